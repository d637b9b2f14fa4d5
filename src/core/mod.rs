//! Platform-agnostic core module - shared between the WASM front end and CLI

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod grid;
pub mod loader;
pub mod mask;
pub mod particle;
pub mod preset;
pub mod scene;
pub mod scroll;
pub mod size_map;

pub use cache::{CachedScene, SceneCache};
pub use config::{EngineConfig, MotionConfig, SiteConfig, TabConfig};
pub use engine::MorphEngine;
pub use error::{ConfigError, LoadError};
pub use frame::{Dot, DotBatches, DotSurface, Pointer};
pub use grid::{CellLayout, GridSize, Viewport};
pub use loader::{LoadCompletion, LoadRequest, LoadState, LoadTicket, WarmCompletion, WarmRequest};
pub use mask::{collect_masks, ForegroundBounds, MaskRect};
pub use particle::Particle;
pub use preset::{ImageTag, PresetTable, Tuning};
pub use scene::{CropBias, Generation, ImageId, ImageSource, LoadedImage, SceneSet, TabId};
#[allow(unused_imports)]
pub use size_map::{build_size_map, SizeMap, SizeMapCache};
