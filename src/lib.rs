//! Dot-art background engine
//!
//! Turns sets of photographs into a grid of gray dots whose sizes follow
//! image darkness, and morphs the dots between the images of a set as the
//! page scrolls:
//! - `core`: platform-agnostic engine, size maps, particles, frame step
//! - `wasm`: `DotArt` bindings driving a 2D canvas (feature `wasm`)
//! - `loader_native` + `raster`: headless loading and rendering (feature `cli`)

pub mod core;
pub mod raster;
pub mod time;

#[cfg(feature = "cli")]
pub mod loader_native;

#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
mod canvas;
#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
mod loader_wasm;
#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
mod wasm;

#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
pub use wasm::DotArt;
