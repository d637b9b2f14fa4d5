//! Size-map builder: image → per-cell dot weights
//!
//! The source image is center-cropped to the grid's aspect ratio, scaled
//! down to one pixel per grid cell and converted to inverted grayscale.
//! The per-image [`Tuning`] turns that intensity into a dot radius.

use std::collections::HashMap;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use tracing::{debug, trace};

use super::grid::GridSize;
use super::preset::{PresetTable, Tuning};
use super::scene::{CropBias, ImageId, LoadedImage};

/// Share of the image height the upper-biased crop moves up by
const UPPER_CROP_SHIFT: f32 = 0.25;

/// Source-space crop window, in image pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CropRect {
    /// Integer window clamped to the image bounds, at least 1×1
    fn pixel_bounds(&self, image_width: u32, image_height: u32) -> (u32, u32, u32, u32) {
        let x = (self.x.round().max(0.0) as u32).min(image_width.saturating_sub(1));
        let y = (self.y.round().max(0.0) as u32).min(image_height.saturating_sub(1));
        let w = (self.width.round() as u32).clamp(1, image_width - x);
        let h = (self.height.round() as u32).clamp(1, image_height - y);
        (x, y, w, h)
    }
}

/// Crop matching the grid aspect, trimming the excess evenly from the
/// longer axis of the image.
pub fn crop_rect(image_width: u32, image_height: u32, grid: GridSize, bias: CropBias) -> CropRect {
    let (w, h) = (image_width as f32, image_height as f32);
    let screen_aspect = grid.aspect();
    let image_aspect = w / h;

    let mut rect = if screen_aspect > image_aspect {
        let height = w / screen_aspect;
        CropRect {
            x: 0.0,
            y: (h - height) / 2.0,
            width: w,
            height,
        }
    } else {
        let width = h * screen_aspect;
        CropRect {
            x: (w - width) / 2.0,
            y: 0.0,
            width,
            height: h,
        }
    };

    if bias == CropBias::Upper {
        rect.y = (rect.y - h * UPPER_CROP_SHIFT).max(0.0);
    }
    rect
}

/// Dense row-major weights, one per grid cell.
#[derive(Clone, Debug, PartialEq)]
pub struct SizeMap {
    grid: GridSize,
    weights: Vec<f32>,
}

impl SizeMap {
    pub fn grid(&self) -> GridSize {
        self.grid
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    #[inline]
    pub fn get(&self, cell: usize) -> f32 {
        self.weights.get(cell).copied().unwrap_or(0.0)
    }

    pub fn max_weight(&self) -> f32 {
        self.weights.iter().copied().fold(0.0, f32::max)
    }
}

/// Sample `image` at `grid` resolution. Pure function of its inputs.
pub fn build_size_map(image: &RgbaImage, grid: GridSize, tuning: Tuning, bias: CropBias) -> SizeMap {
    if grid.is_empty() || image.width() == 0 || image.height() == 0 {
        return SizeMap {
            grid,
            weights: vec![0.0; grid.cell_count()],
        };
    }

    let (x, y, w, h) = crop_rect(image.width(), image.height(), grid, bias)
        .pixel_bounds(image.width(), image.height());
    let cropped = imageops::crop_imm(image, x, y, w, h).to_image();
    let sampled = imageops::resize(&cropped, grid.cols, grid.rows, FilterType::Triangle);

    let weights = sampled
        .pixels()
        .map(|px| {
            let [r, g, b, _] = px.0;
            let sum = r as f32 + g as f32 + b as f32;
            tuning.weight(1.0 - sum / 765.0)
        })
        .collect();

    SizeMap { grid, weights }
}

/// Size maps keyed by (image identity, grid dimensions).
///
/// Entries never go stale for a fixed grid; the whole cache is dropped
/// when the viewport changes.
#[derive(Debug, Default)]
pub struct SizeMapCache {
    maps: HashMap<(ImageId, GridSize), Arc<SizeMap>>,
}

impl SizeMapCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(&mut self, image: &LoadedImage, grid: GridSize, presets: &PresetTable) -> Arc<SizeMap> {
        let key = (image.id.clone(), grid);
        if let Some(map) = self.maps.get(&key) {
            trace!(image = %image.id, cols = grid.cols, rows = grid.rows, "Size map cache hit");
            return map.clone();
        }

        let tuning = presets.tuning(image.tag);
        let map = Arc::new(build_size_map(&image.pixels, grid, tuning, image.crop));
        debug!(
            image = %image.id,
            cols = grid.cols,
            rows = grid.rows,
            tag = ?image.tag,
            max = map.max_weight(),
            "Size map built"
        );
        self.maps.insert(key, map.clone());
        map
    }

    pub fn contains(&self, id: &ImageId, grid: GridSize) -> bool {
        self.maps.contains_key(&(id.clone(), grid))
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn clear(&mut self) {
        self.maps.clear();
    }
}
