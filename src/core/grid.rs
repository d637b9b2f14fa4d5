//! Viewport and dot-grid geometry

use serde::{Deserialize, Serialize};

/// Drawable surface size in CSS pixels
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }
}

/// Grid resolution in cells. One cell holds at most one dot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GridSize {
    pub cols: u32,
    pub rows: u32,
}

impl GridSize {
    pub fn new(cols: u32, rows: u32) -> Self {
        Self { cols, rows }
    }

    /// Number of whole cells of `gap` pixels that fit into the viewport
    pub fn for_viewport(viewport: Viewport, gap: f32) -> Self {
        if gap <= 0.0 {
            return Self::default();
        }
        Self {
            cols: (viewport.width / gap).floor() as u32,
            rows: (viewport.height / gap).floor() as u32,
        }
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    pub fn is_empty(&self) -> bool {
        self.cols == 0 || self.rows == 0
    }

    /// cols / rows; callers must check `is_empty` first
    pub fn aspect(&self) -> f32 {
        self.cols as f32 / self.rows as f32
    }
}

/// Maps cell indices of a grid to screen positions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellLayout {
    pub grid: GridSize,
    pub gap: f32,
}

impl CellLayout {
    pub fn new(grid: GridSize, gap: f32) -> Self {
        Self { grid, gap }
    }

    /// Screen-space center of a row-major cell index
    #[inline]
    pub fn cell_center(&self, index: usize) -> (f32, f32) {
        let cols = self.grid.cols.max(1) as usize;
        let col = index % cols;
        let row = index / cols;
        (
            col as f32 * self.gap + self.gap / 2.0,
            row as f32 * self.gap + self.gap / 2.0,
        )
    }
}
