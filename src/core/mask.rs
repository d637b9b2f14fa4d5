//! Foreground mask rectangles
//!
//! Dots under designated foreground elements (section headers) shrink to
//! nothing. Rectangles are recomputed on scroll and resize.

use serde::{Deserialize, Serialize};

/// Padding added around each foreground element, in pixels
pub const MASK_PADDING: f32 = 4.0;

/// Elements at or below this opacity do not mask
const MIN_MASK_OPACITY: f32 = 0.1;

/// Screen-space rectangle; edges are inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaskRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl MaskRect {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self { left, top, right, bottom }
    }

    #[inline]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }
}

/// Measured bounds and computed visibility of one foreground element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForegroundBounds {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    /// `display != none` and `visibility != hidden`
    pub displayed: bool,
    pub opacity: f32,
}

impl ForegroundBounds {
    fn masks(&self, viewport_height: f32) -> bool {
        let bottom = self.top + self.height;
        self.displayed
            && self.opacity > MIN_MASK_OPACITY
            && bottom > 0.0
            && self.top < viewport_height
            && self.width > 0.0
            && self.height > 0.0
    }
}

/// Padded mask rectangles for every element that is visible on screen.
pub fn collect_masks<I>(elements: I, viewport_height: f32) -> Vec<MaskRect>
where
    I: IntoIterator<Item = ForegroundBounds>,
{
    elements
        .into_iter()
        .filter(|el| el.masks(viewport_height))
        .map(|el| {
            MaskRect::new(
                el.left - MASK_PADDING,
                el.top - MASK_PADDING,
                el.left + el.width + MASK_PADDING,
                el.top + el.height + MASK_PADDING,
            )
        })
        .collect()
}
