//! 2D canvas dot surface

use std::collections::HashMap;
use std::f64::consts::TAU;

use tracing::warn;
use web_sys::CanvasRenderingContext2d;

use crate::core::frame::{Dot, DotSurface};

pub struct CanvasSurface {
    ctx: CanvasRenderingContext2d,
    width: f64,
    height: f64,
    /// "rgb(g,g,g)" per gray level
    styles: HashMap<u8, String>,
}

impl CanvasSurface {
    pub fn new(ctx: CanvasRenderingContext2d, width: f64, height: f64) -> Self {
        Self {
            ctx,
            width,
            height,
            styles: HashMap::new(),
        }
    }

    pub fn set_size(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }
}

impl DotSurface for CanvasSurface {
    fn clear(&mut self) {
        self.ctx.clear_rect(0.0, 0.0, self.width, self.height);
    }

    fn fill_dots(&mut self, gray: u8, dots: &[Dot]) {
        let style = self
            .styles
            .entry(gray)
            .or_insert_with(|| format!("rgb({gray},{gray},{gray})"));
        self.ctx.set_fill_style_str(style);

        // One path and one fill per gray level
        self.ctx.begin_path();
        for dot in dots {
            let (x, y, r) = (dot.x as f64, dot.y as f64, dot.radius as f64);
            self.ctx.move_to(x + r, y);
            if let Err(e) = self.ctx.arc(x, y, r, 0.0, TAU) {
                warn!(error = ?e, x, y, radius = r, "Dot arc rejected");
                break;
            }
        }
        self.ctx.fill();
    }
}
