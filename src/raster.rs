//! Software dot surface backed by an `RgbaImage`
//!
//! Used by the CLI to render frames to PNG and by tests that need to
//! look at actual pixels.

use image::{Rgba, RgbaImage};

use crate::core::frame::{Dot, DotSurface};

/// Page background the dots are drawn over
pub const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

pub struct RasterSurface {
    image: RgbaImage,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, BACKGROUND),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Fill every pixel whose center lies inside the circle
    fn fill_circle(&mut self, dot: Dot, color: Rgba<u8>) {
        if dot.radius <= 0.0 {
            return;
        }
        let (w, h) = self.image.dimensions();
        let r_sq = dot.radius * dot.radius;

        let x0 = (dot.x - dot.radius).floor().max(0.0) as u32;
        let y0 = (dot.y - dot.radius).floor().max(0.0) as u32;
        let x1 = ((dot.x + dot.radius).ceil().max(0.0) as u32).min(w);
        let y1 = ((dot.y + dot.radius).ceil().max(0.0) as u32).min(h);

        for y in y0..y1 {
            let dy = y as f32 + 0.5 - dot.y;
            for x in x0..x1 {
                let dx = x as f32 + 0.5 - dot.x;
                if dx * dx + dy * dy <= r_sq {
                    self.image.put_pixel(x, y, color);
                }
            }
        }
    }

    #[cfg(feature = "cli")]
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> image::ImageResult<()> {
        self.image.save(path)
    }
}

impl DotSurface for RasterSurface {
    fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = BACKGROUND;
        }
    }

    fn fill_dots(&mut self, gray: u8, dots: &[Dot]) {
        let color = Rgba([gray, gray, gray, 255]);
        for &dot in dots {
            self.fill_circle(dot, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_circle_interior_only() {
        let mut surface = RasterSurface::new(20, 20);
        surface.fill_dots(
            100,
            &[Dot {
                x: 10.0,
                y: 10.0,
                radius: 3.0,
            }],
        );
        let img = surface.image();
        assert_eq!(img.get_pixel(10, 10), &Rgba([100, 100, 100, 255]));
        assert_eq!(img.get_pixel(10, 7), &Rgba([100, 100, 100, 255]));
        assert_eq!(img.get_pixel(10, 4), &BACKGROUND);
        assert_eq!(img.get_pixel(0, 0), &BACKGROUND);
    }

    #[test]
    fn clips_at_edges_and_clears() {
        let mut surface = RasterSurface::new(8, 8);
        surface.fill_dots(
            0,
            &[Dot {
                x: 0.0,
                y: 7.5,
                radius: 4.0,
            }],
        );
        assert_eq!(surface.image().get_pixel(0, 7), &Rgba([0, 0, 0, 255]));

        surface.clear();
        assert!(surface.image().pixels().all(|p| *p == BACKGROUND));
    }

    #[test]
    fn engine_frame_renders_dots() {
        use crate::core::{EngineConfig, LoadCompletion, MorphEngine, PresetTable, TabId, Viewport};
        use crate::core::{ImageSource, ImageTag};

        let mut engine =
            MorphEngine::new(EngineConfig::default(), PresetTable::default(), Viewport::new(48.0, 48.0));
        let request = engine
            .set_art_set(
                TabId::from("resume"),
                vec![ImageSource::new("dark.png", ImageTag::Default)],
            )
            .unwrap();
        engine.accept(LoadCompletion {
            ticket: request.ticket,
            index: 0,
            result: Ok(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255]))),
        });

        let mut surface = RasterSurface::new(48, 48);
        for _ in 0..40 {
            engine.frame(&mut surface);
        }
        // Cell centers sit at 6, 18, 30, 42; idle dots are gray 150
        assert_eq!(surface.image().get_pixel(6, 6), &Rgba([150, 150, 150, 255]));
        assert_eq!(surface.image().get_pixel(0, 0), &BACKGROUND);
    }
}
