//! Platform-agnostic time utilities
//!
//! Provides a unified way to get elapsed time in seconds since app start.

use std::collections::VecDeque;

#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
pub fn now_seconds() -> f64 {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now() / 1000.0)
        .unwrap_or(0.0)
}

#[cfg(not(all(target_arch = "wasm32", feature = "wasm")))]
pub fn now_seconds() -> f64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_secs_f64()
}

/// Frame rate over the last 60 frames
#[derive(Debug)]
pub struct FpsCounter {
    frames: VecDeque<f64>,
}

impl FpsCounter {
    const WINDOW: usize = 60;

    pub fn new() -> Self {
        Self {
            frames: VecDeque::with_capacity(Self::WINDOW + 1),
        }
    }

    pub fn tick(&mut self) {
        self.tick_at(now_seconds());
    }

    /// Record a frame at `seconds`
    pub fn tick_at(&mut self, seconds: f64) {
        self.frames.push_back(seconds);
        if self.frames.len() > Self::WINDOW {
            self.frames.pop_front();
        }
    }

    pub fn fps(&self) -> f64 {
        let (Some(first), Some(last)) = (self.frames.front(), self.frames.back()) else {
            return 0.0;
        };
        let elapsed = last - first;
        if elapsed <= 0.0 {
            return 0.0;
        }
        (self.frames.len() as f64 - 1.0) / elapsed
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_over_window() {
        let mut fps = FpsCounter::new();
        assert_eq!(fps.fps(), 0.0);
        for i in 0..100 {
            fps.tick_at(i as f64 / 50.0);
        }
        assert!((fps.fps() - 50.0).abs() < 1e-6);
    }

    #[test]
    fn single_frame_has_no_rate() {
        let mut fps = FpsCounter::new();
        fps.tick_at(1.0);
        assert_eq!(fps.fps(), 0.0);
    }
}
