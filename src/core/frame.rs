//! Per-frame particle step and color-batched drawing
//!
//! One call to [`step_particles`] advances every particle by one display
//! frame and sorts the visible dots into gray-level batches, so a surface
//! switches fill color once per batch instead of once per dot.

use std::collections::BTreeMap;

use super::config::MotionConfig;
use super::mask::MaskRect;
use super::particle::Particle;

/// Last known pointer position in surface coordinates
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pointer {
    pub x: f32,
    pub y: f32,
}

impl Pointer {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A filled circle to draw
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Dot {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

/// Anything the engine can draw dots onto.
pub trait DotSurface {
    /// Erase the previous frame
    fn clear(&mut self);

    /// Fill every dot with the gray level `gray` (r = g = b)
    fn fill_dots(&mut self, gray: u8, dots: &[Dot]);
}

/// Visible dots of one frame grouped by quantized gray level.
///
/// Batch vectors are kept between frames to reuse their allocations.
#[derive(Debug, Default)]
pub struct DotBatches {
    batches: BTreeMap<u8, Vec<Dot>>,
}

impl DotBatches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        for dots in self.batches.values_mut() {
            dots.clear();
        }
    }

    #[inline]
    fn push(&mut self, gray: u8, dot: Dot) {
        self.batches.entry(gray).or_default().push(dot);
    }

    /// Non-empty batches in ascending gray order
    pub fn iter(&self) -> impl Iterator<Item = (u8, &[Dot])> {
        self.batches
            .iter()
            .filter(|(_, dots)| !dots.is_empty())
            .map(|(&gray, dots)| (gray, dots.as_slice()))
    }

    pub fn batch_count(&self) -> usize {
        self.iter().count()
    }

    pub fn dot_count(&self) -> usize {
        self.batches.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.dot_count() == 0
    }

    pub fn draw(&self, surface: &mut impl DotSurface) {
        for (gray, dots) in self.iter() {
            surface.fill_dots(gray, dots);
        }
    }
}

/// Pointer proximity in [0, 1]: 1 at the pointer, 0 at or beyond the radius
#[inline]
pub fn pointer_force(p: &Particle, pointer: Option<Pointer>, radius: f32) -> f32 {
    let Some(pointer) = pointer else {
        return 0.0;
    };
    if radius <= 0.0 {
        return 0.0;
    }
    let dx = pointer.x - p.x;
    let dy = pointer.y - p.y;
    let dist_sq = dx * dx + dy * dy;
    if dist_sq < radius * radius {
        (radius - dist_sq.sqrt()) / radius
    } else {
        0.0
    }
}

/// Quantized gray level: darker near the pointer
#[inline]
pub fn gray_bucket(force: f32, motion: &MotionConfig) -> u8 {
    let idle = motion.idle_gray as f32;
    let step = motion.gray_step.max(1) as f32;
    let gray = ((idle - force * idle) / step).floor() * step;
    gray.clamp(0.0, 255.0) as u8
}

/// Advance every particle one frame toward `scene` and collect the dots
/// worth drawing into `out`.
pub fn step_particles(
    particles: &mut [Particle],
    scene: usize,
    masks: &[MaskRect],
    pointer: Option<Pointer>,
    motion: &MotionConfig,
    out: &mut DotBatches,
) {
    out.clear();

    for p in particles.iter_mut() {
        let target_base = p.target(scene);
        p.base_size += (target_base - p.base_size) * motion.base_smoothing;

        let force = pointer_force(p, pointer, motion.pointer_radius);
        let target = if p.is_masked(masks) {
            0.0
        } else {
            p.base_size + force * motion.pointer_boost
        };
        p.current_size += (target - p.current_size) * motion.size_smoothing;

        if p.current_size < motion.min_visible_size {
            continue;
        }

        out.push(
            gray_bucket(force, motion),
            Dot {
                x: p.x,
                y: p.y,
                radius: p.current_size,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particle(x: f32, y: f32, sizes: &[f32]) -> Particle {
        Particle {
            cell: 0,
            x,
            y,
            target_sizes: sizes.to_vec(),
            base_size: sizes[0],
            current_size: 0.0,
        }
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(u8, usize)>,
    }

    impl DotSurface for Recorder {
        fn clear(&mut self) {
            self.calls.clear();
        }

        fn fill_dots(&mut self, gray: u8, dots: &[Dot]) {
            self.calls.push((gray, dots.len()));
        }
    }

    #[test]
    fn base_size_glides_toward_target_scene() {
        let motion = MotionConfig::default();
        let mut ps = vec![particle(0.0, 0.0, &[0.0, 4.0])];
        let mut out = DotBatches::new();

        step_particles(&mut ps, 1, &[], None, &motion, &mut out);
        assert!((ps[0].base_size - 0.4).abs() < 1e-6);
        assert!((ps[0].current_size - 0.08).abs() < 1e-6);
        // Below min_visible_size: nothing drawn yet
        assert!(out.is_empty());

        for _ in 0..200 {
            step_particles(&mut ps, 1, &[], None, &motion, &mut out);
        }
        assert!((ps[0].base_size - 4.0).abs() < 1e-3);
        assert!((ps[0].current_size - 4.0).abs() < 1e-3);
        assert_eq!(out.dot_count(), 1);
    }

    #[test]
    fn masked_particle_fades_out_despite_pointer() {
        let motion = MotionConfig::default();
        let mut ps = vec![particle(50.0, 50.0, &[6.0])];
        ps[0].current_size = 6.0;
        let masks = [MaskRect::new(40.0, 40.0, 60.0, 60.0)];
        let mut out = DotBatches::new();

        for _ in 0..100 {
            step_particles(&mut ps, 0, &masks, Some(Pointer::new(50.0, 50.0)), &motion, &mut out);
        }
        assert!(ps[0].current_size < 1e-6);
        assert!(out.is_empty());
        // Base size is left alone by masking
        assert!((ps[0].base_size - 6.0).abs() < 1e-6);
    }

    #[test]
    fn pointer_boosts_and_darkens_nearby_dots() {
        let motion = MotionConfig::default();
        let mut ps = vec![
            particle(100.0, 100.0, &[2.0]),
            particle(400.0, 100.0, &[2.0]),
        ];
        ps[0].current_size = 2.0;
        ps[1].current_size = 2.0;
        let mut out = DotBatches::new();

        for _ in 0..100 {
            step_particles(&mut ps, 0, &[], Some(Pointer::new(100.0, 100.0)), &motion, &mut out);
        }
        assert!((ps[0].current_size - 7.0).abs() < 1e-3);
        assert!((ps[1].current_size - 2.0).abs() < 1e-3);

        let batches: Vec<(u8, usize)> = out.iter().map(|(g, d)| (g, d.len())).collect();
        assert_eq!(batches, vec![(0, 1), (150, 1)]);
    }

    #[test]
    fn force_falls_off_linearly() {
        let p = particle(0.0, 0.0, &[1.0]);
        assert_eq!(pointer_force(&p, None, 75.0), 0.0);
        assert_eq!(pointer_force(&p, Some(Pointer::new(0.0, 0.0)), 75.0), 1.0);
        assert!((pointer_force(&p, Some(Pointer::new(37.5, 0.0)), 75.0) - 0.5).abs() < 1e-6);
        assert_eq!(pointer_force(&p, Some(Pointer::new(75.0, 0.0)), 75.0), 0.0);
    }

    #[test]
    fn gray_buckets_are_quantized() {
        let motion = MotionConfig::default();
        assert_eq!(gray_bucket(0.0, &motion), 150);
        assert_eq!(gray_bucket(1.0, &motion), 0);
        // 153 - 0.5 * 153 = 76.5 → 70
        assert_eq!(gray_bucket(0.5, &motion), 70);
    }

    #[test]
    fn draw_issues_one_call_per_batch() {
        let motion = MotionConfig::default();
        let mut ps: Vec<Particle> = (0..5).map(|i| particle(i as f32 * 200.0, 0.0, &[3.0])).collect();
        for p in &mut ps {
            p.current_size = 3.0;
        }
        let mut out = DotBatches::new();
        step_particles(&mut ps, 0, &[], Some(Pointer::new(0.0, 0.0)), &motion, &mut out);

        let mut surface = Recorder::default();
        out.draw(&mut surface);
        assert_eq!(out.batch_count(), 2);
        assert_eq!(surface.calls, vec![(0, 1), (150, 4)]);
    }
}
