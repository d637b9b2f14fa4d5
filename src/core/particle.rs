//! Particle grid builder
//!
//! Merges the size maps of a scene set into the live particle list. Only
//! cells that are visible in at least one scene become particles.

use std::sync::Arc;

use tracing::debug;

use super::grid::CellLayout;
use super::mask::MaskRect;
use super::size_map::SizeMap;

/// Minimum per-cell weight (across all scenes) that yields a particle
pub const VISIBILITY_THRESHOLD: f32 = 0.05;

/// One visible grid cell with per-scene target sizes.
#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    /// Row-major cell index in the grid the particle was built for
    pub cell: usize,
    pub x: f32,
    pub y: f32,
    /// One weight per image of the scene set
    pub target_sizes: Vec<f32>,
    /// Smoothed toward `target_sizes[scene]`
    pub base_size: f32,
    /// Drawn radius, smoothed toward the masked/boosted base size
    pub current_size: f32,
}

impl Particle {
    /// Weight for a scene index; out-of-range scenes read as empty
    #[inline]
    pub fn target(&self, scene: usize) -> f32 {
        self.target_sizes.get(scene).copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn is_masked(&self, masks: &[MaskRect]) -> bool {
        masks.iter().any(|r| r.contains(self.x, self.y))
    }
}

/// Build particles for every cell whose maximum weight across `maps`
/// exceeds `threshold`. All maps must share the layout's grid. A negative
/// threshold acts as zero, so all-empty cells never become particles.
pub fn build_particles(maps: &[Arc<SizeMap>], layout: CellLayout, threshold: f32) -> Vec<Particle> {
    let cells = layout.grid.cell_count();
    let threshold = threshold.max(0.0);
    let mut particles = Vec::new();

    for cell in 0..cells {
        let max = maps.iter().map(|m| m.get(cell)).fold(0.0_f32, f32::max);
        if max <= threshold {
            continue;
        }

        let target_sizes: Vec<f32> = maps.iter().map(|m| m.get(cell)).collect();
        let (x, y) = layout.cell_center(cell);
        particles.push(Particle {
            cell,
            x,
            y,
            base_size: target_sizes.first().copied().unwrap_or(0.0),
            current_size: 0.0,
            target_sizes,
        });
    }

    debug!(
        scenes = maps.len(),
        cols = layout.grid.cols,
        rows = layout.grid.rows,
        particles = particles.len(),
        "Particles built"
    );
    particles
}

/// Transfer smoothed sizes from `old` particles that occupy the same cell
/// index. Both lists are sorted by cell, as `build_particles` emits them.
pub fn carry_over(new: &mut [Particle], old: &[Particle]) -> usize {
    let mut reused = 0;
    let mut old_iter = old.iter().peekable();

    for p in new.iter_mut() {
        while old_iter.peek().is_some_and(|o| o.cell < p.cell) {
            old_iter.next();
        }
        if let Some(o) = old_iter.peek() {
            if o.cell == p.cell {
                p.base_size = o.base_size;
                p.current_size = o.current_size;
                reused += 1;
            }
        }
    }
    reused
}

/// Split a freshly built list so that only the first `batch` particles
/// are revealed immediately. `batch == 0` disables the split.
pub fn split_for_reveal(mut particles: Vec<Particle>, batch: usize) -> (Vec<Particle>, Vec<Particle>) {
    if batch == 0 || particles.len() <= batch {
        return (particles, Vec::new());
    }
    let rest = particles.split_off(batch);
    (particles, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::GridSize;
    use crate::core::preset::Tuning;
    use crate::core::scene::CropBias;
    use crate::core::size_map::build_size_map;
    use image::{Rgba, RgbaImage};
    use proptest::prelude::*;

    fn map_from(weights: &[(u32, u32, u8)], grid: GridSize, max: f32) -> Arc<SizeMap> {
        let mut img = RgbaImage::from_pixel(grid.cols, grid.rows, Rgba([255, 255, 255, 255]));
        for &(x, y, v) in weights {
            img.put_pixel(x, y, Rgba([v, v, v, 255]));
        }
        Arc::new(build_size_map(&img, grid, Tuning::new(0.0, 1.0, max), CropBias::Center))
    }

    #[test]
    fn one_visible_cell_becomes_one_particle() {
        let grid = GridSize::new(10, 10);
        let layout = CellLayout::new(grid, 12.0);
        let a = map_from(&[(4, 7, 0)], grid, 3.0);
        let b = map_from(&[], grid, 3.0);

        let particles = build_particles(&[a, b], layout, VISIBILITY_THRESHOLD);
        assert_eq!(particles.len(), 1);
        let p = &particles[0];
        assert_eq!(p.cell, 74);
        assert_eq!((p.x, p.y), (54.0, 90.0));
        assert_eq!(p.target_sizes.len(), 2);
        assert!((p.target_sizes[0] - 3.0).abs() < 1e-6);
        assert_eq!(p.target_sizes[1], 0.0);
        assert_eq!(p.current_size, 0.0);
        assert_eq!(p.base_size, p.target_sizes[0]);
    }

    #[test]
    fn negative_threshold_skips_empty_cells() {
        let grid = GridSize::new(10, 10);
        let layout = CellLayout::new(grid, 10.0);
        let maps = vec![map_from(&[(4, 4, 0)], grid, 5.0)];

        let particles = build_particles(&maps, layout, -1.0);
        assert_eq!(particles.len(), 1);
        assert!(particles.iter().all(|p| p.target_sizes.iter().any(|&w| w > 0.0)));
    }

    #[test]
    fn cell_visible_only_in_later_scene_is_kept() {
        let grid = GridSize::new(4, 4);
        let layout = CellLayout::new(grid, 10.0);
        let a = map_from(&[], grid, 5.0);
        let b = map_from(&[(1, 1, 0)], grid, 5.0);

        let particles = build_particles(&[a, b], layout, VISIBILITY_THRESHOLD);
        assert_eq!(particles.len(), 1);
        assert_eq!(particles[0].base_size, 0.0);
        assert!((particles[0].target(1) - 5.0).abs() < 1e-6);
        assert_eq!(particles[0].target(7), 0.0);
    }

    #[test]
    fn carry_over_matches_cells() {
        let layout = CellLayout::new(GridSize::new(4, 1), 10.0);
        let make = |cell: usize, size: f32| {
            let (x, y) = layout.cell_center(cell);
            Particle {
                cell,
                x,
                y,
                target_sizes: vec![1.0],
                base_size: size,
                current_size: size,
            }
        };
        let old = vec![make(0, 2.0), make(2, 3.0)];
        let mut new = vec![make(1, 0.0), make(2, 0.0), make(3, 0.0)];

        assert_eq!(carry_over(&mut new, &old), 1);
        assert_eq!(new[0].current_size, 0.0);
        assert_eq!(new[1].current_size, 3.0);
        assert_eq!(new[1].base_size, 3.0);
        assert_eq!(new[2].current_size, 0.0);
    }

    #[test]
    fn reveal_split_keeps_everything() {
        let layout = CellLayout::new(GridSize::new(8, 8), 10.0);
        let particles: Vec<Particle> = (0..10)
            .map(|cell| {
                let (x, y) = layout.cell_center(cell);
                Particle { cell, x, y, target_sizes: vec![1.0], base_size: 1.0, current_size: 0.0 }
            })
            .collect();

        let (now, later) = split_for_reveal(particles.clone(), 4);
        assert_eq!(now.len(), 4);
        assert_eq!(later.len(), 6);
        let mut joined = now;
        joined.extend(later);
        assert_eq!(joined, particles);

        let (now, later) = split_for_reveal(particles, 0);
        assert_eq!(now.len(), 10);
        assert!(later.is_empty());
    }

    proptest! {
        #[test]
        fn vectors_match_scene_count_and_no_particle_is_empty(
            scenes in 1usize..5,
            dark in proptest::collection::vec((0u32..6, 0u32..5, any::<u8>()), 0..12),
        ) {
            let grid = GridSize::new(6, 5);
            let layout = CellLayout::new(grid, 8.0);
            let maps: Vec<Arc<SizeMap>> = (0..scenes)
                .map(|s| {
                    let cells: Vec<_> = dark.iter().copied().skip(s).step_by(scenes).collect();
                    map_from(&cells, grid, 4.0)
                })
                .collect();

            let particles = build_particles(&maps, layout, VISIBILITY_THRESHOLD);
            for p in &particles {
                prop_assert_eq!(p.target_sizes.len(), scenes);
                let max = p.target_sizes.iter().copied().fold(0.0_f32, f32::max);
                prop_assert!(max > VISIBILITY_THRESHOLD);
            }
            let expected = (0..grid.cell_count())
                .filter(|&c| maps.iter().map(|m| m.get(c)).fold(0.0_f32, f32::max) > VISIBILITY_THRESHOLD)
                .count();
            prop_assert_eq!(particles.len(), expected);
        }
    }
}
