//! Scene cache: fully built particle lists per tab

use std::collections::HashMap;

use tracing::{debug, trace};

use super::particle::Particle;
use super::scene::{LoadedImage, TabId};

/// Particles and the image set they were derived from.
#[derive(Clone, Debug)]
pub struct CachedScene {
    pub images: Vec<LoadedImage>,
    pub particles: Vec<Particle>,
}

impl CachedScene {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Particles ready to go live again: every dot grows in from zero.
    pub fn restore_particles(&self) -> Vec<Particle> {
        self.particles
            .iter()
            .map(|p| Particle {
                current_size: 0.0,
                ..p.clone()
            })
            .collect()
    }
}

/// Tab → fully loaded scene. Only complete sets are ever stored.
#[derive(Debug, Default)]
pub struct SceneCache {
    scenes: HashMap<TabId, CachedScene>,
}

impl SceneCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached scene for `tab`, only if it was built from `expected_len` images
    pub fn lookup(&self, tab: &TabId, expected_len: usize) -> Option<&CachedScene> {
        let scene = self.scenes.get(tab)?;
        if scene.len() != expected_len {
            trace!(%tab, cached = scene.len(), expected_len, "Scene cache size mismatch");
            return None;
        }
        Some(scene)
    }

    /// Store a complete scene. Multi-image sets always replace the entry;
    /// a single-image set is written only when the tab has no entry yet.
    pub fn store(&mut self, tab: TabId, scene: CachedScene) -> bool {
        if scene.len() <= 1 && self.scenes.contains_key(&tab) {
            trace!(%tab, "Keeping existing scene cache entry");
            return false;
        }
        debug!(%tab, images = scene.len(), particles = scene.particles.len(), "Scene cached");
        self.scenes.insert(tab, scene);
        true
    }

    pub fn contains(&self, tab: &TabId) -> bool {
        self.scenes.contains_key(tab)
    }

    pub fn get(&self, tab: &TabId) -> Option<&CachedScene> {
        self.scenes.get(tab)
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn clear(&mut self) {
        self.scenes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::preset::ImageTag;
    use crate::core::scene::ImageSource;
    use image::RgbaImage;

    fn scene(n: usize) -> CachedScene {
        let images = (0..n)
            .map(|i| {
                LoadedImage::new(
                    &ImageSource::new(format!("img-{i}.png"), ImageTag::Default),
                    RgbaImage::new(2, 2),
                )
            })
            .collect();
        CachedScene {
            images,
            particles: vec![Particle {
                cell: 3,
                x: 1.0,
                y: 2.0,
                target_sizes: vec![1.0; n],
                base_size: 1.0,
                current_size: 0.9,
            }],
        }
    }

    #[test]
    fn lookup_requires_matching_set_size() {
        let mut cache = SceneCache::new();
        let tab = TabId::from("resume");
        assert!(cache.store(tab.clone(), scene(3)));

        assert!(cache.lookup(&tab, 3).is_some());
        assert!(cache.lookup(&tab, 2).is_none());
        assert!(cache.lookup(&TabId::from("arts"), 3).is_none());
    }

    #[test]
    fn single_image_set_never_replaces_entry() {
        let mut cache = SceneCache::new();
        let tab = TabId::from("writing");
        assert!(cache.store(tab.clone(), scene(1)));
        assert!(!cache.store(tab.clone(), scene(1)));
        assert!(cache.store(tab.clone(), scene(3)));
        assert_eq!(cache.get(&tab).unwrap().len(), 3);
        assert!(!cache.store(tab.clone(), scene(1)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn restored_particles_start_invisible() {
        let restored = scene(2).restore_particles();
        assert_eq!(restored[0].current_size, 0.0);
        assert_eq!(restored[0].base_size, 1.0);
        assert_eq!(restored[0].target_sizes.len(), 2);
    }
}
