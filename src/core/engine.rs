//! Morph engine: owns all live scene state
//!
//! The engine never performs I/O. Loading is requested by returning a
//! [`LoadRequest`] or [`WarmRequest`] to the caller, which hands it to a
//! platform loader and feeds the results back through [`MorphEngine::accept`]
//! and [`MorphEngine::accept_warm`]. Every method runs on the render thread.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use super::cache::{CachedScene, SceneCache};
use super::config::EngineConfig;
use super::frame::{step_particles, DotBatches, DotSurface, Pointer};
use super::grid::{CellLayout, GridSize, Viewport};
use super::loader::{
    LoadCompletion, LoadProgress, LoadRequest, LoadState, LoadTicket, SceneLoad, WarmCompletion, WarmRequest,
};
use super::mask::MaskRect;
use super::particle::{build_particles, carry_over, split_for_reveal, Particle};
use super::preset::PresetTable;
use super::scene::{Generation, ImageSource, LoadedImage, TabId};
use super::size_map::SizeMapCache;

pub struct MorphEngine {
    config: EngineConfig,
    presets: PresetTable,
    viewport: Viewport,
    grid: GridSize,
    preview_grid: GridSize,
    resize_epoch: u64,

    size_maps: SizeMapCache,
    scenes: SceneCache,

    /// Finished pre-warm loads waiting for idle time to be built
    warm_queue: VecDeque<WarmCompletion>,

    current_tab: Option<TabId>,
    generation: Generation,
    pending: Option<SceneLoad>,
    /// Fully loaded set behind the live particles (empty while loading)
    active: Vec<LoadedImage>,
    /// Image behind a live preview, with the scene count it stands in for
    preview: Option<(LoadedImage, usize)>,

    particles: Vec<Particle>,
    deferred: Vec<Particle>,
    scene_len: usize,
    target_scene: usize,

    pointer: Option<Pointer>,
    masks: Vec<MaskRect>,
    masks_dirty: bool,
    batches: DotBatches,
}

impl MorphEngine {
    pub fn new(config: EngineConfig, presets: PresetTable, viewport: Viewport) -> Self {
        let grid = GridSize::for_viewport(viewport, config.gap);
        let preview_grid = GridSize::for_viewport(viewport, config.preview_gap);
        info!(
            width = viewport.width,
            height = viewport.height,
            cols = grid.cols,
            rows = grid.rows,
            "Morph engine created"
        );
        Self {
            config,
            presets,
            viewport,
            grid,
            preview_grid,
            resize_epoch: 0,
            size_maps: SizeMapCache::new(),
            scenes: SceneCache::new(),
            warm_queue: VecDeque::new(),
            current_tab: None,
            generation: Generation::default(),
            pending: None,
            active: Vec::new(),
            preview: None,
            particles: Vec::new(),
            deferred: Vec::new(),
            scene_len: 0,
            target_scene: 0,
            pointer: None,
            masks: Vec::new(),
            masks_dirty: true,
            batches: DotBatches::new(),
        }
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Make `sources` the scene set of `tab`. Returns the load the caller
    /// must start, or `None` when the set is empty or already cached.
    pub fn set_art_set(&mut self, tab: TabId, sources: Vec<ImageSource>) -> Option<LoadRequest> {
        self.current_tab = Some(tab.clone());
        self.pending = None;

        if sources.is_empty() {
            debug!(%tab, "Empty scene set");
            self.clear_live();
            return None;
        }

        if self.install_cached(&tab, sources.len()) {
            return None;
        }

        self.clear_live();
        self.generation = self.generation.next();
        let ticket = LoadTicket {
            tab: tab.clone(),
            generation: self.generation,
        };
        info!(%tab, images = sources.len(), generation = self.generation.value(), "Loading scene set");

        let request = LoadRequest { ticket, sources };
        self.pending = Some(SceneLoad::new(request.clone()));
        Some(request)
    }

    /// Feed one image result into the pending load. Returns true when
    /// the live particles changed.
    pub fn accept(&mut self, completion: LoadCompletion) -> bool {
        let quick_preview = self.config.quick_preview;
        let generation = self.generation;

        let Some(load) = self.pending.as_mut() else {
            debug!(tab = %completion.ticket.tab, "Completion without pending load discarded");
            return false;
        };
        if completion.ticket.generation != generation || load.ticket() != &completion.ticket {
            debug!(
                tab = %completion.ticket.tab,
                generation = completion.ticket.generation.value(),
                current = generation.value(),
                "Stale completion discarded"
            );
            return false;
        }

        let progress = load.accept(completion.index, completion.result);
        let scene_count = load.len();
        let preview = match progress {
            LoadProgress::FirstReady(index) if quick_preview && scene_count > 1 && load.commit_preview() => {
                load.ready_image(index).cloned()
            }
            _ => None,
        };

        match progress {
            LoadProgress::FirstReady(_) => match preview {
                Some(image) => {
                    self.install_preview(image, scene_count);
                    true
                }
                None => false,
            },
            LoadProgress::AllReady => {
                let Some(load) = self.pending.take() else {
                    return false;
                };
                match load.into_scene_set() {
                    Ok(set) => {
                        let tab = set.tab().clone();
                        self.commit_final(tab, set.into_images());
                        true
                    }
                    Err(load) => {
                        self.pending = Some(load);
                        false
                    }
                }
            }
            LoadProgress::Stalled | LoadProgress::Pending => false,
        }
    }

    /// Request a background load of `tab`'s set so a later switch hits
    /// the scene cache.
    pub fn pre_warm(&self, tab: TabId, sources: Vec<ImageSource>) -> Option<WarmRequest> {
        if sources.is_empty() || self.scenes.contains(&tab) {
            return None;
        }
        debug!(%tab, images = sources.len(), delay_ms = self.config.prewarm_delay_ms, "Pre-warm requested");
        Some(WarmRequest {
            tab,
            epoch: self.resize_epoch,
            delay_ms: self.config.prewarm_delay_ms,
            sources,
        })
    }

    /// Build and cache a pre-warmed set. Never touches live state.
    /// Returns true when the scene cache gained an entry.
    pub fn accept_warm(&mut self, completion: WarmCompletion) -> bool {
        let tab = completion.tab;
        if completion.epoch != self.resize_epoch {
            debug!(%tab, epoch = completion.epoch, current = self.resize_epoch, "Stale pre-warm discarded");
            return false;
        }
        if self.scenes.contains(&tab) {
            debug!(%tab, "Pre-warm finished for cached tab");
            return false;
        }
        if completion.sources.is_empty() || completion.results.len() != completion.sources.len() {
            warn!(%tab, sources = completion.sources.len(), results = completion.results.len(), "Malformed pre-warm result");
            return false;
        }

        let mut images = Vec::with_capacity(completion.sources.len());
        let mut failed = 0;
        for (source, result) in completion.sources.iter().zip(completion.results) {
            match result {
                Ok(pixels) if pixels.width() > 0 && pixels.height() > 0 => {
                    images.push(LoadedImage::new(source, pixels));
                }
                Ok(_) => {
                    warn!(%tab, src = %source.src, "Pre-warm image has zero size");
                    failed += 1;
                }
                Err(e) => {
                    warn!(%tab, error = %e, "Pre-warm image failed");
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            warn!(%tab, failed, "Partial pre-warm not cached");
            return false;
        }

        let particles = self.build_full(&images);
        self.scenes.store(tab, CachedScene { images, particles })
    }

    /// Hold a finished pre-warm load without building it. The caller
    /// drains the queue with [`MorphEngine::build_queued_warm`] when the
    /// display is idle.
    pub fn queue_warm(&mut self, completion: WarmCompletion) {
        debug!(tab = %completion.tab, queued = self.warm_queue.len() + 1, "Pre-warm queued for idle build");
        self.warm_queue.push_back(completion);
    }

    pub fn warm_queued(&self) -> usize {
        self.warm_queue.len()
    }

    /// Build the oldest queued pre-warm. Returns true when the scene cache
    /// gained an entry.
    pub fn build_queued_warm(&mut self) -> bool {
        match self.warm_queue.pop_front() {
            Some(completion) => self.accept_warm(completion),
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Scene selection
    // ------------------------------------------------------------------

    /// Switch the current tab. Loads in flight for the previous tab go
    /// stale; a cached scene for the new tab goes live immediately.
    pub fn set_current_tab(&mut self, tab: TabId) -> bool {
        self.masks.clear();
        self.masks_dirty = true;

        if self.current_tab.as_ref() == Some(&tab) {
            return false;
        }
        debug!(from = ?self.current_tab.as_ref().map(TabId::as_str), to = %tab, "Current tab changed");

        self.generation = self.generation.next();
        self.pending = None;
        self.current_tab = Some(tab.clone());

        let len = self.scenes.get(&tab).map(CachedScene::len);
        if !len.is_some_and(|len| self.install_cached(&tab, len)) {
            self.clear_live();
        }
        true
    }

    /// Glide every particle toward scene `index` (clamped). Returns false
    /// when there is nothing to do.
    pub fn morph_to(&mut self, index: usize) -> bool {
        if self.scene_len == 0 {
            return false;
        }
        let index = index.min(self.scene_len - 1);
        if index == self.target_scene {
            return false;
        }
        debug!(from = self.target_scene, to = index, "Morph");
        self.target_scene = index;
        true
    }

    pub fn set_pointer(&mut self, pointer: Option<Pointer>) {
        self.pointer = pointer;
    }

    pub fn set_masks(&mut self, masks: Vec<MaskRect>) {
        self.masks = masks;
    }

    /// True once after anything invalidated the mask rectangles
    pub fn take_mask_refresh(&mut self) -> bool {
        std::mem::take(&mut self.masks_dirty)
    }

    // ------------------------------------------------------------------
    // Resize and frame
    // ------------------------------------------------------------------

    /// Adopt a new viewport. Both caches are dropped; the live scene is
    /// rebuilt on the new grid.
    pub fn resize(&mut self, viewport: Viewport) -> bool {
        if viewport == self.viewport {
            return false;
        }
        self.viewport = viewport;
        self.grid = GridSize::for_viewport(viewport, self.config.gap);
        self.preview_grid = GridSize::for_viewport(viewport, self.config.preview_gap);
        self.resize_epoch += 1;
        self.size_maps.clear();
        self.scenes.clear();
        self.masks_dirty = true;
        info!(
            width = viewport.width,
            height = viewport.height,
            cols = self.grid.cols,
            rows = self.grid.rows,
            epoch = self.resize_epoch,
            "Resized"
        );

        if !self.active.is_empty() {
            let images = std::mem::take(&mut self.active);
            let mut particles = self.build_full(&images);
            if self.config.carry_over_on_resize {
                self.particles.append(&mut self.deferred);
                let reused = carry_over(&mut particles, &self.particles);
                debug!(reused, "Carried over particle sizes");
            }
            if let Some(tab) = self.current_tab.clone() {
                self.scenes.store(
                    tab,
                    CachedScene {
                        images: images.clone(),
                        particles: particles.clone(),
                    },
                );
            }
            self.active = images;
            self.install_live(particles);
        } else if let Some((image, scene_count)) = self.preview.take() {
            self.install_preview(image, scene_count);
        }
        true
    }

    /// Advance one display frame and draw it. Returns the number of dots
    /// drawn.
    pub fn frame(&mut self, surface: &mut impl DotSurface) -> usize {
        if !self.deferred.is_empty() {
            debug!(count = self.deferred.len(), "Revealing deferred particles");
            self.particles.append(&mut self.deferred);
        }

        surface.clear();
        step_particles(
            &mut self.particles,
            self.target_scene,
            &self.masks,
            self.pointer,
            &self.config.motion,
            &mut self.batches,
        );
        self.batches.draw(surface);
        self.batches.dot_count()
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn grid(&self) -> GridSize {
        self.grid
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn resize_epoch(&self) -> u64 {
        self.resize_epoch
    }

    pub fn current_tab(&self) -> Option<&TabId> {
        self.current_tab.as_ref()
    }

    /// Particles currently drawn (deferred ones excluded)
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len() + self.deferred.len()
    }

    pub fn scene_len(&self) -> usize {
        self.scene_len
    }

    pub fn target_scene(&self) -> usize {
        self.target_scene
    }

    pub fn is_preview(&self) -> bool {
        self.preview.is_some()
    }

    pub fn masks(&self) -> &[MaskRect] {
        &self.masks
    }

    pub fn scene_cache(&self) -> &SceneCache {
        &self.scenes
    }

    pub fn size_map_cache(&self) -> &SizeMapCache {
        &self.size_maps
    }

    pub fn load_state(&self) -> LoadState {
        match &self.pending {
            Some(load) => load.state(),
            None if self.active.is_empty() => LoadState::Idle,
            None => LoadState::Ready,
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn clear_live(&mut self) {
        self.active.clear();
        self.preview = None;
        self.particles.clear();
        self.deferred.clear();
        self.scene_len = 0;
        self.target_scene = 0;
    }

    fn install_cached(&mut self, tab: &TabId, expected_len: usize) -> bool {
        let Some(cached) = self.scenes.lookup(tab, expected_len) else {
            return false;
        };
        let particles = cached.restore_particles();
        let images = cached.images.clone();
        debug!(%tab, particles = particles.len(), "Scene cache hit");

        self.clear_live();
        self.scene_len = images.len();
        self.active = images;
        self.install_live(particles);
        true
    }

    fn install_live(&mut self, particles: Vec<Particle>) {
        let (live, deferred) = split_for_reveal(particles, self.config.reveal_batch);
        self.particles = live;
        self.deferred = deferred;
    }

    fn install_preview(&mut self, image: LoadedImage, scene_count: usize) {
        let map = self.size_maps.get_or_build(&image, self.preview_grid, &self.presets);
        let maps = vec![map; scene_count];
        let layout = CellLayout::new(self.preview_grid, self.config.preview_gap);
        let particles = build_particles(&maps, layout, self.config.visibility_threshold);
        info!(image = %image.id, particles = particles.len(), "Preview installed");

        self.preview = Some((image, scene_count));
        self.scene_len = scene_count;
        self.target_scene = self.target_scene.min(scene_count.saturating_sub(1));
        self.install_live(particles);
    }

    fn commit_final(&mut self, tab: TabId, images: Vec<LoadedImage>) {
        let particles = self.build_full(&images);
        info!(%tab, images = images.len(), particles = particles.len(), "Scene set ready");
        self.scenes.store(
            tab,
            CachedScene {
                images: images.clone(),
                particles: particles.clone(),
            },
        );

        self.preview = None;
        self.scene_len = images.len();
        self.target_scene = self.target_scene.min(self.scene_len.saturating_sub(1));
        self.active = images;
        self.install_live(particles);
    }

    fn build_full(&mut self, images: &[LoadedImage]) -> Vec<Particle> {
        let maps: Vec<_> = images
            .iter()
            .map(|image| self.size_maps.get_or_build(image, self.grid, &self.presets))
            .collect();
        let layout = CellLayout::new(self.grid, self.config.gap);
        build_particles(&maps, layout, self.config.visibility_threshold)
    }
}
