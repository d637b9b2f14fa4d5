//! Two-phase scene loading
//!
//! A [`SceneLoad`] tracks one attempt to load every image of a tab's
//! scene set. Platform loaders start all images at once and report each
//! result as a [`LoadCompletion`]; the engine feeds them in here.
//!
//! Phases only move forward: `Loading → Preview → Final` or
//! `Loading → Final`. A preview can only be committed while `Loading`,
//! so it can never replace a final build.

use image::RgbaImage;
use tracing::{debug, warn};

use super::error::LoadError;
use super::scene::{Generation, ImageSource, LoadedImage, SceneSet, TabId};

/// Identity of a load attempt, echoed back with every completion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadTicket {
    pub tab: TabId,
    pub generation: Generation,
}

/// Work order for a platform loader.
#[derive(Clone, Debug)]
pub struct LoadRequest {
    pub ticket: LoadTicket,
    pub sources: Vec<ImageSource>,
}

/// Result for one image of a [`LoadRequest`].
#[derive(Debug)]
pub struct LoadCompletion {
    pub ticket: LoadTicket,
    pub index: usize,
    pub result: Result<RgbaImage, LoadError>,
}

/// Background pre-warm order. `epoch` is the engine's resize epoch at
/// the time of the request.
#[derive(Clone, Debug)]
pub struct WarmRequest {
    pub tab: TabId,
    pub epoch: u64,
    pub delay_ms: u64,
    pub sources: Vec<ImageSource>,
}

/// Every result of a [`WarmRequest`], in source order.
#[derive(Debug)]
pub struct WarmCompletion {
    pub tab: TabId,
    pub epoch: u64,
    pub sources: Vec<ImageSource>,
    pub results: Vec<Result<RgbaImage, LoadError>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadPhase {
    Loading,
    Preview,
    Final,
}

/// What a completion changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadProgress {
    /// Nothing actionable
    Pending,
    /// The first image of the set is ready (slot index)
    FirstReady(usize),
    /// Every image is ready
    AllReady,
    /// All slots settled but at least one failed; no final build
    Stalled,
}

/// Loader status for front ends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading { ready: usize, total: usize },
    Ready,
    Stalled { failed: usize },
}

#[derive(Debug)]
enum Slot {
    Pending,
    Ready(LoadedImage),
    Failed,
}

#[derive(Debug)]
pub struct SceneLoad {
    ticket: LoadTicket,
    sources: Vec<ImageSource>,
    slots: Vec<Slot>,
    phase: LoadPhase,
}

impl SceneLoad {
    pub fn new(request: LoadRequest) -> Self {
        let slots = request.sources.iter().map(|_| Slot::Pending).collect();
        Self {
            ticket: request.ticket,
            sources: request.sources,
            slots,
            phase: LoadPhase::Loading,
        }
    }

    pub fn ticket(&self) -> &LoadTicket {
        &self.ticket
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn ready_count(&self) -> usize {
        self.slots.iter().filter(|s| matches!(s, Slot::Ready(_))).count()
    }

    pub fn failed_count(&self) -> usize {
        self.slots.iter().filter(|s| matches!(s, Slot::Failed)).count()
    }

    pub fn state(&self) -> LoadState {
        let failed = self.failed_count();
        let ready = self.ready_count();
        if ready == self.len() {
            LoadState::Ready
        } else if failed > 0 && ready + failed == self.len() {
            LoadState::Stalled { failed }
        } else {
            LoadState::Loading {
                ready,
                total: self.len(),
            }
        }
    }

    /// Record the result for slot `index`.
    pub fn accept(&mut self, index: usize, result: Result<RgbaImage, LoadError>) -> LoadProgress {
        let Some(slot) = self.slots.get(index) else {
            warn!(tab = %self.ticket.tab, index, "Completion for unknown slot");
            return LoadProgress::Pending;
        };
        if !matches!(slot, Slot::Pending) {
            debug!(tab = %self.ticket.tab, index, "Duplicate completion ignored");
            return LoadProgress::Pending;
        }

        match result {
            Ok(pixels) if pixels.width() == 0 || pixels.height() == 0 => {
                warn!(src = %self.sources[index].src, "Image loaded with zero size");
                self.slots[index] = Slot::Failed;
            }
            Ok(pixels) => {
                let image = LoadedImage::new(&self.sources[index], pixels);
                debug!(tab = %self.ticket.tab, src = %image.id, index, "Image ready");
                self.slots[index] = Slot::Ready(image);
            }
            Err(e) => {
                warn!(tab = %self.ticket.tab, error = %e, "Image failed to load");
                self.slots[index] = Slot::Failed;
            }
        }

        match self.state() {
            LoadState::Ready => LoadProgress::AllReady,
            LoadState::Stalled { failed } => {
                warn!(tab = %self.ticket.tab, failed, total = self.len(), "Scene set can never fully load");
                LoadProgress::Stalled
            }
            _ if self.ready_count() == 1 && matches!(self.slots[index], Slot::Ready(_)) => {
                LoadProgress::FirstReady(index)
            }
            _ => LoadProgress::Pending,
        }
    }

    /// Image in a ready slot
    pub fn ready_image(&self, index: usize) -> Option<&LoadedImage> {
        match self.slots.get(index) {
            Some(Slot::Ready(image)) => Some(image),
            _ => None,
        }
    }

    /// Move to `Preview`; refused unless still `Loading`.
    pub fn commit_preview(&mut self) -> bool {
        if self.phase != LoadPhase::Loading {
            return false;
        }
        self.phase = LoadPhase::Preview;
        true
    }

    /// Consume a fully ready load into its scene set, marking it final.
    /// Returns the load unchanged when some slot is not ready.
    pub fn into_scene_set(mut self) -> Result<SceneSet, SceneLoad> {
        if self.ready_count() != self.len() {
            return Err(self);
        }
        self.phase = LoadPhase::Final;
        let images = self
            .slots
            .into_iter()
            .filter_map(|s| match s {
                Slot::Ready(image) => Some(image),
                _ => None,
            })
            .collect();
        Ok(SceneSet::new(self.ticket.tab, images))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::preset::ImageTag;

    fn request(n: usize) -> LoadRequest {
        LoadRequest {
            ticket: LoadTicket {
                tab: TabId::from("resume"),
                generation: Generation::default().next(),
            },
            sources: (0..n)
                .map(|i| ImageSource::new(format!("assets/{i}.png"), ImageTag::Bridge))
                .collect(),
        }
    }

    fn ok() -> Result<RgbaImage, LoadError> {
        Ok(RgbaImage::new(4, 4))
    }

    fn failed(src: &str) -> Result<RgbaImage, LoadError> {
        Err(LoadError::Io {
            src: src.into(),
            reason: "not found".into(),
        })
    }

    #[test]
    fn reports_first_then_all_ready() {
        let mut load = SceneLoad::new(request(3));
        assert_eq!(load.state(), LoadState::Loading { ready: 0, total: 3 });

        assert_eq!(load.accept(2, ok()), LoadProgress::FirstReady(2));
        assert_eq!(load.ready_image(2).unwrap().id.as_str(), "assets/2.png");
        assert_eq!(load.accept(0, ok()), LoadProgress::Pending);
        assert_eq!(load.accept(1, ok()), LoadProgress::AllReady);

        let set = load.into_scene_set().unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.images()[1].id.as_str(), "assets/1.png");
    }

    #[test]
    fn failure_stalls_the_set() {
        let mut load = SceneLoad::new(request(2));
        assert_eq!(load.accept(0, failed("assets/0.png")), LoadProgress::Pending);
        assert_eq!(load.accept(1, ok()), LoadProgress::Stalled);
        assert_eq!(load.state(), LoadState::Stalled { failed: 1 });
        assert!(load.into_scene_set().is_err());
    }

    #[test]
    fn zero_sized_image_counts_as_failure() {
        let mut load = SceneLoad::new(request(1));
        assert_eq!(load.accept(0, Ok(RgbaImage::new(0, 0))), LoadProgress::Stalled);
    }

    #[test]
    fn duplicate_and_unknown_slots_are_ignored() {
        let mut load = SceneLoad::new(request(2));
        assert_eq!(load.accept(0, ok()), LoadProgress::FirstReady(0));
        assert_eq!(load.accept(0, failed("assets/0.png")), LoadProgress::Pending);
        assert_eq!(load.accept(9, ok()), LoadProgress::Pending);
        assert_eq!(load.ready_count(), 1);
    }

    #[test]
    fn single_image_set_goes_straight_to_all_ready() {
        let mut load = SceneLoad::new(request(1));
        assert_eq!(load.accept(0, ok()), LoadProgress::AllReady);
    }

    #[test]
    fn preview_only_from_loading() {
        let mut load = SceneLoad::new(request(2));
        assert!(load.commit_preview());
        assert!(!load.commit_preview());

        // Final consumes the load; no preview can follow it
        assert_eq!(load.accept(0, ok()), LoadProgress::FirstReady(0));
        assert_eq!(load.accept(1, ok()), LoadProgress::AllReady);
        assert!(load.into_scene_set().is_ok());
    }
}
