//! Engine tuning and site catalog configuration
//!
//! Everything is plain serde data. `SiteConfig::builtin()` parses the
//! catalog embedded from `assets/site.json`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::preset::PresetTable;
use super::scene::{ImageSource, TabId};
use super::scroll;

const BUILTIN_SITE: &str = include_str!("../../assets/site.json");

/// Per-frame smoothing and pointer interaction constants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Base size glide toward the target scene weight
    pub base_smoothing: f32,
    /// Drawn size glide toward the masked/boosted target
    pub size_smoothing: f32,
    /// Pointer influence radius in pixels
    pub pointer_radius: f32,
    /// Extra radius at zero pointer distance
    pub pointer_boost: f32,
    /// Dots smaller than this are not drawn
    pub min_visible_size: f32,
    /// Gray level of dots outside the pointer radius
    pub idle_gray: u8,
    /// Gray quantization step for draw batching
    pub gray_step: u8,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            base_smoothing: 0.1,
            size_smoothing: 0.2,
            pointer_radius: 75.0,
            pointer_boost: 5.0,
            min_visible_size: 0.2,
            idle_gray: 153,
            gray_step: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Grid cell size in pixels for the full build
    pub gap: f32,
    /// Coarser cell size used by the first-image preview
    pub preview_gap: f32,
    /// Show a preview as soon as the first image of a set is ready
    pub quick_preview: bool,
    /// Minimum weight across scenes for a cell to become a particle
    pub visibility_threshold: f32,
    /// Keep smoothed sizes of same-index cells when rebuilding on resize
    pub carry_over_on_resize: bool,
    /// Particles revealed on the first frame of a large build (0 = all)
    pub reveal_batch: usize,
    /// Idle delay before background pre-warm loads start
    pub prewarm_delay_ms: u64,
    pub motion: MotionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gap: 12.0,
            preview_gap: 24.0,
            quick_preview: true,
            visibility_threshold: super::particle::VISIBILITY_THRESHOLD,
            carry_over_on_resize: false,
            reveal_batch: 0,
            prewarm_delay_ms: 500,
            motion: MotionConfig::default(),
        }
    }
}

/// One content tab and its background scene set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TabConfig {
    pub id: TabId,
    pub images: Vec<ImageSource>,
    /// Scene index shown for each scroll segment of the tab's content
    #[serde(default)]
    pub segments: Vec<usize>,
    /// CSS selectors of elements that mask dots on this tab
    #[serde(default = "default_mask_selectors")]
    pub mask_selectors: Vec<String>,
}

fn default_mask_selectors() -> Vec<String> {
    vec![".writing-header".into(), ".arts-header".into()]
}

impl TabConfig {
    /// Scene index for a scroll offset. Without segments, every scene
    /// gets one segment in order.
    pub fn scene_for_scroll(&self, scroll_y: f32, viewport_height: f32) -> usize {
        if self.segments.is_empty() {
            return scroll::segment_index(scroll_y, viewport_height, self.images.len());
        }
        let segment = scroll::segment_index(scroll_y, viewport_height, self.segments.len());
        self.segments[segment]
    }

    pub fn mask_selector(&self) -> String {
        self.mask_selectors.join(", ")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub presets: PresetTable,
    pub tabs: Vec<TabConfig>,
    pub initial_tab: TabId,
}

impl SiteConfig {
    /// Parse and validate a JSON site config
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SiteConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// The catalog shipped with the crate
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_json(BUILTIN_SITE)
    }

    pub fn tab(&self, id: &str) -> Option<&TabConfig> {
        self.tabs.iter().find(|t| t.id.as_str() == id)
    }

    /// Source entry for `src`, searching every tab; unknown sources fall
    /// back to the default tag and a centered crop.
    pub fn source_for(&self, src: &str) -> ImageSource {
        self.tabs
            .iter()
            .flat_map(|t| t.images.iter())
            .find(|s| s.src == src)
            .cloned()
            .unwrap_or_else(|| ImageSource::new(src, Default::default()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let engine = &self.engine;
        if engine.gap <= 0.0 || engine.preview_gap <= 0.0 {
            return Err(ConfigError::invalid("grid gaps must be positive"));
        }
        if engine.preview_gap < engine.gap {
            return Err(ConfigError::invalid("preview_gap must not be finer than gap"));
        }
        if !engine.visibility_threshold.is_finite() || engine.visibility_threshold < 0.0 {
            return Err(ConfigError::invalid("visibility_threshold must be finite and non-negative"));
        }
        if !(0.0..=1.0).contains(&engine.motion.base_smoothing)
            || !(0.0..=1.0).contains(&engine.motion.size_smoothing)
        {
            return Err(ConfigError::invalid("smoothing factors must lie in [0, 1]"));
        }
        if engine.motion.gray_step == 0 {
            return Err(ConfigError::invalid("gray_step must be non-zero"));
        }
        if let Some(tag) = self.presets.first_invalid() {
            return Err(ConfigError::invalid(format!(
                "preset {tag:?} needs threshold in [0, 1) and non-negative exponent and size"
            )));
        }

        let mut seen = HashSet::new();
        for tab in &self.tabs {
            if !seen.insert(tab.id.as_str()) {
                return Err(ConfigError::invalid(format!("duplicate tab '{}'", tab.id)));
            }
            if let Some(&scene) = tab.segments.iter().find(|&&s| s >= tab.images.len()) {
                return Err(ConfigError::invalid(format!(
                    "tab '{}' segment references scene {scene} but has {} images",
                    tab.id,
                    tab.images.len()
                )));
            }
        }
        if self.tab(self.initial_tab.as_str()).is_none() {
            return Err(ConfigError::invalid(format!(
                "initial tab '{}' is not configured",
                self.initial_tab
            )));
        }
        Ok(())
    }
}
