//! Per-image tuning presets for luminance → dot size shaping
//!
//! Each configured image carries an [`ImageTag`]; the tag selects a
//! [`Tuning`] from the [`PresetTable`]. The default table reproduces the
//! hand-tuned values of the site artwork.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Stable per-image category used to pick a tuning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageTag {
    #[default]
    Default,
    /// Close bridge shots with heavy cable detail
    BridgeDetail,
    /// Bridge scenes
    Bridge,
    /// Bird's-eye city grid, buildings against streets and haze
    CityAerial,
    /// Street-level city scenes with light skies
    City,
    /// Monochrome skyline prints
    SkylineMono,
    /// Soft, low-contrast artwork (snow scenes, pencil facades)
    ArtsSoft,
    /// Architectural landmark studies
    Landmark,
    /// Any other artwork
    Arts,
}

/// Threshold / exponent / maximum-dot-size triple.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tuning {
    /// Intensities below this are treated as background
    pub threshold: f32,
    /// Contrast shaping applied after rescaling into [0, 1]
    pub exponent: f32,
    /// Dot radius at full intensity, in pixels
    pub max_dot_size: f32,
}

impl Tuning {
    pub const DEFAULT: Tuning = Tuning::new(0.15, 2.2, 5.0);

    pub const fn new(threshold: f32, exponent: f32, max_dot_size: f32) -> Self {
        Self {
            threshold,
            exponent,
            max_dot_size,
        }
    }

    /// Dot weight for an inverted-grayscale intensity in [0, 1]
    #[inline]
    pub fn weight(&self, intensity: f32) -> f32 {
        if intensity < self.threshold {
            return 0.0;
        }
        let scaled = (intensity - self.threshold) / (1.0 - self.threshold);
        scaled.powf(self.exponent) * self.max_dot_size
    }

    pub fn is_valid(&self) -> bool {
        (0.0..1.0).contains(&self.threshold) && self.exponent >= 0.0 && self.max_dot_size >= 0.0
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Tag → tuning lookup with a fallback for unlisted tags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresetTable {
    pub fallback: Tuning,
    pub entries: BTreeMap<ImageTag, Tuning>,
}

impl Default for PresetTable {
    fn default() -> Self {
        let entries = BTreeMap::from([
            (ImageTag::BridgeDetail, Tuning::new(0.05, 1.6, 8.0)),
            (ImageTag::Bridge, Tuning::new(0.05, 1.5, 6.0)),
            (ImageTag::CityAerial, Tuning::new(0.15, 2.0, 7.0)),
            (ImageTag::City, Tuning::new(0.005, 0.8, 7.5)),
            (ImageTag::SkylineMono, Tuning::new(0.15, 1.4, 7.0)),
            (ImageTag::ArtsSoft, Tuning::new(0.02, 1.1, 7.5)),
            (ImageTag::Landmark, Tuning::new(0.1, 1.8, 6.5)),
            (ImageTag::Arts, Tuning::new(0.03, 1.2, 7.0)),
        ]);
        Self {
            fallback: Tuning::DEFAULT,
            entries,
        }
    }
}

impl PresetTable {
    pub fn tuning(&self, tag: ImageTag) -> Tuning {
        self.entries.get(&tag).copied().unwrap_or(self.fallback)
    }

    pub fn set(&mut self, tag: ImageTag, tuning: Tuning) {
        self.entries.insert(tag, tuning);
    }

    /// First tag whose tuning is out of range, if any
    pub fn first_invalid(&self) -> Option<ImageTag> {
        if !self.fallback.is_valid() {
            return Some(ImageTag::Default);
        }
        self.entries
            .iter()
            .find(|(_, t)| !t.is_valid())
            .map(|(tag, _)| *tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_matches_artwork_tuning() {
        let table = PresetTable::default();
        assert_eq!(table.tuning(ImageTag::Default), Tuning::new(0.15, 2.2, 5.0));
        assert_eq!(table.tuning(ImageTag::BridgeDetail), Tuning::new(0.05, 1.6, 8.0));
        assert_eq!(table.tuning(ImageTag::City), Tuning::new(0.005, 0.8, 7.5));
        assert_eq!(table.tuning(ImageTag::Landmark), Tuning::new(0.1, 1.8, 6.5));
        assert!(table.first_invalid().is_none());
    }

    #[test]
    fn weight_zeroes_background_and_scales_foreground() {
        let t = Tuning::new(0.2, 1.0, 4.0);
        assert_eq!(t.weight(0.1), 0.0);
        assert_eq!(t.weight(0.2), 0.0);
        assert!((t.weight(1.0) - 4.0).abs() < 1e-6);
        assert!((t.weight(0.6) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn overrides_deserialize_by_tag_name() {
        let json = r#"{
            "fallback": { "threshold": 0.1, "exponent": 1.0, "max_dot_size": 3.0 },
            "entries": { "city-aerial": { "threshold": 0.3, "exponent": 2.5, "max_dot_size": 6.0 } }
        }"#;
        let table: PresetTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.tuning(ImageTag::CityAerial), Tuning::new(0.3, 2.5, 6.0));
        assert_eq!(table.tuning(ImageTag::Bridge), Tuning::new(0.1, 1.0, 3.0));
    }

    #[test]
    fn threshold_of_one_is_rejected() {
        let mut table = PresetTable::default();
        table.set(ImageTag::Arts, Tuning::new(1.0, 1.0, 1.0));
        assert_eq!(table.first_invalid(), Some(ImageTag::Arts));
    }
}
