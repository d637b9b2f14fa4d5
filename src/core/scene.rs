//! Tab, image and scene-set identities

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use super::preset::ImageTag;

/// Identifier of a content tab ("resume", "writing", ...)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(String);

impl TabId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TabId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Borrow<str> for TabId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a source image; the size-map cache is keyed by it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the crop window is placed on the source image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CropBias {
    #[default]
    Center,
    /// Move the window up by a quarter of the image height
    Upper,
}

/// One configured image of a scene set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSource {
    /// URL (browser) or path relative to the asset root (CLI)
    pub src: String,
    #[serde(default)]
    pub tag: ImageTag,
    #[serde(default)]
    pub crop: CropBias,
}

impl ImageSource {
    pub fn new(src: impl Into<String>, tag: ImageTag) -> Self {
        Self {
            src: src.into(),
            tag,
            crop: CropBias::Center,
        }
    }

    pub fn id(&self) -> ImageId {
        ImageId::new(self.src.clone())
    }
}

/// A decoded image ready for sampling.
#[derive(Clone, Debug)]
pub struct LoadedImage {
    pub id: ImageId,
    pub tag: ImageTag,
    pub crop: CropBias,
    pub pixels: Arc<RgbaImage>,
}

impl LoadedImage {
    pub fn new(source: &ImageSource, pixels: RgbaImage) -> Self {
        Self {
            id: source.id(),
            tag: source.tag,
            crop: source.crop,
            pixels: Arc::new(pixels),
        }
    }
}

/// Ordered, fully loaded images of one tab. Never mutated after creation.
#[derive(Clone, Debug)]
pub struct SceneSet {
    tab: TabId,
    images: Vec<LoadedImage>,
}

impl SceneSet {
    pub fn new(tab: TabId, images: Vec<LoadedImage>) -> Self {
        Self { tab, images }
    }

    pub fn tab(&self) -> &TabId {
        &self.tab
    }

    pub fn images(&self) -> &[LoadedImage] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn into_images(self) -> Vec<LoadedImage> {
        self.images
    }
}

/// Monotonic counter identifying one scene-load attempt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_source_defaults_from_json() {
        let src: ImageSource = serde_json::from_str(r#"{ "src": "assets/nyc-liberty.jpg" }"#).unwrap();
        assert_eq!(src.tag, ImageTag::Default);
        assert_eq!(src.crop, CropBias::Center);
        assert_eq!(src.id().as_str(), "assets/nyc-liberty.jpg");

        let src: ImageSource =
            serde_json::from_str(r#"{ "src": "a.jpg", "tag": "city", "crop": "upper" }"#).unwrap();
        assert_eq!(src.tag, ImageTag::City);
        assert_eq!(src.crop, CropBias::Upper);
    }

    #[test]
    fn generations_increase() {
        let g = Generation::default();
        assert!(g.next() > g);
        assert_eq!(g.next().next().value(), 2);
    }

    #[test]
    fn tab_ids_compare_with_str() {
        let tab = TabId::from("arts");
        let s: &str = tab.borrow();
        assert_eq!(s, "arts");
        assert_eq!(tab.to_string(), "arts");
    }
}
