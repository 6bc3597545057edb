//! Content items supplied by the feed collaborator.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ArchiveError;

/// One media entry of a multi-image item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryMedia {
    /// Still image URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Animated variant, used when there is no still URL.
    #[serde(default)]
    pub gif: Option<String>,
}

impl GalleryMedia {
    /// The URL to fetch: the still image, else the animated variant.
    #[must_use]
    pub fn media_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .filter(|u| !u.is_empty())
            .or_else(|| self.gif.as_deref().filter(|u| !u.is_empty()))
    }
}

/// A feed entry pointing at one or more media files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Stable identifier, used in file names.
    pub id: String,
    /// Primary URL; ignored when the item has a gallery.
    pub url: String,
    /// Creation time in Unix seconds.
    pub created: f64,
    #[serde(default)]
    pub title: Option<String>,
    /// Gallery members in display order.
    #[serde(default)]
    pub gallery: Vec<GalleryMedia>,
}

impl ContentItem {
    #[must_use]
    pub fn new(id: impl Into<String>, url: impl Into<String>, created: f64) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            created,
            title: None,
            gallery: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_gallery(mut self, gallery: Vec<GalleryMedia>) -> Self {
        self.gallery = gallery;
        self
    }

    #[must_use]
    pub fn has_gallery(&self) -> bool {
        !self.gallery.is_empty()
    }

    /// Creation date as `YYYY-MM-DD` in UTC.
    #[must_use]
    pub fn date_str(&self) -> String {
        let created = DateTime::<Utc>::from_timestamp(self.created.floor() as i64, 0).unwrap_or_default();
        created.format("%Y-%m-%d").to_string()
    }
}

/// Read a JSON array of items.
///
/// # Errors
///
/// Returns [`ArchiveError::ReadItems`] or [`ArchiveError::ParseItems`].
pub fn load_items(path: &Path) -> Result<Vec<ContentItem>, ArchiveError> {
    let content = std::fs::read_to_string(path).map_err(|source| ArchiveError::ReadItems {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ArchiveError::ParseItems {
        path: path.to_path_buf(),
        source,
    })
}
