//! Media catalog types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Kind of source media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

/// A source media item referenced by timeline elements and stickers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    /// Catalog identifier.
    pub id: String,

    /// Media kind.
    #[serde(rename = "type")]
    pub kind: MediaKind,

    /// Location of the source (`file://` prefix or plain path).
    pub url: String,

    /// Native width in pixels.
    #[serde(default)]
    pub width: u32,

    /// Native height in pixels.
    #[serde(default)]
    pub height: u32,

    /// Source duration for time-based media.
    #[serde(default)]
    pub duration_secs: Option<f64>,
}

impl MediaItem {
    pub fn new(
        id: impl Into<String>,
        kind: MediaKind,
        url: impl Into<String>,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            url: url.into(),
            width,
            height,
            duration_secs: None,
        }
    }

    /// Whether this item ever produces pixels.
    pub fn is_visual(&self) -> bool {
        !matches!(self.kind, MediaKind::Audio)
    }
}

/// Read-only lookup of media items by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<MediaItem>", into = "Vec<MediaItem>")]
pub struct MediaCatalog {
    items: Vec<MediaItem>,
    index: HashMap<String, usize>,
}

impl MediaCatalog {
    pub fn new(items: Vec<MediaItem>) -> Self {
        let index = items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.id.clone(), i))
            .collect();
        Self { items, index }
    }

    pub fn get(&self, id: &str) -> Option<&MediaItem> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaItem> {
        self.items.iter()
    }
}

impl From<Vec<MediaItem>> for MediaCatalog {
    fn from(items: Vec<MediaItem>) -> Self {
        Self::new(items)
    }
}

impl From<MediaCatalog> for Vec<MediaItem> {
    fn from(catalog: MediaCatalog) -> Self {
        catalog.items
    }
}
