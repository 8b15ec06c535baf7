//! The read-only bundle an export consumes.
//!
//! A snapshot is written by the editor as a single JSON document:
//!
//! ```json
//! {
//!   "timeline": { "tracks": [...] },
//!   "media": [...],
//!   "effects": { "<element id>": [...] },
//!   "stickers": [...],
//!   "settings": { "width": 1920, "height": 1080, "format": "mp4" }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::color::parse_hex_color;
use crate::effects::EffectCatalog;
use crate::media::MediaCatalog;
use crate::settings::ExportSettings;
use crate::sticker::StickerOverlay;
use crate::timeline::{ElementContent, Timeline};

/// Everything needed to export one timeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    #[serde(default)]
    pub timeline: Timeline,

    #[serde(default)]
    pub media: MediaCatalog,

    #[serde(default)]
    pub effects: EffectCatalog,

    #[serde(default)]
    pub stickers: Vec<StickerOverlay>,

    #[serde(default)]
    pub settings: ExportSettings,
}

impl ExportSnapshot {
    pub fn new(timeline: Timeline, media: MediaCatalog, settings: ExportSettings) -> Self {
        Self {
            timeline,
            media,
            effects: EffectCatalog::default(),
            stickers: Vec::new(),
            settings,
        }
    }

    /// Load a snapshot from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref().to_path_buf();
        let json = std::fs::read_to_string(&path).map_err(|e| SnapshotError::IoError {
            path: path.clone(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| SnapshotError::ParseError { path, source: e })
    }

    /// Save the snapshot as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref().to_path_buf();
        let json = serde_json::to_string_pretty(self).map_err(|e| SnapshotError::ParseError {
            path: path.clone(),
            source: e,
        })?;
        std::fs::write(&path, json).map_err(|e| SnapshotError::IoError { path, source: e })
    }

    /// Collect every problem that would make an export misbehave.
    ///
    /// Missing media is tolerated at render time (the element is skipped),
    /// so callers decide whether these are warnings or hard errors.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = vec![];

        if self.settings.width == 0 || self.settings.height == 0 {
            problems.push(format!(
                "Output size must be positive, got {}x{}",
                self.settings.width, self.settings.height
            ));
        }
        if parse_hex_color(&self.settings.background_color).is_none() {
            problems.push(format!(
                "Invalid background colour: {}",
                self.settings.background_color
            ));
        }

        for (track, element) in self.timeline.elements() {
            if element.start_time < 0.0 {
                problems.push(format!("Element {} starts before 0s", element.id));
            }
            if element.duration < 0.0 || element.trim_start < 0.0 || element.trim_end < 0.0 {
                problems.push(format!("Element {} has a negative duration or trim", element.id));
            }
            match &element.content {
                ElementContent::Media { media_id } => match self.media.get(media_id) {
                    None => problems.push(format!(
                        "Element {} references missing media {media_id}",
                        element.id
                    )),
                    Some(item) if item.is_visual() && (item.width == 0 || item.height == 0) => {
                        problems.push(format!("Media {} has no dimensions", item.id))
                    }
                    Some(_) => {}
                },
                ElementContent::Text(text) => {
                    if parse_hex_color(&text.color).is_none() {
                        problems.push(format!(
                            "Text element {} has invalid colour {}",
                            element.id, text.color
                        ));
                    }
                    if text.font_size <= 0.0 {
                        problems.push(format!("Text element {} has no font size", element.id));
                    }
                }
            }
            if track.kind == crate::timeline::TrackKind::Text && element.text_content().is_none() {
                problems.push(format!("Text track holds non-text element {}", element.id));
            }
        }

        for item in self.media.iter() {
            if let Some(d) = item.duration_secs {
                if !d.is_finite() || d <= 0.0 {
                    problems.push(format!("Media {} has invalid duration {d}", item.id));
                }
            }
        }

        for sticker in &self.stickers {
            if self.media.get(&sticker.media_id).is_none() {
                problems.push(format!(
                    "Sticker {} references missing media {}",
                    sticker.id, sticker.media_id
                ));
            }
            if sticker.width <= 0.0 || sticker.height <= 0.0 {
                problems.push(format!("Sticker {} has no size", sticker.id));
            }
        }

        problems
    }
}

/// Errors that can occur when loading or saving snapshots.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid snapshot: {message}")]
    ValidationError { message: String },
}

impl ExportSnapshot {
    /// Like [`ExportSnapshot::validate`], but fails on the first batch of problems.
    pub fn ensure_valid(&self) -> Result<(), SnapshotError> {
        let problems = self.validate();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(SnapshotError::ValidationError {
                message: problems.join("; "),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaItem, MediaKind};
    use crate::timeline::{TextContent, TimelineElement, Track, TrackKind};

    const SAMPLE: &str = r##"{
        "timeline": {
            "tracks": [
                {"type": "video", "elements": [
                    {"id": "clip", "type": "media", "mediaId": "v1", "startTime": 0, "duration": 5}
                ]},
                {"type": "text", "elements": [
                    {"id": "title", "type": "text", "startTime": 1, "duration": 1, "content": "Hi"}
                ]}
            ]
        },
        "media": [
            {"id": "v1", "type": "video", "url": "clip.mp4", "width": 1920, "height": 1080, "durationSecs": 5}
        ],
        "effects": {
            "clip": [{"name": "bw", "params": {"grayscale": 100}}]
        },
        "settings": {"width": 1280, "height": 720, "format": "mp4", "quality": "medium"}
    }"##;

    #[test]
    fn test_load_snapshot_json() {
        let dir = std::env::temp_dir().join(format!("reelforge-snapshot-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("snapshot.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let snapshot = ExportSnapshot::load(&path).unwrap();
        assert_eq!(snapshot.timeline.element_count(), 2);
        assert!((snapshot.timeline.duration_secs() - 5.0).abs() < 1e-9);
        assert_eq!(
            snapshot.effects.merged_for("clip").unwrap().grayscale,
            Some(100.0)
        );
        assert!(snapshot.validate().is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_reports_parse_and_io_errors() {
        let missing = ExportSnapshot::load("/nonexistent/reelforge/snapshot.json");
        assert!(matches!(missing, Err(SnapshotError::IoError { .. })));

        let dir = std::env::temp_dir().join(format!("reelforge-badjson-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ExportSnapshot::load(&path),
            Err(SnapshotError::ParseError { .. })
        ));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_validate_flags_dangling_media() {
        let timeline = Timeline::new()
            .with_track(
                Track::new(TrackKind::Media)
                    .with_element(TimelineElement::media("clip", "ghost", -1.0, 2.0)),
            )
            .with_track(Track::new(TrackKind::Text).with_element(TimelineElement::text(
                "t",
                TextContent::new("x"),
                0.0,
                1.0,
            )));
        let media = MediaCatalog::new(vec![MediaItem::new(
            "img",
            MediaKind::Image,
            "a.png",
            0,
            10,
        )]);
        let mut snapshot = ExportSnapshot::new(timeline, media, ExportSettings::default());
        snapshot.settings.width = 0;

        let problems = snapshot.validate();
        assert!(problems.iter().any(|p| p.contains("missing media ghost")));
        assert!(problems.iter().any(|p| p.contains("starts before 0s")));
        assert!(problems.iter().any(|p| p.contains("Output size")));
        assert!(snapshot.ensure_valid().is_err());
    }

    #[test]
    fn test_validate_flags_bad_media_duration() {
        let mut huge = MediaItem::new("huge", MediaKind::Video, "huge.mp4", 640, 360);
        huge.duration_secs = Some(f64::INFINITY);
        let mut empty = MediaItem::new("empty", MediaKind::Video, "empty.mp4", 640, 360);
        empty.duration_secs = Some(0.0);
        let mut fine = MediaItem::new("fine", MediaKind::Video, "fine.mp4", 640, 360);
        fine.duration_secs = Some(12.5);

        let snapshot = ExportSnapshot::new(
            Timeline::new(),
            MediaCatalog::new(vec![huge, empty, fine]),
            ExportSettings::default(),
        );
        let problems = snapshot.validate();
        assert!(problems.iter().any(|p| p.contains("Media huge has invalid duration")));
        assert!(problems.iter().any(|p| p.contains("Media empty has invalid duration")));
        assert!(!problems.iter().any(|p| p.contains("Media fine")));
    }
}
