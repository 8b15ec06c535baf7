//! Tracks and timed elements.
//!
//! Times are in seconds on the timeline clock. An element occupies the
//! half-open window `[start_time, start_time + duration - trim_start - trim_end)`.

use serde::{Deserialize, Serialize};

/// Kind of track, ordered bottom-to-top for rendering.
///
/// The derived `Ord` is the layering order: audio under media under text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    #[serde(rename = "video", alias = "media")]
    Media,
    Text,
}

impl TrackKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackKind::Audio => "audio",
            TrackKind::Media => "video",
            TrackKind::Text => "text",
        }
    }
}

/// A track containing timed elements.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Track identifier (optional in editor exports).
    #[serde(default)]
    pub id: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Layer class of this track.
    #[serde(rename = "type")]
    pub kind: TrackKind,

    /// Muted tracks still render visually; muting only concerns audio.
    #[serde(default)]
    pub muted: bool,

    /// Elements in declaration order.
    #[serde(default)]
    pub elements: Vec<TimelineElement>,
}

impl Track {
    /// Create an empty track of the given kind.
    pub fn new(kind: TrackKind) -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            kind,
            muted: false,
            elements: Vec::new(),
        }
    }

    /// Builder-style element append.
    pub fn with_element(mut self, element: TimelineElement) -> Self {
        self.elements.push(element);
        self
    }
}

/// A single timed item on a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineElement {
    /// Unique element identifier; effects are keyed by it.
    pub id: String,

    /// Timeline position where the element starts (seconds).
    pub start_time: f64,

    /// Untrimmed duration (seconds).
    pub duration: f64,

    /// Seconds trimmed off the head of the source.
    #[serde(default)]
    pub trim_start: f64,

    /// Seconds trimmed off the tail of the source.
    #[serde(default)]
    pub trim_end: f64,

    /// Hidden elements are never active.
    #[serde(default)]
    pub hidden: bool,

    /// What the element draws.
    #[serde(flatten)]
    pub content: ElementContent,
}

/// Payload of an element, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ElementContent {
    /// Reference into the media catalog.
    Media {
        #[serde(rename = "mediaId")]
        media_id: String,
    },
    /// Styled text drawn directly onto the frame.
    Text(TextContent),
}

/// Text payload and styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    /// The text to draw. No word-wrap is applied.
    pub content: String,

    /// Font size in pixels.
    #[serde(default = "default_font_size")]
    pub font_size: f32,

    /// Text colour as `#rrggbb` or `#rrggbbaa`.
    #[serde(default = "default_text_color")]
    pub color: String,

    /// Optional background box colour behind the text.
    #[serde(default)]
    pub background_color: Option<String>,

    /// Explicit left edge in canvas pixels. Centered when unset.
    #[serde(default)]
    pub x: Option<f64>,

    /// Explicit top edge in canvas pixels. Centered when unset.
    #[serde(default)]
    pub y: Option<f64>,
}

fn default_font_size() -> f32 {
    48.0
}

fn default_text_color() -> String {
    "#ffffff".to_string()
}

impl TextContent {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            font_size: default_font_size(),
            color: default_text_color(),
            background_color: None,
            x: None,
            y: None,
        }
    }
}

impl TimelineElement {
    /// Create a media element referencing `media_id`.
    pub fn media(
        id: impl Into<String>,
        media_id: impl Into<String>,
        start_time: f64,
        duration: f64,
    ) -> Self {
        Self {
            id: id.into(),
            start_time,
            duration,
            trim_start: 0.0,
            trim_end: 0.0,
            hidden: false,
            content: ElementContent::Media {
                media_id: media_id.into(),
            },
        }
    }

    /// Create a text element.
    pub fn text(id: impl Into<String>, text: TextContent, start_time: f64, duration: f64) -> Self {
        Self {
            id: id.into(),
            start_time,
            duration,
            trim_start: 0.0,
            trim_end: 0.0,
            hidden: false,
            content: ElementContent::Text(text),
        }
    }

    /// Length of the visible window after trimming (never negative).
    pub fn visible_duration(&self) -> f64 {
        (self.duration - self.trim_start - self.trim_end).max(0.0)
    }

    /// Exclusive end of the visible window.
    pub fn visible_end(&self) -> f64 {
        self.start_time + self.visible_duration()
    }

    /// Whether the element is visible at timeline time `t`.
    pub fn is_active_at(&self, t: f64) -> bool {
        !self.hidden && t >= self.start_time && t < self.visible_end()
    }

    /// Position inside the source media that corresponds to timeline time `t`.
    pub fn source_time_at(&self, t: f64) -> f64 {
        self.trim_start + (t - self.start_time)
    }

    /// Media catalog id, for media elements.
    pub fn media_id(&self) -> Option<&str> {
        match &self.content {
            ElementContent::Media { media_id } => Some(media_id),
            ElementContent::Text(_) => None,
        }
    }

    /// Text payload, for text elements.
    pub fn text_content(&self) -> Option<&TextContent> {
        match &self.content {
            ElementContent::Text(text) => Some(text),
            ElementContent::Media { .. } => None,
        }
    }
}

/// The full multi-track timeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    /// Tracks in declaration order. Declaration order does not decide layering.
    #[serde(default)]
    pub tracks: Vec<Track>,
}

impl Timeline {
    /// Create an empty timeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style track append.
    pub fn with_track(mut self, track: Track) -> Self {
        self.tracks.push(track);
        self
    }

    /// Total duration: the latest visible end of any element.
    pub fn duration_secs(&self) -> f64 {
        self.tracks
            .iter()
            .flat_map(|track| track.elements.iter())
            .map(TimelineElement::visible_end)
            .fold(0.0, f64::max)
    }

    /// Number of elements across all tracks.
    pub fn element_count(&self) -> usize {
        self.tracks.iter().map(|t| t.elements.len()).sum()
    }

    /// Iterate `(track, element)` pairs in declaration order.
    pub fn elements(&self) -> impl Iterator<Item = (&Track, &TimelineElement)> {
        self.tracks
            .iter()
            .flat_map(|track| track.elements.iter().map(move |el| (track, el)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_track_kind_layer_order() {
        assert!(TrackKind::Audio < TrackKind::Media);
        assert!(TrackKind::Media < TrackKind::Text);
    }

    #[test]
    fn test_track_kind_accepts_editor_names() {
        let kind: TrackKind = serde_json::from_str("\"video\"").unwrap();
        assert_eq!(kind, TrackKind::Media);
        let kind: TrackKind = serde_json::from_str("\"media\"").unwrap();
        assert_eq!(kind, TrackKind::Media);
        assert_eq!(serde_json::to_string(&TrackKind::Media).unwrap(), "\"video\"");
    }

    #[test]
    fn test_visible_window_end_is_exclusive() {
        let mut el = TimelineElement::media("a", "m", 1.0, 5.0);
        el.trim_start = 0.5;
        el.trim_end = 1.5;
        assert!((el.visible_end() - 4.0).abs() < 1e-9);
        assert!(!el.is_active_at(0.999));
        assert!(el.is_active_at(1.0));
        assert!(el.is_active_at(3.999));
        assert!(!el.is_active_at(4.0));
    }

    #[test]
    fn test_hidden_element_never_active() {
        let mut el = TimelineElement::media("a", "m", 0.0, 5.0);
        el.hidden = true;
        assert!(!el.is_active_at(1.0));
    }

    #[test]
    fn test_source_time_includes_trim() {
        let mut el = TimelineElement::media("a", "m", 2.0, 10.0);
        el.trim_start = 3.0;
        assert!((el.source_time_at(2.5) - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_timeline_duration_uses_trimmed_ends() {
        let mut clip = TimelineElement::media("v", "m", 0.0, 6.0);
        clip.trim_end = 1.0;
        let timeline = Timeline::new()
            .with_track(Track::new(TrackKind::Media).with_element(clip))
            .with_track(
                Track::new(TrackKind::Text)
                    .with_element(TimelineElement::text("t", TextContent::new("hi"), 1.0, 2.0)),
            );
        assert!((timeline.duration_secs() - 5.0).abs() < 1e-9);
        assert_eq!(timeline.element_count(), 2);
        assert_eq!(Timeline::new().duration_secs(), 0.0);
    }

    #[test]
    fn test_element_json_shape() {
        let json = r##"{
            "id": "title",
            "type": "text",
            "startTime": 1.0,
            "duration": 2.0,
            "content": "Hello",
            "fontSize": 32,
            "color": "#ff0000",
            "x": 10
        }"##;
        let el: TimelineElement = serde_json::from_str(json).unwrap();
        let text = el.text_content().unwrap();
        assert_eq!(text.content, "Hello");
        assert_eq!(text.x, Some(10.0));
        assert_eq!(text.y, None);
        assert_eq!(el.trim_start, 0.0);

        let json = r#"{"id":"clip","type":"media","mediaId":"m1","startTime":0,"duration":5}"#;
        let el: TimelineElement = serde_json::from_str(json).unwrap();
        assert_eq!(el.media_id(), Some("m1"));
    }

    proptest! {
        #[test]
        fn prop_active_iff_inside_window(
            start in 0.0f64..100.0,
            duration in 0.0f64..50.0,
            trim_start in 0.0f64..10.0,
            trim_end in 0.0f64..10.0,
            t in 0.0f64..200.0,
        ) {
            let mut el = TimelineElement::media("p", "m", start, duration);
            el.trim_start = trim_start;
            el.trim_end = trim_end;
            let end = start + duration - trim_start - trim_end;
            let expected = start <= t && t < end;
            prop_assert_eq!(el.is_active_at(t), expected);
            prop_assert!(!el.is_active_at(el.visible_end()));
        }
    }
}
