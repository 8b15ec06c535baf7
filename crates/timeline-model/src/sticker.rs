//! Overlay stickers drawn above all timeline tracks.

use serde::{Deserialize, Serialize};

/// An image overlay positioned in canvas percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StickerOverlay {
    pub id: String,

    /// Media catalog id of the sticker image.
    pub media_id: String,

    /// Horizontal center, percent of canvas width.
    pub x: f64,
    /// Vertical center, percent of canvas height.
    pub y: f64,
    /// Width, percent of canvas width.
    pub width: f64,
    /// Height, percent of canvas height.
    pub height: f64,

    /// 0.0..=1.0.
    #[serde(default = "default_opacity")]
    pub opacity: f64,

    #[serde(default)]
    pub z_index: i32,

    /// Inclusive start; visible from the beginning when unset.
    #[serde(default)]
    pub start_time: Option<f64>,

    /// Exclusive end; visible until the end when unset.
    #[serde(default)]
    pub end_time: Option<f64>,
}

fn default_opacity() -> f64 {
    1.0
}

impl StickerOverlay {
    pub fn is_visible_at(&self, t: f64) -> bool {
        self.start_time.map_or(true, |start| t >= start)
            && self.end_time.map_or(true, |end| t < end)
    }

    /// Pixel rectangle `(left, top, width, height)` on a canvas.
    pub fn pixel_rect(&self, canvas_width: u32, canvas_height: u32) -> (f64, f64, f64, f64) {
        let w = self.width / 100.0 * canvas_width as f64;
        let h = self.height / 100.0 * canvas_height as f64;
        let cx = self.x / 100.0 * canvas_width as f64;
        let cy = self.y / 100.0 * canvas_height as f64;
        (cx - w / 2.0, cy - h / 2.0, w, h)
    }
}

/// Stickers visible at `t`, ordered by z-index (ties keep input order).
pub fn visible_stickers(stickers: &[StickerOverlay], t: f64) -> Vec<&StickerOverlay> {
    let mut visible: Vec<&StickerOverlay> =
        stickers.iter().filter(|s| s.is_visible_at(t)).collect();
    visible.sort_by_key(|s| s.z_index);
    visible
}
