//! Text element rasterization.

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use reelforge_common::error::{ReelforgeError, ReelforgeResult};
use reelforge_timeline::{parse_hex_color, TextContent};

const DEFAULT_TEXT_COLOR: [u8; 4] = [255, 255, 255, 255];

/// Measures and draws single-line text.
pub trait TextRasterizer: Send + Sync {
    /// Pixel size of the text box, background padding included.
    fn measure(&self, text: &TextContent) -> (u32, u32);

    /// Draw the text box with its top-left corner at `(x, y)`.
    fn draw(&self, canvas: &mut RgbaImage, text: &TextContent, x: i32, y: i32);
}

/// Rasterizer backed by a TTF/OTF font file.
pub struct FontTextRasterizer {
    font: FontVec,
}

impl FontTextRasterizer {
    pub fn new(font: FontVec) -> Self {
        Self { font }
    }

    pub fn from_path(path: &Path) -> ReelforgeResult<Self> {
        if !path.exists() {
            return Err(ReelforgeError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let data = std::fs::read(path)?;
        let font = FontVec::try_from_vec(data).map_err(|e| {
            ReelforgeError::config(format!("Invalid font {}: {e}", path.display()))
        })?;
        Ok(Self::new(font))
    }

    fn padding(text: &TextContent) -> u32 {
        if text.background_color.is_some() {
            (text.font_size * 0.25).round().max(0.0) as u32
        } else {
            0
        }
    }
}

impl TextRasterizer for FontTextRasterizer {
    fn measure(&self, text: &TextContent) -> (u32, u32) {
        let scale = PxScale::from(text.font_size.max(1.0));
        let (w, h) = text_size(scale, &self.font, &text.content);
        let pad = Self::padding(text);
        (w + pad * 2, h + pad * 2)
    }

    fn draw(&self, canvas: &mut RgbaImage, text: &TextContent, x: i32, y: i32) {
        let (box_w, box_h) = self.measure(text);
        let pad = Self::padding(text) as i32;

        if let Some(bg) = text.background_color.as_deref().and_then(parse_hex_color) {
            if box_w > 0 && box_h > 0 {
                draw_filled_rect_mut(canvas, Rect::at(x, y).of_size(box_w, box_h), Rgba(bg));
            }
        }

        let color = parse_hex_color(&text.color).unwrap_or(DEFAULT_TEXT_COLOR);
        let scale = PxScale::from(text.font_size.max(1.0));
        draw_text_mut(
            canvas,
            Rgba(color),
            x + pad,
            y + pad,
            scale,
            &self.font,
            &text.content,
        );
    }
}
