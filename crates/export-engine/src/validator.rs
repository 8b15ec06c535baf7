//! Detects video layers that decoded to nothing.
//!
//! A decoder that has not caught up yet yields a black or fully transparent
//! frame. The validator samples a bounded grid over the layer and rejects it
//! when too few samples carry visible content.

use image::RgbaImage;
use reelforge_common::error::{ReelforgeError, ReelforgeResult};

use crate::tuning::RenderTuning;

#[derive(Debug, Clone, Copy)]
pub struct FrameValidator {
    grid: u32,
    min_ratio: f64,
    threshold: u8,
}

impl FrameValidator {
    pub fn new(grid: u32, min_ratio: f64, threshold: u8) -> Self {
        Self {
            grid: grid.max(1),
            min_ratio,
            threshold,
        }
    }

    pub fn from_tuning(tuning: &RenderTuning) -> Self {
        Self::new(
            tuning.validation_grid,
            tuning.min_content_ratio,
            tuning.content_threshold,
        )
    }

    /// Share of grid samples that are neither black nor transparent.
    pub fn coverage(&self, layer: &RgbaImage) -> f64 {
        let (width, height) = layer.dimensions();
        if width == 0 || height == 0 {
            return 0.0;
        }

        let cols = self.grid.min(width);
        let rows = self.grid.min(height);
        let mut content = 0u32;

        for row in 0..rows {
            let y = sample_coord(row, rows, height);
            for col in 0..cols {
                let x = sample_coord(col, cols, width);
                let [r, g, b, a] = layer.get_pixel(x, y).0;
                if a > 0 && r.max(g).max(b) > self.threshold {
                    content += 1;
                }
            }
        }

        content as f64 / (cols * rows) as f64
    }

    /// Accept the layer or fail with [`ReelforgeError::FrameValidation`].
    pub fn validate(&self, element_id: &str, layer: &RgbaImage) -> ReelforgeResult<f64> {
        let coverage = self.coverage(layer);
        if coverage < self.min_ratio {
            return Err(ReelforgeError::FrameValidation {
                element_id: element_id.to_string(),
                coverage,
            });
        }
        Ok(coverage)
    }
}

impl Default for FrameValidator {
    fn default() -> Self {
        Self::from_tuning(&RenderTuning::default())
    }
}

/// Center of cell `index` when `extent` pixels are split into `cells`.
fn sample_coord(index: u32, cells: u32, extent: u32) -> u32 {
    let pos = ((index as f64 + 0.5) * extent as f64 / cells as f64) as u32;
    pos.min(extent - 1)
}
