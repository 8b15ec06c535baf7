//! Element placement on the output canvas.

use reelforge_timeline::TimelineElement;

/// Placement rectangle in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Placement {
    /// Integer origin and size for raster operations.
    pub fn to_pixels(&self) -> (i64, i64, u32, u32) {
        (
            self.x.round() as i64,
            self.y.round() as i64,
            self.width.round().max(0.0) as u32,
            self.height.round().max(0.0) as u32,
        )
    }
}

/// Fit media of `media_width x media_height` onto the canvas.
///
/// Media that fits is drawn at native size; larger media is scaled down with
/// its aspect ratio kept. Either way the result is centered. Text elements
/// with authored `x`/`y` keep those coordinates instead of the centered ones.
pub fn calculate_element_bounds(
    element: &TimelineElement,
    media_width: u32,
    media_height: u32,
    canvas_width: u32,
    canvas_height: u32,
) -> Placement {
    let (mw, mh) = (media_width as f64, media_height as f64);
    let (cw, ch) = (canvas_width as f64, canvas_height as f64);

    let (width, height) = if mw <= 0.0 || mh <= 0.0 {
        (0.0, 0.0)
    } else if mw <= cw && mh <= ch {
        (mw, mh)
    } else {
        let media_aspect = mw / mh;
        let canvas_aspect = cw / ch;
        if media_aspect > canvas_aspect {
            (cw, cw / media_aspect)
        } else {
            (ch * media_aspect, ch)
        }
    };

    let mut placement = Placement {
        x: (cw - width) / 2.0,
        y: (ch - height) / 2.0,
        width,
        height,
    };

    if let Some(text) = element.text_content() {
        if let Some(x) = text.x {
            placement.x = x;
        }
        if let Some(y) = text.y {
            placement.y = y;
        }
    }

    placement
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use reelforge_timeline::TextContent;

    fn clip() -> TimelineElement {
        TimelineElement::media("clip", "m", 0.0, 1.0)
    }

    #[test]
    fn test_small_media_is_centered_at_native_size() {
        let p = calculate_element_bounds(&clip(), 640, 360, 1920, 1080);
        assert_eq!(
            p,
            Placement {
                x: 640.0,
                y: 360.0,
                width: 640.0,
                height: 360.0
            }
        );
    }

    #[test]
    fn test_large_media_scales_to_canvas() {
        let p = calculate_element_bounds(&clip(), 3840, 2160, 1920, 1080);
        assert_eq!(p.width, 1920.0);
        assert_eq!(p.height, 1080.0);
        assert_eq!((p.x, p.y), (0.0, 0.0));
    }

    #[test]
    fn test_wide_media_is_width_constrained() {
        let p = calculate_element_bounds(&clip(), 4000, 1000, 1920, 1080);
        assert_eq!(p.width, 1920.0);
        assert_eq!(p.height, 480.0);
        assert_eq!(p.y, 300.0);
    }

    #[test]
    fn test_tall_media_is_height_constrained() {
        let p = calculate_element_bounds(&clip(), 1000, 2000, 1920, 1080);
        assert_eq!(p.height, 1080.0);
        assert_eq!(p.width, 540.0);
        assert_eq!(p.x, 690.0);
    }

    #[test]
    fn test_text_overrides_position() {
        let mut text = TextContent::new("hello");
        text.x = Some(12.0);
        let element = TimelineElement::text("t", text, 0.0, 1.0);
        let p = calculate_element_bounds(&element, 100, 40, 1920, 1080);
        assert_eq!(p.x, 12.0);
        assert_eq!(p.y, 520.0);
    }

    proptest! {
        #[test]
        fn prop_bounds_fit_canvas_without_upscaling(
            mw in 1u32..8000,
            mh in 1u32..8000,
            cw in 16u32..4000,
            ch in 16u32..4000,
        ) {
            let p = calculate_element_bounds(&clip(), mw, mh, cw, ch);
            prop_assert!(p.width <= cw as f64 + 1e-6);
            prop_assert!(p.height <= ch as f64 + 1e-6);
            prop_assert!(p.width <= mw as f64 + 1e-6);
            prop_assert!(p.height <= mh as f64 + 1e-6);
            prop_assert!(p.x >= -1e-6 && p.y >= -1e-6);

            let expected = mw as f64 / mh as f64;
            let actual = p.width / p.height;
            prop_assert!((actual - expected).abs() / expected < 1e-9);
        }
    }
}
