//! Layer compositing and effect application.
//!
//! Drawing an element is: scale the source into its placement, run the
//! filter pass, run the advanced pass, then alpha-blend onto the canvas.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use reelforge_timeline::{parse_hex_color, EffectParameters};

use crate::bounds::Placement;

/// Default tint mix when a tint colour is set without a strength.
const DEFAULT_TINT_STRENGTH: f64 = 50.0;

/// Fill the whole canvas with one colour.
pub fn fill_background(canvas: &mut RgbaImage, color: [u8; 4]) {
    for pixel in canvas.pixels_mut() {
        *pixel = Rgba(color);
    }
}

/// Scale `source` to the placement size.
///
/// Returns `None` for a degenerate placement.
pub fn prepare_layer(source: &RgbaImage, placement: &Placement) -> Option<RgbaImage> {
    let (_, _, width, height) = placement.to_pixels();
    if width == 0 || height == 0 {
        return None;
    }
    if source.dimensions() == (width, height) {
        return Some(source.clone());
    }
    Some(imageops::resize(source, width, height, FilterType::Triangle))
}

/// Alpha-blend a prepared layer at its placement origin.
pub fn draw_layer(canvas: &mut RgbaImage, layer: &RgbaImage, placement: &Placement) {
    let (x, y, _, _) = placement.to_pixels();
    imageops::overlay(canvas, layer, x, y);
}

/// Run both effect passes over a layer.
pub fn apply_effects(layer: &mut RgbaImage, params: &EffectParameters) {
    if params.has_filters() {
        apply_filter_pass(layer, params);
    }
    if params.has_advanced() {
        apply_advanced_pass(layer, params);
    }
}

/// Filter-style pass: colour adjustments, blur, opacity.
pub fn apply_filter_pass(layer: &mut RgbaImage, params: &EffectParameters) {
    let brightness = params.brightness.map(|v| 1.0 + v.clamp(-100.0, 100.0) / 100.0);
    let contrast = params.contrast.map(|v| 1.0 + v.clamp(-100.0, 100.0) / 100.0);
    let saturation = params.saturation.map(|v| 1.0 + v.clamp(-100.0, 100.0) / 100.0);
    let hue = params.hue_rotate.map(hue_rotate_matrix);
    let grayscale = params.grayscale.map(unit_amount);
    let sepia = params.sepia.map(unit_amount);
    let invert = params.invert.map(unit_amount);

    let recolor = brightness.is_some()
        || contrast.is_some()
        || saturation.is_some()
        || hue.is_some()
        || grayscale.is_some()
        || sepia.is_some()
        || invert.is_some();

    if recolor {
        for pixel in layer.pixels_mut() {
            let mut rgb = [pixel[0] as f64, pixel[1] as f64, pixel[2] as f64];

            if let Some(f) = brightness {
                rgb = rgb.map(|c| c * f);
            }
            if let Some(f) = contrast {
                rgb = rgb.map(|c| (c - 128.0) * f + 128.0);
            }
            if let Some(f) = saturation {
                let l = luma(rgb);
                rgb = rgb.map(|c| l + (c - l) * f);
            }
            if let Some(m) = &hue {
                rgb = mul_matrix(m, rgb);
            }
            if let Some(a) = grayscale {
                let l = luma(rgb);
                rgb = rgb.map(|c| c * (1.0 - a) + l * a);
            }
            if let Some(a) = sepia {
                rgb = mul_matrix(&sepia_matrix(a), rgb);
            }
            if let Some(a) = invert {
                rgb = rgb.map(|c| c * (1.0 - a) + (255.0 - c) * a);
            }

            pixel[0] = to_channel(rgb[0]);
            pixel[1] = to_channel(rgb[1]);
            pixel[2] = to_channel(rgb[2]);
        }
    }

    if let Some(radius) = params.blur {
        if radius > 0.0 {
            *layer = imageops::blur(layer, radius as f32);
        }
    }

    if let Some(opacity) = params.opacity {
        apply_opacity(layer, (opacity / 100.0).clamp(0.0, 1.0) as f32);
    }
}

/// Advanced pass: pixelate, tint, vignette.
pub fn apply_advanced_pass(layer: &mut RgbaImage, params: &EffectParameters) {
    if let Some(block) = params.pixelate {
        let block = block.round();
        if block > 1.0 {
            pixelate(layer, block as u32);
        }
    }

    if let Some(tint) = params.tint.as_deref() {
        match parse_hex_color(tint) {
            Some([tr, tg, tb, _]) => {
                let k = unit_amount(params.tint_strength.unwrap_or(DEFAULT_TINT_STRENGTH));
                for pixel in layer.pixels_mut() {
                    pixel[0] = to_channel(pixel[0] as f64 * (1.0 - k) + tr as f64 * k);
                    pixel[1] = to_channel(pixel[1] as f64 * (1.0 - k) + tg as f64 * k);
                    pixel[2] = to_channel(pixel[2] as f64 * (1.0 - k) + tb as f64 * k);
                }
            }
            None => tracing::debug!(tint, "Ignoring unparseable tint colour"),
        }
    }

    if let Some(strength) = params.vignette {
        let strength = unit_amount(strength);
        if strength > 0.0 {
            vignette(layer, strength);
        }
    }
}

/// Multiply every pixel's alpha by `opacity` in `[0, 1]`.
pub fn apply_opacity(layer: &mut RgbaImage, opacity: f32) {
    for pixel in layer.pixels_mut() {
        pixel[3] = (pixel[3] as f32 * opacity).round().clamp(0.0, 255.0) as u8;
    }
}

fn pixelate(layer: &mut RgbaImage, block: u32) {
    let (width, height) = layer.dimensions();
    for by in (0..height).step_by(block as usize) {
        for bx in (0..width).step_by(block as usize) {
            let x_end = (bx + block).min(width);
            let y_end = (by + block).min(height);

            let mut sum = [0u64; 4];
            for y in by..y_end {
                for x in bx..x_end {
                    let p = layer.get_pixel(x, y);
                    for (acc, c) in sum.iter_mut().zip(p.0) {
                        *acc += c as u64;
                    }
                }
            }
            let count = ((x_end - bx) * (y_end - by)) as u64;
            let avg = Rgba(sum.map(|s| (s / count) as u8));

            for y in by..y_end {
                for x in bx..x_end {
                    layer.put_pixel(x, y, avg);
                }
            }
        }
    }
}

fn vignette(layer: &mut RgbaImage, strength: f64) {
    let (width, height) = layer.dimensions();
    let cx = width as f64 / 2.0;
    let cy = height as f64 / 2.0;
    let max_dist = (cx * cx + cy * cy).sqrt().max(1.0);

    for (x, y, pixel) in layer.enumerate_pixels_mut() {
        let dx = x as f64 + 0.5 - cx;
        let dy = y as f64 + 0.5 - cy;
        let d = (dx * dx + dy * dy).sqrt() / max_dist;
        let factor = 1.0 - strength * d * d;
        for c in 0..3 {
            pixel[c] = to_channel(pixel[c] as f64 * factor);
        }
    }
}

fn unit_amount(percent: f64) -> f64 {
    (percent / 100.0).clamp(0.0, 1.0)
}

fn luma(rgb: [f64; 3]) -> f64 {
    0.2126 * rgb[0] + 0.7152 * rgb[1] + 0.0722 * rgb[2]
}

fn to_channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn mul_matrix(m: &[[f64; 3]; 3], rgb: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * rgb[0] + m[0][1] * rgb[1] + m[0][2] * rgb[2],
        m[1][0] * rgb[0] + m[1][1] * rgb[1] + m[1][2] * rgb[2],
        m[2][0] * rgb[0] + m[2][1] * rgb[1] + m[2][2] * rgb[2],
    ]
}

fn hue_rotate_matrix(degrees: f64) -> [[f64; 3]; 3] {
    let (s, c) = degrees.to_radians().sin_cos();
    [
        [
            0.213 + 0.787 * c - 0.213 * s,
            0.715 - 0.715 * c - 0.715 * s,
            0.072 - 0.072 * c + 0.928 * s,
        ],
        [
            0.213 - 0.213 * c + 0.143 * s,
            0.715 + 0.285 * c + 0.140 * s,
            0.072 - 0.072 * c - 0.283 * s,
        ],
        [
            0.213 - 0.213 * c - 0.787 * s,
            0.715 - 0.715 * c + 0.715 * s,
            0.072 + 0.928 * c + 0.072 * s,
        ],
    ]
}

fn sepia_matrix(amount: f64) -> [[f64; 3]; 3] {
    let inv = 1.0 - amount;
    [
        [0.393 + 0.607 * inv, 0.769 - 0.769 * inv, 0.189 - 0.189 * inv],
        [0.349 - 0.349 * inv, 0.686 + 0.314 * inv, 0.168 - 0.168 * inv],
        [0.272 - 0.272 * inv, 0.534 - 0.534 * inv, 0.131 + 0.869 * inv],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(8, 8, Rgba(rgba))
    }

    fn params(f: impl FnOnce(&mut EffectParameters)) -> EffectParameters {
        let mut p = EffectParameters::default();
        f(&mut p);
        p
    }

    #[test]
    fn test_brightness_and_invert() {
        let mut layer = solid([50, 60, 70, 255]);
        apply_effects(&mut layer, &params(|p| p.brightness = Some(100.0)));
        assert_eq!(layer.get_pixel(0, 0).0, [100, 120, 140, 255]);

        let mut layer = solid([10, 20, 30, 255]);
        apply_effects(&mut layer, &params(|p| p.invert = Some(100.0)));
        assert_eq!(layer.get_pixel(3, 3).0, [245, 235, 225, 255]);
    }

    #[test]
    fn test_grayscale_equalizes_channels() {
        let mut layer = solid([200, 40, 90, 255]);
        apply_effects(&mut layer, &params(|p| p.grayscale = Some(100.0)));
        let [r, g, b, _] = layer.get_pixel(0, 0).0;
        assert_eq!(r, g);
        assert_eq!(g, b);
    }

    #[test]
    fn test_zero_hue_rotation_is_identity() {
        let mut layer = solid([200, 40, 90, 255]);
        apply_effects(&mut layer, &params(|p| p.hue_rotate = Some(0.0)));
        assert_eq!(layer.get_pixel(0, 0).0, [200, 40, 90, 255]);
    }

    #[test]
    fn test_opacity_scales_alpha_only() {
        let mut layer = solid([100, 100, 100, 200]);
        apply_effects(&mut layer, &params(|p| p.opacity = Some(50.0)));
        assert_eq!(layer.get_pixel(0, 0).0, [100, 100, 100, 100]);
    }

    #[test]
    fn test_pixelate_averages_blocks() {
        let mut layer = RgbaImage::new(4, 4);
        layer.put_pixel(0, 0, Rgba([200, 0, 0, 255]));
        layer.put_pixel(1, 1, Rgba([200, 0, 0, 255]));
        apply_advanced_pass(&mut layer, &params(|p| p.pixelate = Some(2.0)));
        assert_eq!(layer.get_pixel(0, 1).0, [100, 0, 0, 127]);
        assert_eq!(layer.get_pixel(3, 3).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_tint_and_vignette() {
        let mut layer = solid([0, 0, 0, 255]);
        apply_advanced_pass(
            &mut layer,
            &params(|p| {
                p.tint = Some("#ff0000".to_string());
                p.tint_strength = Some(100.0);
            }),
        );
        assert_eq!(layer.get_pixel(4, 4).0, [255, 0, 0, 255]);

        let mut layer = RgbaImage::from_pixel(64, 64, Rgba([200, 200, 200, 255]));
        apply_advanced_pass(&mut layer, &params(|p| p.vignette = Some(100.0)));
        let center = layer.get_pixel(32, 32)[0];
        let corner = layer.get_pixel(0, 0)[0];
        assert!(center > 190);
        assert!(corner < 20);
    }

    #[test]
    fn test_prepare_and_draw_layer() {
        let mut canvas = RgbaImage::new(20, 10);
        fill_background(&mut canvas, [0, 0, 0, 255]);
        let source = solid([0, 255, 0, 255]);
        let placement = Placement {
            x: 5.0,
            y: 2.0,
            width: 4.0,
            height: 4.0,
        };
        let layer = prepare_layer(&source, &placement).unwrap();
        assert_eq!(layer.dimensions(), (4, 4));
        draw_layer(&mut canvas, &layer, &placement);
        assert_eq!(canvas.get_pixel(6, 3).0, [0, 255, 0, 255]);
        assert_eq!(canvas.get_pixel(0, 0).0, [0, 0, 0, 255]);

        let empty = Placement {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 3.0,
        };
        assert!(prepare_layer(&source, &empty).is_none());
    }
}
