//! Luma conversion.
//!
//! Reduces an RGBA [`SourceImage`] to one floating-point luminance sample
//! per pixel using the standard perceptual weights
//! `0.299*R + 0.587*G + 0.114*B`. Alpha is ignored.

use crate::types::{GrayscaleBuffer, SourceImage};

/// Red channel weight.
pub const LUMA_RED: f64 = 0.299;
/// Green channel weight.
pub const LUMA_GREEN: f64 = 0.587;
/// Blue channel weight.
pub const LUMA_BLUE: f64 = 0.114;

/// Luminance of a single pixel.
///
/// Evaluated in `f64` in channel order and narrowed to `f32` for
/// storage, so results match a double-precision evaluation written into
/// a 32-bit float array.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::suboptimal_flops)]
pub fn luma(r: u8, g: u8, b: u8) -> f32 {
    // Plain multiply-add order; a fused mul_add rounds differently.
    (f64::from(r) * LUMA_RED + f64::from(g) * LUMA_GREEN + f64::from(b) * LUMA_BLUE) as f32
}

/// Compute the grayscale buffer for a decoded source image.
#[must_use = "returns the grayscale buffer"]
pub fn to_grayscale(source: &SourceImage) -> GrayscaleBuffer {
    let image = source.image();
    GrayscaleBuffer::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, _] = image.get_pixel(x, y).0;
        luma(r, g, b)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> SourceImage {
        SourceImage::new(image::RgbaImage::from_fn(width, height, |_, _| {
            image::Rgba(rgba)
        }))
    }

    #[test]
    fn white_is_full_luminance() {
        assert!((luma(255, 255, 255) - 255.0).abs() < 1e-3);
    }

    #[test]
    fn black_is_zero() {
        assert!(luma(0, 0, 0).abs() < f32::EPSILON);
    }

    #[test]
    fn weighted_not_averaged() {
        let r = luma(255, 0, 0);
        let g = luma(0, 255, 0);
        let b = luma(0, 0, 255);
        assert!(
            g > r && r > b,
            "expected green > red > blue luminance, got R={r} G={g} B={b}",
        );
    }

    #[test]
    #[allow(clippy::cast_possible_truncation)]
    fn matches_reference_weights() {
        let expected = (200.0_f64 * 0.299 + 100.0 * 0.587 + 50.0 * 0.114) as f32;
        assert!((luma(200, 100, 50) - expected).abs() < f32::EPSILON);
    }

    #[test]
    fn alpha_is_ignored() {
        let opaque = to_grayscale(&solid(2, 2, [90, 120, 30, 255]));
        let transparent = to_grayscale(&solid(2, 2, [90, 120, 30, 0]));
        assert_eq!(opaque, transparent);
    }

    #[test]
    fn output_dimensions_match_input() {
        let gray = to_grayscale(&solid(17, 31, [128, 64, 32, 255]));
        assert_eq!(gray.width(), 17);
        assert_eq!(gray.height(), 31);
        assert_eq!(gray.samples().len(), 17 * 31);
    }

    #[test]
    fn samples_follow_pixel_positions() {
        let source = SourceImage::new(image::RgbaImage::from_fn(2, 2, |x, y| {
            if (x, y) == (1, 0) {
                image::Rgba([255, 255, 255, 255])
            } else {
                image::Rgba([0, 0, 0, 255])
            }
        }));
        let gray = to_grayscale(&source);
        assert!(gray.get(1, 0).unwrap_or_default() > 254.0);
        assert!(gray.get(0, 1).unwrap_or_default() < 1.0);
    }
}
