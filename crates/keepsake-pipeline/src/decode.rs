//! Image decoding.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces an RGBA
//! [`SourceImage`]. This is the first step in the pipeline: raw bytes in,
//! pixels out.
//!
//! Photos are returned the way a browser displays them: an EXIF
//! orientation tag is applied before conversion, so a portrait phone
//! photo stored sideways decodes upright.

use std::io::Cursor;

use image::{DynamicImage, ImageDecoder, ImageReader, Limits};

use crate::types::{Dimensions, SketchConfig, SketchError, SourceError, SourceImage};

/// Widest decoded pixel the `image` crate produces (RGBA, 32-bit float).
const MAX_BYTES_PER_PIXEL: u64 = 16;

/// Decode raw image bytes into an upright RGBA source image.
///
/// Supports whatever formats the `image` crate was built with. Images
/// with other pixel layouts (grayscale, 16-bit, RGB) are converted to
/// 8-bit RGBA.
///
/// The header is read first; sources larger than
/// [`SketchConfig::max_pixels`] are refused before any pixel data is
/// decoded. The decoder's allocation limit is raised to match, so every
/// source the config admits can actually be decoded.
///
/// # Errors
///
/// Returns [`SketchError::SourceUnavailable`] with
/// [`SourceError::EmptyInput`] if `bytes` is empty, or with
/// [`SourceError::Decode`] if the format is unrecognized or the data is
/// corrupt. Returns [`SketchError::CanvasUnavailable`] if the image has
/// more pixels than the config allows.
pub fn decode(bytes: &[u8], config: &SketchConfig) -> Result<SourceImage, SketchError> {
    if bytes.is_empty() {
        return Err(SourceError::EmptyInput.into());
    }

    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| SourceError::Decode(image::ImageError::IoError(e)))?;
    reader.limits(decoder_limits(config));
    let mut decoder = reader.into_decoder().map_err(SourceError::Decode)?;

    let (width, height) = decoder.dimensions();
    let dimensions = Dimensions::new(width, height);
    if dimensions.pixel_count() > config.max_pixels {
        return Err(SketchError::canvas(format!(
            "{dimensions} ({} pixels) exceeds the {} pixel limit",
            dimensions.pixel_count(),
            config.max_pixels
        )));
    }

    let orientation = decoder.orientation().map_err(SourceError::Decode)?;
    let mut img = DynamicImage::from_decoder(decoder).map_err(SourceError::Decode)?;
    img.apply_orientation(orientation);
    Ok(SourceImage::new(img.to_rgba8()))
}

/// Decoder limits that admit every image within `config.max_pixels`.
fn decoder_limits(config: &SketchConfig) -> Limits {
    let mut limits = Limits::default();
    limits.max_alloc = Some(config.max_pixels.saturating_mul(MAX_BYTES_PER_PIXEL));
    limits
}
