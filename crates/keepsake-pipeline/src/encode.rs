//! PNG encoding of the finished sketch.
//!
//! Reading pixels back off the drawing surface is the last step that can
//! fail, so encoder errors are reported as
//! [`SketchError::CanvasUnavailable`].

use image::ImageEncoder;

use crate::types::{SketchError, SketchResult};

/// Encode a sketch as an RGBA8 PNG byte stream.
///
/// # Errors
///
/// Returns [`SketchError::CanvasUnavailable`] if PNG encoding fails.
pub fn encode_png(sketch: &SketchResult) -> Result<Vec<u8>, SketchError> {
    let image = sketch.image();
    let mut png = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut png);
    encoder
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| SketchError::canvas(format!("PNG encoding failed: {e}")))?;
    Ok(png)
}
