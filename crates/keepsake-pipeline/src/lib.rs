//! keepsake-pipeline: Pure pencil-sketch pipeline (sans-IO).
//!
//! Converts a raster photograph into black-and-white line art through:
//! decode -> luma grayscale -> Sobel edge magnitude -> PNG encode.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and returns encoded bytes. Fetching sources, async
//! orchestration and browser interaction live in `keepsake-io`.

pub mod decode;
pub mod diagnostics;
pub mod encode;
pub mod grayscale;
pub mod sketch;
pub mod sobel;
pub mod types;

pub use diagnostics::{Clock, SketchDiagnostics, WebClock, generate_with_diagnostics};
pub use types::{
    Dimensions, ErrorKind, GrayscaleBuffer, RgbaImage, SketchConfig, SketchError, SketchOutput,
    SketchResult, SourceError, SourceImage,
};

/// Generate a pencil sketch from raw image bytes.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP) and a configuration,
/// and produces a PNG of identical dimensions in which strong edges are
/// dark and flat regions white.
///
/// # Steps
///
/// 1. Decode image to RGBA
/// 2. Luma grayscale conversion
/// 3. Allocate an opaque white drawing surface
/// 4. Sobel edge magnitude on every interior pixel
/// 5. PNG encode
///
/// # Errors
///
/// Returns [`SketchError::SourceUnavailable`] if `bytes` is empty or not a
/// decodable image. Returns [`SketchError::CanvasUnavailable`] if the
/// drawing surface cannot be allocated or encoded.
#[tracing::instrument(skip_all, fields(input_bytes = bytes.len()))]
pub fn generate(bytes: &[u8], config: &SketchConfig) -> Result<SketchOutput, SketchError> {
    let source = decode::decode(bytes, config)?;
    tracing::debug!(dimensions = %source.dimensions(), "decoded source image");

    let sketch = sketch_source(&source, config)?;
    drop(source);

    let png = encode::encode_png(&sketch)?;
    tracing::debug!(output_bytes = png.len(), "encoded sketch");
    Ok(SketchOutput {
        png,
        dimensions: sketch.dimensions(),
    })
}

/// Render the sketch of an already-decoded image without encoding it.
///
/// # Errors
///
/// Returns [`SketchError::CanvasUnavailable`] if the drawing surface
/// cannot be allocated.
pub fn sketch_source(
    source: &SourceImage,
    config: &SketchConfig,
) -> Result<SketchResult, SketchError> {
    let gray = grayscale::to_grayscale(source);
    sketch::render(&gray, config)
}
