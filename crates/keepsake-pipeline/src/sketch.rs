//! Pencil-sketch rendering.
//!
//! Allocates an opaque white drawing surface the size of the grayscale
//! buffer and fills every interior pixel with the inverted Sobel edge
//! magnitude. The outermost one-pixel frame stays white.
//!
//! Rows are independent, so with the `parallel` feature they are rendered
//! on the rayon pool. Output is identical either way.

use image::RgbaImage;

use crate::sobel;
use crate::types::{Dimensions, GrayscaleBuffer, SketchConfig, SketchError, SketchResult};

/// Bytes per output pixel (RGBA8).
const CHANNELS: usize = 4;

/// Allocate an opaque white RGBA surface.
///
/// # Errors
///
/// Returns [`SketchError::CanvasUnavailable`] if the surface has zero
/// area, exceeds [`SketchConfig::max_pixels`], or cannot be allocated.
pub fn allocate_surface(
    dimensions: Dimensions,
    config: &SketchConfig,
) -> Result<RgbaImage, SketchError> {
    if dimensions.is_empty() {
        return Err(SketchError::canvas(format!(
            "cannot create a {dimensions} drawing surface"
        )));
    }

    let pixels = dimensions.pixel_count();
    if pixels > config.max_pixels {
        return Err(SketchError::canvas(format!(
            "{dimensions} ({pixels} pixels) exceeds the {} pixel limit",
            config.max_pixels
        )));
    }

    let len = usize::try_from(pixels)
        .ok()
        .and_then(|p| p.checked_mul(CHANNELS))
        .ok_or_else(|| SketchError::canvas(format!("{dimensions} is not addressable")))?;

    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|e| SketchError::canvas(format!("cannot allocate {len} bytes: {e}")))?;
    buf.resize(len, u8::MAX);

    RgbaImage::from_raw(dimensions.width, dimensions.height, buf)
        .ok_or_else(|| SketchError::canvas(format!("surface buffer does not fit {dimensions}")))
}

/// Render the pencil sketch of a grayscale buffer.
///
/// # Errors
///
/// Returns [`SketchError::CanvasUnavailable`] if the drawing surface
/// cannot be allocated (see [`allocate_surface`]).
#[tracing::instrument(skip_all, fields(dimensions = %gray.dimensions()))]
pub fn render(gray: &GrayscaleBuffer, config: &SketchConfig) -> Result<SketchResult, SketchError> {
    let mut surface = allocate_surface(gray.dimensions(), config)?;
    let scale = config.effective_magnitude_scale();

    let (width, height) = (gray.width() as usize, gray.height() as usize);
    if width < 3 || height < 3 {
        tracing::debug!("no interior pixels; sketch is blank");
        return Ok(SketchResult::new(surface));
    }

    let row_bytes = width * CHANNELS;
    let interior_rows = height - 2;

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        surface
            .par_chunks_exact_mut(row_bytes)
            .enumerate()
            .skip(1)
            .take(interior_rows)
            .for_each(|(y, out)| render_row(gray, y, out, scale));
    }

    #[cfg(not(feature = "parallel"))]
    {
        surface
            .chunks_exact_mut(row_bytes)
            .enumerate()
            .skip(1)
            .take(interior_rows)
            .for_each(|(y, out)| render_row(gray, y, out, scale));
    }

    Ok(SketchResult::new(surface))
}

/// Fill the interior pixels of output row `y`.
#[allow(clippy::cast_possible_truncation)]
fn render_row(gray: &GrayscaleBuffer, y: usize, out: &mut [u8], scale: f64) {
    let y = y as u32;
    let rows = [gray.row(y - 1), gray.row(y), gray.row(y + 1)];
    let width = rows[1].len();

    for (x, px) in out
        .chunks_exact_mut(CHANNELS)
        .enumerate()
        .take(width - 1)
        .skip(1)
    {
        let (gx, gy) = sobel::gradient(rows, x);
        let value = sobel::pencil_luminance(sobel::edge_magnitude(gx, gy, scale));
        px.copy_from_slice(&[value, value, value, u8::MAX]);
    }
}
