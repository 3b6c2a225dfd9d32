//! Blob URL creation for generated sketches.
//!
//! A sketch's PNG bytes become a `blob:` object URL that can be used
//! directly as an `<img src>`, replacing the slot's fallback path.

use keepsake_pipeline::SketchOutput;
use wasm_bindgen::JsValue;
use web_sys::BlobPropertyBag;

/// Errors that can occur during Blob URL creation.
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    /// A browser API call returned an error.
    #[error("browser API error: {0}")]
    JsError(String),
}

impl From<JsValue> for RasterError {
    fn from(value: JsValue) -> Self {
        Self::JsError(format!("{value:?}"))
    }
}

/// Wrap already-encoded PNG bytes in a Blob URL.
///
/// The returned URL must be revoked via [`revoke_blob_url`] when no
/// longer needed to avoid memory leaks.
///
/// # Errors
///
/// Returns [`RasterError::JsError`] if Blob or URL creation fails.
pub fn png_to_blob_url(png: &[u8]) -> Result<String, RasterError> {
    let uint8_array = js_sys::Uint8Array::from(png);
    let parts = js_sys::Array::new();
    parts.push(&uint8_array);

    let opts = BlobPropertyBag::new();
    opts.set_type("image/png");
    let blob = web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &opts)?;

    let url = web_sys::Url::create_object_url_with_blob(&blob)?;
    Ok(url)
}

/// Blob URL for a generated sketch. See [`png_to_blob_url`].
///
/// # Errors
///
/// Returns [`RasterError::JsError`] if Blob or URL creation fails.
pub fn sketch_to_blob_url(sketch: &SketchOutput) -> Result<String, RasterError> {
    png_to_blob_url(&sketch.png)
}

/// Revoke a Blob URL previously created by [`png_to_blob_url`].
///
/// Best-effort: failures are ignored since the URL may have already
/// been revoked.
pub fn revoke_blob_url(url: &str) {
    let _ = web_sys::Url::revoke_object_url(url);
}
