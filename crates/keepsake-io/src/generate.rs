//! Asynchronous sketch generation.

use keepsake_pipeline::{SketchConfig, SketchError, SketchOutput};

use crate::loader::SourceLoader;
use crate::source::SourceRef;

/// Load `source` and render its pencil sketch.
///
/// Awaiting the loader is the only suspension point. On WASM the task
/// then yields once to the browser event loop, so anything the caller
/// scheduled (a busy indicator, a fallback image) can paint before the
/// synchronous convolution runs. Callers that must not block at all
/// should run [`keepsake_pipeline::generate`] in a web worker
/// (see `SketchWorker`) or on a thread pool instead.
///
/// Dropping the future discards the work; there is nothing to tear down.
///
/// # Errors
///
/// Returns [`SketchError::SourceUnavailable`] if the loader fails or the
/// bytes do not decode, and [`SketchError::CanvasUnavailable`] if no
/// drawing surface can be provided. Nothing is retried.
#[tracing::instrument(skip(loader, config), fields(source = %source))]
pub async fn generate_sketch<L: SourceLoader>(
    loader: &L,
    source: &SourceRef,
    config: &SketchConfig,
) -> Result<SketchOutput, SketchError> {
    let bytes = loader.load(source).await.inspect_err(|e| {
        tracing::warn!(error = %e, "source could not be loaded");
    })?;
    tracing::debug!(bytes = bytes.len(), "source loaded");

    yield_to_host().await;

    let result = keepsake_pipeline::generate(&bytes, config);
    match &result {
        Ok(output) => tracing::debug!(dimensions = %output.dimensions, "sketch ready"),
        Err(e) => tracing::warn!(error = %e, "sketch generation failed"),
    }
    result
}

#[cfg(target_arch = "wasm32")]
async fn yield_to_host() {
    gloo_timers::future::TimeoutFuture::new(0).await;
}

#[cfg(not(target_arch = "wasm32"))]
#[allow(clippy::unused_async)]
async fn yield_to_host() {}
