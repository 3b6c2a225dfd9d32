//! Browser `fetch` loader.

use keepsake_pipeline::SourceError;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, RequestMode, Response};

use crate::loader::SourceLoader;
use crate::source::SourceRef;

/// Loads sources through the window's `fetch`.
///
/// Requests are made in CORS mode. A remote image whose origin does not
/// allow cross-origin reads fails here, before any pixels are touched,
/// instead of producing a tainted canvas later. Local references are
/// fetched as site-relative URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchLoader;

impl FetchLoader {
    /// A new loader.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SourceLoader for FetchLoader {
    async fn load(&self, source: &SourceRef) -> Result<Vec<u8>, SourceError> {
        let url = source.to_string();
        fetch_bytes(&url)
            .await
            .map_err(|reason| SourceError::load(url.as_str(), reason))
    }
}

#[allow(clippy::future_not_send)] // WASM is single-threaded
async fn fetch_bytes(url: &str) -> Result<Vec<u8>, String> {
    let opts = RequestInit::new();
    opts.set_method("GET");
    opts.set_mode(RequestMode::Cors);
    let request = Request::new_with_str_and_init(url, &opts).map_err(js_message)?;

    let window = web_sys::window().ok_or_else(|| "no global window".to_owned())?;
    let response = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(js_message)?;
    let response: Response = response
        .dyn_into()
        .map_err(|_| "fetch did not return a Response".to_owned())?;
    if !response.ok() {
        return Err(format!("HTTP {}", response.status()));
    }

    let buffer = JsFuture::from(response.array_buffer().map_err(js_message)?)
        .await
        .map_err(js_message)?;
    Ok(js_sys::Uint8Array::new(&buffer).to_vec())
}

fn js_message(value: JsValue) -> String {
    value
        .dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{value:?}"))
}
