//! Web worker communication for off-main-thread sketch generation.
//!
//! [`SketchWorker`] wraps a `web_sys::Worker` running the
//! `keepsake-worker` WASM module. It sends image bytes + config to the
//! worker via `postMessage` and receives either the encoded PNG or a
//! serialized `SketchError` back.
//!
//! The worker is created from embedded JS + WASM blobs, so no extra
//! static files need to be served.

use std::cell::RefCell;
use std::rc::Rc;

use keepsake_pipeline::{Dimensions, SketchConfig, SketchError, SketchOutput};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::loader::SourceLoader;
use crate::source::SourceRef;

/// Runs `keepsake_pipeline::generate` in a dedicated web worker.
///
/// Create one at startup and reuse it for every sketch. Call
/// [`cancel`](Self::cancel) to abandon an in-progress run; this kills
/// the worker and spawns a fresh one.
pub struct SketchWorker {
    worker_js: &'static str,
    worker_wasm: &'static [u8],
    /// Replaced on cancel.
    inner: RefCell<web_sys::Worker>,
}

impl SketchWorker {
    /// Create a new sketch worker from embedded JS and WASM blobs.
    ///
    /// # Errors
    ///
    /// Returns [`SketchError::CanvasUnavailable`] if the worker cannot
    /// be created (e.g. in a non-browser environment).
    pub fn new(worker_js: &'static str, worker_wasm: &'static [u8]) -> Result<Self, SketchError> {
        let worker = create_worker(worker_js, worker_wasm)?;
        Ok(Self {
            worker_js,
            worker_wasm,
            inner: RefCell::new(worker),
        })
    }

    /// Load `source` and sketch it in the worker.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run), plus
    /// [`SketchError::SourceUnavailable`] if the loader fails.
    #[allow(clippy::future_not_send)] // WASM is single-threaded
    pub async fn generate<L: SourceLoader>(
        &self,
        loader: &L,
        source: &SourceRef,
        config: &SketchConfig,
        generation: f64,
    ) -> Result<SketchOutput, SketchError> {
        let bytes = loader.load(source).await?;
        self.run(&bytes, config, generation).await
    }

    /// Sketch already-loaded image bytes in the worker.
    ///
    /// The `generation` parameter is passed through to the response so
    /// replies to earlier requests are ignored.
    ///
    /// # Errors
    ///
    /// Returns the worker's [`SketchError`] if generation failed there.
    /// Returns [`SketchError::CanvasUnavailable`] if the worker cannot be
    /// reached, was terminated, or its reply is malformed.
    #[allow(clippy::future_not_send)] // WASM is single-threaded
    pub async fn run(
        &self,
        image_bytes: &[u8],
        config: &SketchConfig,
        generation: f64,
    ) -> Result<SketchOutput, SketchError> {
        let config_json = serde_json::to_string(config)
            .map_err(|e| SketchError::canvas(format!("failed to serialize config: {e}")))?;

        let message = js_sys::Object::new();
        let set = |key: &str, val: &JsValue| {
            js_sys::Reflect::set(&message, &JsValue::from_str(key), val)
                .map(|_| ())
                .map_err(|_| SketchError::canvas(format!("failed to set {key}")))
        };
        set("imageBytes", &js_sys::Uint8Array::from(image_bytes))?;
        set("configJson", &JsValue::from_str(&config_json))?;
        set("generation", &JsValue::from_f64(generation))?;

        let result = Rc::new(RefCell::new(None::<Result<SketchOutput, SketchError>>));
        let result_clone = Rc::clone(&result);

        let (promise, resolve, reject) = new_promise()?;

        let onmessage = Closure::<dyn FnMut(web_sys::MessageEvent)>::new(
            move |event: web_sys::MessageEvent| {
                let data = event.data();

                let resp_generation = js_sys::Reflect::get(&data, &JsValue::from_str("generation"))
                    .ok()
                    .and_then(|v| v.as_f64())
                    .unwrap_or(-1.0);
                if (resp_generation - generation).abs() > f64::EPSILON {
                    // Reply to an earlier request.
                    return;
                }

                *result_clone.borrow_mut() = Some(parse_response(&data));
                resolve.call0(&JsValue::NULL).ok();
            },
        );

        let onerror =
            Closure::<dyn FnMut(web_sys::ErrorEvent)>::new(move |event: web_sys::ErrorEvent| {
                let _ = reject.call1(&JsValue::NULL, &JsValue::from_str(&event.message()));
            });

        {
            let worker = self.inner.borrow();
            worker.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
            worker.set_onerror(Some(onerror.as_ref().unchecked_ref()));
            worker
                .post_message(&message)
                .map_err(|_| SketchError::canvas("failed to postMessage"))?;
        }

        // Keep the closures alive while awaiting.
        let _onmessage_guard = onmessage;
        let _onerror_guard = onerror;

        let await_result = wasm_bindgen_futures::JsFuture::from(promise).await;

        {
            let worker = self.inner.borrow();
            worker.set_onmessage(None);
            worker.set_onerror(None);
        }

        match await_result {
            Ok(_) => result.borrow_mut().take().unwrap_or_else(|| {
                Err(SketchError::canvas("worker completed but no result captured"))
            }),
            Err(e) => {
                let msg = e.as_string().unwrap_or_else(|| "unknown worker error".into());
                tracing::warn!(error = %msg, "sketch worker failed");
                Err(SketchError::canvas(format!("worker error: {msg}")))
            }
        }
    }

    /// Abandon any in-progress run by terminating the worker and
    /// creating a fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`SketchError::CanvasUnavailable`] if the replacement
    /// worker cannot be created.
    pub fn cancel(&self) -> Result<(), SketchError> {
        self.inner.borrow().terminate();
        let new_worker = create_worker(self.worker_js, self.worker_wasm)?;
        *self.inner.borrow_mut() = new_worker;
        Ok(())
    }
}

/// Decode a worker reply into a sketch or the worker's error.
fn parse_response(data: &JsValue) -> Result<SketchOutput, SketchError> {
    let get = |key: &str| js_sys::Reflect::get(data, &JsValue::from_str(key)).ok();

    let ok = get("ok").and_then(|v| v.as_bool()).unwrap_or(false);
    if !ok {
        let json = get("errorJson")
            .and_then(|v| v.as_string())
            .ok_or_else(|| SketchError::canvas("worker response missing errorJson"))?;
        return Err(serde_json::from_str::<SketchError>(&json).unwrap_or_else(|e| {
            SketchError::canvas(format!("failed to deserialize worker error: {e}"))
        }));
    }

    let png = get("pngBytes")
        .and_then(|v| v.dyn_into::<js_sys::Uint8Array>().ok())
        .ok_or_else(|| SketchError::canvas("worker response missing pngBytes"))?
        .to_vec();
    let dimension = |key: &str| {
        get(key)
            .and_then(|v| v.as_f64())
            .and_then(|v| {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let n = v as u32;
                (f64::from(n) == v).then_some(n)
            })
            .ok_or_else(|| SketchError::canvas(format!("worker response missing {key}")))
    };
    Ok(SketchOutput {
        png,
        dimensions: Dimensions::new(dimension("width")?, dimension("height")?),
    })
}

/// Create a web worker from embedded JS glue and WASM binary.
///
/// The WASM binary and a wrapper script that initializes the glue from
/// it are each turned into Blob URLs; the worker runs the wrapper.
fn create_worker(worker_js: &str, worker_wasm: &[u8]) -> Result<web_sys::Worker, SketchError> {
    let wasm_array = js_sys::Uint8Array::from(worker_wasm);
    let wasm_blob_parts = js_sys::Array::new();
    wasm_blob_parts.push(&wasm_array.buffer());
    let wasm_blob_opts = web_sys::BlobPropertyBag::new();
    wasm_blob_opts.set_type("application/wasm");
    let wasm_blob = web_sys::Blob::new_with_buffer_source_sequence_and_options(
        &wasm_blob_parts,
        &wasm_blob_opts,
    )
    .map_err(browser("WASM Blob"))?;
    let wasm_url =
        web_sys::Url::create_object_url_with_blob(&wasm_blob).map_err(browser("WASM Blob URL"))?;

    let wrapper_js = format!(
        r#"{worker_js}

wasm_bindgen("{wasm_url}")
    .catch(function(e) {{ console.error("Worker WASM init failed:", e); }});
"#
    );

    let js_blob_parts = js_sys::Array::new();
    js_blob_parts.push(&JsValue::from_str(&wrapper_js));
    let js_blob_opts = web_sys::BlobPropertyBag::new();
    js_blob_opts.set_type("application/javascript");
    let js_blob = web_sys::Blob::new_with_str_sequence_and_options(&js_blob_parts, &js_blob_opts)
        .map_err(browser("JS Blob"))?;
    let js_url =
        web_sys::Url::create_object_url_with_blob(&js_blob).map_err(browser("JS Blob URL"))?;

    let worker = web_sys::Worker::new(&js_url).map_err(browser("Worker"))?;

    // The WASM URL stays alive: the worker's async init may still be
    // fetching it.
    web_sys::Url::revoke_object_url(&js_url).ok();

    Ok(worker)
}

fn browser(what: &'static str) -> impl FnOnce(JsValue) -> SketchError {
    move |_| SketchError::canvas(format!("failed to create {what}"))
}

/// Create a JS Promise along with its resolve and reject functions.
fn new_promise() -> Result<(js_sys::Promise, js_sys::Function, js_sys::Function), SketchError> {
    let resolve = Rc::new(RefCell::new(None::<js_sys::Function>));
    let reject = Rc::new(RefCell::new(None::<js_sys::Function>));
    let resolve_clone = Rc::clone(&resolve);
    let reject_clone = Rc::clone(&reject);

    let promise = js_sys::Promise::new(&mut move |res, rej| {
        *resolve_clone.borrow_mut() = Some(res);
        *reject_clone.borrow_mut() = Some(rej);
    });

    let resolve_fn = resolve.borrow_mut().take();
    let reject_fn = reject.borrow_mut().take();
    match (resolve_fn, reject_fn) {
        (Some(res), Some(rej)) => Ok((promise, res, rej)),
        _ => Err(SketchError::canvas("promise executor did not run")),
    }
}
