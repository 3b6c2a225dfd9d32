//! Web worker entry point for keepsake sketch generation.
//!
//! This crate compiles to a standalone WASM module that runs inside a
//! `Worker`. It receives image bytes and a `SketchConfig` via
//! `postMessage`, calls `keepsake_pipeline::generate`, and posts the
//! encoded PNG back as a raw `Uint8Array`.
//!
//! Running the convolution in a worker keeps the page's main thread
//! free while a large photograph is sketched.

use keepsake_pipeline::{SketchConfig, SketchError, SketchOutput};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

/// Message protocol: the main thread sends a JS object with:
/// - `imageBytes`: `Uint8Array` containing the raw image file bytes
/// - `configJson`: `String` containing JSON-serialized `SketchConfig`
/// - `generation`: `f64` generation counter (passed through to response)
///
/// On success the worker responds with a JS object containing:
/// - `generation`: `f64` matching the request generation
/// - `ok`: `true`
/// - `pngBytes`: `Uint8Array` with the encoded sketch
/// - `width`, `height`: `f64` sketch dimensions
///
/// On error the worker responds with:
/// - `generation`: `f64`
/// - `ok`: `false`
/// - `errorJson`: `String` with the JSON-serialized `SketchError`
#[wasm_bindgen(start)]
pub fn worker_main() {
    console_error_panic_hook::set_once();

    let global: web_sys::DedicatedWorkerGlobalScope = js_sys::global()
        .dyn_into()
        .expect_throw("not running in a DedicatedWorkerGlobalScope");

    let onmessage =
        Closure::<dyn FnMut(web_sys::MessageEvent)>::new(move |event: web_sys::MessageEvent| {
            handle_message(event);
        });
    global.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
    onmessage.forget(); // lives for the worker lifetime
}

#[allow(clippy::needless_pass_by_value)]
fn handle_message(event: web_sys::MessageEvent) {
    let data = event.data();

    let generation = js_sys::Reflect::get(&data, &JsValue::from_str("generation"))
        .ok()
        .and_then(|v| v.as_f64())
        .expect_throw("generation is not a number");

    let image_bytes = js_sys::Reflect::get(&data, &JsValue::from_str("imageBytes"))
        .ok()
        .and_then(|v| v.dyn_into::<js_sys::Uint8Array>().ok())
        .map(|array| array.to_vec())
        .unwrap_or_default();

    let config_json = js_sys::Reflect::get(&data, &JsValue::from_str("configJson"))
        .ok()
        .and_then(|v| v.as_string())
        .unwrap_or_default();

    let config = if config_json.is_empty() {
        SketchConfig::default()
    } else {
        match serde_json::from_str::<SketchConfig>(&config_json) {
            Ok(c) => c,
            Err(e) => {
                post_error(
                    generation,
                    &SketchError::canvas(format!("invalid sketch configuration: {e}")),
                );
                return;
            }
        }
    };

    // Synchronous; blocks this worker thread only.
    match keepsake_pipeline::generate(&image_bytes, &config) {
        Ok(output) => post_success(generation, &output),
        Err(e) => post_error(generation, &e),
    }
}

fn post_success(generation: f64, output: &SketchOutput) {
    let response = js_sys::Object::new();
    let set = |key: &str, val: &JsValue| {
        js_sys::Reflect::set(&response, &JsValue::from_str(key), val)
            .expect_throw("failed to set response field");
    };

    set("generation", &JsValue::from_f64(generation));
    set("ok", &JsValue::from_bool(true));
    set("pngBytes", &js_sys::Uint8Array::from(output.png.as_slice()));
    set("width", &JsValue::from_f64(f64::from(output.dimensions.width)));
    set("height", &JsValue::from_f64(f64::from(output.dimensions.height)));

    post(&response);
}

fn post_error(generation: f64, error: &SketchError) {
    let error_json = serde_json::to_string(error)
        .unwrap_or_else(|e| format!("\"serialization error: {e}\""));

    let response = js_sys::Object::new();
    let _ = js_sys::Reflect::set(
        &response,
        &JsValue::from_str("generation"),
        &JsValue::from_f64(generation),
    );
    let _ = js_sys::Reflect::set(&response, &JsValue::from_str("ok"), &JsValue::from_bool(false));
    let _ = js_sys::Reflect::set(
        &response,
        &JsValue::from_str("errorJson"),
        &JsValue::from_str(&error_json),
    );

    post(&response);
}

fn post(response: &js_sys::Object) {
    if let Ok(global) = js_sys::global().dyn_into::<web_sys::DedicatedWorkerGlobalScope>() {
        let _ = global.post_message(response);
    }
}
