//! keepsake-io: Source loading and async orchestration for sketches.
//!
//! Resolves source references to bytes, runs the pure
//! `keepsake-pipeline` generator without blocking the caller's event
//! loop, and manages decorative slots that show a static fallback until
//! their sketch is ready. On WASM it also provides a `fetch` loader,
//! Blob URL helpers and a web worker client.

pub mod generate;
pub mod loader;
pub mod slots;
pub mod source;

#[cfg(target_arch = "wasm32")]
pub mod fetch;
#[cfg(target_arch = "wasm32")]
pub mod raster;
#[cfg(target_arch = "wasm32")]
pub mod worker;

pub use generate::generate_sketch;
pub use loader::{FsLoader, MemoryLoader, SourceLoader};
pub use slots::{Completion, Generation, SketchSlots, SlotImage};
pub use source::SourceRef;

#[cfg(target_arch = "wasm32")]
pub use fetch::FetchLoader;
#[cfg(target_arch = "wasm32")]
pub use worker::SketchWorker;
