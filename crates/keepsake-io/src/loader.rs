//! Source loaders: turn a [`SourceRef`] into encoded image bytes.
//!
//! Loading is the only step of sketch generation that waits on I/O, so
//! it is the only async seam. [`FsLoader`] reads local assets natively,
//! [`MemoryLoader`] serves bytes the caller already holds, and on WASM
//! [`FetchLoader`](crate::fetch::FetchLoader) goes through `fetch`.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use keepsake_pipeline::SourceError;

use crate::source::SourceRef;

/// Loads the encoded bytes behind a source reference.
///
/// Implementations report every failure (missing file, network error,
/// unsupported reference) as a [`SourceError`]; they never retry.
pub trait SourceLoader {
    /// Load the raw bytes of `source`.
    fn load(&self, source: &SourceRef) -> impl Future<Output = Result<Vec<u8>, SourceError>>;
}

/// Reads local references from the filesystem.
///
/// Remote references are rejected: no HTTP client is carried natively.
/// Reads are synchronous; the returned future completes on first poll.
#[derive(Debug, Clone, Default)]
pub struct FsLoader {
    root: Option<PathBuf>,
}

impl FsLoader {
    /// Loader that uses paths as given.
    #[must_use]
    pub const fn new() -> Self {
        Self { root: None }
    }

    /// Loader that resolves paths against `root`.
    ///
    /// Site-absolute asset paths (`/assets/a.jpg`) are treated as
    /// relative to `root`, the way a static file server maps them.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// The filesystem path a local reference resolves to.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) => root.join(path.strip_prefix("/").unwrap_or(path)),
            None => path.to_path_buf(),
        }
    }
}

impl SourceLoader for FsLoader {
    async fn load(&self, source: &SourceRef) -> Result<Vec<u8>, SourceError> {
        match source {
            SourceRef::Local(path) => {
                let resolved = self.resolve(path);
                std::fs::read(&resolved)
                    .map_err(|e| SourceError::load(resolved.display().to_string(), e.to_string()))
            }
            SourceRef::Remote(url) => Err(SourceError::load(
                url.as_str(),
                "remote sources need a fetch-capable loader",
            )),
        }
    }
}

/// Serves pre-registered byte buffers.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    entries: HashMap<SourceRef, Vec<u8>>,
}

impl MemoryLoader {
    /// An empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` under `source`, replacing any previous entry.
    #[must_use]
    pub fn with(mut self, source: impl Into<SourceRef>, bytes: Vec<u8>) -> Self {
        self.insert(source, bytes);
        self
    }

    /// Register `bytes` under `source`, replacing any previous entry.
    pub fn insert(&mut self, source: impl Into<SourceRef>, bytes: Vec<u8>) {
        self.entries.insert(source.into(), bytes);
    }
}

impl SourceLoader for MemoryLoader {
    async fn load(&self, source: &SourceRef) -> Result<Vec<u8>, SourceError> {
        self.entries
            .get(source)
            .cloned()
            .ok_or_else(|| SourceError::load(source.to_string(), "not found"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn fs_loader_reads_file() {
        let dir = std::env::temp_dir().join(format!("keepsake-loader-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("assets")).unwrap();
        std::fs::write(dir.join("assets/a.bin"), [1u8, 2, 3]).unwrap();

        let loader = FsLoader::with_root(&dir);
        let bytes = pollster::block_on(loader.load(&SourceRef::parse("/assets/a.bin"))).unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);

        let direct = FsLoader::new();
        let bytes =
            pollster::block_on(direct.load(&SourceRef::local(dir.join("assets/a.bin")))).unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn fs_loader_missing_file_is_load_error() {
        let loader = FsLoader::new();
        let result = pollster::block_on(loader.load(&SourceRef::local("/definitely/not/here.jpg")));
        assert!(matches!(
            result,
            Err(SourceError::Load { ref reference, .. }) if reference == "/definitely/not/here.jpg"
        ));
    }

    #[test]
    fn fs_loader_rejects_remote() {
        let loader = FsLoader::new();
        let remote = SourceRef::parse("https://example.com/a.jpg");
        let result = pollster::block_on(loader.load(&remote));
        assert!(matches!(result, Err(SourceError::Load { .. })));
    }

    #[test]
    fn resolve_without_root_is_identity() {
        let loader = FsLoader::new();
        assert_eq!(loader.resolve(Path::new("/a/b.jpg")), PathBuf::from("/a/b.jpg"));
    }

    #[test]
    fn resolve_with_root_strips_leading_slash() {
        let loader = FsLoader::with_root("/srv/site");
        assert_eq!(
            loader.resolve(Path::new("/assets/b.jpg")),
            PathBuf::from("/srv/site/assets/b.jpg")
        );
        assert_eq!(
            loader.resolve(Path::new("assets/b.jpg")),
            PathBuf::from("/srv/site/assets/b.jpg")
        );
    }

    #[test]
    fn memory_loader_serves_registered_bytes() {
        let loader = MemoryLoader::new().with("/a.png", vec![9, 9]);
        assert_eq!(
            pollster::block_on(loader.load(&SourceRef::parse("/a.png"))).unwrap(),
            vec![9, 9]
        );
        assert!(pollster::block_on(loader.load(&SourceRef::parse("/b.png"))).is_err());
    }
}
