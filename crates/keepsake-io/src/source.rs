//! References to source images.
//!
//! A [`SourceRef`] is what a caller hands the generator: either a local
//! asset path or a remote URL. Parsing never fails; whether the reference
//! can actually be loaded is up to the [`SourceLoader`](crate::SourceLoader).

use std::convert::Infallible;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Where a source image lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceRef {
    /// A filesystem path or site-relative asset path (`/assets/a.jpg`).
    Local(PathBuf),
    /// An `http://` or `https://` URL.
    Remote(String),
}

impl SourceRef {
    /// Parse a reference string.
    ///
    /// `http://` and `https://` URLs (scheme matched case-insensitively)
    /// become [`SourceRef::Remote`]. A `file://` URL becomes the path
    /// after the scheme. Anything else is a local path.
    #[must_use]
    pub fn parse(reference: &str) -> Self {
        let reference = reference.trim();
        if has_scheme(reference, "http://") || has_scheme(reference, "https://") {
            return Self::Remote(reference.to_owned());
        }
        if has_scheme(reference, "file://") {
            return Self::Local(PathBuf::from(&reference["file://".len()..]));
        }
        Self::Local(PathBuf::from(reference))
    }

    /// A local path reference.
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::Local(path.into())
    }

    /// A remote URL reference, taken verbatim.
    pub fn remote(url: impl Into<String>) -> Self {
        Self::Remote(url.into())
    }

    /// Returns `true` for URLs that need a network fetch.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// The local path, if this is a local reference.
    #[must_use]
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Local(path) => Some(path),
            Self::Remote(_) => None,
        }
    }

    /// File name without extension, used to name derived outputs.
    #[must_use]
    pub fn stem(&self) -> Option<&str> {
        match self {
            Self::Local(path) => path.file_stem().and_then(|s| s.to_str()),
            Self::Remote(url) => {
                let path = url.split(['?', '#']).next().unwrap_or(url);
                let name = path.rsplit('/').next().filter(|n| !n.is_empty())?;
                Some(name.rsplit_once('.').map_or(name, |(base, _)| base))
            }
        }
    }
}

fn has_scheme(reference: &str, scheme: &str) -> bool {
    reference
        .get(..scheme.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => f.write_str(url),
        }
    }
}

impl FromStr for SourceRef {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for SourceRef {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}
