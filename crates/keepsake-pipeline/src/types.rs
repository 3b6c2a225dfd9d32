//! Shared types for the keepsake sketch pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Re-export `RgbaImage` so downstream crates can reference decoded and
/// rendered rasters without depending on `image` directly.
pub use image::RgbaImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create a new dimensions value.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A decoded source photograph.
///
/// Always stored as interleaved 8-bit RGBA, row-major, top-to-bottom,
/// whatever the encoded format was. Immutable once decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage(RgbaImage);

impl SourceImage {
    /// Wrap an already-decoded RGBA image.
    #[must_use]
    pub const fn new(image: RgbaImage) -> Self {
        Self(image)
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Image dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.0.width(), self.0.height())
    }

    /// The underlying RGBA raster.
    #[must_use]
    pub const fn image(&self) -> &RgbaImage {
        &self.0
    }
}

/// One floating-point luminance sample per source pixel.
///
/// Same `width × height` as the [`SourceImage`] it was derived from.
/// Never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct GrayscaleBuffer {
    width: u32,
    height: u32,
    samples: Vec<f32>,
}

impl GrayscaleBuffer {
    /// Build a buffer from row-major samples.
    ///
    /// Returns `None` if `samples.len() != width * height`.
    #[must_use]
    pub fn from_samples(width: u32, height: u32, samples: Vec<f32>) -> Option<Self> {
        let expected = usize::try_from(Dimensions::new(width, height).pixel_count()).ok()?;
        (samples.len() == expected).then_some(Self {
            width,
            height,
            samples,
        })
    }

    /// Build a buffer by evaluating `f(x, y)` for every pixel.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        let samples = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();
        Self {
            width,
            height,
            samples,
        }
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Buffer dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// All samples, row-major.
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// One row of samples. Empty if `y` is out of range.
    #[must_use]
    pub fn row(&self, y: u32) -> &[f32] {
        let width = self.width as usize;
        let start = y as usize * width;
        self.samples.get(start..start + width).unwrap_or(&[])
    }

    /// The sample at `(x, y)`, if in range.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width {
            return None;
        }
        self.row(y).get(x as usize).copied()
    }
}

/// The rendered pencil sketch.
///
/// Same dimensions as the source. Every pixel is opaque grayscale
/// (`R == G == B`, `A == 255`); darker means a stronger edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SketchResult(RgbaImage);

impl SketchResult {
    pub(crate) const fn new(image: RgbaImage) -> Self {
        Self(image)
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Sketch dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.0.width(), self.0.height())
    }

    /// Luminance at `(x, y)`, if in range.
    #[must_use]
    pub fn luminance(&self, x: u32, y: u32) -> Option<u8> {
        self.0.get_pixel_checked(x, y).map(|p| p.0[0])
    }

    /// The underlying RGBA raster.
    #[must_use]
    pub const fn image(&self) -> &RgbaImage {
        &self.0
    }

    /// Consume the sketch and return the raster.
    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.0
    }
}

/// An encoded sketch, ready to hand to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SketchOutput {
    /// Lossless PNG byte stream.
    pub png: Vec<u8>,
    /// Dimensions of the encoded image (always equal to the source's).
    pub dimensions: Dimensions,
}

/// Configuration for the sketch generator.
///
/// All parameters have defaults reproducing the reference styling.
/// Missing fields in JSON fall back to those defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SketchConfig {
    /// Multiplier applied to the Sobel gradient magnitude before
    /// clamping. Values below 1.0 soften contrast.
    ///
    /// Non-finite or negative values are replaced by
    /// [`Self::DEFAULT_MAGNITUDE_SCALE`] when the sketch is rendered.
    pub magnitude_scale: f64,

    /// Largest drawing surface, in pixels, the generator will allocate.
    /// Larger sources fail with [`SketchError::CanvasUnavailable`].
    pub max_pixels: u64,
}

impl SketchConfig {
    /// Contrast-softening scale for the edge magnitude.
    pub const DEFAULT_MAGNITUDE_SCALE: f64 = 0.9;

    /// 16384 × 16384, the common upper bound on browser canvas area.
    pub const DEFAULT_MAX_PIXELS: u64 = 16_384 * 16_384;

    /// The magnitude scale actually used when rendering.
    #[must_use]
    pub fn effective_magnitude_scale(&self) -> f64 {
        if self.magnitude_scale.is_finite() && self.magnitude_scale >= 0.0 {
            self.magnitude_scale
        } else {
            Self::DEFAULT_MAGNITUDE_SCALE
        }
    }
}

impl Default for SketchConfig {
    fn default() -> Self {
        Self {
            magnitude_scale: Self::DEFAULT_MAGNITUDE_SCALE,
            max_pixels: Self::DEFAULT_MAX_PIXELS,
        }
    }
}

/// Why a source image could not be turned into pixels.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The bytes are not a decodable raster image.
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// The reference could not be fetched or read.
    #[error("failed to load {reference}: {reason}")]
    Load {
        /// The source reference as given by the caller.
        reference: String,
        /// Human-readable cause.
        reason: String,
    },
}

impl SourceError {
    /// Build a [`SourceError::Load`] value.
    pub fn load(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load {
            reference: reference.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that terminate a sketch generation.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits.
#[derive(Debug, thiserror::Error)]
pub enum SketchError {
    /// The source could not be loaded or decoded.
    #[error("source image unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    /// No drawing surface could be provided for the output.
    #[error("drawing surface unavailable: {0}")]
    CanvasUnavailable(String),
}

impl SketchError {
    /// Build a [`SketchError::CanvasUnavailable`] value.
    pub fn canvas(msg: impl Into<String>) -> Self {
        Self::CanvasUnavailable(msg.into())
    }

    /// The failure category, without the cause.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::SourceUnavailable(_) => ErrorKind::SourceUnavailable,
            Self::CanvasUnavailable(_) => ErrorKind::CanvasUnavailable,
        }
    }
}

/// Failure category of a [`SketchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Network, name resolution, read, or decode failure.
    SourceUnavailable,
    /// Drawing surface could not be allocated or read back.
    CanvasUnavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceUnavailable => f.write_str("source unavailable"),
            Self::CanvasUnavailable => f.write_str("canvas unavailable"),
        }
    }
}

/// Serde-compatible proxy for `SketchError`.
///
/// A deserialized `Decode` error cannot recover the original typed
/// `image::ImageError`; it is rebuilt as a generic decoding error that
/// carries the original message.
#[derive(Serialize, Deserialize)]
enum SketchErrorProxy {
    EmptyInput,
    Decode(String),
    Load { reference: String, reason: String },
    CanvasUnavailable(String),
}

impl Serialize for SketchError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::SourceUnavailable(SourceError::EmptyInput) => SketchErrorProxy::EmptyInput,
            Self::SourceUnavailable(SourceError::Decode(e)) => {
                SketchErrorProxy::Decode(e.to_string())
            }
            Self::SourceUnavailable(SourceError::Load { reference, reason }) => {
                SketchErrorProxy::Load {
                    reference: reference.clone(),
                    reason: reason.clone(),
                }
            }
            Self::CanvasUnavailable(msg) => SketchErrorProxy::CanvasUnavailable(msg.clone()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SketchError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = SketchErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            SketchErrorProxy::EmptyInput => Self::SourceUnavailable(SourceError::EmptyInput),
            SketchErrorProxy::Decode(msg) => {
                let err =
                    image::error::DecodingError::new(image::error::ImageFormatHint::Unknown, msg);
                Self::SourceUnavailable(SourceError::Decode(image::ImageError::Decoding(err)))
            }
            SketchErrorProxy::Load { reference, reason } => {
                Self::SourceUnavailable(SourceError::Load { reference, reason })
            }
            SketchErrorProxy::CanvasUnavailable(msg) => Self::CanvasUnavailable(msg),
        })
    }
}
