//! Generator diagnostics: timing and pixel statistics for each stage.
//!
//! [`generate_with_diagnostics`] runs the same stages as
//! [`crate::generate`] and records how long each took alongside a few
//! counts useful when tuning the magnitude scale.
//!
//! Timestamps come from a caller-supplied [`Clock`]. [`WebClock`] uses the
//! `web-time` crate, which maps to `performance.now()` on WASM and
//! `std::time::Instant` on native.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{SketchConfig, SketchError, SketchOutput, SketchResult};

/// Source of monotonic timestamps.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// [`Clock`] backed by [`web_time::Instant`]; works on WASM and native.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebClock;

impl Clock for WebClock {
    type Instant = web_time::Instant;

    fn now(&self) -> web_time::Instant {
        web_time::Instant::now()
    }

    fn elapsed(&self, since: &web_time::Instant) -> Duration {
        since.elapsed()
    }
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SketchDiagnostics {
    /// Stage 1: image decoding.
    pub decode: StageDiagnostics,
    /// Stage 2: luma conversion.
    pub grayscale: StageDiagnostics,
    /// Stages 3+4: surface allocation and Sobel rendering.
    pub sketch: StageDiagnostics,
    /// Stage 5: PNG encoding.
    pub encode: StageDiagnostics,
    /// Total wall-clock duration of the whole generation (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts.
    pub summary: SketchSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Luma conversion metrics.
    Grayscale {
        /// Mean luminance over all pixels (0.0 for an empty buffer).
        mean_luminance: f64,
    },
    /// Sobel rendering metrics.
    Sketch {
        /// Magnitude scale actually applied (after fallback).
        magnitude_scale: f64,
        /// Pixels darker than pure white.
        edge_pixel_count: u64,
        /// Pixels the convolution visited (the frame excluded).
        interior_pixel_count: u64,
        /// Darkest output luminance.
        min_luminance: u8,
    },
    /// PNG encoding metrics.
    Encode {
        /// Uncompressed RGBA size in bytes.
        raw_bytes: usize,
        /// Encoded PNG size in bytes.
        output_bytes: usize,
    },
}

/// High-level summary for the whole generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SketchSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Pixels darker than pure white in the sketch.
    pub edge_pixel_count: u64,
    /// Encoded PNG size in bytes.
    pub output_bytes: usize,
}

/// Run the generator and record per-stage diagnostics.
///
/// # Errors
///
/// Same as [`crate::generate`].
pub fn generate_with_diagnostics<C: Clock>(
    bytes: &[u8],
    config: &SketchConfig,
    clock: &C,
) -> Result<(SketchOutput, SketchDiagnostics), SketchError> {
    let total_start = clock.now();

    let start = clock.now();
    let source = crate::decode::decode(bytes, config)?;
    let dimensions = source.dimensions();
    let decode = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Decode {
            input_bytes: bytes.len(),
            width: dimensions.width,
            height: dimensions.height,
            pixel_count: dimensions.pixel_count(),
        },
    };

    let start = clock.now();
    let gray = crate::grayscale::to_grayscale(&source);
    drop(source);
    let grayscale = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Grayscale {
            mean_luminance: mean(gray.samples()),
        },
    };

    let start = clock.now();
    let sketch = crate::sketch::render(&gray, config)?;
    drop(gray);
    let edge_pixel_count = count_edge_pixels(&sketch);
    let sketch_stage = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Sketch {
            magnitude_scale: config.effective_magnitude_scale(),
            edge_pixel_count,
            interior_pixel_count: interior_pixel_count(dimensions.width, dimensions.height),
            min_luminance: min_luminance(&sketch),
        },
    };

    let start = clock.now();
    let png = crate::encode::encode_png(&sketch)?;
    let encode = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Encode {
            raw_bytes: sketch.image().as_raw().len(),
            output_bytes: png.len(),
        },
    };

    let summary = SketchSummary {
        image_width: dimensions.width,
        image_height: dimensions.height,
        pixel_count: dimensions.pixel_count(),
        edge_pixel_count,
        output_bytes: png.len(),
    };

    let diagnostics = SketchDiagnostics {
        decode,
        grayscale,
        sketch: sketch_stage,
        encode,
        total_duration: clock.elapsed(&total_start),
        summary,
    };

    Ok((SketchOutput { png, dimensions }, diagnostics))
}

impl SketchDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Sketch Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(72));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Decode", &self.decode),
            ("Grayscale", &self.grayscale),
            ("Sketch", &self.sketch),
            ("Encode", &self.encode),
        ];

        for (name, diag) in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Edge pixels: {}  |  PNG bytes: {}",
            self.summary.edge_pixel_count, self.summary.output_bytes,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Grayscale { mean_luminance } => format!("mean={mean_luminance:.1}"),
        StageMetrics::Sketch {
            magnitude_scale,
            edge_pixel_count,
            interior_pixel_count,
            min_luminance,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *interior_pixel_count > 0 {
                *edge_pixel_count as f64 / *interior_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!(
                "scale={magnitude_scale:.2} edges={edge_pixel_count} ({density:.1}%) \
                 min={min_luminance}",
            )
        }
        StageMetrics::Encode {
            raw_bytes,
            output_bytes,
        } => format!("{raw_bytes} -> {output_bytes} bytes"),
    }
}

/// Count pixels darker than pure white.
pub(crate) fn count_edge_pixels(sketch: &SketchResult) -> u64 {
    sketch
        .image()
        .pixels()
        .map(|p| u64::from(p.0[0] < u8::MAX))
        .sum()
}

/// Darkest luminance in the sketch (255 for a blank sketch).
pub(crate) fn min_luminance(sketch: &SketchResult) -> u8 {
    sketch
        .image()
        .pixels()
        .map(|p| p.0[0])
        .min()
        .unwrap_or(u8::MAX)
}

/// Pixels with a full 3x3 neighbourhood.
const fn interior_pixel_count(width: u32, height: u32) -> u64 {
    width.saturating_sub(2) as u64 * height.saturating_sub(2) as u64
}

#[allow(clippy::cast_precision_loss)]
fn mean(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|&s| f64::from(s)).sum::<f64>() / samples.len() as f64
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use image::ImageEncoder;

    use super::*;

    /// Clock that advances one millisecond per reading.
    struct TickClock(Cell<u64>);

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.0.get() - since)
        }
    }

    fn step_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        });
        let mut buf = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buf)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
            .unwrap();
        buf
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        assert!((duration_ms(d) - 1234.0).abs() < 0.01);
    }

    #[test]
    fn interior_count_excludes_frame() {
        assert_eq!(interior_pixel_count(10, 5), 24);
        assert_eq!(interior_pixel_count(2, 50), 0);
        assert_eq!(interior_pixel_count(1, 1), 0);
    }

    #[test]
    fn mean_of_empty_is_zero() {
        assert!(mean(&[]).abs() < f64::EPSILON);
        assert!((mean(&[1.0, 3.0]) - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn diagnostics_match_plain_generation() {
        let png = step_png(20, 10);
        let config = SketchConfig::default();
        let (output, diagnostics) =
            generate_with_diagnostics(&png, &config, &WebClock).unwrap();
        let plain = crate::generate(&png, &config).unwrap();
        assert_eq!(output, plain);

        assert_eq!(diagnostics.summary.image_width, 20);
        assert_eq!(diagnostics.summary.image_height, 10);
        assert_eq!(diagnostics.summary.output_bytes, output.png.len());
        // Two edge columns on each of the 8 interior rows.
        assert_eq!(diagnostics.summary.edge_pixel_count, 16);
        assert!(matches!(
            diagnostics.sketch.metrics,
            StageMetrics::Sketch {
                min_luminance: 0,
                interior_pixel_count: 144,
                ..
            }
        ));
    }

    #[test]
    fn stage_durations_come_from_clock() {
        let clock = TickClock(Cell::new(0));
        let (_, diagnostics) =
            generate_with_diagnostics(&step_png(6, 6), &SketchConfig::default(), &clock).unwrap();
        assert_eq!(diagnostics.decode.duration, Duration::from_millis(1));
        assert_eq!(diagnostics.encode.duration, Duration::from_millis(1));
        assert!(diagnostics.total_duration > diagnostics.decode.duration);
    }

    #[test]
    fn failure_propagates() {
        let result = generate_with_diagnostics(&[], &SketchConfig::default(), &WebClock);
        assert!(matches!(result, Err(SketchError::SourceUnavailable(_))));
    }

    #[test]
    fn report_produces_table() {
        let (_, diagnostics) =
            generate_with_diagnostics(&step_png(8, 8), &SketchConfig::default(), &WebClock)
                .unwrap();
        let report = diagnostics.report();
        assert!(report.contains("Sketch Diagnostics Report"));
        assert!(report.contains("Grayscale"));
        assert!(report.contains("scale=0.90"));
    }

    #[test]
    fn json_round_trip_preserves_durations() {
        let (_, diagnostics) =
            generate_with_diagnostics(&step_png(8, 8), &SketchConfig::default(), &WebClock)
                .unwrap();
        let json = serde_json::to_string(&diagnostics).unwrap();
        let back: SketchDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.summary.pixel_count, 64);
        assert!(
            (back.total_duration.as_secs_f64() - diagnostics.total_duration.as_secs_f64()).abs()
                < 1e-9
        );
    }
}
