//! Sobel gradients and the edge-to-pencil mapping.
//!
//! The 3x3 kernel pair approximates horizontal and vertical intensity
//! derivatives. The gradient magnitude is scaled, clamped to `[0, 255]`
//! and inverted so strong edges render dark and flat regions near-white.

use crate::types::GrayscaleBuffer;

/// A 3x3 convolution kernel, row-major.
pub type Kernel3 = [[f64; 3]; 3];

/// Horizontal derivative kernel.
pub const SOBEL_X: Kernel3 = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];

/// Vertical derivative kernel.
pub const SOBEL_Y: Kernel3 = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

/// Largest edge magnitude representable in the output.
pub const MAX_MAGNITUDE: f64 = 255.0;

/// Gradient `(gx, gy)` at column `x` given the rows above, at, and below.
///
/// Products are accumulated top-left to bottom-right in `f64`. Callers
/// outside the row loop should use [`gradient_at`], which bounds-checks.
///
/// # Panics
///
/// Panics if `x == 0` or `x + 1 >= row.len()` for any of the rows.
#[must_use]
pub(crate) fn gradient(rows: [&[f32]; 3], x: usize) -> (f64, f64) {
    let mut gx = 0.0;
    let mut gy = 0.0;
    for (ky, row) in rows.iter().enumerate() {
        for (kx, sample) in row[x - 1..=x + 1].iter().enumerate() {
            let pixel = f64::from(*sample);
            gx += pixel * SOBEL_X[ky][kx];
            gy += pixel * SOBEL_Y[ky][kx];
        }
    }
    (gx, gy)
}

/// Gradient at pixel `(x, y)` of a grayscale buffer.
///
/// Border pixels (and out-of-range positions) have no full 3x3
/// neighbourhood and report a zero gradient.
#[must_use]
pub fn gradient_at(gray: &GrayscaleBuffer, x: u32, y: u32) -> (f64, f64) {
    let interior = x >= 1
        && y >= 1
        && x.saturating_add(1) < gray.width()
        && y.saturating_add(1) < gray.height();
    if !interior {
        return (0.0, 0.0);
    }
    gradient([gray.row(y - 1), gray.row(y), gray.row(y + 1)], x as usize)
}

/// Scaled Euclidean gradient norm, clamped to `[0, MAX_MAGNITUDE]`.
#[must_use]
#[allow(clippy::suboptimal_flops, clippy::imprecise_flops)]
pub fn edge_magnitude(gx: f64, gy: f64, scale: f64) -> f64 {
    // sqrt of the plain sum of squares; hypot rounds differently.
    ((gx * gx + gy * gy).sqrt() * scale).clamp(0.0, MAX_MAGNITUDE)
}

/// Output luminance for a clamped edge magnitude.
///
/// `255 - magnitude`, rounded half-to-even into a byte, which is how a
/// clamped byte array stores a fractional value.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn pencil_luminance(magnitude: f64) -> u8 {
    (MAX_MAGNITUDE - magnitude.clamp(0.0, MAX_MAGNITUDE)).round_ties_even() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_buffer() -> GrayscaleBuffer {
        GrayscaleBuffer::from_fn(6, 5, |x, _| if x < 3 { 0.0 } else { 255.0 })
    }

    #[test]
    fn kernels_are_transposes() {
        for (i, row) in SOBEL_X.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                assert!((value - SOBEL_Y[j][i]).abs() < f64::EPSILON);
            }
        }
    }

    #[test]
    fn flat_region_has_zero_gradient() {
        let gray = GrayscaleBuffer::from_fn(5, 5, |_, _| 77.0);
        let (gx, gy) = gradient_at(&gray, 2, 2);
        assert!(gx.abs() < f64::EPSILON);
        assert!(gy.abs() < f64::EPSILON);
    }

    #[test]
    fn vertical_step_has_horizontal_gradient() {
        let gray = step_buffer();
        let (gx, gy) = gradient_at(&gray, 2, 2);
        // Right column is 255, others 0: 255 * (1 + 2 + 1).
        assert!((gx - 1020.0).abs() < 1e-9);
        assert!(gy.abs() < 1e-9);
    }

    #[test]
    fn horizontal_step_has_vertical_gradient() {
        let gray = GrayscaleBuffer::from_fn(5, 6, |_, y| if y < 3 { 0.0 } else { 255.0 });
        let (gx, gy) = gradient_at(&gray, 2, 2);
        assert!(gx.abs() < 1e-9);
        assert!((gy - 1020.0).abs() < 1e-9);
    }

    #[test]
    fn border_positions_report_zero() {
        let gray = step_buffer();
        for (x, y) in [(0, 2), (5, 2), (2, 0), (2, 4), (99, 99)] {
            assert_eq!(gradient_at(&gray, x, y), (0.0, 0.0), "({x}, {y})");
        }
    }

    #[test]
    fn row_gradient_matches_buffer_gradient() {
        let gray = step_buffer();
        let rows = [gray.row(1), gray.row(2), gray.row(3)];
        for x in 1..5 {
            assert_eq!(gradient(rows, x as usize), gradient_at(&gray, x, 2), "x={x}");
        }
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn row_gradient_needs_a_right_neighbour() {
        let row = [0.0_f32; 4];
        let _ = gradient([&row, &row, &row], 3);
    }

    #[test]
    fn magnitude_is_scaled_and_clamped() {
        assert!((edge_magnitude(3.0, 4.0, 1.0) - 5.0).abs() < 1e-12);
        assert!((edge_magnitude(3.0, 4.0, 0.9) - 4.5).abs() < 1e-12);
        assert!((edge_magnitude(1020.0, 0.0, 0.9) - MAX_MAGNITUDE).abs() < f64::EPSILON);
        assert!(edge_magnitude(1020.0, 0.0, 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn luminance_inverts_magnitude() {
        assert_eq!(pencil_luminance(0.0), 255);
        assert_eq!(pencil_luminance(MAX_MAGNITUDE), 0);
        assert_eq!(pencil_luminance(55.0), 200);
    }

    #[test]
    fn luminance_rounds_half_to_even() {
        // 255 - 4.5 = 250.5 -> 250; 255 - 5.5 = 249.5 -> 250.
        assert_eq!(pencil_luminance(4.5), 250);
        assert_eq!(pencil_luminance(5.5), 250);
        assert_eq!(pencil_luminance(4.4), 251);
    }

    #[test]
    fn luminance_clamps_out_of_range_input() {
        assert_eq!(pencil_luminance(-10.0), 255);
        assert_eq!(pencil_luminance(1000.0), 0);
    }
}
