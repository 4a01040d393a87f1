//! Rotation Transform.
//!
//! Rotates a frame about its geometric centre so that its content is aligned
//! with the map axes.  The rotation is a 2×3 affine [`RotationMatrix`]; a
//! positive angle turns content counter-clockwise as displayed (image `y`
//! pointing down).  [`rotate_frame`] performs an inverse-mapped warp with
//! bilinear interpolation, so every destination pixel is defined and source
//! samples falling outside the frame contribute [`BACKGROUND`].
//!
//! # Example
//!
//! ```rust
//! use mapfuse_perception::rotation::rotate_frame;
//! use image::{GrayImage, Luma};
//!
//! let frame = GrayImage::from_pixel(8, 8, Luma([90]));
//! let same = rotate_frame(&frame, 0.0).unwrap();
//! assert_eq!(same, frame);
//! ```

use std::f64::consts::TAU;

use image::{GrayImage, Luma};
use mapfuse_types::MapError;

/// Value written where the rotated frame has no source data.
pub const BACKGROUND: u8 = 0;

/// Reduce any finite angle to `[0, 2π)`.
pub fn normalize_angle(angle_rad: f64) -> f64 {
    let a = angle_rad.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs.
    if a >= TAU { 0.0 } else { a }
}

// ────────────────────────────────────────────────────────────────────────────
// RotationMatrix
// ────────────────────────────────────────────────────────────────────────────

/// A 2×3 affine transform `[R | t]` mapping source pixel coordinates to
/// destination pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationMatrix {
    pub m: [[f64; 3]; 2],
}

impl RotationMatrix {
    /// Rotation by `angle_rad` about (`center_x`, `center_y`).
    ///
    /// The angle is normalised to `[0, 2π)` first.
    pub fn about(center_x: f64, center_y: f64, angle_rad: f64) -> Self {
        let (s, c) = normalize_angle(angle_rad).sin_cos();
        Self {
            m: [
                [c, s, (1.0 - c) * center_x - s * center_y],
                [-s, c, s * center_x + (1.0 - c) * center_y],
            ],
        }
    }

    /// Map a point through the transform.
    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let [r0, r1] = self.m;
        (
            r0[0] * x + r0[1] * y + r0[2],
            r1[0] * x + r1[1] * y + r1[2],
        )
    }

    /// Inverse transform.  The linear part is orthonormal, so it is inverted
    /// by transposition.
    pub fn inverse(&self) -> Self {
        let [[a, b, tx], [c, d, ty]] = self.m;
        Self {
            m: [
                [a, c, -(a * tx + c * ty)],
                [b, d, -(b * tx + d * ty)],
            ],
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Warp
// ────────────────────────────────────────────────────────────────────────────

/// Rotate `frame` by `heading_rad` about its geometric centre.
///
/// The output has the same dimensions as the input.  Any angle is accepted
/// and reduced modulo 2π.
///
/// # Errors
///
/// Returns [`MapError::GeometryDegenerate`] when `heading_rad` is not finite.
pub fn rotate_frame(frame: &GrayImage, heading_rad: f64) -> Result<GrayImage, MapError> {
    if !heading_rad.is_finite() {
        return Err(MapError::GeometryDegenerate(format!(
            "rotation angle {heading_rad} is not finite"
        )));
    }

    let (w, h) = (frame.width(), frame.height());
    if w == 0 || h == 0 {
        return Ok(GrayImage::new(w, h));
    }

    let cx = (f64::from(w) - 1.0) / 2.0;
    let cy = (f64::from(h) - 1.0) / 2.0;
    let inv = RotationMatrix::about(cx, cy, heading_rad).inverse();

    Ok(GrayImage::from_fn(w, h, |x, y| {
        let (sx, sy) = inv.apply(f64::from(x), f64::from(y));
        let v = sample_bilinear(frame, sx, sy);
        Luma([v.round().clamp(0.0, 255.0) as u8])
    }))
}

/// Bilinear sample at a sub-pixel position.  Neighbours outside the image
/// read as [`BACKGROUND`].
fn sample_bilinear(img: &GrayImage, x: f64, y: f64) -> f64 {
    let (w, h) = (f64::from(img.width()), f64::from(img.height()));
    if x <= -1.0 || y <= -1.0 || x >= w || y >= h {
        return f64::from(BACKGROUND);
    }

    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let px = |xi: i64, yi: i64| -> f64 {
        if xi < 0 || yi < 0 {
            return f64::from(BACKGROUND);
        }
        img.get_pixel_checked(xi as u32, yi as u32)
            .map_or(f64::from(BACKGROUND), |p| f64::from(p[0]))
    };

    (1.0 - fx) * (1.0 - fy) * px(x0, y0)
        + fx * (1.0 - fy) * px(x0 + 1, y0)
        + (1.0 - fx) * fy * px(x0, y0 + 1)
        + fx * fy * px(x0 + 1, y0 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    fn gradient(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| Luma([(50 + 3 * x + 2 * y).min(255) as u8]))
    }

    fn at(img: &GrayImage, x: u32, y: u32) -> u8 {
        img.get_pixel(x, y)[0]
    }

    fn max_abs_diff(a: &GrayImage, b: &GrayImage) -> u8 {
        a.as_raw()
            .iter()
            .zip(b.as_raw())
            .map(|(p, q)| p.abs_diff(*q))
            .max()
            .unwrap_or(0)
    }

    // ── Angle handling ──────────────────────────────────────────────────────

    #[test]
    fn normalize_angle_wraps_into_range() {
        assert!((normalize_angle(3.0 * PI) - PI).abs() < 1e-12);
        assert!((normalize_angle(-FRAC_PI_2) - 1.5 * PI).abs() < 1e-12);
        assert_eq!(normalize_angle(0.0), 0.0);
        assert!(normalize_angle(-1e-20) < TAU);
    }

    // ── RotationMatrix ──────────────────────────────────────────────────────

    #[test]
    fn matrix_keeps_center_fixed() {
        let m = RotationMatrix::about(4.0, 3.0, 1.1);
        let (x, y) = m.apply(4.0, 3.0);
        assert!((x - 4.0).abs() < 1e-12);
        assert!((y - 3.0).abs() < 1e-12);
    }

    #[test]
    fn matrix_inverse_roundtrips_points() {
        let m = RotationMatrix::about(10.0, 6.0, 2.3);
        let inv = m.inverse();
        let (x, y) = m.apply(1.5, -7.0);
        let (bx, by) = inv.apply(x, y);
        assert!((bx - 1.5).abs() < 1e-9);
        assert!((by + 7.0).abs() < 1e-9);
    }

    #[test]
    fn matrix_quarter_turn_is_counter_clockwise_on_screen() {
        // Right of centre moves to above centre (image y points down).
        let m = RotationMatrix::about(2.0, 2.0, FRAC_PI_2);
        let (x, y) = m.apply(4.0, 2.0);
        assert!((x - 2.0).abs() < 1e-12);
        assert!(y.abs() < 1e-12);
    }

    // ── rotate_frame ────────────────────────────────────────────────────────

    #[test]
    fn zero_rotation_is_identity() {
        for (w, h) in [(1, 1), (2, 3), (17, 9), (64, 48)] {
            let img = gradient(w, h);
            assert_eq!(rotate_frame(&img, 0.0).unwrap(), img, "{w}x{h}");
        }
    }

    #[test]
    fn full_turns_are_identity() {
        let img = gradient(12, 10);
        assert_eq!(rotate_frame(&img, TAU).unwrap(), img);
        assert_eq!(rotate_frame(&img, -2.0 * TAU).unwrap(), img);
    }

    #[test]
    fn unnormalized_angles_match_normalized() {
        let img = gradient(21, 15);
        let a = rotate_frame(&img, 0.3).unwrap();
        let b = rotate_frame(&img, 0.3 + 2.0 * TAU).unwrap();
        assert!(max_abs_diff(&a, &b) <= 1);

        let c = rotate_frame(&img, -0.3).unwrap();
        let d = rotate_frame(&img, TAU - 0.3).unwrap();
        assert!(max_abs_diff(&c, &d) <= 1);
    }

    #[test]
    fn quarter_turn_moves_marked_pixel() {
        let mut img = GrayImage::new(5, 5);
        img.put_pixel(4, 2, Luma([255]));
        let out = rotate_frame(&img, FRAC_PI_2).unwrap();
        assert_eq!(at(&out, 2, 0), 255);
        assert_eq!(at(&out, 4, 2), 0);
    }

    #[test]
    fn rotation_is_invertible_in_the_interior() {
        let img = gradient(41, 41);
        let there = rotate_frame(&img, 0.7).unwrap();
        let back = rotate_frame(&there, -0.7).unwrap();

        let c = 20.0_f64;
        for y in 0..41u32 {
            for x in 0..41u32 {
                let d = (f64::from(x) - c).hypot(f64::from(y) - c);
                if d > 12.0 {
                    continue;
                }
                let (a, b) = (at(&img, x, y), at(&back, x, y));
                assert!(a.abs_diff(b) <= 2, "({x},{y}): {a} vs {b}");
            }
        }
    }

    #[test]
    fn corners_fall_back_to_background() {
        let img = GrayImage::from_pixel(21, 21, Luma([255]));
        let out = rotate_frame(&img, FRAC_PI_4).unwrap();
        assert_eq!(at(&out, 0, 0), BACKGROUND);
        assert_eq!(at(&out, 20, 20), BACKGROUND);
        assert_eq!(at(&out, 10, 10), 255);
    }

    #[test]
    fn non_finite_angle_is_degenerate() {
        let img = GrayImage::from_pixel(4, 4, Luma([1]));
        assert!(matches!(
            rotate_frame(&img, f64::NAN),
            Err(MapError::GeometryDegenerate(_))
        ));
        assert!(rotate_frame(&img, f64::INFINITY).is_err());
    }

    #[test]
    fn empty_frame_stays_empty() {
        let img = GrayImage::new(0, 0);
        assert!(rotate_frame(&img, 1.0).unwrap().is_empty());
    }
}
