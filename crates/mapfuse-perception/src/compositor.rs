//! Map Compositor.
//!
//! Merges a map-aligned frame into a raster with a pointwise maximum:
//!
//! ```text
//! canvas[p] = max(canvas[p], frame[p - offset])
//! ```
//!
//! Evidence already on the canvas is therefore never erased; a pixel's value
//! is non-decreasing over every merge that touches it, and merging the same
//! frame twice at the same place is the same as merging it once.
//!
//! The target rectangle ([`Roi`]) may hang off any edge of the raster.  It is
//! clipped first; a rectangle with no overlap is reported as
//! [`MapError::GeometryDegenerate`] and leaves the raster untouched.

use image::GrayImage;
use mapfuse_types::MapError;

use crate::projection::PixelCoord;

/// Rectangle-of-interest in canvas pixel coordinates.  Unclipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    /// Rectangle of `width × height` whose top-left corner is
    /// `(center.x - width / 2, center.y - height / 2)`.
    pub fn centered_at(center: PixelCoord, width: u32, height: u32) -> Self {
        Self {
            x: center.x.saturating_sub(i64::from(width / 2)),
            y: center.y.saturating_sub(i64::from(height / 2)),
            width,
            height,
        }
    }

    /// Intersect with `[0, canvas_width) × [0, canvas_height)`.
    ///
    /// Returns `None` when the overlap has zero area.
    pub fn clip(&self, canvas_width: u32, canvas_height: u32) -> Option<ClippedRoi> {
        let (x0, x1) = clip_span(self.x, self.width, canvas_width)?;
        let (y0, y1) = clip_span(self.y, self.height, canvas_height)?;
        Some(ClippedRoi {
            canvas_x: x0 as u32,
            canvas_y: y0 as u32,
            frame_x: (x0 - self.x) as u32,
            frame_y: (y0 - self.y) as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }
}

/// Half-open overlap of `[start, start + len)` with `[0, limit)`.
fn clip_span(start: i64, len: u32, limit: u32) -> Option<(i64, i64)> {
    let lo = start.max(0);
    let hi = start.saturating_add(i64::from(len)).min(i64::from(limit));
    (hi > lo).then_some((lo, hi))
}

/// The part of a [`Roi`] that lies on the canvas, with the matching offset
/// into the source frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClippedRoi {
    pub canvas_x: u32,
    pub canvas_y: u32,
    pub frame_x: u32,
    pub frame_y: u32,
    pub width: u32,
    pub height: u32,
}

impl ClippedRoi {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Summary of one successful merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    /// Canvas region that was visited.
    pub region: ClippedRoi,
    /// Pixels whose value strictly increased.
    pub raised_pixels: u64,
}

/// Merge `frame` into `canvas` at `roi` using pointwise maximum.
///
/// # Errors
///
/// Returns [`MapError::GeometryDegenerate`] when `roi` does not match the
/// frame size or has no overlap with the canvas.  The canvas is unchanged in
/// both cases.
pub fn composite_max(canvas: &mut GrayImage, frame: &GrayImage, roi: Roi) -> Result<MergeReport, MapError> {
    if roi.width != frame.width() || roi.height != frame.height() {
        return Err(MapError::GeometryDegenerate(format!(
            "roi {}x{} does not match frame {}x{}",
            roi.width,
            roi.height,
            frame.width(),
            frame.height()
        )));
    }
    let region = roi.clip(canvas.width(), canvas.height()).ok_or_else(|| {
        MapError::GeometryDegenerate(format!(
            "roi at ({}, {}) size {}x{} lies outside the {}x{} canvas",
            roi.x,
            roi.y,
            roi.width,
            roi.height,
            canvas.width(),
            canvas.height()
        ))
    })?;

    let mut raised_pixels = 0u64;
    let (fx, cx) = (region.frame_x as usize, region.canvas_x as usize);
    let w = region.width as usize;
    let rows = region.height as usize;
    let canvas_stride = canvas.width() as usize;
    let src_rows = frame
        .as_raw()
        .chunks_exact(frame.width() as usize)
        .skip(region.frame_y as usize)
        .take(rows);
    let dst_rows = canvas
        .chunks_exact_mut(canvas_stride)
        .skip(region.canvas_y as usize)
        .take(rows);
    for (src, dst) in src_rows.zip(dst_rows) {
        for (d, &s) in dst[cx..cx + w].iter_mut().zip(&src[fx..fx + w]) {
            if s > *d {
                *d = s;
                raised_pixels += 1;
            }
        }
    }

    Ok(MergeReport {
        region,
        raised_pixels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn pattern(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| Luma([((x * 31 + y * 17) % 256) as u8]))
    }

    fn filled(w: u32, h: u32, v: u8) -> GrayImage {
        GrayImage::from_pixel(w, h, Luma([v]))
    }

    fn at(img: &GrayImage, x: u32, y: u32) -> u8 {
        img.get_pixel(x, y)[0]
    }

    // ── Roi ─────────────────────────────────────────────────────────────────

    #[test]
    fn centered_roi_uses_integer_half_size() {
        let roi = Roi::centered_at(PixelCoord::new(500, 500), 100, 101);
        assert_eq!((roi.x, roi.y), (450, 450));
        let roi = Roi::centered_at(PixelCoord::new(0, 0), 5, 3);
        assert_eq!((roi.x, roi.y), (-2, -1));
    }

    #[test]
    fn clip_inside_is_unchanged() {
        let c = Roi { x: 10, y: 20, width: 30, height: 40 }.clip(100, 100).unwrap();
        assert_eq!((c.canvas_x, c.canvas_y, c.frame_x, c.frame_y), (10, 20, 0, 0));
        assert_eq!((c.width, c.height), (30, 40));
    }

    #[test]
    fn clip_top_left_overhang_offsets_frame() {
        let c = Roi { x: -5, y: -2, width: 10, height: 10 }.clip(100, 100).unwrap();
        assert_eq!((c.canvas_x, c.canvas_y), (0, 0));
        assert_eq!((c.frame_x, c.frame_y), (5, 2));
        assert_eq!((c.width, c.height), (5, 8));
    }

    #[test]
    fn clip_bottom_right_overhang_truncates() {
        let c = Roi { x: 95, y: 98, width: 10, height: 10 }.clip(100, 100).unwrap();
        assert_eq!((c.width, c.height), (5, 2));
        assert_eq!(c.area(), 10);
    }

    #[test]
    fn clip_without_overlap_is_none() {
        assert!(Roi { x: 100, y: 0, width: 10, height: 10 }.clip(100, 100).is_none());
        assert!(Roi { x: -10, y: 0, width: 10, height: 10 }.clip(100, 100).is_none());
        assert!(Roi { x: 0, y: 5000, width: 10, height: 10 }.clip(100, 100).is_none());
        assert!(Roi { x: 0, y: 0, width: 0, height: 10 }.clip(100, 100).is_none());
        assert!(Roi { x: i64::MAX, y: 0, width: 10, height: 10 }.clip(100, 100).is_none());
    }

    // ── composite_max ───────────────────────────────────────────────────────

    #[test]
    fn centred_uniform_frame_fills_expected_square() {
        let mut canvas = GrayImage::new(1000, 1000);
        canvas.put_pixel(460, 460, Luma([250]));
        let frame = filled(100, 100, 200);
        let roi = Roi::centered_at(PixelCoord::new(500, 500), 100, 100);

        let report = composite_max(&mut canvas, &frame, roi).unwrap();
        assert_eq!(report.region.area(), 100 * 100);
        assert_eq!(report.raised_pixels, 100 * 100 - 1);

        for y in 440..560 {
            for x in 440..560 {
                let inside = (450..550).contains(&x) && (450..550).contains(&y);
                let expected = match (x, y) {
                    (460, 460) => 250,
                    _ if inside => 200,
                    _ => 0,
                };
                assert_eq!(at(&canvas, x, y), expected, "({x},{y})");
            }
        }
    }

    #[test]
    fn merge_is_idempotent() {
        let frame = pattern(30, 20);
        let roi = Roi { x: 7, y: -3, width: 30, height: 20 };

        let mut once = pattern(50, 40);
        composite_max(&mut once, &frame, roi).unwrap();
        let mut twice = once.clone();
        let report = composite_max(&mut twice, &frame, roi).unwrap();

        assert_eq!(once, twice);
        assert_eq!(report.raised_pixels, 0);
    }

    #[test]
    fn merge_never_decreases_any_pixel() {
        let mut canvas = GrayImage::new(64, 64);
        let frames = [
            (filled(20, 20, 180), Roi { x: 10, y: 10, width: 20, height: 20 }),
            (filled(20, 20, 40), Roi { x: 15, y: 15, width: 20, height: 20 }),
            (pattern(20, 20), Roi { x: 50, y: 50, width: 20, height: 20 }),
            (filled(20, 20, 0), Roi { x: 12, y: 12, width: 20, height: 20 }),
        ];
        for (frame, roi) in frames.iter() {
            let before = canvas.clone();
            composite_max(&mut canvas, frame, *roi).unwrap();
            for (b, a) in before.as_raw().iter().zip(canvas.as_raw()) {
                assert!(a >= b);
            }
        }
        // Darker passes did not erase the first one.
        assert_eq!(at(&canvas, 20, 20), 180);
    }

    #[test]
    fn partial_overlap_copies_matching_subrectangle() {
        let mut canvas = GrayImage::new(10, 10);
        let frame = pattern(6, 6);
        composite_max(&mut canvas, &frame, Roi { x: -2, y: 7, width: 6, height: 6 }).unwrap();

        for y in 0..10u32 {
            for x in 0..10u32 {
                let fx = i64::from(x) + 2;
                let fy = i64::from(y) - 7;
                let expected = if (0..6).contains(&fx) && (0..6).contains(&fy) {
                    at(&frame, fx as u32, fy as u32)
                } else {
                    0
                };
                assert_eq!(at(&canvas, x, y), expected, "({x},{y})");
            }
        }
    }

    #[test]
    fn off_canvas_merge_is_degenerate_and_harmless() {
        let mut canvas = filled(1000, 1000, 3);
        let before = canvas.clone();
        let frame = filled(100, 100, 200);
        let roi = Roi::centered_at(PixelCoord::new(5000, -5000), 100, 100);

        let err = composite_max(&mut canvas, &frame, roi).unwrap_err();
        assert!(matches!(err, MapError::GeometryDegenerate(_)));
        assert_eq!(canvas, before);
    }

    #[test]
    fn mismatched_roi_size_is_rejected() {
        let mut canvas = GrayImage::new(10, 10);
        let frame = filled(4, 4, 9);
        let err = composite_max(&mut canvas, &frame, Roi { x: 0, y: 0, width: 5, height: 4 }).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }
}
