//! Normalisation of incoming sensor images to single-channel 8-bit intensity.
//!
//! Colour encodings are reduced with the ITU-R BT.601 luma weights
//! (`0.299 R + 0.587 G + 0.114 B`), the weights OpenCV applies for its mono8
//! conversion.  These differ from `image`'s own `to_luma8`, which uses
//! Rec. 709.  16-bit mono keeps its high byte.

use image::GrayImage;
use mapfuse_types::{ImageEncoding, MapError, RawImage};

/// Convert `raw` into a `mono8` [`GrayImage`].
///
/// # Errors
///
/// Returns [`MapError::Conversion`] when the image has zero area, when `step`
/// is shorter than one packed row, or when `data` is too short for
/// `step * height` bytes.
pub fn to_mono8(raw: &RawImage) -> Result<GrayImage, MapError> {
    let fail = |details: String| MapError::Conversion {
        encoding: raw.encoding.to_string(),
        details,
    };

    if raw.width == 0 || raw.height == 0 {
        return Err(fail(format!("image has zero area ({}x{})", raw.width, raw.height)));
    }

    let bpp = raw.encoding.bytes_per_pixel();
    let width = raw.width as usize;
    let height = raw.height as usize;
    let step = raw.step as usize;
    let packed_row = width * bpp;

    if step < packed_row {
        return Err(fail(format!(
            "row step {step} is shorter than {packed_row} bytes needed for {width} pixels"
        )));
    }
    // The final row may omit its padding.
    let needed = step * (height - 1) + packed_row;
    if raw.data.len() < needed {
        return Err(fail(format!(
            "buffer holds {} bytes, expected at least {needed}",
            raw.data.len()
        )));
    }

    let mut pixels = vec![0u8; width * height];
    for (y, dst) in pixels.chunks_exact_mut(width).enumerate() {
        let src = &raw.data[y * step..y * step + packed_row];
        match raw.encoding {
            ImageEncoding::Mono8 => dst.copy_from_slice(src),
            ImageEncoding::Mono16 => {
                for (d, px) in dst.iter_mut().zip(src.chunks_exact(2)) {
                    *d = if raw.is_bigendian { px[0] } else { px[1] };
                }
            }
            ImageEncoding::Rgb8 | ImageEncoding::Rgba8 => {
                for (d, px) in dst.iter_mut().zip(src.chunks_exact(bpp)) {
                    *d = luma(px[0], px[1], px[2]);
                }
            }
            ImageEncoding::Bgr8 | ImageEncoding::Bgra8 => {
                for (d, px) in dst.iter_mut().zip(src.chunks_exact(bpp)) {
                    *d = luma(px[2], px[1], px[0]);
                }
            }
        }
    }
    GrayImage::from_raw(raw.width, raw.height, pixels)
        .ok_or_else(|| fail(format!("{width}x{height} does not fit the pixel buffer")))
}

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
    y.round().clamp(0.0, 255.0) as u8
}
