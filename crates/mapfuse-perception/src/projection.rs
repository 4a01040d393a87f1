//! Coordinate Mapper: physical map coordinates ↔ canvas pixels.

use mapfuse_types::MapError;

/// An integer pixel location on the canvas.  May lie outside the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelCoord {
    pub x: i64,
    pub y: i64,
}

impl PixelCoord {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Fixed affine mapping from physical position to canvas pixel:
///
/// ```text
/// pixel_x = round(x / meters_per_pixel) + origin_x
/// pixel_y = round(y / meters_per_pixel) + origin_y
/// ```
///
/// Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapProjection {
    meters_per_pixel: f64,
    origin_x: i64,
    origin_y: i64,
}

impl MapProjection {
    /// # Errors
    ///
    /// Returns [`MapError::Configuration`] unless `meters_per_pixel` is finite
    /// and strictly positive.
    pub fn new(meters_per_pixel: f64, origin_x: i64, origin_y: i64) -> Result<Self, MapError> {
        if !meters_per_pixel.is_finite() || meters_per_pixel <= 0.0 {
            return Err(MapError::Configuration(format!(
                "meters_per_pixel must be finite and > 0, got {meters_per_pixel}"
            )));
        }
        Ok(Self {
            meters_per_pixel,
            origin_x,
            origin_y,
        })
    }

    pub fn meters_per_pixel(&self) -> f64 {
        self.meters_per_pixel
    }

    pub fn origin(&self) -> PixelCoord {
        PixelCoord::new(self.origin_x, self.origin_y)
    }

    /// Pixel containing the physical point (`x`, `y`).
    ///
    /// # Errors
    ///
    /// Returns [`MapError::GeometryDegenerate`] for non-finite input.
    pub fn to_pixel(&self, x: f64, y: f64) -> Result<PixelCoord, MapError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(MapError::GeometryDegenerate(format!(
                "position ({x}, {y}) is not finite"
            )));
        }
        // `as` saturates, so positions far off the map stay far off the map.
        Ok(PixelCoord::new(
            ((x / self.meters_per_pixel).round() as i64).saturating_add(self.origin_x),
            ((y / self.meters_per_pixel).round() as i64).saturating_add(self.origin_y),
        ))
    }

    /// Physical position of the centre of `pixel`.
    pub fn to_world(&self, pixel: PixelCoord) -> (f64, f64) {
        (
            pixel.x.saturating_sub(self.origin_x) as f64 * self.meters_per_pixel,
            pixel.y.saturating_sub(self.origin_y) as f64 * self.meters_per_pixel,
        )
    }
}
