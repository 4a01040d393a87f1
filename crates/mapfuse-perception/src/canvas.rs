//! Map Canvas – the persistent accumulated raster.
//!
//! [`MapCanvas`] pairs a fixed-size [`GrayImage`] with the [`MapProjection`]
//! that places physical positions on it.  Both are fixed at construction.
//!
//! The pipeline mutates the canvas through a [`CanvasHandle`]; display or
//! export collaborators hold clones of the same handle and call
//! [`CanvasHandle::snapshot`], which copies the raster under a read lock so a
//! reader never observes a half-applied merge.

use std::sync::{Arc, PoisonError, RwLock};

use image::GrayImage;
use mapfuse_types::MapError;

use crate::compositor::{MergeReport, Roi, composite_max};
use crate::projection::{MapProjection, PixelCoord};

/// Startup geometry of the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapGeometry {
    pub width: u32,
    pub height: u32,
    /// Pixel that corresponds to the physical origin.
    pub origin_x: i64,
    pub origin_y: i64,
    pub meters_per_pixel: f64,
}

impl Default for MapGeometry {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 1000,
            origin_x: 500,
            origin_y: 500,
            meters_per_pixel: 0.0025,
        }
    }
}

/// The accumulated map raster.
#[derive(Debug, Clone)]
pub struct MapCanvas {
    image: GrayImage,
    projection: MapProjection,
}

impl MapCanvas {
    /// Allocate a zero-filled ("unknown") canvas.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Configuration`] when either dimension is zero or
    /// the scale is invalid.
    pub fn new(geometry: MapGeometry) -> Result<Self, MapError> {
        if geometry.width == 0 || geometry.height == 0 {
            return Err(MapError::Configuration(format!(
                "canvas must have non-zero size, got {}x{}",
                geometry.width, geometry.height
            )));
        }
        let projection = MapProjection::new(
            geometry.meters_per_pixel,
            geometry.origin_x,
            geometry.origin_y,
        )?;
        Ok(Self {
            image: GrayImage::new(geometry.width, geometry.height),
            projection,
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn projection(&self) -> &MapProjection {
        &self.projection
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    /// Merge a map-aligned `frame` centred on `center`.
    ///
    /// See [`composite_max`] for the combine rule and error cases.
    pub fn merge(&mut self, frame: &GrayImage, center: PixelCoord) -> Result<MergeReport, MapError> {
        let roi = Roi::centered_at(center, frame.width(), frame.height());
        composite_max(&mut self.image, frame, roi)
    }

    /// Number of pixels holding any evidence (non-zero).
    pub fn observed_pixels(&self) -> u64 {
        self.image.as_raw().iter().filter(|&&v| v != 0).count() as u64
    }

    /// Fraction of the canvas holding any evidence, in `[0, 1]`.
    pub fn coverage(&self) -> f64 {
        let total = u64::from(self.width()) * u64::from(self.height());
        self.observed_pixels() as f64 / total as f64
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Shared handle
// ────────────────────────────────────────────────────────────────────────────

/// Cheaply clonable, thread-safe handle to a [`MapCanvas`].
#[derive(Debug, Clone)]
pub struct CanvasHandle {
    inner: Arc<RwLock<MapCanvas>>,
}

impl CanvasHandle {
    pub fn new(canvas: MapCanvas) -> Self {
        Self {
            inner: Arc::new(RwLock::new(canvas)),
        }
    }

    /// Copy of the current raster, taken under the read lock.
    pub fn snapshot(&self) -> GrayImage {
        self.read(|c| c.image().clone())
    }

    pub fn width(&self) -> u32 {
        self.read(MapCanvas::width)
    }

    pub fn height(&self) -> u32 {
        self.read(MapCanvas::height)
    }

    pub fn projection(&self) -> MapProjection {
        self.read(|c| *c.projection())
    }

    /// Run `f` with shared access to the canvas.
    pub fn read<T>(&self, f: impl FnOnce(&MapCanvas) -> T) -> T {
        // A panic inside a previous merge cannot leave a pixel below its old
        // value, so a poisoned lock still guards a valid canvas.
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Run `f` with exclusive access to the canvas.
    pub fn write<T>(&self, f: impl FnOnce(&mut MapCanvas) -> T) -> T {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
