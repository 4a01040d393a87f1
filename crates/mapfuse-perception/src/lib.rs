//! `mapfuse-perception` – the map-building core.
//!
//! Turns a stream of single-channel frames plus a pose per frame into one
//! top-down raster.  Everything here is synchronous, allocation-light and
//! free of I/O so it can be tested in isolation.
//!
//! # Modules
//!
//! - [`frame_buffer`] – [`FrameBuffer`][frame_buffer::FrameBuffer]: the
//!   `Empty → Ready` holder of the latest frame.
//! - [`rotation`] – [`rotate_frame`][rotation::rotate_frame]: bilinear
//!   rotation about the frame centre into map orientation.
//! - [`projection`] – [`MapProjection`][projection::MapProjection]: physical
//!   position ↔ canvas pixel.
//! - [`compositor`] – [`composite_max`][compositor::composite_max]: clipped,
//!   pointwise-maximum merge.
//! - [`canvas`] – [`MapCanvas`][canvas::MapCanvas] and its shared
//!   [`CanvasHandle`][canvas::CanvasHandle].
//! - [`transform`] – [`Quaternion::yaw`][transform::Quaternion::yaw]:
//!   heading extraction from 3-D pose sources.

pub mod canvas;
pub mod compositor;
pub mod frame_buffer;
pub mod projection;
pub mod rotation;
pub mod transform;

pub use canvas::{CanvasHandle, MapCanvas, MapGeometry};
pub use compositor::{ClippedRoi, MergeReport, Roi, composite_max};
pub use frame_buffer::{BufferState, FrameBuffer};
pub use projection::{MapProjection, PixelCoord};
pub use rotation::{RotationMatrix, rotate_frame};
pub use transform::{Quaternion, Vec3, planar_pose, yaw_from_quaternion};
