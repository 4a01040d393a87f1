//! `mapfuse-hal` – sensor-facing edge of the mapping stack.
//!
//! # Modules
//!
//! - [`camera`] – [`ImageSource`][camera::ImageSource]: the narrow "yield next
//!   frame" interface every image producer implements, plus
//!   [`QueuedSource`][camera::QueuedSource] for replaying recorded frames.
//! - [`convert`] – [`to_mono8`][convert::to_mono8]: normalises any supported
//!   [`ImageEncoding`][mapfuse_types::ImageEncoding] to single-channel
//!   intensity.
//! - [`sim`] – [`SimCamera`][sim::SimCamera] and
//!   [`SimTrajectory`][sim::SimTrajectory] for headless runs without hardware.

pub mod camera;
pub mod convert;
pub mod sim;

pub use camera::{ImageSource, QueuedSource};
pub use convert::to_mono8;
