use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Pixel layout tag carried by every incoming sensor image.
///
/// Serialised with the wire names used by common robotics image transports
/// (`"mono8"`, `"bgr8"`, …).  Deserialisation goes through [`FromStr`], so
/// the `8UC1`/`16UC1` aliases are accepted there too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ImageEncoding {
    Mono8,
    Mono16,
    Rgb8,
    Bgr8,
    Rgba8,
    Bgra8,
}

impl ImageEncoding {
    /// Bytes occupied by one pixel in this encoding.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ImageEncoding::Mono8 => 1,
            ImageEncoding::Mono16 => 2,
            ImageEncoding::Rgb8 | ImageEncoding::Bgr8 => 3,
            ImageEncoding::Rgba8 | ImageEncoding::Bgra8 => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ImageEncoding::Mono8 => "mono8",
            ImageEncoding::Mono16 => "mono16",
            ImageEncoding::Rgb8 => "rgb8",
            ImageEncoding::Bgr8 => "bgr8",
            ImageEncoding::Rgba8 => "rgba8",
            ImageEncoding::Bgra8 => "bgra8",
        }
    }
}

impl fmt::Display for ImageEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageEncoding {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mono8" | "8UC1" => Ok(ImageEncoding::Mono8),
            "mono16" | "16UC1" => Ok(ImageEncoding::Mono16),
            "rgb8" => Ok(ImageEncoding::Rgb8),
            "bgr8" => Ok(ImageEncoding::Bgr8),
            "rgba8" => Ok(ImageEncoding::Rgba8),
            "bgra8" => Ok(ImageEncoding::Bgra8),
            other => Err(MapError::Conversion {
                encoding: other.to_string(),
                details: "unsupported image encoding".to_string(),
            }),
        }
    }
}

impl TryFrom<String> for ImageEncoding {
    type Error = MapError;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        tag.parse()
    }
}

impl From<ImageEncoding> for String {
    fn from(encoding: ImageEncoding) -> Self {
        encoding.as_str().to_string()
    }
}

/// A timestamped sensor image exactly as delivered by the image source,
/// before it is normalised to single-channel intensity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawImage {
    /// Acquisition time of the image.
    pub stamp: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    pub encoding: ImageEncoding,
    /// Length of one row in bytes (may include padding).
    pub step: u32,
    /// Byte order of multi-byte samples.
    pub is_bigendian: bool,
    pub data: Vec<u8>,
}

impl RawImage {
    /// Build a tightly packed `mono8` image.
    pub fn mono8(stamp: DateTime<Utc>, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            stamp,
            width,
            height,
            encoding: ImageEncoding::Mono8,
            step: width,
            is_bigendian: false,
            data,
        }
    }
}

/// Planar pose of the agent: position in physical units (metres) plus
/// heading, measured counter-clockwise from +X (radians).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    pub heading_rad: f64,
}

impl Pose2D {
    pub fn new(x: f64, y: f64, heading_rad: f64) -> Self {
        Self { x, y, heading_rad }
    }
}

/// A [`Pose2D`] valid at a specific instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StampedPose {
    pub stamp: DateTime<Utc>,
    pub pose: Pose2D,
}

impl StampedPose {
    pub fn new(stamp: DateTime<Utc>, pose: Pose2D) -> Self {
        Self { stamp, pose }
    }
}

/// Why a frame was dropped without touching the map canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The image could not be converted to single-channel intensity.
    Conversion,
    /// No pose was available for the frame's timestamp within the wait.
    PoseUnavailable,
    /// The target rectangle had no overlap with the canvas.
    OffMap,
    /// The frame was consumed by the warm-up window.
    WarmUp,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::Conversion => "conversion",
            SkipReason::PoseUnavailable => "pose_unavailable",
            SkipReason::OffMap => "off_map",
            SkipReason::WarmUp => "warm_up",
        };
        f.write_str(s)
    }
}

/// Notification wrapper published on the map event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "mapfuse-runtime::map_builder"
    pub source: String,
    pub payload: MapEventPayload,
}

impl MapEvent {
    /// Wrap `payload` with a fresh id and the current wall-clock time.
    pub fn new(source: impl Into<String>, payload: MapEventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// What happened to a single frame, or to the session as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MapEventPayload {
    FrameComposited {
        stamp: DateTime<Utc>,
        pose: Pose2D,
        pixel_x: i64,
        pixel_y: i64,
        /// Canvas pixels whose value strictly increased.
        raised_pixels: u64,
    },
    FrameSkipped {
        stamp: DateTime<Utc>,
        reason: SkipReason,
    },
    /// A session began pulling frames from `image_source`.
    SessionStarted { image_source: String },
    /// A session ended without a fatal error.
    SessionStopped {
        /// e.g., "source_exhausted"
        reason: String,
        received: u64,
        composited: u64,
        coverage: f64,
    },
    /// A session was aborted by a fatal error.
    SessionFailed { error: MapError },
}

/// Error type shared by every mapfuse crate.
///
/// Only [`MapError::Configuration`] is fatal; the other variants describe a
/// single frame that the pipeline drops before moving on.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MapError {
    #[error("Could not convert '{encoding}' to mono8: {details}")]
    Conversion { encoding: String, details: String },

    #[error("Pose unavailable: {0}")]
    PoseUnavailable(String),

    #[error("Degenerate geometry: {0}")]
    GeometryDegenerate(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Event bus error: {0}")]
    Channel(String),
}

impl MapError {
    /// `true` for errors that must stop the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MapError::Configuration(_))
    }
}
