//! [`MapBuilder`] – the per-frame mapping pipeline.
//!
//! Each call to [`MapBuilder::process`] runs one frame through:
//!
//! 1. **Convert** – normalise the [`RawImage`] to `mono8` and ingest it into
//!    the [`FrameBuffer`].
//! 2. **Locate** – ask the [`PoseResolver`] where the agent was at the frame's
//!    timestamp, waiting at most [`MapBuilderConfig::pose_timeout`].
//! 3. **Rotate** – turn the frame into map orientation with
//!    [`rotate_frame`].
//! 4. **Place** – map the pose to a canvas pixel with the canvas
//!    [`MapProjection`][mapfuse_perception::MapProjection].
//! 5. **Merge** – max-composite the rotated frame centred on that pixel.
//!
//! Per-frame problems never abort the pipeline: they come back as
//! [`FrameOutcome::Skipped`] with a [`SkipReason`].  Only configuration errors
//! (for example the sensor resolution changing mid-run) are returned as
//! `Err`.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mapfuse_middleware::PoseBuffer;
//! use mapfuse_runtime::map_builder::{MapBuilder, MapBuilderConfig};
//!
//! # async fn demo(raw: mapfuse_types::RawImage) -> Result<(), mapfuse_types::MapError> {
//! let poses = Arc::new(PoseBuffer::default());
//! let mut builder = MapBuilder::new(MapBuilderConfig::default(), poses)?;
//! let outcome = builder.process(&raw).await?;
//! println!("{outcome:?}, coverage {:.3}", builder.canvas().read(|c| c.coverage()));
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mapfuse_hal::to_mono8;
use mapfuse_middleware::{EventBus, PoseResolver, Topic};
use mapfuse_perception::{
    CanvasHandle, FrameBuffer, MapCanvas, MapGeometry, MergeReport, PixelCoord, rotate_frame,
};
use mapfuse_types::{MapError, MapEvent, MapEventPayload, Pose2D, RawImage, SkipReason};
use tracing::{debug, error, info, instrument, warn};

/// Event `source` tag for everything the pipeline publishes.
const EVENT_SOURCE: &str = "mapfuse-runtime::map_builder";

/// Default bound on the pose lookup.
pub const DEFAULT_POSE_TIMEOUT: Duration = Duration::from_secs(3);

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`MapBuilder`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapBuilderConfig {
    /// Canvas size, origin pixel and scale.
    pub geometry: MapGeometry,
    /// Maximum wait for the pose of one frame.
    pub pose_timeout: Duration,
    /// Number of initial frames that only fill the frame buffer.
    pub warmup_frames: u32,
}

impl Default for MapBuilderConfig {
    fn default() -> Self {
        Self {
            geometry: MapGeometry::default(),
            pose_timeout: DEFAULT_POSE_TIMEOUT,
            warmup_frames: 0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outcomes and statistics
// ─────────────────────────────────────────────────────────────────────────────

/// Result of running one frame through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// The frame was merged into the canvas.
    Composited {
        pose: Pose2D,
        /// Canvas pixel the frame was centred on.
        pixel: PixelCoord,
        report: MergeReport,
    },
    /// The frame was dropped; the canvas is unchanged.
    Skipped(SkipReason),
}

impl FrameOutcome {
    pub fn is_composited(&self) -> bool {
        matches!(self, FrameOutcome::Composited { .. })
    }

    fn to_payload(self, stamp: DateTime<Utc>) -> MapEventPayload {
        match self {
            FrameOutcome::Composited {
                pose,
                pixel,
                report,
            } => MapEventPayload::FrameComposited {
                stamp,
                pose,
                pixel_x: pixel.x,
                pixel_y: pixel.y,
                raised_pixels: report.raised_pixels,
            },
            FrameOutcome::Skipped(reason) => MapEventPayload::FrameSkipped { stamp, reason },
        }
    }
}

/// Running counters of a [`MapBuilder`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub received: u64,
    pub composited: u64,
    pub skipped_conversion: u64,
    pub skipped_pose: u64,
    pub skipped_off_map: u64,
    pub skipped_warmup: u64,
}

impl PipelineStats {
    /// Total frames dropped for any reason.
    pub fn skipped(&self) -> u64 {
        self.skipped_conversion + self.skipped_pose + self.skipped_off_map + self.skipped_warmup
    }

    fn record(&mut self, outcome: &FrameOutcome) {
        match outcome {
            FrameOutcome::Composited { .. } => self.composited += 1,
            FrameOutcome::Skipped(SkipReason::Conversion) => self.skipped_conversion += 1,
            FrameOutcome::Skipped(SkipReason::PoseUnavailable) => self.skipped_pose += 1,
            FrameOutcome::Skipped(SkipReason::OffMap) => self.skipped_off_map += 1,
            FrameOutcome::Skipped(SkipReason::WarmUp) => self.skipped_warmup += 1,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MapBuilder
// ─────────────────────────────────────────────────────────────────────────────

/// The mapping pipeline.
///
/// Owns the frame buffer and the canvas; the pose resolver is injected so
/// tests can substitute fakes.  Frames are processed strictly one at a time
/// because [`process`](Self::process) takes `&mut self`.
pub struct MapBuilder {
    config: MapBuilderConfig,
    frames: FrameBuffer,
    canvas: CanvasHandle,
    poses: Arc<dyn PoseResolver>,
    bus: Option<EventBus>,
    stats: PipelineStats,
}

impl MapBuilder {
    /// Build a pipeline with a fresh, all-unknown canvas.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Configuration`] for an unusable canvas geometry.
    pub fn new(config: MapBuilderConfig, poses: Arc<dyn PoseResolver>) -> Result<Self, MapError> {
        let canvas = MapCanvas::new(config.geometry)?;
        info!(
            width = config.geometry.width,
            height = config.geometry.height,
            origin_x = config.geometry.origin_x,
            origin_y = config.geometry.origin_y,
            meters_per_pixel = config.geometry.meters_per_pixel,
            pose_timeout = ?config.pose_timeout,
            warmup_frames = config.warmup_frames,
            "map builder ready"
        );
        Ok(Self {
            config,
            frames: FrameBuffer::new(),
            canvas: CanvasHandle::new(canvas),
            poses,
            bus: None,
            stats: PipelineStats::default(),
        })
    }

    /// Publish every [`FrameOutcome`] on `bus` ([`Topic::MapUpdates`]).
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// A handle to the shared canvas, for display or export.
    pub fn canvas(&self) -> CanvasHandle {
        self.canvas.clone()
    }

    /// The bus given to [`with_bus`](Self::with_bus), if any.
    pub fn bus(&self) -> Option<&EventBus> {
        self.bus.as_ref()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn config(&self) -> &MapBuilderConfig {
        &self.config
    }

    pub fn frame_buffer(&self) -> &FrameBuffer {
        &self.frames
    }

    /// Run one frame through the pipeline.
    ///
    /// The pose lookup is the only await point and is bounded by the
    /// configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Configuration`] when the frame's dimensions differ
    /// from the first frame's.  Every other failure is reported as
    /// [`FrameOutcome::Skipped`].
    #[instrument(skip_all, fields(stamp = %raw.stamp, encoding = %raw.encoding))]
    pub async fn process(&mut self, raw: &RawImage) -> Result<FrameOutcome, MapError> {
        self.stats.received += 1;

        let frame = match to_mono8(raw) {
            Ok(frame) => frame,
            Err(err) => {
                error!(%err, "dropping frame that could not be converted");
                return Ok(self.finish(raw.stamp, FrameOutcome::Skipped(SkipReason::Conversion)));
            }
        };
        self.frames.ingest(&frame)?;

        if self.frames.ingested() <= u64::from(self.config.warmup_frames) {
            debug!(
                ingested = self.frames.ingested(),
                warmup_frames = self.config.warmup_frames,
                "warm-up frame buffered"
            );
            return Ok(self.finish(raw.stamp, FrameOutcome::Skipped(SkipReason::WarmUp)));
        }

        let pose = match self.poses.lookup(raw.stamp, self.config.pose_timeout).await {
            Ok(pose) => pose,
            Err(err) => {
                warn!(%err, "no pose for frame; skipping");
                return Ok(self.finish(raw.stamp, FrameOutcome::Skipped(SkipReason::PoseUnavailable)));
            }
        };

        let outcome = match self.composite(pose) {
            Ok(outcome) => outcome,
            Err(MapError::GeometryDegenerate(details)) => {
                debug!(%details, "frame does not land on the canvas");
                FrameOutcome::Skipped(SkipReason::OffMap)
            }
            Err(err) => return Err(err),
        };
        Ok(self.finish(raw.stamp, outcome))
    }

    fn composite(&self, pose: Pose2D) -> Result<FrameOutcome, MapError> {
        let frame = self
            .frames
            .frame()
            .ok_or_else(|| MapError::GeometryDegenerate("frame buffer is empty".to_string()))?;
        let rotated = rotate_frame(frame, pose.heading_rad)?;
        let pixel = self.canvas.projection().to_pixel(pose.x, pose.y)?;
        let report = self.canvas.write(|canvas| canvas.merge(&rotated, pixel))?;
        debug!(
            x = pose.x,
            y = pose.y,
            heading_rad = pose.heading_rad,
            pixel_x = pixel.x,
            pixel_y = pixel.y,
            raised_pixels = report.raised_pixels,
            "frame composited"
        );
        Ok(FrameOutcome::Composited {
            pose,
            pixel,
            report,
        })
    }

    fn finish(&mut self, stamp: DateTime<Utc>, outcome: FrameOutcome) -> FrameOutcome {
        self.stats.record(&outcome);
        if let Some(bus) = &self.bus {
            // Best-effort publish – no subscribers is not an error.
            let _ = bus.publish_to(Topic::MapUpdates, MapEvent::new(EVENT_SOURCE, outcome.to_payload(stamp)));
        }
        outcome
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
