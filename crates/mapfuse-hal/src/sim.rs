//! In-process simulation sources for CI/CD testing without physical hardware.
//!
//! [`SimTrajectory`] describes where the simulated agent is at any instant and
//! [`SimCamera`] yields the frames it would capture along the way.  Together
//! they let the full mapfuse stack run in headless tests and demos.
//!
//! # Example
//!
//! ```rust
//! use mapfuse_hal::camera::ImageSource;
//! use mapfuse_hal::sim::{SimCamera, SimTrajectory};
//!
//! let start = chrono::Utc::now();
//! let mut camera = SimCamera::new("sim_down", 40, 30, start)
//!     .with_frame_count(3);
//! let trajectory = SimTrajectory::circle(0.0, 0.0, 0.5, 0.2);
//!
//! while let Some(frame) = camera.next_frame().unwrap() {
//!     let pose = trajectory.pose_at(start, frame.stamp);
//!     assert!(pose.x.hypot(pose.y) <= 0.5 + 1e-9);
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use mapfuse_types::{ImageEncoding, MapError, Pose2D, RawImage, StampedPose};
use std::f64::consts::FRAC_PI_2;
use tracing::{debug, warn};

use crate::camera::ImageSource;

// ────────────────────────────────────────────────────────────────────────────
// Trajectory
// ────────────────────────────────────────────────────────────────────────────

/// A constant-speed circular path, heading tangent to the circle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimTrajectory {
    pub center_x: f64,
    pub center_y: f64,
    /// Circle radius (metres).  Zero keeps the agent in place, spinning.
    pub radius: f64,
    /// Angular speed around the circle (rad/s).
    pub angular_speed: f64,
}

impl SimTrajectory {
    pub fn circle(center_x: f64, center_y: f64, radius: f64, angular_speed: f64) -> Self {
        Self {
            center_x,
            center_y,
            radius,
            angular_speed,
        }
    }

    /// Pose `now - start` seconds into the run.
    pub fn pose_at(&self, start: DateTime<Utc>, now: DateTime<Utc>) -> Pose2D {
        let t = seconds_between(start, now);
        let phase = self.angular_speed * t;
        Pose2D::new(
            self.center_x + self.radius * phase.cos(),
            self.center_y + self.radius * phase.sin(),
            phase + FRAC_PI_2,
        )
    }

    /// Sample the path every `period` over `[start, end]`, inclusive.
    pub fn sample(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        period: Duration,
    ) -> Vec<StampedPose> {
        let mut out = Vec::new();
        if period <= Duration::zero() {
            return out;
        }
        let mut t = start;
        while t <= end {
            out.push(StampedPose::new(t, self.pose_at(start, t)));
            t += period;
        }
        out
    }
}

fn seconds_between(start: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let d = now - start;
    match d.num_nanoseconds() {
        Some(ns) => ns as f64 * 1e-9,
        None => d.num_milliseconds() as f64 * 1e-3,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Camera
// ────────────────────────────────────────────────────────────────────────────

/// A simulated downward-looking camera.
///
/// Every frame shows the same footprint: a bright disc filling the image, with
/// a brighter stripe along the forward (+X image) axis so rotations are
/// visible in the resulting map.  Frames are stamped `start + i * period`.
pub struct SimCamera {
    id: String,
    width: u32,
    height: u32,
    start: DateTime<Utc>,
    period: Duration,
    encoding: ImageEncoding,
    frame_count: Option<u64>,
    emitted: u64,
}

impl SimCamera {
    /// Create a camera producing `width × height` `mono8` frames at 10 Hz,
    /// indefinitely.
    pub fn new(id: impl Into<String>, width: u32, height: u32, start: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            start,
            period: Duration::milliseconds(100),
            encoding: ImageEncoding::Mono8,
            frame_count: None,
            emitted: 0,
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Stop after `count` frames.
    pub fn with_frame_count(mut self, count: u64) -> Self {
        self.frame_count = Some(count);
        self
    }

    /// Emit frames in `encoding` instead of `mono8`.  `Mono16` is not
    /// supported by the simulator and falls back to `mono8`.
    pub fn with_encoding(mut self, encoding: ImageEncoding) -> Self {
        self.encoding = match encoding {
            ImageEncoding::Mono16 => ImageEncoding::Mono8,
            other => other,
        };
        self
    }

    /// Stamp of the frame with index `i`, or `None` once it no longer fits
    /// in a timestamp.
    pub fn stamp_of(&self, i: u64) -> Option<DateTime<Utc>> {
        let n = i32::try_from(i).ok()?;
        let offset = self.period.checked_mul(n)?;
        self.start.checked_add_signed(offset)
    }

    fn intensity(&self, x: u32, y: u32) -> u8 {
        let cx = (self.width as f64 - 1.0) / 2.0;
        let cy = (self.height as f64 - 1.0) / 2.0;
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        let r = cx.min(cy);
        if dx * dx + dy * dy > r * r {
            return 0;
        }
        if dx >= 0.0 && dy.abs() <= 1.0 {
            return 250;
        }
        140
    }

    fn render(&self, stamp: DateTime<Utc>) -> RawImage {
        let bpp = self.encoding.bytes_per_pixel();
        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * bpp);
        for y in 0..self.height {
            for x in 0..self.width {
                let v = self.intensity(x, y);
                match self.encoding {
                    ImageEncoding::Mono8 | ImageEncoding::Mono16 => data.push(v),
                    ImageEncoding::Rgb8 | ImageEncoding::Bgr8 => data.extend_from_slice(&[v, v, v]),
                    ImageEncoding::Rgba8 | ImageEncoding::Bgra8 => {
                        data.extend_from_slice(&[v, v, v, 255])
                    }
                }
            }
        }
        RawImage {
            stamp,
            width: self.width,
            height: self.height,
            encoding: self.encoding,
            step: self.width * bpp as u32,
            is_bigendian: false,
            data,
        }
    }
}

impl ImageSource for SimCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn next_frame(&mut self) -> Result<Option<RawImage>, MapError> {
        if self.frame_count.is_some_and(|n| self.emitted >= n) {
            return Ok(None);
        }
        let Some(stamp) = self.stamp_of(self.emitted) else {
            warn!(camera = %self.id, frame = self.emitted, "sim clock exhausted; ending stream");
            return Ok(None);
        };
        self.emitted += 1;
        debug!(camera = %self.id, frame = self.emitted, "sim frame rendered");
        Ok(Some(self.render(stamp)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trajectory_starts_on_circle_heading_tangent() {
        let start = Utc::now();
        let traj = SimTrajectory::circle(1.0, 2.0, 0.5, 0.3);
        let p = traj.pose_at(start, start);
        assert!((p.x - 1.5).abs() < 1e-9);
        assert!((p.y - 2.0).abs() < 1e-9);
        assert!((p.heading_rad - FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn trajectory_quarter_turn() {
        let start = Utc::now();
        let traj = SimTrajectory::circle(0.0, 0.0, 1.0, FRAC_PI_2);
        let p = traj.pose_at(start, start + Duration::seconds(1));
        assert!(p.x.abs() < 1e-9);
        assert!((p.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn trajectory_sample_is_inclusive() {
        let start = Utc::now();
        let traj = SimTrajectory::circle(0.0, 0.0, 1.0, 1.0);
        let poses = traj.sample(start, start + Duration::seconds(1), Duration::milliseconds(250));
        assert_eq!(poses.len(), 5);
        assert_eq!(poses[0].stamp, start);
        assert_eq!(poses[4].stamp, start + Duration::seconds(1));
        assert!(traj.sample(start, start, Duration::zero()).is_empty());
    }

    #[test]
    fn camera_emits_stamped_frames_until_count() {
        let start = Utc::now();
        let mut cam = SimCamera::new("sim", 9, 7, start)
            .with_period(Duration::milliseconds(50))
            .with_frame_count(2);
        assert_eq!(cam.id(), "sim");

        let f0 = cam.next_frame().unwrap().expect("frame 0");
        let f1 = cam.next_frame().unwrap().expect("frame 1");
        assert!(cam.next_frame().unwrap().is_none());

        assert_eq!(f0.stamp, start);
        assert_eq!(f1.stamp, start + Duration::milliseconds(50));
        assert_eq!(f0.data.len(), 9 * 7);
        assert_eq!(f0.encoding, ImageEncoding::Mono8);
    }

    #[test]
    fn camera_ends_stream_when_stamps_overflow() {
        let start = Utc::now();
        let mut cam = SimCamera::new("sim", 4, 4, start);
        assert_eq!(cam.stamp_of(3), Some(start + Duration::milliseconds(300)));
        assert_eq!(cam.stamp_of(u64::from(u32::MAX)), None);

        cam.emitted = i32::MAX as u64 + 1;
        assert!(cam.next_frame().unwrap().is_none());

        let mut slow = SimCamera::new("sim", 4, 4, start).with_period(Duration::days(100_000));
        assert!(slow.next_frame().unwrap().is_some());
        assert_eq!(slow.stamp_of(1_000), None);
    }

    #[test]
    fn camera_footprint_has_stripe_and_dark_corners() {
        let mut cam = SimCamera::new("sim", 11, 11, Utc::now());
        let f = cam.next_frame().unwrap().unwrap();
        let at = |x: usize, y: usize| f.data[y * 11 + x];
        assert_eq!(at(0, 0), 0);
        assert_eq!(at(9, 5), 250);
        assert_eq!(at(1, 5), 140);
    }

    #[test]
    fn camera_colour_encoding_packs_channels() {
        let mut cam = SimCamera::new("sim", 4, 4, Utc::now()).with_encoding(ImageEncoding::Bgra8);
        let f = cam.next_frame().unwrap().unwrap();
        assert_eq!(f.encoding, ImageEncoding::Bgra8);
        assert_eq!(f.step, 16);
        assert_eq!(f.data.len(), 64);
    }
}
