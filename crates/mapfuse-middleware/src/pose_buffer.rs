//! Time-indexed pose history.
//!
//! [`PoseBuffer`] keeps a bounded window of [`StampedPose`] samples, newest
//! last, and answers [`PoseResolver::lookup`] queries against it:
//!
//! | Requested stamp | Result |
//! |---|---|
//! | equal to a sample | that sample |
//! | between two samples | linear interpolation (heading along the shorter arc) |
//! | older than the oldest sample | immediate [`MapError::PoseUnavailable`] |
//! | newer than the newest sample | wait for newer samples, up to the timeout |
//!
//! Producers call [`PoseBuffer::insert`] from any thread; every insert wakes
//! pending lookups so they can re-check.

use std::collections::VecDeque;
use std::f64::consts::{PI, TAU};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mapfuse_perception::transform::{Quaternion, Vec3, planar_pose};
use mapfuse_types::{MapError, Pose2D, StampedPose};
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::adapter::PoseResolver;

/// Default length of retained history.
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(10);

enum Resolve {
    Found(Pose2D),
    Pending,
    Failed(MapError),
}

/// Bounded, interpolating pose history.
#[derive(Debug)]
pub struct PoseBuffer {
    history: Mutex<VecDeque<StampedPose>>,
    arrivals: Notify,
    cache_duration: chrono::Duration,
}

impl Default for PoseBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_DURATION)
    }
}

impl PoseBuffer {
    /// Keep samples no older than `cache_duration` behind the newest one.
    pub fn new(cache_duration: Duration) -> Self {
        Self {
            history: Mutex::new(VecDeque::new()),
            arrivals: Notify::new(),
            cache_duration: chrono::Duration::from_std(cache_duration)
                .unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Add a sample.  Samples may arrive out of order; a sample with the same
    /// stamp as an existing one replaces it.
    pub fn insert(&self, sample: StampedPose) {
        {
            let mut history = self.lock();
            match history.binary_search_by(|p| p.stamp.cmp(&sample.stamp)) {
                Ok(i) => history[i] = sample,
                Err(i) => history.insert(i, sample),
            }
            let horizon = history
                .back()
                .and_then(|p| p.stamp.checked_sub_signed(self.cache_duration));
            if let Some(horizon) = horizon {
                while history.front().is_some_and(|p| p.stamp < horizon) {
                    history.pop_front();
                }
            }
            trace!(stamp = %sample.stamp, retained = history.len(), "pose sample stored");
        }
        self.arrivals.notify_waiters();
    }

    /// Add a sample given as a 3-D rigid-body transform.
    pub fn insert_transform(&self, stamp: DateTime<Utc>, translation: Vec3, rotation: Quaternion) {
        self.insert(StampedPose::new(stamp, planar_pose(translation, rotation)));
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn oldest(&self) -> Option<StampedPose> {
        self.lock().front().copied()
    }

    pub fn latest(&self) -> Option<StampedPose> {
        self.lock().back().copied()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<StampedPose>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(&self, stamp: DateTime<Utc>) -> Resolve {
        let history = self.lock();
        let (Some(oldest), Some(newest)) = (history.front(), history.back()) else {
            return Resolve::Pending;
        };
        if stamp < oldest.stamp {
            return Resolve::Failed(MapError::PoseUnavailable(format!(
                "requested {stamp} is before the oldest retained pose at {}",
                oldest.stamp
            )));
        }
        if stamp > newest.stamp {
            return Resolve::Pending;
        }
        match history.binary_search_by(|p| p.stamp.cmp(&stamp)) {
            Ok(i) => Resolve::Found(history[i].pose),
            // oldest < stamp < newest, so 0 < i < len.
            Err(i) => Resolve::Found(interpolate(&history[i - 1], &history[i], stamp)),
        }
    }
}

#[async_trait]
impl PoseResolver for PoseBuffer {
    async fn lookup(&self, stamp: DateTime<Utc>, timeout: Duration) -> Result<Pose2D, MapError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Register for wake-ups before checking, so an insert between the
            // check and the wait is not missed.
            let arrived = self.arrivals.notified();
            tokio::pin!(arrived);
            arrived.as_mut().enable();

            match self.resolve(stamp) {
                Resolve::Found(pose) => return Ok(pose),
                Resolve::Failed(err) => return Err(err),
                Resolve::Pending => {}
            }

            if tokio::time::timeout_at(deadline, arrived).await.is_err() {
                debug!(%stamp, ?timeout, "pose lookup timed out");
                return Err(MapError::PoseUnavailable(format!(
                    "no pose for {stamp} within {timeout:?}"
                )));
            }
        }
    }
}

fn interpolate(a: &StampedPose, b: &StampedPose, stamp: DateTime<Utc>) -> Pose2D {
    let span = seconds(b.stamp - a.stamp);
    let f = if span > 0.0 {
        (seconds(stamp - a.stamp) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let dh = wrap_pi(b.pose.heading_rad - a.pose.heading_rad);
    Pose2D::new(
        a.pose.x + f * (b.pose.x - a.pose.x),
        a.pose.y + f * (b.pose.y - a.pose.y),
        wrap_pi(a.pose.heading_rad + f * dh),
    )
}

fn seconds(d: chrono::Duration) -> f64 {
    match d.num_nanoseconds() {
        Some(ns) => ns as f64 * 1e-9,
        None => d.num_milliseconds() as f64 * 1e-3,
    }
}

/// Wrap an angle into `(-π, π]`.
fn wrap_pi(angle: f64) -> f64 {
    let a = (angle + PI).rem_euclid(TAU) - PI;
    if a <= -PI { a + TAU } else { a }
}
