//! The pose-resolver seam.
//!
//! The mapping pipeline never talks to a transform service directly.  It asks
//! a [`PoseResolver`] "where was the agent at time T?" and treats any error as
//! "no pose for this frame".  Implementations:
//!
//! - [`PoseBuffer`][crate::pose_buffer::PoseBuffer] – in-process time-indexed
//!   pose history with interpolation and a bounded wait.
//! - Test fakes in the runtime crate that return canned poses or time out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mapfuse_types::{MapError, Pose2D};

/// Resolve the agent's planar pose at an instant.
///
/// # Contract
///
/// * Wait at most `timeout` for the answer.  The call is the only suspension
///   point of the mapping pipeline, so it must not block past the deadline.
/// * Return `Err` (conventionally [`MapError::PoseUnavailable`]) for every
///   failure, including timeouts.  Callers do not inspect the reason.
#[async_trait]
pub trait PoseResolver: Send + Sync {
    async fn lookup(&self, stamp: DateTime<Utc>, timeout: Duration) -> Result<Pose2D, MapError>;
}

#[async_trait]
impl<T: PoseResolver + ?Sized> PoseResolver for Arc<T> {
    async fn lookup(&self, stamp: DateTime<Utc>, timeout: Duration) -> Result<Pose2D, MapError> {
        (**self).lookup(stamp, timeout).await
    }
}
