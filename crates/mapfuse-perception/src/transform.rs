//! 3-D orientation helpers for planar mapping.
//!
//! Pose sources usually publish a full rigid-body transform (translation +
//! unit quaternion).  The mapper only needs the heading about the vertical
//! axis, so [`Quaternion::yaw`] extracts it and [`Quaternion::from_yaw`]
//! builds the matching pure-yaw rotation.
//!
//! # Example
//!
//! ```rust
//! use mapfuse_perception::transform::{Quaternion, Vec3, planar_pose};
//!
//! let q = Quaternion::from_yaw(0.75);
//! let pose = planar_pose(Vec3::new(1.0, -2.0, 0.3), q);
//! assert!((pose.heading_rad - 0.75).abs() < 1e-9);
//! assert_eq!(pose.x, 1.0);
//! ```

use mapfuse_types::Pose2D;

/// A 3-D translation vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// A rotation quaternion (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Pure rotation of `yaw_rad` about +Z.
    pub fn from_yaw(yaw_rad: f64) -> Self {
        let (s, c) = (yaw_rad * 0.5).sin_cos();
        Self::new(c, 0.0, 0.0, s)
    }

    /// Scale to unit length.  A zero quaternion becomes the identity.
    pub fn normalized(self) -> Self {
        let n = (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt();
        if n == 0.0 || !n.is_finite() {
            return Self::identity();
        }
        Self::new(self.w / n, self.x / n, self.y / n, self.z / n)
    }

    /// Heading about +Z in `(-π, π]`, from the ZYX (yaw-pitch-roll)
    /// decomposition.
    pub fn yaw(self) -> f64 {
        let q = self.normalized();
        let siny_cosp = 2.0 * (q.w * q.z + q.x * q.y);
        let cosy_cosp = 1.0 - 2.0 * (q.y * q.y + q.z * q.z);
        siny_cosp.atan2(cosy_cosp)
    }
}

/// Heading about +Z of the rotation `(w, x, y, z)`, in `(-π, π]`.
pub fn yaw_from_quaternion(w: f64, x: f64, y: f64, z: f64) -> f64 {
    Quaternion::new(w, x, y, z).yaw()
}

/// Project a rigid-body transform onto the map plane.
pub fn planar_pose(translation: Vec3, rotation: Quaternion) -> Pose2D {
    Pose2D::new(translation.x, translation.y, rotation.yaw())
}
