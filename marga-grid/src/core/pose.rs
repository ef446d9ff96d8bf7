//! Robot pose representation.

use serde::{Deserialize, Serialize};

use super::math::normalize_angle;
use super::point::WorldPoint;

/// Robot pose in world coordinates (x, y, theta).
///
/// Coordinate system: ROS REP-103
/// - X: Forward (positive ahead of robot)
/// - Y: Left (positive to robot's left)
/// - Theta: Rotation angle in radians, CCW positive from +X axis
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose2D {
    /// X position in metres
    pub x: f32,
    /// Y position in metres
    pub y: f32,
    /// Orientation in radians, normalized to [-π, π]
    pub theta: f32,
}

impl Pose2D {
    /// Create a new pose with theta normalized to [-π, π].
    #[inline]
    pub fn new(x: f32, y: f32, theta: f32) -> Self {
        Self {
            x,
            y,
            theta: normalize_angle(theta),
        }
    }

    /// Identity pose at the origin with zero heading.
    #[inline]
    pub fn identity() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            theta: 0.0,
        }
    }

    /// Get the position as a WorldPoint.
    #[inline]
    pub fn position(&self) -> WorldPoint {
        WorldPoint::new(self.x, self.y)
    }

    /// Compose two poses: self ⊕ other.
    ///
    /// Applies `other` relative to `self`'s frame.
    #[inline]
    pub fn compose(&self, other: &Pose2D) -> Pose2D {
        let p = self.transform_point(other.position());
        Pose2D::new(p.x, p.y, self.theta + other.theta)
    }

    /// Inverse of this pose: the transform that undoes it.
    #[inline]
    pub fn inverse(&self) -> Pose2D {
        let (sin_t, cos_t) = self.theta.sin_cos();
        Pose2D::new(
            -self.x * cos_t - self.y * sin_t,
            self.x * sin_t - self.y * cos_t,
            -self.theta,
        )
    }

    /// Transform a point from this pose's local frame to the world frame.
    #[inline]
    pub fn transform_point(&self, point: WorldPoint) -> WorldPoint {
        let (sin_t, cos_t) = self.theta.sin_cos();
        WorldPoint::new(
            self.x + point.x * cos_t - point.y * sin_t,
            self.y + point.x * sin_t + point.y * cos_t,
        )
    }

    /// Transform a point from the world frame to this pose's local frame.
    #[inline]
    pub fn inverse_transform_point(&self, point: WorldPoint) -> WorldPoint {
        let (sin_t, cos_t) = self.theta.sin_cos();
        let dx = point.x - self.x;
        let dy = point.y - self.y;
        WorldPoint::new(dx * cos_t + dy * sin_t, -dx * sin_t + dy * cos_t)
    }
}
