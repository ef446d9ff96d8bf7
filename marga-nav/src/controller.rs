//! Waypoint-following motion controller.
//!
//! Converts the next stretch of a planned path into a bounded linear and
//! angular velocity command. Large heading errors are resolved by turning
//! in place; otherwise translation and rotation are blended. Per-tick
//! velocity deltas respect the platform's acceleration limits.

use serde::{Deserialize, Serialize};

use marga_grid::{normalize_angle, GridCoord, OccupancyGrid, Pose2D, WorldPoint};

use crate::config::{ControllerConfig, RobotConfig};
use crate::planning::CostField;

/// A velocity command: linear in m/s, angular in rad/s.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    /// Linear velocity, m/s.
    pub linear: f32,
    /// Angular velocity, rad/s.
    pub angular: f32,
}

impl Velocity {
    /// The zero command.
    #[inline]
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Outcome of a control step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControlOutcome {
    /// Drive with this command.
    Command(Velocity),
    /// The goal is reached (position and, when requested, heading).
    GoalReached,
    /// No safe command could be produced from the given path.
    Stalled,
}

/// Resolved controller parameters.
#[derive(Clone, Copy, Debug)]
pub struct ControllerParams {
    /// Maximum linear velocity, m/s.
    pub max_linear_vel: f32,
    /// Maximum angular velocity, rad/s.
    pub max_angular_vel: f32,
    /// Maximum linear acceleration, m/s².
    pub max_linear_acc: f32,
    /// Maximum angular acceleration, rad/s².
    pub max_angular_acc: f32,
    /// Proportional gain for linear control.
    pub linear_gain: f32,
    /// Proportional gain for angular control.
    pub angular_gain: f32,
    /// Heading error above which the robot turns in place, radians.
    pub rotation_threshold: f32,
    /// Goal distance tolerance, metres.
    pub goal_translation_tolerance: f32,
    /// Goal heading tolerance, radians.
    pub goal_rotation_tolerance: f32,
    /// Look-ahead distance for waypoint selection, metres.
    pub lookahead: f32,
}

impl ControllerParams {
    /// Resolve configuration against a map resolution.
    ///
    /// The look-ahead defaults to `max(2 * resolution, 0.2 m)` when the
    /// configuration does not pin it.
    pub fn resolve(robot: &RobotConfig, controller: &ControllerConfig, resolution: f32) -> Self {
        Self {
            max_linear_vel: robot.max_linear_vel,
            max_angular_vel: robot.max_angular_vel,
            max_linear_acc: robot.max_linear_acc,
            max_angular_acc: robot.max_angular_acc,
            linear_gain: controller.linear_gain,
            angular_gain: controller.angular_gain,
            rotation_threshold: controller.rotation_threshold,
            goal_translation_tolerance: controller.goal_translation_tolerance,
            goal_rotation_tolerance: controller.goal_rotation_tolerance,
            lookahead: controller
                .lookahead
                .unwrap_or_else(|| (2.0 * resolution).max(0.2)),
        }
    }
}

/// Reactive waypoint-following controller.
///
/// Stateful only in the previously commanded velocity, which anchors the
/// acceleration clamps.
#[derive(Clone, Debug)]
pub struct MotionController {
    params: ControllerParams,
    last: Velocity,
}

impl MotionController {
    /// Create a controller from resolved parameters.
    pub fn new(params: ControllerParams) -> Self {
        Self {
            params,
            last: Velocity::zero(),
        }
    }

    /// Forget the previous command, e.g. after a cancel or an emergency
    /// stop brought the robot to rest.
    pub fn reset(&mut self) {
        self.last = Velocity::zero();
    }

    /// Compute the next command along `path` (ordered robot-first).
    ///
    /// `enforce_heading` asks for terminal alignment with `goal.theta`.
    /// `dt` is the control period used for the acceleration clamps.
    pub fn control(
        &mut self,
        pose: Pose2D,
        goal: Pose2D,
        enforce_heading: bool,
        path: &[GridCoord],
        grid: &OccupancyGrid,
        field: &CostField,
        dt: f32,
    ) -> ControlOutcome {
        let p = self.params;
        let goal_dist = pose.position().distance(&goal.position());

        if goal_dist <= p.goal_translation_tolerance {
            let heading_error = normalize_angle(goal.theta - pose.theta);
            if !enforce_heading || heading_error.abs() <= p.goal_rotation_tolerance {
                self.last = Velocity::zero();
                return ControlOutcome::GoalReached;
            }
            // In position but not aligned: rotate in place onto the goal
            // heading.
            let angular = heading_error.signum()
                * (p.angular_gain * heading_error.abs()).min(p.max_angular_vel);
            return ControlOutcome::Command(self.apply_limits(0.0, angular, dt));
        }

        let Some(target) = self.select_waypoint(pose, path, grid, field) else {
            return ControlOutcome::Stalled;
        };

        let translation = pose.position().distance(&target);
        let heading = pose.position().angle_to(&target);
        let heading_error = normalize_angle(heading - pose.theta);

        let (linear, angular) = if heading_error.abs() > p.rotation_threshold {
            // Realign before translating.
            (
                0.0,
                heading_error.signum()
                    * (p.angular_gain * heading_error.abs()).min(p.max_angular_vel),
            )
        } else {
            (
                (p.linear_gain * translation).min(p.max_linear_vel) * heading_error.cos(),
                (p.angular_gain * heading_error).clamp(-p.max_angular_vel, p.max_angular_vel),
            )
        };

        ControlOutcome::Command(self.apply_limits(linear, angular, dt))
    }

    /// Pick the target the robot should steer toward.
    ///
    /// Preferred: the furthest path cell within the look-ahead whose
    /// straight segment from the robot is collision-free. Fallback: the
    /// nearest path cell ahead of the robot. `None` when neither tier
    /// yields a target; the caller stalls and leaves re-planning to the
    /// engine.
    fn select_waypoint(
        &self,
        pose: Pose2D,
        path: &[GridCoord],
        grid: &OccupancyGrid,
        field: &CostField,
    ) -> Option<WorldPoint> {
        if path.is_empty() {
            return None;
        }
        let here = pose.position();
        let robot_cell = grid.world_to_grid(here);
        let min_step = 0.5 * grid.resolution();

        let mut best: Option<WorldPoint> = None;
        let mut nearest_ahead: Option<WorldPoint> = None;
        for &cell in path {
            let target = grid.grid_to_world(cell);
            let d = here.distance(&target);
            if d <= min_step {
                continue;
            }
            if nearest_ahead.is_none() {
                nearest_ahead = Some(target);
            }
            if d > self.params.lookahead {
                break;
            }
            if field.line_of_sight(robot_cell, cell) {
                best = Some(target);
            }
        }

        best.or(nearest_ahead)
    }

    /// Clamp the command against velocity and per-tick acceleration limits
    /// and remember it for the next tick.
    fn apply_limits(&mut self, linear: f32, angular: f32, dt: f32) -> Velocity {
        let p = self.params;
        let dv = (linear - self.last.linear).clamp(-p.max_linear_acc * dt, p.max_linear_acc * dt);
        let dw = (angular - self.last.angular)
            .clamp(-p.max_angular_acc * dt, p.max_angular_acc * dt);
        self.last = Velocity {
            linear: (self.last.linear + dv).clamp(-p.max_linear_vel, p.max_linear_vel),
            angular: (self.last.angular + dw).clamp(-p.max_angular_vel, p.max_angular_vel),
        };
        self.last
    }
}
