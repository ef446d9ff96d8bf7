//! Configuration loading for MargaNav.

use std::path::Path;

use serde::Deserialize;

use crate::error::{NavError, Result};
use crate::planning::CostDecay;

/// Main configuration structure.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NavConfig {
    /// Cost-field parameters.
    #[serde(default)]
    pub planner: PlannerConfig,
    /// Kinematic limits of the platform.
    #[serde(default)]
    pub robot: RobotConfig,
    /// Waypoint-following controller parameters.
    #[serde(default)]
    pub controller: ControllerConfig,
}

/// Cost-field parameters.
#[derive(Clone, Debug, Deserialize)]
pub struct PlannerConfig {
    /// Traversal cost at the outer edge of the safety region.
    #[serde(default = "default_min_cost")]
    pub min_cost: f32,

    /// Traversal cost at the robot-radius boundary.
    #[serde(default = "default_max_cost")]
    pub max_cost: f32,

    /// Robot radius in metres. Cells closer than this to an obstacle are
    /// impassable.
    #[serde(default = "default_robot_radius")]
    pub robot_radius: f32,

    /// Width of the soft safety region beyond the robot radius, metres.
    #[serde(default = "default_safety_region")]
    pub safety_region: f32,

    /// Decay profile of the cost ramp across the safety region.
    #[serde(default)]
    pub decay: CostDecay,
}

/// Robot kinematic limits.
#[derive(Clone, Debug, Deserialize)]
pub struct RobotConfig {
    /// Maximum linear velocity in m/s.
    #[serde(default = "default_max_linear_vel")]
    pub max_linear_vel: f32,

    /// Maximum angular velocity in rad/s.
    #[serde(default = "default_max_angular_vel")]
    pub max_angular_vel: f32,

    /// Maximum linear acceleration in m/s².
    #[serde(default = "default_max_linear_acc")]
    pub max_linear_acc: f32,

    /// Maximum angular acceleration in rad/s².
    #[serde(default = "default_max_angular_acc")]
    pub max_angular_acc: f32,
}

/// Motion controller parameters.
#[derive(Clone, Debug, Deserialize)]
pub struct ControllerConfig {
    /// Distance tolerance for reaching the goal (metres).
    #[serde(default = "default_goal_translation_tolerance")]
    pub goal_translation_tolerance: f32,

    /// Heading tolerance for reaching a goal with orientation (radians).
    #[serde(default = "default_goal_rotation_tolerance")]
    pub goal_rotation_tolerance: f32,

    /// Proportional gain for linear control.
    #[serde(default = "default_linear_gain")]
    pub linear_gain: f32,

    /// Proportional gain for angular control.
    #[serde(default = "default_angular_gain")]
    pub angular_gain: f32,

    /// Heading error above which the robot turns in place (radians).
    #[serde(default = "default_rotation_threshold")]
    pub rotation_threshold: f32,

    /// Look-ahead distance for waypoint selection (metres). When absent it
    /// is resolved against the map as `max(2 * resolution, 0.2)`.
    #[serde(default)]
    pub lookahead: Option<f32>,

    /// Control period in seconds; bounds per-tick velocity deltas.
    #[serde(default = "default_control_period")]
    pub control_period: f32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            min_cost: default_min_cost(),
            max_cost: default_max_cost(),
            robot_radius: default_robot_radius(),
            safety_region: default_safety_region(),
            decay: CostDecay::default(),
        }
    }
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            max_linear_vel: default_max_linear_vel(),
            max_angular_vel: default_max_angular_vel(),
            max_linear_acc: default_max_linear_acc(),
            max_angular_acc: default_max_angular_acc(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            goal_translation_tolerance: default_goal_translation_tolerance(),
            goal_rotation_tolerance: default_goal_rotation_tolerance(),
            linear_gain: default_linear_gain(),
            angular_gain: default_angular_gain(),
            rotation_threshold: default_rotation_threshold(),
            lookahead: None,
            control_period: default_control_period(),
        }
    }
}

// Default value functions
fn default_min_cost() -> f32 {
    0.0
}
fn default_max_cost() -> f32 {
    100.0
}
fn default_robot_radius() -> f32 {
    0.2
}
fn default_safety_region() -> f32 {
    0.4
}
fn default_max_linear_vel() -> f32 {
    0.3
}
fn default_max_angular_vel() -> f32 {
    1.0
}
fn default_max_linear_acc() -> f32 {
    0.5
}
fn default_max_angular_acc() -> f32 {
    2.0
}
fn default_goal_translation_tolerance() -> f32 {
    0.1
}
fn default_goal_rotation_tolerance() -> f32 {
    0.2
}
fn default_linear_gain() -> f32 {
    2.0
}
fn default_angular_gain() -> f32 {
    2.0
}
fn default_rotation_threshold() -> f32 {
    0.8
}
fn default_control_period() -> f32 {
    0.05
}

impl NavConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NavError::Config(format!("failed to read config file: {}", e)))?;
        let config: NavConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check parameter invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let p = &self.planner;
        if !(p.min_cost >= 0.0 && p.max_cost >= p.min_cost && p.max_cost.is_finite()) {
            return Err(NavError::Config(format!(
                "cost range invalid: min={}, max={}",
                p.min_cost, p.max_cost
            )));
        }
        if p.robot_radius < 0.0 || p.safety_region < 0.0 {
            return Err(NavError::Config(
                "robot_radius and safety_region must be non-negative".into(),
            ));
        }
        if self.controller.control_period <= 0.0 {
            return Err(NavError::Config("control_period must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        NavConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: NavConfig = toml::from_str(
            "[planner]\nrobot_radius = 0.3\n\n[robot]\nmax_linear_vel = 0.5\n",
        )
        .unwrap();
        assert_eq!(config.planner.robot_radius, 0.3);
        assert_eq!(config.planner.max_cost, 100.0);
        assert_eq!(config.robot.max_linear_vel, 0.5);
        assert_eq!(config.robot.max_angular_vel, 1.0);
    }

    #[test]
    fn inverted_cost_range_rejected() {
        let config: NavConfig =
            toml::from_str("[planner]\nmin_cost = 50.0\nmax_cost = 10.0\n").unwrap();
        assert!(config.validate().is_err());
    }
}
