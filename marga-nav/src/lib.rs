//! # MargaNav
//!
//! Grid path planner and motion controller for differential-drive robots.
//!
//! ## Overview
//!
//! Given an occupancy grid, a live robot pose, a goal and the latest laser
//! scan, the planner continuously produces a collision-free path and the
//! velocity command that drives the robot along it:
//!
//! 1. A truncated Euclidean distance transform and a cost field encode the
//!    robot radius and a soft safety region around every obstacle
//! 2. A per-tick overlay stamps laser returns into the cost field and
//!    re-inflates them locally
//! 3. A goal-seeded Dijkstra search produces parent pointers and cumulative
//!    costs; the path falls out by walking parents from the robot cell
//! 4. A waypoint-following controller turns the path into bounded
//!    linear/angular velocities
//!
//! The [`Planner`] engine coordinates the four under asynchronous inputs
//! behind a single mutex and an external periodic tick.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use marga_grid::{Pose2D, WorldPoint};
//! use marga_nav::{NavConfig, Planner, PlannerState};
//!
//! let planner = Planner::new(NavConfig::default());
//! planner.load_map("maps/office.yaml")?;
//! planner.set_robot_pose(Pose2D::new(0.5, 0.5, 0.0))?;
//! planner.set_goal(WorldPoint::new(4.5, 2.0), None)?;
//!
//! loop {
//!     match planner.planner_step() {
//!         PlannerState::GoalReached => break,
//!         _ => apply(planner.velocities()),
//!     }
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod planning;

pub use config::NavConfig;
pub use controller::{ControlOutcome, MotionController, Velocity};
pub use engine::{CommandSink, ExecutionStatus, Planner, PlannerState};
pub use error::{NavError, Result};
