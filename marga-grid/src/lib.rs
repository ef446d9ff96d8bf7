//! # MargaGrid
//!
//! 2D occupancy grid and geometry core for the Marga navigation stack.
//!
//! ## Overview
//!
//! MargaGrid provides the map-side building blocks the planner operates on:
//!
//! - **Geometry**: [`WorldPoint`] (metres), [`GridCoord`] (cell indices) and
//!   [`Pose2D`] with rigid 2D frame transforms
//! - **Occupancy grid**: byte raster with trinary classification
//!   (free / occupied / unknown) and cached world↔grid transforms
//! - **Map loader**: ROS `map_server` style YAML metadata plus image raster
//!
//! ## Coordinate System
//!
//! Uses ROS REP-103 convention:
//! - X: Forward (positive ahead of robot)
//! - Y: Left (positive to robot's left)
//! - Theta: Rotation in radians, CCW positive from +X axis
//!
//! Grid row 0 is the *bottom* row of the map; the loader flips image rasters
//! (which store the top row first) on the way in. The grid keeps two anchor
//! poses: the map origin (world pose of the bottom-left cell, the one map
//! metadata files specify) and the image origin (world pose of the top-left
//! cell, useful when projecting back onto the source raster).

#![warn(missing_docs)]

pub mod core;
pub mod error;
pub mod grid;

pub use crate::core::{normalize_angle, GridCoord, Pose2D, WorldPoint};
pub use crate::error::MapError;
pub use crate::grid::{load_occupancy_grid, CellState, OccupancyGrid};
