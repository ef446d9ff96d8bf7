//! Path planning over an occupancy grid.
//!
//! This module provides the planning pipeline, leaves first:
//! - Truncated Euclidean distance transform with nearest-obstacle parents
//! - Cost field encoding robot radius and a soft safety region
//! - Per-tick dynamic obstacle overlay fed by laser points
//! - Goal-seeded Dijkstra search with path extraction

mod cost_field;
mod dijkstra;
mod distance_map;
mod dynamic_layer;

pub use cost_field::{CostDecay, CostField, CostParams};
pub use dijkstra::{search, PathMap};
pub use distance_map::DistanceMap;
pub use dynamic_layer::DynamicLayer;
