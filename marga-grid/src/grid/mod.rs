//! Occupancy grid storage and map loading.

mod loader;
mod occupancy;

pub use loader::load_occupancy_grid;
pub use occupancy::{CellState, OccupancyGrid};
