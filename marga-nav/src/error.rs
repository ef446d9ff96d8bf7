//! Error types for MargaNav.

use thiserror::Error;

use marga_grid::MapError;

/// MargaNav error type.
///
/// Transient conditions (`PathNotFound`, `ControllerStalled`) surface as
/// planner state transitions during normal operation; they only appear as
/// errors on the fallible entry points. Structural conditions (`Map`,
/// `Config`) fail the operation that raised them and leave prior state
/// intact.
#[derive(Error, Debug)]
pub enum NavError {
    /// An operation that needs a map ran before any map was loaded.
    #[error("no map loaded")]
    MapUnavailable,

    /// A pose or goal landed outside the grid bounds.
    #[error("input outside map bounds: ({x:.2}, {y:.2})")]
    InputOutOfMap {
        /// World x of the offending input, metres.
        x: f32,
        /// World y of the offending input, metres.
        y: f32,
    },

    /// The search left the robot cell unreachable from the goal.
    #[error("no path from robot to goal")]
    PathNotFound,

    /// The controller could not produce a safe velocity command.
    #[error("controller could not produce a command")]
    ControllerStalled,

    /// Map construction or loading failed.
    #[error("map error: {0}")]
    Map(#[from] MapError),

    /// Configuration file could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for NavError {
    fn from(e: toml::de::Error) -> Self {
        NavError::Config(e.to_string())
    }
}

/// Result alias for navigation operations.
pub type Result<T> = std::result::Result<T, NavError>;
