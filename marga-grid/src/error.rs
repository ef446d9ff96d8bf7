//! Error types for MargaGrid.

use thiserror::Error;

/// Errors produced while building or loading an occupancy grid.
///
/// All of these are structural: a failed load leaves any previously loaded
/// map untouched.
#[derive(Error, Debug)]
pub enum MapError {
    /// Grid resolution must be a positive number of metres per cell.
    #[error("map resolution must be positive, got {0}")]
    InvalidResolution(f32),

    /// Occupancy thresholds must satisfy `0 <= free < occupied <= 1`.
    #[error("occupancy thresholds inverted: occupied={occupied}, free={free}")]
    InvalidThresholds {
        /// Occupied threshold from the metadata, in [0, 1].
        occupied: f32,
        /// Free threshold from the metadata, in [0, 1].
        free: f32,
    },

    /// The raster contains no cells.
    #[error("map raster is empty")]
    EmptyRaster,

    /// Raster byte count does not match `width * height`.
    #[error("raster size mismatch: expected {expected} cells, got {actual}")]
    RasterSizeMismatch {
        /// Number of cells implied by the metadata.
        expected: usize,
        /// Number of bytes actually supplied.
        actual: usize,
    },

    /// Map metadata file could not be parsed.
    #[error("malformed map metadata: {0}")]
    Metadata(String),

    /// Filesystem error while reading metadata or raster.
    #[error("map I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image raster could not be decoded.
    #[error("map image error: {0}")]
    Image(#[from] image::ImageError),
}

impl From<serde_yaml::Error> for MapError {
    fn from(e: serde_yaml::Error) -> Self {
        MapError::Metadata(e.to_string())
    }
}

/// Result alias for map operations.
pub type Result<T> = std::result::Result<T, MapError>;
