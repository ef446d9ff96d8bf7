//! ROS `map_server` style map loading: YAML metadata plus image raster.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::Pose2D;
use crate::error::{MapError, Result};

use super::occupancy::OccupancyGrid;

const DEFAULT_OCCUPIED_THRESH: f32 = 0.65;
const DEFAULT_FREE_THRESH: f32 = 0.196;

#[derive(Debug, Deserialize)]
struct MapMetadata {
    image: String,
    resolution: f32,
    origin: [f32; 3],
    #[serde(default = "default_occupied_thresh")]
    occupied_thresh: f32,
    #[serde(default = "default_free_thresh")]
    free_thresh: f32,
    #[serde(default = "default_negate")]
    negate: Negate,
}

/// `negate` appears in the wild both as a bool and as 0/1.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Negate {
    Bool(bool),
    Int(i32),
}

impl Negate {
    fn is_negated(&self) -> bool {
        match self {
            Self::Bool(value) => *value,
            Self::Int(value) => *value != 0,
        }
    }
}

fn default_negate() -> Negate {
    Negate::Int(0)
}

fn default_occupied_thresh() -> f32 {
    DEFAULT_OCCUPIED_THRESH
}

fn default_free_thresh() -> f32 {
    DEFAULT_FREE_THRESH
}

/// Load an occupancy grid from a YAML metadata file.
///
/// The metadata names the raster image (relative paths resolve against the
/// YAML's directory), the resolution, the world pose of the bottom-left
/// pixel, the occupancy thresholds and the `negate` flag. Pixel shade maps
/// to occupancy probability: dark pixels are occupied unless `negate` is
/// set. The raster's top row becomes the grid's highest row.
pub fn load_occupancy_grid(yaml_path: impl AsRef<Path>) -> Result<OccupancyGrid> {
    let yaml_path = yaml_path.as_ref();
    let yaml_str = std::fs::read_to_string(yaml_path)?;
    let metadata: MapMetadata = serde_yaml::from_str(&yaml_str)?;

    let image_path = resolve_image_path(yaml_path, &metadata.image);
    tracing::info!(
        "loading map raster {:?} (resolution {} m/cell)",
        image_path,
        metadata.resolution
    );

    let image = image::open(&image_path)?;
    let gray = image.into_luma8();
    let (width, height) = gray.dimensions();
    let (width, height) = (width as usize, height as usize);
    if width == 0 || height == 0 {
        return Err(MapError::EmptyRaster);
    }

    let negate = metadata.negate.is_negated();
    let raw = gray.as_raw();
    let mut data = vec![0u8; width * height];
    for y in 0..height {
        // Image row 0 is the top of the map; grid row 0 is the bottom.
        let grid_row = (height - 1 - y) * width;
        let src_row = y * width;
        for x in 0..width {
            let shade = raw[src_row + x] as f32 / 255.0;
            let occ = if negate { shade } else { 1.0 - shade };
            data[grid_row + x] = (occ * 255.0).round() as u8;
        }
    }

    let origin = Pose2D::new(
        metadata.origin[0],
        metadata.origin[1],
        metadata.origin[2],
    );
    OccupancyGrid::from_raster(
        data,
        width,
        height,
        metadata.resolution,
        origin,
        metadata.occupied_thresh,
        metadata.free_thresh,
    )
}

fn resolve_image_path(yaml_path: &Path, image_ref: &str) -> PathBuf {
    let image_path = PathBuf::from(image_ref);
    if image_path.is_absolute() {
        return image_path;
    }
    match yaml_path.parent() {
        Some(parent) => parent.join(image_path),
        None => image_path,
    }
}
