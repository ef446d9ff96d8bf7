//! Occupancy grid with cached world↔grid transforms.

use serde::{Deserialize, Serialize};

use crate::core::{GridCoord, Pose2D, WorldPoint};
use crate::error::{MapError, Result};

/// Trinary classification of a grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellState {
    /// Occupancy below the free threshold.
    Free,
    /// Occupancy above the occupied threshold.
    Occupied,
    /// Between the thresholds, or never observed.
    Unknown,
}

/// Occupancy grid: a byte raster plus the metadata that anchors it in the
/// world.
///
/// Each cell stores an occupancy probability scaled to `[0, 255]`. Row 0 is
/// the *bottom* row of the map. Two anchor poses are kept:
///
/// - `origin`: world pose of cell (0, 0), the bottom-left cell. This is the
///   pose map metadata files specify.
/// - `image_origin`: world pose of cell (0, height-1), the top-left cell as
///   seen in the source raster.
///
/// Both inverse transforms are cached so forward projection
/// (`world_to_grid`) is a single rigid transform plus a scale.
#[derive(Clone, Debug)]
pub struct OccupancyGrid {
    data: Vec<u8>,
    width: usize,
    height: usize,
    resolution: f32,
    inv_resolution: f32,
    origin: Pose2D,
    origin_inv: Pose2D,
    image_origin: Pose2D,
    image_origin_inv: Pose2D,
    occupied_thresh: f32,
    free_thresh: f32,
    occupied_byte: u8,
    free_byte: u8,
}

impl OccupancyGrid {
    /// Create an all-free grid.
    pub fn new(
        width: usize,
        height: usize,
        resolution: f32,
        origin: Pose2D,
        occupied_thresh: f32,
        free_thresh: f32,
    ) -> Result<Self> {
        Self::from_raster(
            vec![0; width * height],
            width,
            height,
            resolution,
            origin,
            occupied_thresh,
            free_thresh,
        )
    }

    /// Create a grid from an existing raster (row 0 = bottom row).
    pub fn from_raster(
        data: Vec<u8>,
        width: usize,
        height: usize,
        resolution: f32,
        origin: Pose2D,
        occupied_thresh: f32,
        free_thresh: f32,
    ) -> Result<Self> {
        if !(resolution > 0.0) {
            return Err(MapError::InvalidResolution(resolution));
        }
        if width == 0 || height == 0 {
            return Err(MapError::EmptyRaster);
        }
        if data.len() != width * height {
            return Err(MapError::RasterSizeMismatch {
                expected: width * height,
                actual: data.len(),
            });
        }
        if !(0.0..=1.0).contains(&free_thresh)
            || !(0.0..=1.0).contains(&occupied_thresh)
            || occupied_thresh <= free_thresh
        {
            return Err(MapError::InvalidThresholds {
                occupied: occupied_thresh,
                free: free_thresh,
            });
        }

        // Top-left cell sits (height-1) rows above the origin, same heading.
        let image_origin =
            origin.compose(&Pose2D::new(0.0, (height - 1) as f32 * resolution, 0.0));

        Ok(Self {
            data,
            width,
            height,
            resolution,
            inv_resolution: 1.0 / resolution,
            origin,
            origin_inv: origin.inverse(),
            image_origin,
            image_origin_inv: image_origin.inverse(),
            occupied_thresh,
            free_thresh,
            occupied_byte: (occupied_thresh * 255.0).round() as u8,
            free_byte: (free_thresh * 255.0).round() as u8,
        })
    }

    /// Grid width in cells.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid height in cells.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Total number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the grid has no cells. Construction rejects this, so a
    /// built grid always returns false.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Resolution in metres per cell.
    #[inline]
    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    /// World pose of the bottom-left cell.
    #[inline]
    pub fn origin(&self) -> Pose2D {
        self.origin
    }

    /// World pose of the top-left cell (row `height - 1`).
    #[inline]
    pub fn image_origin(&self) -> Pose2D {
        self.image_origin
    }

    /// Occupied threshold in [0, 1].
    #[inline]
    pub fn occupied_thresh(&self) -> f32 {
        self.occupied_thresh
    }

    /// Free threshold in [0, 1].
    #[inline]
    pub fn free_thresh(&self) -> f32 {
        self.free_thresh
    }

    /// True when `coord` addresses a cell of this grid.
    #[inline]
    pub fn in_bounds(&self, coord: GridCoord) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && (coord.x as usize) < self.width
            && (coord.y as usize) < self.height
    }

    /// Flat index of a cell, or `None` when out of bounds.
    #[inline]
    pub fn index(&self, coord: GridCoord) -> Option<usize> {
        if self.in_bounds(coord) {
            Some(coord.y as usize * self.width + coord.x as usize)
        } else {
            None
        }
    }

    /// Grid coordinate of a flat index.
    #[inline]
    pub fn coord(&self, index: usize) -> GridCoord {
        GridCoord::new((index % self.width) as i32, (index / self.width) as i32)
    }

    /// Occupancy byte of a cell, or `None` when out of bounds.
    #[inline]
    pub fn occupancy(&self, coord: GridCoord) -> Option<u8> {
        self.index(coord).map(|i| self.data[i])
    }

    /// Trinary state of a cell, or `None` when out of bounds.
    #[inline]
    pub fn state(&self, coord: GridCoord) -> Option<CellState> {
        self.occupancy(coord).map(|v| self.classify(v))
    }

    /// Trinary state by flat index. The index must come from [`Self::index`].
    #[inline]
    pub fn state_by_index(&self, index: usize) -> CellState {
        self.classify(self.data[index])
    }

    #[inline]
    fn classify(&self, value: u8) -> CellState {
        if value >= self.occupied_byte {
            CellState::Occupied
        } else if value <= self.free_byte {
            CellState::Free
        } else {
            CellState::Unknown
        }
    }

    /// Overwrite a cell's occupancy byte. Returns false when out of bounds.
    pub fn set_occupancy(&mut self, coord: GridCoord, value: u8) -> bool {
        match self.index(coord) {
            Some(i) => {
                self.data[i] = value;
                true
            }
            None => false,
        }
    }

    /// Project a world point onto the grid, rounding to the nearest cell.
    ///
    /// The result is *not* bounds-checked: callers decide whether an
    /// off-grid result is an error or simply discarded.
    #[inline]
    pub fn world_to_grid(&self, point: WorldPoint) -> GridCoord {
        let local = self.origin_inv.transform_point(point);
        GridCoord::new(
            (local.x * self.inv_resolution).round() as i32,
            (local.y * self.inv_resolution).round() as i32,
        )
    }

    /// World position of a cell's centre.
    #[inline]
    pub fn grid_to_world(&self, coord: GridCoord) -> WorldPoint {
        self.origin.transform_point(WorldPoint::new(
            coord.x as f32 * self.resolution,
            coord.y as f32 * self.resolution,
        ))
    }

    /// Project a world point into image-raster coordinates (top-left anchor,
    /// y growing downward).
    #[inline]
    pub fn world_to_image(&self, point: WorldPoint) -> GridCoord {
        let local = self.image_origin_inv.transform_point(point);
        GridCoord::new(
            (local.x * self.inv_resolution).round() as i32,
            (-local.y * self.inv_resolution).round() as i32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    fn grid(origin: Pose2D) -> OccupancyGrid {
        OccupancyGrid::new(40, 30, 0.05, origin, 0.65, 0.196).unwrap()
    }

    #[test]
    fn world_grid_roundtrip_axis_aligned() {
        let g = grid(Pose2D::new(-1.0, 2.0, 0.0));
        for &c in &[
            GridCoord::new(0, 0),
            GridCoord::new(39, 29),
            GridCoord::new(7, 13),
        ] {
            assert_eq!(g.world_to_grid(g.grid_to_world(c)), c);
        }
    }

    #[test]
    fn world_grid_roundtrip_rotated_origin() {
        let g = grid(Pose2D::new(0.3, -0.4, FRAC_PI_2));
        for &c in &[GridCoord::new(1, 1), GridCoord::new(20, 5)] {
            assert_eq!(g.world_to_grid(g.grid_to_world(c)), c);
        }
    }

    #[test]
    fn origin_cell_maps_to_origin_position() {
        let origin = Pose2D::new(1.5, -2.5, 0.0);
        let g = grid(origin);
        let p = g.grid_to_world(GridCoord::new(0, 0));
        assert_relative_eq!(p.x, origin.x);
        assert_relative_eq!(p.y, origin.y);
    }

    #[test]
    fn image_origin_is_top_left_cell() {
        let g = grid(Pose2D::new(0.0, 0.0, 0.0));
        let top_left = g.grid_to_world(GridCoord::new(0, 29));
        assert_relative_eq!(g.image_origin().x, top_left.x, epsilon = 1e-5);
        assert_relative_eq!(g.image_origin().y, top_left.y, epsilon = 1e-5);
        // Top-left cell is pixel (0, 0) of the source raster.
        let px = g.world_to_image(top_left);
        assert_eq!(px, GridCoord::new(0, 0));
    }

    #[test]
    fn classification_uses_thresholds() {
        let mut g = grid(Pose2D::identity());
        let c = GridCoord::new(3, 3);
        g.set_occupancy(c, 255);
        assert_eq!(g.state(c), Some(CellState::Occupied));
        g.set_occupancy(c, 0);
        assert_eq!(g.state(c), Some(CellState::Free));
        g.set_occupancy(c, 128);
        assert_eq!(g.state(c), Some(CellState::Unknown));
    }

    #[test]
    fn out_of_bounds_access_is_none() {
        let g = grid(Pose2D::identity());
        assert_eq!(g.state(GridCoord::new(-1, 0)), None);
        assert_eq!(g.state(GridCoord::new(0, 30)), None);
        assert_eq!(g.occupancy(GridCoord::new(40, 0)), None);
    }

    #[test]
    fn rejects_malformed_metadata() {
        assert!(matches!(
            OccupancyGrid::new(10, 10, 0.0, Pose2D::identity(), 0.65, 0.196),
            Err(MapError::InvalidResolution(_))
        ));
        assert!(matches!(
            OccupancyGrid::new(10, 10, 0.05, Pose2D::identity(), 0.1, 0.65),
            Err(MapError::InvalidThresholds { .. })
        ));
        assert!(matches!(
            OccupancyGrid::new(0, 10, 0.05, Pose2D::identity(), 0.65, 0.196),
            Err(MapError::EmptyRaster)
        ));
        assert!(matches!(
            OccupancyGrid::from_raster(
                vec![0; 5],
                10,
                10,
                0.05,
                Pose2D::identity(),
                0.65,
                0.196
            ),
            Err(MapError::RasterSizeMismatch { .. })
        ));
    }
}
