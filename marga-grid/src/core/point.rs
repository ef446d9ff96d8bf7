//! Point and coordinate types for the occupancy grid.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// Grid coordinates (integer cell indices)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridCoord {
    /// X coordinate (column index)
    pub x: i32,
    /// Y coordinate (row index, row 0 at the map bottom)
    pub y: i32,
}

impl GridCoord {
    /// Create a new grid coordinate
    #[inline]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another coordinate, in cells².
    ///
    /// Exact: cell indices are integers, so no rounding is involved.
    #[inline]
    pub fn distance_squared(&self, other: &GridCoord) -> i32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Chebyshev distance (max of x and y distance) - used for 8-connected grids
    #[inline]
    pub fn chebyshev_distance(&self, other: &GridCoord) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// Get the 8 neighbors (including diagonals)
    #[inline]
    pub fn neighbors_8(&self) -> [GridCoord; 8] {
        [
            GridCoord::new(self.x, self.y + 1),     // N
            GridCoord::new(self.x + 1, self.y + 1), // NE
            GridCoord::new(self.x + 1, self.y),     // E
            GridCoord::new(self.x + 1, self.y - 1), // SE
            GridCoord::new(self.x, self.y - 1),     // S
            GridCoord::new(self.x - 1, self.y - 1), // SW
            GridCoord::new(self.x - 1, self.y),     // W
            GridCoord::new(self.x - 1, self.y + 1), // NW
        ]
    }

    /// True when `other` is one of this cell's 8 neighbors.
    #[inline]
    pub fn is_neighbor_8(&self, other: &GridCoord) -> bool {
        *self != *other && self.chebyshev_distance(other) <= 1
    }
}

impl Add for GridCoord {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        GridCoord::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for GridCoord {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        GridCoord::new(self.x - other.x, self.y - other.y)
    }
}

/// World coordinates (metres, f32)
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPoint {
    /// X coordinate in metres (forward in ROS convention)
    pub x: f32,
    /// Y coordinate in metres (left in ROS convention)
    pub y: f32,
}

impl WorldPoint {
    /// Zero point (origin)
    pub const ZERO: WorldPoint = WorldPoint { x: 0.0, y: 0.0 };

    /// Create a new world point
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    #[inline]
    pub fn distance(&self, other: &WorldPoint) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Squared distance (faster, avoids sqrt)
    #[inline]
    pub fn distance_squared(&self, other: &WorldPoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Angle from this point to another (radians, CCW from +X)
    #[inline]
    pub fn angle_to(&self, other: &WorldPoint) -> f32 {
        (other.y - self.y).atan2(other.x - self.x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn world_point_distance() {
        let a = WorldPoint::new(0.0, 0.0);
        let b = WorldPoint::new(3.0, 4.0);
        assert_relative_eq!(a.distance(&b), 5.0);
        assert_relative_eq!(a.distance_squared(&b), 25.0);
    }

    #[test]
    fn grid_coord_distances() {
        let a = GridCoord::new(2, 3);
        let b = GridCoord::new(5, -1);
        assert_eq!(a.distance_squared(&b), 25);
        assert_eq!(a.chebyshev_distance(&b), 4);
    }

    #[test]
    fn grid_coord_neighbors() {
        let c = GridCoord::new(0, 0);
        for n in c.neighbors_8() {
            assert!(c.is_neighbor_8(&n));
        }
        assert!(!c.is_neighbor_8(&c));
        assert!(!c.is_neighbor_8(&GridCoord::new(2, 0)));
    }
}
