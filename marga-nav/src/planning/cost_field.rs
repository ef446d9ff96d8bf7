//! Distance-to-cost encoding with robot radius and soft safety region.

use serde::{Deserialize, Serialize};

use marga_grid::GridCoord;

use super::distance_map::DistanceMap;

/// Decay profile of the cost ramp across the safety region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CostDecay {
    /// Straight line from `max_cost` at the robot radius down to `min_cost`
    /// at the outer edge of the safety region.
    #[default]
    Linear,
    /// Nav2-style exponential fall-off from the robot radius.
    Exponential {
        /// Decay rate in 1/cells; larger values hug obstacles tighter.
        scaling: f32,
    },
}

/// Cost-field parameters resolved to cell units.
#[derive(Clone, Copy, Debug)]
pub struct CostParams {
    /// Cost at the outer edge of the safety region.
    pub min_cost: f32,
    /// Cost at the robot-radius boundary.
    pub max_cost: f32,
    /// Robot radius in cells.
    pub robot_radius_cells: f32,
    /// Robot radius plus safety region, in cells.
    pub safe_radius_cells: f32,
    /// Ramp shape.
    pub decay: CostDecay,
}

impl CostParams {
    /// Resolve metric parameters against a grid resolution.
    pub fn from_metric(
        min_cost: f32,
        max_cost: f32,
        robot_radius_m: f32,
        safety_region_m: f32,
        resolution: f32,
        decay: CostDecay,
    ) -> Self {
        Self {
            min_cost,
            max_cost,
            robot_radius_cells: robot_radius_m / resolution,
            safe_radius_cells: (robot_radius_m + safety_region_m) / resolution,
            decay,
        }
    }

    /// Truncation radius for the distance transform, in cells. One cell of
    /// slack so the ramp's outer edge is never clipped by truncation.
    pub fn max_map_index(&self) -> i32 {
        self.safe_radius_cells.ceil() as i32 + 1
    }

    /// Cost of a cell at `distance_cells` from the nearest obstacle.
    ///
    /// Infinite inside the robot radius, monotonically non-increasing across
    /// the safety region, zero beyond it.
    pub fn cell_cost(&self, distance_cells: f32) -> f32 {
        if distance_cells <= self.robot_radius_cells {
            return f32::INFINITY;
        }
        if distance_cells >= self.safe_radius_cells {
            return 0.0;
        }
        let span = self.max_cost - self.min_cost;
        match self.decay {
            CostDecay::Linear => {
                let ratio = (self.safe_radius_cells - distance_cells)
                    / (self.safe_radius_cells - self.robot_radius_cells);
                self.min_cost + span * ratio.clamp(0.0, 1.0)
            }
            CostDecay::Exponential { scaling } => {
                let fall = (-scaling * (distance_cells - self.robot_radius_cells)).exp();
                self.min_cost + span * fall
            }
        }
    }
}

/// Per-cell traversal cost: `+∞` for obstacles (and everything within the
/// robot radius of one), a monotone ramp across the safety region, zero in
/// the open.
#[derive(Clone, Debug)]
pub struct CostField {
    width: usize,
    height: usize,
    pub(crate) costs: Vec<f32>,
}

impl CostField {
    /// Encode a distance map into a cost field.
    ///
    /// A map with no obstacle at all yields a uniform `min_cost` field: with
    /// nothing to stay clear of, every cell is equally traversable.
    pub fn from_distance_map(dmap: &DistanceMap, params: &CostParams) -> Self {
        let len = dmap.width() * dmap.height();
        let costs = if !dmap.has_sources() {
            vec![params.min_cost; len]
        } else {
            (0..len)
                .map(|i| params.cell_cost(dmap.distance_cells(i)))
                .collect()
        };
        Self {
            width: dmap.width(),
            height: dmap.height(),
            costs,
        }
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

    /// Cost at a flat index.
    #[inline]
    pub fn cost_at(&self, index: usize) -> f32 {
        self.costs[index]
    }

    /// Cost at a grid coordinate; out-of-bounds cells are impassable.
    #[inline]
    pub fn cost(&self, coord: GridCoord) -> f32 {
        if coord.x < 0
            || coord.y < 0
            || coord.x as usize >= self.width
            || coord.y as usize >= self.height
        {
            return f32::INFINITY;
        }
        self.costs[coord.y as usize * self.width + coord.x as usize]
    }

    /// True when the cell can be traversed at all.
    #[inline]
    pub fn is_traversable(&self, coord: GridCoord) -> bool {
        self.cost(coord).is_finite()
    }

    /// Check that the straight segment between two cells stays traversable.
    ///
    /// Walks Bresenham's line and fails on the first impassable cell.
    pub fn line_of_sight(&self, from: GridCoord, to: GridCoord) -> bool {
        let mut x0 = from.x;
        let mut y0 = from.y;
        let x1 = to.x;
        let y1 = to.y;

        let dx = (x1 - x0).abs();
        let dy = (y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx - dy;

        loop {
            if !self.is_traversable(GridCoord::new(x0, y0)) {
                return false;
            }
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 > -dy {
                err -= dy;
                x0 += sx;
            }
            if e2 < dx {
                err += dx;
                y0 += sy;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use marga_grid::{OccupancyGrid, Pose2D};

    fn params(decay: CostDecay) -> CostParams {
        // 0.2 m radius + 0.4 m safety at 0.05 m/cell: 4 and 12 cells.
        CostParams::from_metric(0.0, 100.0, 0.2, 0.4, 0.05, decay)
    }

    #[test]
    fn zones_of_the_ramp() {
        let p = params(CostDecay::Linear);
        assert!(p.cell_cost(0.0).is_infinite());
        assert!(p.cell_cost(4.0).is_infinite());
        assert_relative_eq!(p.cell_cost(12.0), 0.0);
        assert_relative_eq!(p.cell_cost(20.0), 0.0);
        assert_relative_eq!(p.cell_cost(8.0), 50.0, epsilon = 1e-3);
        assert!(p.cell_cost(f32::INFINITY) == 0.0);
    }

    #[test]
    fn cost_is_monotone_in_distance() {
        for decay in [CostDecay::Linear, CostDecay::Exponential { scaling: 0.5 }] {
            let p = params(decay);
            let mut last = f32::INFINITY;
            let mut d = 0.0f32;
            while d <= 14.0 {
                let c = p.cell_cost(d);
                assert!(
                    c <= last,
                    "cost increased at d={} with {:?}: {} > {}",
                    d,
                    decay,
                    c,
                    last
                );
                last = c;
                d += 0.25;
            }
        }
    }

    #[test]
    fn obstacle_free_map_is_uniform_min_cost() {
        let grid = OccupancyGrid::new(10, 10, 0.05, Pose2D::identity(), 0.65, 0.196).unwrap();
        let p = CostParams::from_metric(7.0, 100.0, 0.2, 0.4, 0.05, CostDecay::Linear);
        let dmap = DistanceMap::build(&grid, p.max_map_index());
        let field = CostField::from_distance_map(&dmap, &p);
        for i in 0..100 {
            assert_relative_eq!(field.cost_at(i), 7.0);
        }
    }

    #[test]
    fn obstacles_are_inflated() {
        let mut grid =
            OccupancyGrid::new(30, 30, 0.05, Pose2D::identity(), 0.65, 0.196).unwrap();
        grid.set_occupancy(GridCoord::new(15, 15), 255);
        let p = params(CostDecay::Linear);
        let dmap = DistanceMap::build(&grid, p.max_map_index());
        let field = CostField::from_distance_map(&dmap, &p);

        // Within the robot radius: impassable.
        assert!(!field.is_traversable(GridCoord::new(15, 15)));
        assert!(!field.is_traversable(GridCoord::new(18, 15)));
        // Safety region: finite, positive.
        let c = field.cost(GridCoord::new(22, 15));
        assert!(c.is_finite() && c > 0.0);
        // Open space.
        assert_relative_eq!(field.cost(GridCoord::new(1, 1)), 0.0);
    }

    #[test]
    fn out_of_bounds_is_impassable() {
        let grid = OccupancyGrid::new(5, 5, 0.05, Pose2D::identity(), 0.65, 0.196).unwrap();
        let p = params(CostDecay::Linear);
        let dmap = DistanceMap::build(&grid, p.max_map_index());
        let field = CostField::from_distance_map(&dmap, &p);
        assert!(!field.is_traversable(GridCoord::new(-1, 0)));
        assert!(!field.is_traversable(GridCoord::new(5, 0)));
    }

    #[test]
    fn line_of_sight_blocked_by_obstacles() {
        let mut grid =
            OccupancyGrid::new(30, 30, 0.05, Pose2D::identity(), 0.65, 0.196).unwrap();
        for y in 0..30 {
            grid.set_occupancy(GridCoord::new(15, y), 255);
        }
        let p = params(CostDecay::Linear);
        let dmap = DistanceMap::build(&grid, p.max_map_index());
        let field = CostField::from_distance_map(&dmap, &p);

        assert!(field.line_of_sight(GridCoord::new(1, 1), GridCoord::new(1, 28)));
        assert!(!field.line_of_sight(GridCoord::new(1, 15), GridCoord::new(28, 15)));
    }

    #[test]
    fn static_layer_is_idempotent() {
        let mut grid =
            OccupancyGrid::new(25, 25, 0.05, Pose2D::identity(), 0.65, 0.196).unwrap();
        for x in 5..20 {
            grid.set_occupancy(GridCoord::new(x, 12), 255);
        }
        let p = params(CostDecay::Linear);

        let a = CostField::from_distance_map(&DistanceMap::build(&grid, p.max_map_index()), &p);
        let b = CostField::from_distance_map(&DistanceMap::build(&grid, p.max_map_index()), &p);
        assert_eq!(a.costs, b.costs);
    }
}
