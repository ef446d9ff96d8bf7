//! Truncated Euclidean distance transform with nearest-obstacle parents.

use std::collections::VecDeque;

use marga_grid::{CellState, GridCoord, OccupancyGrid};

/// Parent value of a cell no wavefront has reached.
pub(crate) const NO_PARENT: i32 = -1;

/// Squared distance of a cell no wavefront has reached.
pub(crate) const UNREACHED: i32 = i32::MAX;

/// 8-connected neighborhood offsets, cardinals first.
///
/// The order matters for tie-breaking: with a FIFO frontier, expanding
/// straight moves before diagonal ones keeps equal-cost parent chains
/// axis-aligned instead of zigzagging.
pub(crate) const NEIGHBORS_8: [(i32, i32); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (1, -1),
    (-1, 1),
    (1, 1),
];

/// Per-cell distance to the nearest occupied cell, truncated at a maximum
/// radius.
///
/// Each cell records the flat index of its nearest occupied cell (its
/// *parent*) and the exact squared Euclidean distance to it, in cells².
/// Squared distances between integer cell coordinates are integers, so the
/// transform is exact up to the truncation radius.
///
/// Unknown cells seed the transform alongside occupied ones: a cell the map
/// has no information about is kept out of reach of the robot.
#[derive(Clone, Debug)]
pub struct DistanceMap {
    width: usize,
    height: usize,
    pub(crate) parents: Vec<i32>,
    pub(crate) dist2: Vec<i32>,
    pub(crate) max_dist2: i32,
    seeded: bool,
}

impl DistanceMap {
    /// Build the distance map of an occupancy grid, truncated at
    /// `max_index` cells.
    pub fn build(grid: &OccupancyGrid, max_index: i32) -> Self {
        let width = grid.width();
        let height = grid.height();
        let len = width * height;

        let mut parents = vec![NO_PARENT; len];
        let mut dist2 = vec![UNREACHED; len];
        let mut queue = VecDeque::new();

        for idx in 0..len {
            match grid.state_by_index(idx) {
                CellState::Occupied | CellState::Unknown => {
                    parents[idx] = idx as i32;
                    dist2[idx] = 0;
                    queue.push_back(idx);
                }
                CellState::Free => {}
            }
        }

        let seeded = !queue.is_empty();
        let max_dist2 = max_index.saturating_mul(max_index);
        propagate(
            &mut parents,
            &mut dist2,
            width,
            height,
            max_dist2,
            &mut queue,
            None,
        );

        tracing::debug!(
            "distance map built: {}x{} cells, seeded={}, truncation={} cells",
            width,
            height,
            seeded,
            max_index
        );

        Self {
            width,
            height,
            parents,
            dist2,
            max_dist2,
            seeded,
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

    /// True when the source grid contained at least one occupied or unknown
    /// cell.
    #[inline]
    pub fn has_sources(&self) -> bool {
        self.seeded
    }

    /// Squared distance in cells² at a flat index, or `None` beyond the
    /// truncation radius.
    #[inline]
    pub fn distance_squared(&self, index: usize) -> Option<i32> {
        match self.dist2[index] {
            UNREACHED => None,
            d => Some(d),
        }
    }

    /// Distance in cells at a flat index; infinite beyond truncation.
    #[inline]
    pub fn distance_cells(&self, index: usize) -> f32 {
        match self.dist2[index] {
            UNREACHED => f32::INFINITY,
            d => (d as f32).sqrt(),
        }
    }

    /// Flat index of the nearest occupied cell, when within truncation.
    #[inline]
    pub fn parent(&self, index: usize) -> Option<usize> {
        match self.parents[index] {
            NO_PARENT => None,
            p => Some(p as usize),
        }
    }
}

/// Multi-source wavefront relaxation.
///
/// Pops cells off the queue and offers each 8-neighbor the exact squared
/// distance to the popped cell's parent. A neighbor is updated (and
/// re-queued) only when the candidate is strictly lower than what it holds
/// and within the truncation bound, so ties keep the incumbent parent and
/// the loop terminates. `touched` collects every updated index when given.
pub(crate) fn propagate(
    parents: &mut [i32],
    dist2: &mut [i32],
    width: usize,
    height: usize,
    max_dist2: i32,
    queue: &mut VecDeque<usize>,
    mut touched: Option<&mut Vec<usize>>,
) {
    while let Some(idx) = queue.pop_front() {
        let parent = parents[idx];
        if parent < 0 {
            continue;
        }
        let px = (parent as usize % width) as i32;
        let py = (parent as usize / width) as i32;
        let cx = (idx % width) as i32;
        let cy = (idx / width) as i32;

        for (dx, dy) in NEIGHBORS_8 {
            let nx = cx + dx;
            let ny = cy + dy;
            if nx < 0 || ny < 0 || nx >= width as i32 || ny >= height as i32 {
                continue;
            }
            let nidx = ny as usize * width + nx as usize;

            let ddx = nx - px;
            let ddy = ny - py;
            let candidate = ddx * ddx + ddy * ddy;
            if candidate < dist2[nidx] && candidate <= max_dist2 {
                dist2[nidx] = candidate;
                parents[nidx] = parent;
                if let Some(t) = touched.as_deref_mut() {
                    t.push(nidx);
                }
                queue.push_back(nidx);
            }
        }
    }
}
