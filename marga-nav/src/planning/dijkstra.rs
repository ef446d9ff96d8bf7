//! Goal-seeded Dijkstra search over the cost field.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use marga_grid::GridCoord;

use super::cost_field::CostField;
use super::distance_map::{NEIGHBORS_8, NO_PARENT};

const SQRT_2: f32 = std::f32::consts::SQRT_2;

/// Result of the search: per-cell parent pointer and cumulative cost back
/// to the goal. Cells the wavefront never reached hold an infinite cost and
/// no parent.
#[derive(Clone, Debug)]
pub struct PathMap {
    width: usize,
    height: usize,
    parents: Vec<i32>,
    costs: Vec<f32>,
}

impl PathMap {
    /// Cumulative cost to the goal from a cell; infinite when unreachable
    /// or out of bounds.
    #[inline]
    pub fn cumulative_cost(&self, coord: GridCoord) -> f32 {
        match self.index(coord) {
            Some(i) => self.costs[i],
            None => f32::INFINITY,
        }
    }

    /// True when the goal is reachable from this cell.
    #[inline]
    pub fn is_reachable(&self, coord: GridCoord) -> bool {
        self.cumulative_cost(coord).is_finite()
    }

    /// Walk parent pointers from `from` to the goal.
    ///
    /// Returns the cell sequence ordered robot-first, goal-last, or `None`
    /// when the goal was never reached from `from`.
    pub fn extract_path(&self, from: GridCoord) -> Option<Vec<GridCoord>> {
        let start = self.index(from)?;
        if !self.costs[start].is_finite() {
            return None;
        }

        let mut path = Vec::new();
        let mut current = start;
        loop {
            path.push(GridCoord::new(
                (current % self.width) as i32,
                (current / self.width) as i32,
            ));
            let parent = self.parents[current];
            if parent == NO_PARENT || parent as usize == current {
                break;
            }
            current = parent as usize;
            if path.len() > self.costs.len() {
                // A parent cycle would be a construction bug; fail closed.
                tracing::error!("path extraction exceeded grid size, aborting");
                return None;
            }
        }
        Some(path)
    }

    #[inline]
    fn index(&self, coord: GridCoord) -> Option<usize> {
        if coord.x < 0
            || coord.y < 0
            || coord.x as usize >= self.width
            || coord.y as usize >= self.height
        {
            None
        } else {
            Some(coord.y as usize * self.width + coord.x as usize)
        }
    }
}

/// Heap entry; ordered by cumulative cost, then insertion sequence.
///
/// `BinaryHeap` is a max-heap, so comparisons are reversed. The sequence
/// tie-break makes equal-cost expansion FIFO, which keeps paths
/// reproducible run to run.
struct QueueEntry {
    cost: f32,
    seq: u64,
    index: usize,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.seq == other.seq
    }
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Run Dijkstra from the goal cell outward.
///
/// Edge cost between 8-neighbors is the step length (1 or √2 cells) times
/// the average of the two cell costs; impassable cells never enter the
/// frontier. With a uniformly zero field this degenerates to a breadth-first
/// wavefront whose parents give minimal-hop paths.
///
/// A goal that is out of bounds or impassable yields a map where nothing is
/// reachable.
pub fn search(field: &CostField, goal: GridCoord) -> PathMap {
    let width = field.width();
    let height = field.height();
    let len = width * height;

    let mut map = PathMap {
        width,
        height,
        parents: vec![NO_PARENT; len],
        costs: vec![f32::INFINITY; len],
    };

    let goal_idx = match map.index(goal) {
        Some(i) if field.cost_at(i).is_finite() => i,
        _ => {
            tracing::warn!("goal cell {:?} is off-map or impassable", goal);
            return map;
        }
    };

    let mut heap = BinaryHeap::new();
    let mut seq: u64 = 0;
    map.costs[goal_idx] = 0.0;
    map.parents[goal_idx] = goal_idx as i32;
    heap.push(QueueEntry {
        cost: 0.0,
        seq,
        index: goal_idx,
    });

    let mut expanded: usize = 0;
    while let Some(entry) = heap.pop() {
        if entry.cost > map.costs[entry.index] {
            continue; // stale
        }
        expanded += 1;

        let cx = (entry.index % width) as i32;
        let cy = (entry.index / width) as i32;
        let cell_cost = field.cost_at(entry.index);

        for (dx, dy) in NEIGHBORS_8 {
            let nx = cx + dx;
            let ny = cy + dy;
            if nx < 0 || ny < 0 || nx >= width as i32 || ny >= height as i32 {
                continue;
            }
            let nidx = ny as usize * width + nx as usize;
            let neighbor_cost = field.cost_at(nidx);
            if !neighbor_cost.is_finite() {
                continue;
            }

            let step = if dx == 0 || dy == 0 { 1.0 } else { SQRT_2 };
            let candidate = entry.cost + step * 0.5 * (cell_cost + neighbor_cost);
            if candidate < map.costs[nidx] {
                map.costs[nidx] = candidate;
                map.parents[nidx] = entry.index as i32;
                seq += 1;
                heap.push(QueueEntry {
                    cost: candidate,
                    seq,
                    index: nidx,
                });
            }
        }
    }

    tracing::trace!("dijkstra expanded {} cells from {:?}", expanded, goal);
    map
}
