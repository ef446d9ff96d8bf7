//! Per-tick dynamic obstacle overlay.
//!
//! Laser returns are stamped into working copies of the static distance map
//! and cost field, re-inflated locally, and undone at the start of the next
//! tick. Only the neighborhood of a transient obstacle is ever recomputed;
//! the static layers stay pristine.

use std::collections::VecDeque;

use marga_grid::{CellState, OccupancyGrid, Pose2D, WorldPoint};

use super::cost_field::{CostField, CostParams};
use super::distance_map::{propagate, DistanceMap};

/// Scratch overlay over the static layers.
///
/// Holds working copies of the distance map and cost field plus a journal
/// of every index the current tick modified. [`DynamicLayer::begin_tick`]
/// replays the journal against the static layers, which is cheap because a
/// laser scan only ever touches a bounded neighborhood.
#[derive(Clone, Debug)]
pub struct DynamicLayer {
    dmap: DistanceMap,
    field: CostField,
    touched: Vec<usize>,
}

impl DynamicLayer {
    /// Create an overlay as a copy of the static layers.
    pub fn new(static_dmap: &DistanceMap, static_field: &CostField) -> Self {
        Self {
            dmap: static_dmap.clone(),
            field: static_field.clone(),
            touched: Vec::new(),
        }
    }

    /// Restore every cell the previous tick touched from the static layers.
    pub fn begin_tick(&mut self, static_dmap: &DistanceMap, static_field: &CostField) {
        for &idx in &self.touched {
            self.dmap.parents[idx] = static_dmap.parents[idx];
            self.dmap.dist2[idx] = static_dmap.dist2[idx];
            self.field.costs[idx] = static_field.costs[idx];
        }
        self.touched.clear();
    }

    /// Stamp a laser scan into the overlay.
    ///
    /// Points arrive in the sensor frame and are projected through the
    /// robot pose. Points landing off the map or on unknown cells are
    /// dropped. Each surviving hit becomes a distance-0 source; the
    /// wavefront then re-inflates the neighborhood, bounded by the same
    /// truncation radius as the static transform. Returns the number of
    /// cells stamped.
    pub fn stamp_scan(
        &mut self,
        grid: &OccupancyGrid,
        robot_pose: Pose2D,
        points: &[WorldPoint],
        params: &CostParams,
    ) -> usize {
        let mut queue = VecDeque::new();
        let mut stamped = 0;
        let mut dropped = 0;

        for &point in points {
            let world = robot_pose.transform_point(point);
            let coord = grid.world_to_grid(world);
            let Some(idx) = grid.index(coord) else {
                dropped += 1;
                continue;
            };
            if grid.state_by_index(idx) == CellState::Unknown {
                dropped += 1;
                continue;
            }
            if self.dmap.dist2[idx] != 0 {
                self.dmap.dist2[idx] = 0;
                self.dmap.parents[idx] = idx as i32;
                self.touched.push(idx);
                queue.push_back(idx);
                stamped += 1;
            }
        }

        if stamped > 0 {
            let width = self.field.width();
            let height = self.field.height();
            let max_dist2 = self.dmap.max_dist2;
            propagate(
                &mut self.dmap.parents,
                &mut self.dmap.dist2,
                width,
                height,
                max_dist2,
                &mut queue,
                Some(&mut self.touched),
            );
            for i in 0..self.touched.len() {
                let idx = self.touched[i];
                self.field.costs[idx] = params.cell_cost(self.dmap.distance_cells(idx));
            }
        }

        if dropped > 0 {
            tracing::debug!("laser overlay: {} points dropped (off-map or unknown)", dropped);
        }
        stamped
    }

    /// The overlay's cost field, valid until the next `begin_tick`.
    #[inline]
    pub fn field(&self) -> &CostField {
        &self.field
    }
}
