//! Planner engine: lifecycle, input snapshotting and the per-tick pipeline.
//!
//! The engine is driven by an external periodic tick ([`Planner::planner_step`]).
//! Each tick rebuilds the dynamic obstacle overlay from the latest scan,
//! re-runs the goal-seeded search and asks the controller for the next
//! velocity command.
//!
//! ## Locking
//!
//! A single mutex guards the mutable input snapshot (map layers, pose,
//! goal, laser, state) together with the published outputs. Setters hold it
//! only long enough to store a value; `planner_step` takes it once at entry
//! to copy the snapshot in and once near exit to copy results out, so the
//! heavy computation never blocks producers. A second, tick-private mutex
//! serializes `planner_step` itself (it is not reentrant) and protects the
//! scratch structures that are reused between ticks.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use marga_grid::{load_occupancy_grid, GridCoord, OccupancyGrid, Pose2D, WorldPoint};
use serde::Serialize;

use crate::config::NavConfig;
use crate::controller::{ControlOutcome, ControllerParams, MotionController, Velocity};
use crate::error::{NavError, Result};
use crate::planning::{search, CostField, CostParams, DistanceMap, DynamicLayer};

/// Lifecycle state of the planner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PlannerState {
    /// No map yet; ticks are no-ops.
    WaitingForMap,
    /// Map loaded, no goal.
    WaitingForGoal,
    /// Goal accepted, not yet planned to.
    GoalAccepted,
    /// Last tick produced a path and a command.
    PathFound,
    /// Last tick could not connect robot and goal.
    PathNotFound,
    /// The controller reported the goal reached.
    GoalReached,
}

/// Structured progress report.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct ExecutionStatus {
    /// Current lifecycle state.
    pub state: PlannerState,
    /// Remaining path length to the goal, metres. Zero when no path is
    /// active.
    pub remaining_distance: f32,
}

/// Receiver of the engine's outputs.
///
/// The engine never names a transport: adapters (ROS bridges, simulators,
/// loggers) implement this and are handed in at construction. Calls happen
/// under the engine's input lock and must not block.
pub trait CommandSink: Send {
    /// Receive the velocity command of a tick (also zero commands emitted
    /// on cancel, reset and goal arrival).
    fn send_velocity(&mut self, velocity: Velocity);

    /// Observe a state change. Default: ignore.
    fn send_state(&mut self, _state: PlannerState) {}
}

/// Static layers derived from one map: rebuilt on map load or when a cost
/// parameter changes, immutable afterwards and shared by reference with the
/// tick.
struct StaticLayers {
    grid: Arc<OccupancyGrid>,
    params: CostParams,
    dmap: DistanceMap,
    field: CostField,
    controller_params: ControllerParams,
}

/// A goal in both world and grid representation. Only the goal setter
/// constructs these, which keeps the two in lockstep.
#[derive(Clone, Copy, Debug)]
struct GoalInput {
    pose: Pose2D,
    cell: GridCoord,
    has_heading: bool,
}

/// Everything behind the input mutex.
struct Shared {
    layers: Option<Arc<StaticLayers>>,
    pose: Option<Pose2D>,
    goal: Option<GoalInput>,
    laser: Vec<WorldPoint>,
    state: PlannerState,
    velocity: Velocity,
    path: Vec<WorldPoint>,
    remaining: f32,
    sink: Option<Box<dyn CommandSink>>,
    last_oob: Option<(u32, u32)>,
}

impl Shared {
    /// Publish a velocity to the sink and remember it.
    fn emit_velocity(&mut self, velocity: Velocity) {
        self.velocity = velocity;
        if let Some(sink) = self.sink.as_mut() {
            sink.send_velocity(velocity);
        }
    }

    fn enter_state(&mut self, state: PlannerState) {
        if self.state != state {
            tracing::info!("planner state: {:?} -> {:?}", self.state, state);
            self.state = state;
            if let Some(sink) = self.sink.as_mut() {
                sink.send_state(state);
            }
        }
    }

    /// Warn about an off-map input, at most once per distinct value.
    fn warn_out_of_map(&mut self, what: &str, p: WorldPoint) {
        let key = (p.x.to_bits(), p.y.to_bits());
        if self.last_oob != Some(key) {
            self.last_oob = Some(key);
            tracing::warn!("{} outside map bounds: ({:.2}, {:.2})", what, p.x, p.y);
        }
    }
}

/// Per-tick scratch, reused between ticks and rebuilt when the static
/// layers change.
struct Scratch {
    layers_tag: usize,
    dynamic: Option<DynamicLayer>,
    controller: Option<MotionController>,
}

/// The planner engine.
///
/// All methods take `&self`; the engine is safe to share behind an `Arc`
/// with setters and readers running on other threads than the tick.
pub struct Planner {
    config: NavConfig,
    shared: Mutex<Shared>,
    scratch: Mutex<Scratch>,
}

impl Planner {
    /// Create an engine with no map, no goal and no sink.
    pub fn new(config: NavConfig) -> Self {
        Self {
            config,
            shared: Mutex::new(Shared {
                layers: None,
                pose: None,
                goal: None,
                laser: Vec::new(),
                state: PlannerState::WaitingForMap,
                velocity: Velocity::zero(),
                path: Vec::new(),
                remaining: 0.0,
                sink: None,
                last_oob: None,
            }),
            scratch: Mutex::new(Scratch {
                layers_tag: 0,
                dynamic: None,
                controller: None,
            }),
        }
    }

    /// Attach the output sink.
    pub fn set_sink(&self, sink: Box<dyn CommandSink>) {
        self.shared().sink = Some(sink);
    }

    /// Read a YAML map-metadata file and install the map.
    ///
    /// A failed load leaves any previously installed map untouched.
    pub fn load_map(&self, path: impl AsRef<Path>) -> Result<()> {
        let grid = load_occupancy_grid(path)?;
        self.set_map(grid);
        Ok(())
    }

    /// Install a map and rebuild the static layers.
    ///
    /// The distance transform and cost field are computed before the input
    /// lock is taken, so producers are never stalled behind the rebuild. A
    /// pending goal survives when it still lies on the new map.
    pub fn set_map(&self, grid: OccupancyGrid) {
        let layers = self.build_layers(grid);
        tracing::info!(
            "map installed: {}x{} cells at {} m/cell",
            layers.grid.width(),
            layers.grid.height(),
            layers.grid.resolution()
        );

        let mut shared = self.shared();
        // Re-anchor a pending goal on the new map; drop it when it falls off.
        let goal = shared.goal.take().and_then(|g| {
            let cell = layers.grid.world_to_grid(g.pose.position());
            if layers.grid.in_bounds(cell) {
                Some(GoalInput { cell, ..g })
            } else {
                tracing::warn!("goal dropped: off the newly loaded map");
                None
            }
        });
        shared.goal = goal;
        shared.layers = Some(Arc::new(layers));
        shared.path.clear();
        shared.remaining = 0.0;
        shared.emit_velocity(Velocity::zero());
        match shared.goal {
            Some(_) => shared.enter_state(PlannerState::GoalAccepted),
            None => shared.enter_state(PlannerState::WaitingForGoal),
        }
    }

    /// Update the robot pose (world frame).
    ///
    /// With a map installed, an off-map pose is reported once per distinct
    /// value and otherwise treated as no input.
    pub fn set_robot_pose(&self, pose: Pose2D) -> Result<()> {
        let mut shared = self.shared();
        if let Some(layers) = shared.layers.clone() {
            let cell = layers.grid.world_to_grid(pose.position());
            if !layers.grid.in_bounds(cell) {
                shared.warn_out_of_map("robot pose", pose.position());
                return Err(NavError::InputOutOfMap {
                    x: pose.x,
                    y: pose.y,
                });
            }
        }
        shared.pose = Some(pose);
        Ok(())
    }

    /// Set a goal position, optionally with a terminal heading.
    ///
    /// Requires a map; the goal must lie on it. Accepting a goal moves the
    /// planner to `GoalAccepted` regardless of its previous state.
    pub fn set_goal(&self, position: WorldPoint, heading: Option<f32>) -> Result<()> {
        let mut shared = self.shared();
        let Some(layers) = shared.layers.clone() else {
            return Err(NavError::MapUnavailable);
        };
        let cell = layers.grid.world_to_grid(position);
        if !layers.grid.in_bounds(cell) {
            shared.warn_out_of_map("goal", position);
            return Err(NavError::InputOutOfMap {
                x: position.x,
                y: position.y,
            });
        }

        tracing::info!(
            "goal accepted: ({:.2}, {:.2}){}",
            position.x,
            position.y,
            heading.map_or(String::new(), |t| format!(" heading {:.2} rad", t))
        );
        shared.goal = Some(GoalInput {
            pose: Pose2D::new(position.x, position.y, heading.unwrap_or(0.0)),
            cell,
            has_heading: heading.is_some(),
        });
        shared.path.clear();
        shared.remaining = 0.0;
        shared.enter_state(PlannerState::GoalAccepted);
        Ok(())
    }

    /// Replace the current laser scan (points in the sensor frame).
    pub fn set_laser_points(&self, points: Vec<WorldPoint>) {
        self.shared().laser = points;
    }

    /// Abandon the current goal: zero velocity, path cleared, back to
    /// `WaitingForGoal` (or `WaitingForMap` when no map is installed).
    pub fn cancel_goal(&self) {
        let mut shared = self.shared();
        shared.goal = None;
        shared.path.clear();
        shared.remaining = 0.0;
        shared.emit_velocity(Velocity::zero());
        let next = if shared.layers.is_some() {
            PlannerState::WaitingForGoal
        } else {
            PlannerState::WaitingForMap
        };
        shared.enter_state(next);
    }

    /// Drop everything but the configuration.
    pub fn reset(&self) {
        {
            let mut shared = self.shared();
            shared.layers = None;
            shared.pose = None;
            shared.goal = None;
            shared.laser.clear();
            shared.path.clear();
            shared.remaining = 0.0;
            shared.last_oob = None;
            shared.emit_velocity(Velocity::zero());
            shared.enter_state(PlannerState::WaitingForMap);
        }
        let mut scratch = self.lock_scratch();
        scratch.layers_tag = 0;
        scratch.dynamic = None;
        scratch.controller = None;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PlannerState {
        self.shared().state
    }

    /// Latest velocity command. Defined (possibly non-zero) only in
    /// `PathFound`; zero in every other state.
    pub fn velocities(&self) -> Velocity {
        let shared = self.shared();
        match shared.state {
            PlannerState::PathFound | PlannerState::GoalReached => shared.velocity,
            _ => Velocity::zero(),
        }
    }

    /// Latest path in world coordinates, robot-first.
    pub fn path(&self) -> Vec<WorldPoint> {
        self.shared().path.clone()
    }

    /// Progress report: state plus remaining path length.
    pub fn execution_status(&self) -> ExecutionStatus {
        let shared = self.shared();
        ExecutionStatus {
            state: shared.state,
            remaining_distance: shared.remaining,
        }
    }

    /// Run one planning tick.
    ///
    /// No-op (state unchanged) unless a map, a pose and a goal are all
    /// present, both pose and goal lie on the map, and the planner is in a
    /// state with an active goal. Results computed against a snapshot that
    /// a concurrent `cancel_goal`/`reset`/`set_map` superseded are
    /// discarded.
    pub fn planner_step(&self) -> PlannerState {
        // Serialize ticks; scratch survives between them.
        let mut scratch = self.lock_scratch();

        // Copy the input snapshot in.
        let (layers, pose, goal, laser, entry_state) = {
            let shared = self.shared();
            (
                shared.layers.clone(),
                shared.pose,
                shared.goal,
                shared.laser.clone(),
                shared.state,
            )
        };

        // Consistency gate.
        let Some(layers) = layers else {
            tracing::debug!("tick skipped: {}", NavError::MapUnavailable);
            return entry_state;
        };
        let (Some(pose), Some(goal)) = (pose, goal) else {
            return entry_state;
        };
        if !matches!(
            entry_state,
            PlannerState::GoalAccepted | PlannerState::PathFound | PlannerState::PathNotFound
        ) {
            return entry_state;
        }
        let robot_cell = layers.grid.world_to_grid(pose.position());
        if !layers.grid.in_bounds(robot_cell) || !layers.grid.in_bounds(goal.cell) {
            return entry_state;
        }

        // Rebind scratch to the current layers if the map changed.
        let tag = Arc::as_ptr(&layers) as usize;
        if scratch.layers_tag != tag || scratch.dynamic.is_none() {
            scratch.dynamic = Some(DynamicLayer::new(&layers.dmap, &layers.field));
            scratch.controller = Some(MotionController::new(layers.controller_params));
            scratch.layers_tag = tag;
        }
        let Scratch {
            dynamic: Some(dynamic),
            controller: Some(controller),
            ..
        } = &mut *scratch
        else {
            return entry_state;
        };

        // Overlay the scan, then search from the goal.
        dynamic.begin_tick(&layers.dmap, &layers.field);
        dynamic.stamp_scan(&layers.grid, pose, &laser, &layers.params);
        let path_map = search(dynamic.field(), goal.cell);

        let mut velocity = Velocity::zero();
        let mut path_world: Vec<WorldPoint> = Vec::new();
        let new_state = match path_map.extract_path(robot_cell) {
            None => {
                tracing::debug!("tick: {}", NavError::PathNotFound);
                controller.reset();
                PlannerState::PathNotFound
            }
            Some(cells) => {
                path_world = cells.iter().map(|&c| layers.grid.grid_to_world(c)).collect();
                match controller.control(
                    pose,
                    goal.pose,
                    goal.has_heading,
                    &cells,
                    &layers.grid,
                    dynamic.field(),
                    self.config.controller.control_period,
                ) {
                    ControlOutcome::GoalReached
                        if matches!(
                            entry_state,
                            PlannerState::GoalAccepted | PlannerState::PathFound
                        ) =>
                    {
                        tracing::info!("goal reached");
                        path_world.clear();
                        PlannerState::GoalReached
                    }
                    ControlOutcome::GoalReached => {
                        // Entered from PathNotFound: the goal only just
                        // became reachable again. Report the path this
                        // tick; the completion lands on the next one.
                        PlannerState::PathFound
                    }
                    ControlOutcome::Command(v) => {
                        velocity = v;
                        PlannerState::PathFound
                    }
                    ControlOutcome::Stalled => {
                        tracing::warn!("tick: {}", NavError::ControllerStalled);
                        controller.reset();
                        PlannerState::PathNotFound
                    }
                }
            }
        };
        let remaining = remaining_distance(pose, &path_world);

        // Copy the results out, unless the world moved on beneath us.
        let mut shared = self.shared();
        let superseded = shared.goal.is_none()
            || !matches!(
                shared.state,
                PlannerState::GoalAccepted | PlannerState::PathFound | PlannerState::PathNotFound
            )
            || shared
                .layers
                .as_ref()
                .map_or(true, |l| !Arc::ptr_eq(l, &layers));
        if superseded {
            tracing::debug!("tick result discarded: inputs changed during computation");
            return shared.state;
        }
        shared.path = path_world;
        shared.remaining = remaining;
        shared.emit_velocity(velocity);
        shared.enter_state(new_state);
        shared.state
    }

    /// Derive the static layers for a freshly installed map.
    fn build_layers(&self, grid: OccupancyGrid) -> StaticLayers {
        let p = &self.config.planner;
        let params = CostParams::from_metric(
            p.min_cost,
            p.max_cost,
            p.robot_radius,
            p.safety_region,
            grid.resolution(),
            p.decay,
        );
        let dmap = DistanceMap::build(&grid, params.max_map_index());
        let field = CostField::from_distance_map(&dmap, &params);
        let controller_params = ControllerParams::resolve(
            &self.config.robot,
            &self.config.controller,
            grid.resolution(),
        );
        StaticLayers {
            grid: Arc::new(grid),
            params,
            dmap,
            field,
            controller_params,
        }
    }

    fn shared(&self) -> MutexGuard<'_, Shared> {
        match self.shared.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_scratch(&self) -> MutexGuard<'_, Scratch> {
        match self.scratch.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Length of the polyline from the robot through the remaining path.
fn remaining_distance(pose: Pose2D, path: &[WorldPoint]) -> f32 {
    let Some(first) = path.first() else {
        return 0.0;
    };
    let mut total = pose.position().distance(first);
    for pair in path.windows(2) {
        total += pair[0].distance(&pair[1]);
    }
    total
}
