//! End-to-end planner scenarios on synthetic maps.
//!
//! Each scenario wires a hand-built occupancy grid into the engine and
//! drives it through ticks the way an adapter would: set inputs, tick,
//! observe state, velocities and path.
//!
//! Run with: `cargo test --test scenarios`

use marga_grid::{normalize_angle, GridCoord, OccupancyGrid, Pose2D, WorldPoint};
use marga_nav::{NavConfig, Planner, PlannerState, Velocity};
use std::f32::consts::FRAC_PI_2;

const RES: f32 = 0.05;

fn open_grid(width: usize, height: usize) -> OccupancyGrid {
    OccupancyGrid::new(width, height, RES, Pose2D::identity(), 0.65, 0.196).unwrap()
}

fn planner_with(grid: OccupancyGrid) -> Planner {
    let planner = Planner::new(NavConfig::default());
    planner.set_map(grid);
    planner
}

/// 5 m corridor, free space end to end.
fn corridor() -> Planner {
    planner_with(open_grid(100, 10))
}

/// Simulate the robot following the planner's commands for up to
/// `max_ticks`. Returns the states visited and the final pose.
fn drive(
    planner: &Planner,
    mut pose: Pose2D,
    max_ticks: usize,
) -> (Vec<PlannerState>, Pose2D, Vec<Velocity>) {
    let config = NavConfig::default();
    let dt = config.controller.control_period;
    let mut states = Vec::new();
    let mut commands = Vec::new();

    for _ in 0..max_ticks {
        let state = planner.planner_step();
        states.push(state);
        if state == PlannerState::GoalReached {
            break;
        }
        let v = planner.velocities();
        commands.push(v);
        pose = Pose2D::new(
            pose.x + v.linear * pose.theta.cos() * dt,
            pose.y + v.linear * pose.theta.sin() * dt,
            pose.theta + v.angular * dt,
        );
        planner.set_robot_pose(pose).unwrap();
    }
    (states, pose, commands)
}

#[test]
fn s1_empty_corridor() {
    let planner = corridor();
    planner.set_robot_pose(Pose2D::new(0.5, 0.25, 0.0)).unwrap();
    planner.set_goal(WorldPoint::new(4.5, 0.25), None).unwrap();

    assert_eq!(planner.planner_step(), PlannerState::PathFound);

    // Straight run down the corridor: one cell per 5 cm, about 80 of them.
    let path = planner.path();
    assert!(
        (75..=90).contains(&path.len()),
        "unexpected path length {}",
        path.len()
    );
    for p in &path {
        assert!((p.y - 0.25).abs() < 0.15, "path strays from the row: {:?}", p);
    }

    // Velocity ramps up to the cap and the heading stays level.
    let mut last = Velocity::zero();
    for _ in 0..30 {
        planner.planner_step();
        last = planner.velocities();
    }
    let config = NavConfig::default();
    assert!(last.linear > 0.9 * config.robot.max_linear_vel);
    assert!(last.angular.abs() < 0.05);
}

#[test]
fn s2_obstacle_detour() {
    // 3 m x 2.5 m room with a column from the floor edge up to y = 2 m.
    let mut grid = open_grid(60, 50);
    for y in 0..=40 {
        grid.set_occupancy(GridCoord::new(30, y), 255);
    }
    let planner = planner_with(grid);
    planner.set_robot_pose(Pose2D::new(0.5, 1.0, 0.0)).unwrap();
    planner.set_goal(WorldPoint::new(2.5, 1.0), None).unwrap();

    assert_eq!(planner.planner_step(), PlannerState::PathFound);
    let path = planner.path();

    // The only way around is over the top of the column.
    assert!(path.iter().any(|p| p.y > 2.0), "path never cleared the column");

    // Full robot-radius clearance from every column cell.
    for p in &path {
        for y in 0..=40 {
            let column = WorldPoint::new(1.5, y as f32 * RES);
            assert!(
                p.distance(&column) > 0.2,
                "path point {:?} within robot radius of column",
                p
            );
        }
    }
}

#[test]
fn s3_unreachable_goal() {
    // Robot enclosed by a square wall; goal outside the enclosure.
    let mut grid = open_grid(40, 40);
    for i in 8..=31 {
        grid.set_occupancy(GridCoord::new(i, 8), 255);
        grid.set_occupancy(GridCoord::new(i, 31), 255);
        grid.set_occupancy(GridCoord::new(8, i), 255);
        grid.set_occupancy(GridCoord::new(31, i), 255);
    }
    let planner = planner_with(grid);
    planner.set_robot_pose(Pose2D::new(1.0, 1.0, 0.0)).unwrap();
    planner.set_goal(WorldPoint::new(0.15, 0.15), None).unwrap();

    assert_eq!(planner.planner_step(), PlannerState::PathNotFound);
    assert_eq!(planner.velocities(), Velocity::zero());
    assert!(planner.path().is_empty());
}

#[test]
fn s4_dynamic_obstacle_appears() {
    let planner = corridor();
    let pose = Pose2D::new(0.5, 0.25, 0.0);
    planner.set_robot_pose(pose).unwrap();
    planner.set_goal(WorldPoint::new(4.5, 0.25), None).unwrap();
    assert_eq!(planner.planner_step(), PlannerState::PathFound);

    // A wall of laser returns across the corridor at x = 2 m, handed to the
    // planner in the sensor frame.
    let wall: Vec<WorldPoint> = (1..10)
        .map(|y| pose.inverse_transform_point(WorldPoint::new(2.0, y as f32 * RES)))
        .collect();
    planner.set_laser_points(wall);

    // The corridor is too narrow to route around: next tick must stop.
    assert_eq!(planner.planner_step(), PlannerState::PathNotFound);
    assert_eq!(planner.velocities(), Velocity::zero());

    // The overlay is transient: with the scan gone the static layer is
    // restored and the path comes back.
    planner.set_laser_points(Vec::new());
    assert_eq!(planner.planner_step(), PlannerState::PathFound);
}

#[test]
fn s5_goal_reached_with_heading() {
    let planner = planner_with(open_grid(60, 60));
    let start = Pose2D::new(0.3, 1.0, 0.0);
    planner.set_robot_pose(start).unwrap();
    planner
        .set_goal(WorldPoint::new(1.0, 1.0), Some(FRAC_PI_2))
        .unwrap();
    assert_eq!(planner.state(), PlannerState::GoalAccepted);

    let (states, pose, commands) = drive(&planner, start, 4000);

    assert_eq!(*states.last().unwrap(), PlannerState::GoalReached);
    assert!(states.contains(&PlannerState::PathFound));

    // Terminal alignment within tolerance, robot at rest.
    let config = NavConfig::default();
    let heading_error = normalize_angle(FRAC_PI_2 - pose.theta).abs();
    assert!(
        heading_error <= config.controller.goal_rotation_tolerance + 1e-3,
        "terminal heading error {}",
        heading_error
    );
    assert_eq!(planner.velocities(), Velocity::zero());

    // Every command respected the kinematic envelope.
    let mut prev = Velocity::zero();
    let dt = config.controller.control_period;
    for v in commands {
        assert!(v.linear.abs() <= config.robot.max_linear_vel + 1e-5);
        assert!(v.angular.abs() <= config.robot.max_angular_vel + 1e-5);
        assert!((v.linear - prev.linear).abs() <= config.robot.max_linear_acc * dt + 1e-5);
        assert!((v.angular - prev.angular).abs() <= config.robot.max_angular_acc * dt + 1e-5);
        prev = v;
    }
}

#[test]
fn s6_cancel_during_motion() {
    let planner = corridor();
    planner.set_robot_pose(Pose2D::new(0.5, 0.25, 0.0)).unwrap();
    planner.set_goal(WorldPoint::new(4.5, 0.25), None).unwrap();

    for _ in 0..3 {
        assert_eq!(planner.planner_step(), PlannerState::PathFound);
    }
    assert!(planner.velocities().linear > 0.0);

    planner.cancel_goal();
    assert_eq!(planner.state(), PlannerState::WaitingForGoal);
    assert_eq!(planner.velocities(), Velocity::zero());

    // Idle until a new goal arrives.
    for _ in 0..5 {
        assert_eq!(planner.planner_step(), PlannerState::WaitingForGoal);
        assert_eq!(planner.velocities(), Velocity::zero());
    }

    planner.set_goal(WorldPoint::new(4.5, 0.25), None).unwrap();
    assert_eq!(planner.planner_step(), PlannerState::PathFound);
}

#[test]
fn static_layers_identical_for_identical_maps() {
    // Same bytes in, same plan out: tick twice against two installs of the
    // same map and compare the resulting paths.
    let build = || {
        let mut grid = open_grid(50, 50);
        for x in 10..40 {
            grid.set_occupancy(GridCoord::new(x, 25), 255);
        }
        grid
    };

    let run = |grid: OccupancyGrid| {
        let planner = planner_with(grid);
        planner.set_robot_pose(Pose2D::new(0.5, 0.5, 0.0)).unwrap();
        planner.set_goal(WorldPoint::new(2.0, 2.2), None).unwrap();
        planner.planner_step();
        planner.path()
    };

    assert_eq!(run(build()), run(build()));
}
