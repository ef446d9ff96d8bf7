//! Headless planner runner.
//!
//! Loads a map, accepts a goal on the command line and drives a simulated
//! unicycle robot with the planner's velocity commands until the goal is
//! reached. Useful for exercising the full pipeline without a robot:
//!
//! ```text
//! marga-nav maps/office.yaml --goal 4.5,2.0
//! RUST_LOG=debug marga-nav maps/office.yaml --goal 4.5,2.0,1.57 --start 0.5,0.5,0
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{info, warn};

use marga_grid::{Pose2D, WorldPoint};
use marga_nav::{CommandSink, NavConfig, NavError, Planner, PlannerState, Result, Velocity};

/// Headless path-planner runner with a simulated robot.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Map metadata file (YAML referencing the raster image)
    map: PathBuf,

    /// Configuration file path (TOML); defaults are used when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Goal as "x,y" or "x,y,theta" in metres/radians
    #[arg(short, long)]
    goal: String,

    /// Start pose of the simulated robot as "x,y,theta"
    #[arg(short, long, default_value = "0.5,0.5,0.0")]
    start: String,

    /// Give up after this many seconds of simulated time
    #[arg(long, default_value = "120.0")]
    timeout: f32,

    /// Run the simulation as fast as possible instead of in real time
    #[arg(long)]
    fast: bool,
}

/// Sink that hands the planner's commands to the simulated drive.
struct SimDrive {
    command: Arc<Mutex<Velocity>>,
}

impl CommandSink for SimDrive {
    fn send_velocity(&mut self, velocity: Velocity) {
        if let Ok(mut guard) = self.command.lock() {
            *guard = velocity;
        }
    }
}

fn parse_components(text: &str, what: &str) -> Result<Vec<f32>> {
    text.split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|e| NavError::Config(format!("bad {} component '{}': {}", what, part, e)))
        })
        .collect()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("marga_nav=info".parse().map_err(|e| {
                    NavError::Config(format!("bad log directive: {}", e))
                })?),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            info!("loading configuration from {:?}", path);
            NavConfig::load(path)?
        }
        None => NavConfig::default(),
    };
    info!(
        "clearance: {:.2} m robot radius + {:.2} m safety region",
        config.planner.robot_radius, config.planner.safety_region
    );

    let goal = parse_components(&args.goal, "goal")?;
    let (goal_point, goal_heading) = match goal.as_slice() {
        [x, y] => (WorldPoint::new(*x, *y), None),
        [x, y, theta] => (WorldPoint::new(*x, *y), Some(*theta)),
        _ => {
            return Err(NavError::Config(
                "goal must be 'x,y' or 'x,y,theta'".into(),
            ))
        }
    };
    let start = parse_components(&args.start, "start")?;
    let [x, y, theta] = start.as_slice() else {
        return Err(NavError::Config("start must be 'x,y,theta'".into()));
    };
    let mut pose = Pose2D::new(*x, *y, *theta);

    let dt = config.controller.control_period;
    let command: Arc<Mutex<Velocity>> = Arc::default();

    let planner = Planner::new(config);
    planner.set_sink(Box::new(SimDrive {
        command: Arc::clone(&command),
    }));
    planner.load_map(&args.map)?;
    planner.set_robot_pose(pose)?;
    planner.set_goal(goal_point, goal_heading)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .map_err(|e| NavError::Config(format!("failed to install signal handler: {}", e)))?;

    info!(
        "driving from ({:.2}, {:.2}) to ({:.2}, {:.2})",
        pose.x, pose.y, goal_point.x, goal_point.y
    );

    let mut elapsed = 0.0f32;
    let mut last_report = Instant::now();
    while running.load(Ordering::SeqCst) {
        let state = planner.planner_step();

        // Integrate the unicycle model with the commanded velocities.
        let v = match command.lock() {
            Ok(guard) => *guard,
            Err(_) => Velocity::zero(),
        };
        pose = Pose2D::new(
            pose.x + v.linear * pose.theta.cos() * dt,
            pose.y + v.linear * pose.theta.sin() * dt,
            pose.theta + v.angular * dt,
        );
        // An off-map pose is logged by the engine; keep the last good one.
        let _ = planner.set_robot_pose(pose);

        if state == PlannerState::GoalReached {
            info!("goal reached after {:.1} s", elapsed);
            return Ok(());
        }
        if last_report.elapsed() > Duration::from_secs(2) {
            let status = planner.execution_status();
            info!(
                "state {:?}, {:.2} m remaining, pose ({:.2}, {:.2}, {:.2})",
                status.state, status.remaining_distance, pose.x, pose.y, pose.theta
            );
            last_report = Instant::now();
        }

        elapsed += dt;
        if elapsed > args.timeout {
            warn!("timed out after {:.1} s in state {:?}", elapsed, planner.state());
            return Err(NavError::PathNotFound);
        }
        if !args.fast {
            std::thread::sleep(Duration::from_secs_f32(dt));
        }
    }

    planner.cancel_goal();
    info!("interrupted, goal cancelled");
    Ok(())
}
