mod scene;

use clap::Parser;
use eyre::Result;
use mecanum_sim_lib::{init_tracing, LaserScan, MecanumRobot, Odometry, OccupancyMap};
use scene::SceneConfig;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "sim_node")]
#[command(about = "Run the mecanum robot simulator and print telemetry as JSON lines")]
struct Cli {
    /// Scene file: robot config, start pose, map and obstacles
    #[arg(short, long, default_value = "config/robot.toml")]
    config: String,

    /// Total run time in seconds
    #[arg(short, long, default_value_t = 5.0)]
    duration: f64,

    /// Body-frame velocity command (m/s, m/s, rad/s)
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    vx: f64,
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    vy: f64,
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    omega: f64,

    /// How long the command keeps being refreshed before the operator goes
    /// quiet and the watchdog takes over (s)
    #[arg(long, default_value_t = 2.0)]
    command_for: f64,

    /// Request a reset to the start pose after this many seconds
    #[arg(long)]
    reset_at: Option<f64>,

    /// Publish sensors every N ticks
    #[arg(long, default_value_t = 5)]
    sensor_every: u64,
}

#[derive(Serialize)]
#[serde(tag = "topic", rename_all = "snake_case")]
enum Telemetry {
    Odometry(Odometry),
    Scan(LaserScan),
    Tof { stamp: f64, ranges: Vec<f64> },
}

fn publish(message: &Telemetry) {
    match serde_json::to_string(message) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!("Failed to serialize telemetry: {}", e),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _guard = init_tracing();
    let cli = Cli::parse();

    info!("Loading scene from {}", cli.config);
    let scene = SceneConfig::load_from_file(&cli.config)?;
    let map = Arc::new(scene.build_map()?);
    let robot = Arc::new(MecanumRobot::new(
        "mecanum_sim",
        scene.start,
        scene.robot.clone(),
    )?);
    let obstacles = Arc::new(scene.obstacles.clone());

    tokio::select! {
        result = run(&cli, robot.clone(), map, obstacles) => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    let pose = robot.pose();
    info!(
        "Final pose ({:.3}, {:.3}, {:.3} rad)",
        pose.x, pose.y, pose.theta
    );
    Ok(())
}

async fn run(
    cli: &Cli,
    robot: Arc<MecanumRobot>,
    map: Arc<OccupancyMap>,
    obstacles: Arc<Vec<mecanum_sim_lib::ObstaclePrimitive>>,
) -> Result<()> {
    let rate = robot.config().integrator.tick_rate_hz;
    let mut ticker = tokio::time::interval(tick_period(rate)?);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(
        "Ticking at {:.1} Hz for {:.1} s, command ({:.2}, {:.2}, {:.2}) for {:.1} s",
        rate, cli.duration, cli.vx, cli.vy, cli.omega, cli.command_for
    );

    let started = Instant::now();
    let mut last_tick = started;
    let mut reset_sent = false;
    let mut tick_count: u64 = 0;

    loop {
        ticker.tick().await;
        let now = Instant::now();
        let elapsed = now.duration_since(started).as_secs_f64();
        if elapsed >= cli.duration {
            break;
        }

        if elapsed < cli.command_for {
            robot.set_velocity(cli.vx, cli.vy, cli.omega);
        }
        if let Some(reset_at) = cli.reset_at {
            if !reset_sent && elapsed >= reset_at {
                robot.request_reset();
                reset_sent = true;
            }
        }

        let dt = now.duration_since(last_tick).as_secs_f64();
        last_tick = now;
        robot.tick(dt);
        publish(&Telemetry::Odometry(robot.odometry()));

        tick_count += 1;
        if cli.sensor_every > 0 && tick_count % cli.sensor_every == 0 {
            publish_sensors(robot.clone(), map.clone(), obstacles.clone()).await?;
        }
    }

    Ok(())
}

/// Interval between ticks; tokio rejects a zero period
fn tick_period(rate_hz: f64) -> Result<Duration> {
    let period = Duration::try_from_secs_f64(1.0 / rate_hz)
        .map_err(|e| eyre::eyre!("Invalid tick rate {} Hz: {}", rate_hz, e))?;
    if period.is_zero() {
        eyre::bail!("Tick rate {} Hz is too high", rate_hz);
    }
    Ok(period)
}

/// Sensing is CPU-bound, so it runs off the scheduler thread
async fn publish_sensors(
    robot: Arc<MecanumRobot>,
    map: Arc<OccupancyMap>,
    obstacles: Arc<Vec<mecanum_sim_lib::ObstaclePrimitive>>,
) -> Result<()> {
    let (scan, tof, stamp) = tokio::task::spawn_blocking(move || {
        let scan = robot.laser_scan(&map);
        let tof = robot.query_tof(&obstacles);
        (scan, tof, robot.odometry().stamp)
    })
    .await?;

    publish(&Telemetry::Scan(scan));
    publish(&Telemetry::Tof { stamp, ranges: tof });
    Ok(())
}
