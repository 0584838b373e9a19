//! A single simulated mecanum robot.
//!
//! Commands and ticks serialize on one motion lock. Sensor queries take a
//! copy of the pose under that lock and do all their work after releasing it,
//! so a long scan never delays a velocity command.

use eyre::Result;
use nalgebra::Point2;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::clock::{Clock, MonotonicClock};
use super::integrator::{IntegratorPhase, PoseIntegrator};
use crate::sensors::{BeamTrace, NoiseGenerator, OccupancyMap, RasterScanner, TofRing};
use crate::types::{
    BodyTwist, LaserScan, ObstaclePrimitive, Odometry, Pose2D, RobotState, SimulatorConfig,
};
use crate::utils::{MecanumKinematics, WheelSpeeds};

/// State guarded by the motion lock
#[derive(Debug)]
struct MotionState {
    integrator: PoseIntegrator,
    max_linear_speed: f64,
}

pub struct MecanumRobot {
    name: String,
    config: SimulatorConfig,
    kinematics: MecanumKinematics,
    motion: Mutex<MotionState>,
    tof: TofRing,
    scanner: RasterScanner,
    noise: Option<Mutex<NoiseGenerator>>,
    clock: Arc<dyn Clock>,
}

impl MecanumRobot {
    /// Robot timed by the wall clock
    pub fn new(name: impl Into<String>, initial: Pose2D, config: SimulatorConfig) -> Result<Self> {
        Self::with_clock(name, initial, config, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(
        name: impl Into<String>,
        initial: Pose2D,
        config: SimulatorConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let name = name.into();
        config.validate()?;

        let kinematics = MecanumKinematics::new(config.drive.clone())?;
        let tof = TofRing::new(&config.tof)?;
        let scanner = RasterScanner::new(config.scanner.clone())?;
        let noise = config
            .noise
            .enabled
            .then(|| Mutex::new(NoiseGenerator::new(config.noise.seed)));

        let integrator = PoseIntegrator::new(initial, &config.integrator, clock.now())?;
        let limits = kinematics.limits();

        info!(
            "Robot '{}' at ({:.2}, {:.2}, {:.2} rad): max {:.2} m/s, {:.2} rad/s, {} ToF sensors, {} beams",
            name,
            initial.x,
            initial.y,
            initial.theta,
            limits.max_linear_speed,
            limits.max_angular_rate,
            tof.len(),
            config.scanner.beam_count
        );

        Ok(Self {
            name,
            config,
            kinematics,
            motion: Mutex::new(MotionState {
                integrator,
                max_linear_speed: limits.max_linear_speed,
            }),
            tof,
            scanner,
            noise,
            clock,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn kinematics(&self) -> &MecanumKinematics {
        &self.kinematics
    }

    pub fn tof_ring(&self) -> &TofRing {
        &self.tof
    }

    pub fn scanner(&self) -> &RasterScanner {
        &self.scanner
    }

    // ----- commands -----

    pub fn set_velocity(&self, v_x: f64, v_y: f64, omega_z: f64) {
        self.set_twist(BodyTwist::new(v_x, v_y, omega_z));
    }

    /// Store a body twist and restart the command watchdog
    pub fn set_twist(&self, twist: BodyTwist) {
        let wheels = self.kinematics.body_twist_to_wheel_speeds(&twist);
        let max_rate = self.config.drive.max_wheel_rate;
        if wheels.max_abs() > max_rate {
            warn!(
                "{}: commanded wheel rate {:.2} rad/s exceeds limit {:.2} rad/s",
                self.name,
                wheels.max_abs(),
                max_rate
            );
        }

        let now = self.clock.now();
        self.motion.lock().integrator.set_twist(twist, now);
        debug!(
            "{}: twist v_x={:.3} m/s, v_y={:.3} m/s, ω_z={:.3} rad/s",
            self.name, twist.v_x, twist.v_y, twist.omega_z
        );
    }

    /// Drive by individual wheel rates (front-left, front-right, rear-left, rear-right)
    pub fn set_wheel_speeds(&self, wheels: WheelSpeeds) {
        self.set_twist(self.kinematics.wheel_speeds_to_body_twist(&wheels));
    }

    /// Normalized joystick axes in [-1, 1] scaled by the drive limits
    pub fn set_joystick(&self, forward: f64, lateral: f64, turn: f64) {
        let max_linear_speed = self.motion.lock().max_linear_speed;
        let max_angular_rate = self.kinematics.limits().max_angular_rate;
        self.set_twist(BodyTwist::new(
            forward.clamp(-1.0, 1.0) * max_linear_speed,
            lateral.clamp(-1.0, 1.0) * max_linear_speed,
            turn.clamp(-1.0, 1.0) * max_angular_rate,
        ));
    }

    /// Override the linear speed reached at full joystick deflection
    pub fn set_max_velocity(&self, speed: f64) {
        self.motion.lock().max_linear_speed = speed.abs();
    }

    pub fn max_velocity(&self) -> f64 {
        self.motion.lock().max_linear_speed
    }

    pub fn stop(&self) {
        self.set_twist(BodyTwist::zero());
    }

    /// Return to the initial pose once the settle delay has passed.
    /// Repeated requests while one is pending change nothing.
    pub fn request_reset(&self) {
        let now = self.clock.now();
        if self.motion.lock().integrator.request_reset(now) {
            info!("{}: reset requested", self.name);
        }
    }

    // ----- integration -----

    /// Advance the simulation by `dt` seconds and return the new state
    pub fn tick(&self, dt: f64) -> RobotState {
        let now = self.clock.now();
        let mut motion = self.motion.lock();
        let phase = motion.integrator.step(dt, now);
        let state = motion.integrator.state();
        drop(motion);

        if phase == IntegratorPhase::Resetting {
            debug!("{}: resetting, pose frozen", self.name);
        }
        state
    }

    pub fn state(&self) -> RobotState {
        self.motion.lock().integrator.state()
    }

    pub fn pose(&self) -> Pose2D {
        self.state().pose
    }

    pub fn initial_pose(&self) -> Pose2D {
        self.motion.lock().integrator.initial_pose()
    }

    /// True while a reset is pending; renderers show the robot as crashed
    pub fn is_resetting(&self) -> bool {
        self.motion.lock().integrator.is_resetting()
    }

    pub fn is_moving(&self) -> bool {
        !self.state().twist.is_zero()
    }

    /// Wheel rates matching the current twist
    pub fn wheel_speeds(&self) -> WheelSpeeds {
        self.kinematics
            .body_twist_to_wheel_speeds(&self.state().twist)
    }

    pub fn odometry(&self) -> Odometry {
        let state = self.state();
        Odometry::from_state(&state, &self.config.odometry, self.clock.now().as_secs_f64())
    }

    // ----- sensing -----

    /// ToF readings against the given obstacles, one per ring sensor
    pub fn query_tof(&self, obstacles: &[ObstaclePrimitive]) -> Vec<f64> {
        let pose = self.pose();
        self.tof.measure(&pose, obstacles)
    }

    /// World points where the given ToF readings end
    pub fn tof_hit_points(&self, readings: &[f64]) -> Vec<Point2<f64>> {
        let pose = self.pose();
        self.tof.hit_points(&pose, readings)
    }

    /// Scanner ranges in beam order, noise applied when enabled
    pub fn query_lidar(&self, map: &OccupancyMap) -> Vec<f64> {
        let pose = self.pose();
        let origin = map.world_to_pixel(pose.x, pose.y);
        let mut ranges = self.scanner.scan(origin, pose.theta, map);

        if let Some(noise) = &self.noise {
            noise.lock().perturb_returns(
                &mut ranges,
                self.config.scanner.max_range,
                self.config.noise.range_stddev,
            );
        }
        ranges
    }

    pub fn laser_scan(&self, map: &OccupancyMap) -> LaserScan {
        LaserScan::from_ranges(&self.config.scanner, self.query_lidar(map))
    }

    /// Noise-free beams with their clear cells, for drawing onto the map
    pub fn trace_lidar(&self, map: &OccupancyMap) -> Vec<BeamTrace> {
        let pose = self.pose();
        let origin = map.world_to_pixel(pose.x, pose.y);
        self.scanner.trace(origin, pose.theta, map)
    }
}
