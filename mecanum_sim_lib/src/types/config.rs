use eyre::Result;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_8, PI};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Angles closer than this are treated as equal when checking scan symmetry.
const FOV_SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Longest beam the scanner will rasterize, in pixels
pub const MAX_BEAM_PIXELS: f64 = 4_000_000.0;

/// Complete per-robot configuration.
///
/// Every section falls back to the reference robot when omitted from the
/// TOML file, so a file may override a single value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub drive: DriveConfig,
    pub integrator: IntegratorConfig,
    pub scanner: ScannerConfig,
    pub tof: TofConfig,
    pub noise: NoiseConfig,
    pub odometry: OdometryConfig,
}

/// Mecanum drive-train geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub wheel_radius: f64,   // r: radius of the wheels (m)
    pub wheel_base: f64,     // front-rear wheel separation (m)
    pub track: f64,          // left-right wheel separation (m)
    pub max_wheel_rate: f64, // rad/s
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            wheel_radius: 0.05,
            wheel_base: 0.3,
            track: 0.2,
            max_wheel_rate: 10.0,
        }
    }
}

impl DriveConfig {
    /// lx + ly: lever arm from the robot centre to a wheel contact point.
    pub fn lever_arm(&self) -> f64 {
        self.wheel_base / 2.0 + self.track / 2.0
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.wheel_radius > 0.0) {
            return Err(eyre::eyre!(
                "Wheel radius must be positive, got {}",
                self.wheel_radius
            ));
        }
        if self.wheel_base < 0.0 || self.track < 0.0 {
            return Err(eyre::eyre!(
                "Wheel base ({}) and track ({}) must not be negative",
                self.wheel_base,
                self.track
            ));
        }
        if !(self.lever_arm() > 0.0) {
            return Err(eyre::eyre!(
                "Wheel base and track cannot both be zero: rotation would be unobservable"
            ));
        }
        if self.max_wheel_rate < 0.0 {
            return Err(eyre::eyre!(
                "Maximum wheel rate must not be negative, got {}",
                self.max_wheel_rate
            ));
        }
        Ok(())
    }
}

/// Timing policy of the pose integrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorConfig {
    /// Commands older than this are treated as a stop request (s)
    pub command_timeout: f64,
    /// Time the robot stays frozen before snapping back to its initial pose (s)
    pub reset_settle_delay: f64,
    /// Cadence of the scheduler driving `tick` (Hz)
    pub tick_rate_hz: f64,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            command_timeout: 0.5,
            reset_settle_delay: 1.0,
            tick_rate_hz: 25.0,
        }
    }
}

impl IntegratorConfig {
    pub fn validate(&self) -> Result<()> {
        let finite_non_negative = |t: f64| t.is_finite() && t >= 0.0;
        if !finite_non_negative(self.command_timeout)
            || !finite_non_negative(self.reset_settle_delay)
        {
            return Err(eyre::eyre!(
                "Command timeout ({}) and reset delay ({}) must be finite and not negative",
                self.command_timeout,
                self.reset_settle_delay
            ));
        }
        if !(self.tick_rate_hz.is_finite() && self.tick_rate_hz > 0.0) {
            return Err(eyre::eyre!(
                "Tick rate must be finite and positive, got {} Hz",
                self.tick_rate_hz
            ));
        }
        Ok(())
    }
}

/// How the raster scanner spreads beams over threads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanExecution {
    /// One rayon task per beam on the global pool
    #[default]
    Parallel,

    /// All beams on the calling thread
    Serial,
}

/// Rotating planar range scanner over the occupancy map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub angle_min: f64,       // First beam angle relative to the robot (rad)
    pub angle_increment: f64, // rad
    pub beam_count: usize,
    pub max_range: f64, // m
    /// Beams start this far from the centre so the robot never sees itself (m)
    pub min_range: f64,
    pub pixels_per_meter: f64,
    /// Only every n-th rasterized cell is tested
    pub raster_stride: usize,
    /// Reject an asymmetric field of view instead of warning about it
    pub strict_fov: bool,
    pub execution: ScanExecution,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            angle_min: (-135.0_f64).to_radians(),
            angle_increment: 1.0_f64.to_radians(),
            beam_count: 271,
            max_range: 8.0,
            min_range: 0.2,
            pixels_per_meter: 100.0,
            raster_stride: 3,
            strict_fov: false,
            execution: ScanExecution::Parallel,
        }
    }
}

impl ScannerConfig {
    /// Angle of the last beam
    pub fn angle_max(&self) -> f64 {
        self.angle_min + (self.beam_count.saturating_sub(1)) as f64 * self.angle_increment
    }

    pub fn is_symmetric(&self) -> bool {
        (self.angle_max() + self.angle_min).abs() <= FOV_SYMMETRY_TOLERANCE
    }

    pub fn validate(&self) -> Result<()> {
        if self.beam_count == 0 {
            return Err(eyre::eyre!("Scanner needs at least one beam"));
        }
        if !self.angle_min.is_finite() {
            return Err(eyre::eyre!("First beam angle must be finite, got {}", self.angle_min));
        }
        if !(self.angle_increment.is_finite() && self.angle_increment > 0.0) {
            return Err(eyre::eyre!(
                "Angle increment must be finite and positive, got {}",
                self.angle_increment
            ));
        }
        if !(self.min_range >= 0.0 && self.min_range < self.max_range && self.max_range.is_finite()) {
            return Err(eyre::eyre!(
                "Scanner range [{}, {}] is empty",
                self.min_range,
                self.max_range
            ));
        }
        if !(self.pixels_per_meter.is_finite() && self.pixels_per_meter > 0.0) {
            return Err(eyre::eyre!(
                "Pixels per meter must be finite and positive, got {}",
                self.pixels_per_meter
            ));
        }
        if self.max_range * self.pixels_per_meter > MAX_BEAM_PIXELS {
            return Err(eyre::eyre!(
                "Beam of {} m at {} px/m exceeds {} px",
                self.max_range,
                self.pixels_per_meter,
                MAX_BEAM_PIXELS
            ));
        }
        if self.raster_stride == 0 {
            return Err(eyre::eyre!("Raster stride must be at least 1"));
        }

        if !self.is_symmetric() {
            if self.strict_fov {
                return Err(eyre::eyre!(
                    "Field of view must be symmetric: angle_min = {}, angle_max = {}",
                    self.angle_min,
                    self.angle_max()
                ));
            }
            warn!(
                "Laser beams should be symmetric: angle_min = {:.6}, angle_max = {:.6}; \
                 beams will cover [-angle_max, -angle_min] instead",
                self.angle_min,
                self.angle_max()
            );
        }

        Ok(())
    }
}

/// Ring of fixed time-of-flight sensors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TofConfig {
    /// Facing direction of each sensor relative to the heading (rad)
    pub angles: Vec<f64>,
    /// Distance of each sensor from the kinematic centre along its facing (m)
    pub mount_offsets: Vec<f64>,
    pub max_range: f64,
}

impl Default for TofConfig {
    fn default() -> Self {
        Self {
            angles: vec![
                0.0,
                PI,
                FRAC_PI_2,
                -FRAC_PI_2,
                FRAC_PI_8,
                -FRAC_PI_8,
                PI + FRAC_PI_8,
                PI - FRAC_PI_8,
            ],
            mount_offsets: vec![0.4, 0.4, 0.2, 0.2, 0.45, 0.45, 0.45, 0.45],
            max_range: 8.0,
        }
    }
}

impl TofConfig {
    /// Ring laid out like the scanner beams, every sensor at the same offset.
    pub fn matching_scanner(scanner: &ScannerConfig, mount_offset: f64, max_range: f64) -> Self {
        let angles = (0..scanner.beam_count)
            .map(|i| scanner.angle_min + i as f64 * scanner.angle_increment)
            .collect::<Vec<_>>();
        let mount_offsets = vec![mount_offset; angles.len()];
        Self {
            angles,
            mount_offsets,
            max_range,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.angles.len() != self.mount_offsets.len() {
            return Err(eyre::eyre!(
                "ToF angle count ({}) doesn't match mount offset count ({})",
                self.angles.len(),
                self.mount_offsets.len()
            ));
        }
        if !(self.max_range > 0.0) {
            return Err(eyre::eyre!(
                "ToF range must be positive, got {}",
                self.max_range
            ));
        }
        Ok(())
    }
}

/// Optional Gaussian perturbation of scanner ranges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub enabled: bool,
    pub range_stddev: f64, // m
    /// 0 draws a seed from the OS
    pub seed: u64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            range_stddev: 0.02,
            seed: 0,
        }
    }
}

/// Shaping of the odometry snapshot handed to publishers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdometryConfig {
    /// Subtracted from the simulator position so odometry starts near zero
    pub frame_offset: [f64; 2],
    /// Variance placed on the pose covariance diagonal
    pub pose_variance: f64,
}

impl Default for OdometryConfig {
    fn default() -> Self {
        Self {
            frame_offset: [2.0, 2.0],
            pose_variance: 0.01,
        }
    }
}

impl SimulatorConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: SimulatorConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.drive.validate()?;
        self.integrator.validate()?;
        self.scanner.validate()?;
        self.tof.validate()?;

        if self.noise.range_stddev < 0.0 {
            return Err(eyre::eyre!(
                "Noise standard deviation must not be negative, got {}",
                self.noise.range_stddev
            ));
        }

        Ok(())
    }
}
