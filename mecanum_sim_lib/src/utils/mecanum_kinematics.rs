// Mecanum Wheel Kinematics for 4-Wheel Configuration

use eyre::Result;
use nalgebra::{Matrix3x4, Matrix4x3, Vector4};
use serde::{Deserialize, Serialize};

use crate::types::{BodyTwist, DriveConfig};

/// Singular values below this are treated as zero by the pseudo-inverse.
const PSEUDO_INVERSE_EPSILON: f64 = 1e-10;

/// Angular rates of the four wheels (rad/s)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WheelSpeeds {
    pub front_left: f64,
    pub front_right: f64,
    pub rear_left: f64,
    pub rear_right: f64,
}

impl WheelSpeeds {
    pub fn new(front_left: f64, front_right: f64, rear_left: f64, rear_right: f64) -> Self {
        Self {
            front_left,
            front_right,
            rear_left,
            rear_right,
        }
    }

    pub fn to_vector(&self) -> Vector4<f64> {
        Vector4::new(
            self.front_left,
            self.front_right,
            self.rear_left,
            self.rear_right,
        )
    }

    pub fn from_vector(v: Vector4<f64>) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }

    pub fn max_abs(&self) -> f64 {
        self.to_vector().amax()
    }
}

/// Speed envelope derived from the wheel rate limit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveLimits {
    pub max_linear_speed: f64,  // m/s
    pub max_angular_rate: f64,  // rad/s
}

/// Mecanum Wheel Kinematics Calculator
///
/// Wheel order is front-left, front-right, rear-left, rear-right. Each row of
/// the forward transform is
///
/// u_i = [±1/r, ∓1/r, −(lx+ly)/r] · (v_x, v_y, ω_z)
///
/// The right-hand motors are mounted mirrored, so their sign on v_x is
/// flipped. With that accounted for, front-left and rear-right push against
/// front-right and rear-left on v_y, and all wheels share one lever arm for ω_z.
#[derive(Debug, Clone)]
pub struct MecanumKinematics {
    config: DriveConfig,
    forward: Matrix4x3<f64>, // body twist -> wheel rates
    inverse: Matrix3x4<f64>, // wheel rates -> body twist (least squares)
    limits: DriveLimits,
}

impl MecanumKinematics {
    pub fn new(config: DriveConfig) -> Result<Self> {
        config.validate()?;

        let forward = Self::compute_forward_matrix(&config);
        let inverse = forward
            .pseudo_inverse(PSEUDO_INVERSE_EPSILON)
            .map_err(|e| eyre::eyre!("Drive matrix has no pseudo-inverse: {}", e))?;

        let max_linear_speed = config.max_wheel_rate * config.wheel_radius;
        let limits = DriveLimits {
            max_linear_speed,
            max_angular_rate: max_linear_speed / config.lever_arm(),
        };

        Ok(Self {
            config,
            forward,
            inverse,
            limits,
        })
    }

    #[rustfmt::skip]
    fn compute_forward_matrix(config: &DriveConfig) -> Matrix4x3<f64> {
        let rinv = 1.0 / config.wheel_radius;
        let lxly = config.lever_arm() / config.wheel_radius;

        Matrix4x3::new(
             rinv, -rinv, -lxly, // front-left
            -rinv, -rinv, -lxly, // front-right
             rinv,  rinv, -lxly, // rear-left
            -rinv,  rinv, -lxly, // rear-right
        )
    }

    /// Convert body twist to wheel angular velocities: u = T * V_b
    pub fn body_twist_to_wheel_speeds(&self, twist: &BodyTwist) -> WheelSpeeds {
        WheelSpeeds::from_vector(self.forward * twist.to_vector())
    }

    /// Convert wheel angular velocities to body twist: V_b = T^† * u
    ///
    /// Any finite input is accepted. Inconsistent wheel rates (wheels fighting
    /// each other) map to the least-squares twist.
    pub fn wheel_speeds_to_body_twist(&self, wheel_speeds: &WheelSpeeds) -> BodyTwist {
        BodyTwist::from_vector(self.inverse * wheel_speeds.to_vector())
    }

    pub fn forward_matrix(&self) -> &Matrix4x3<f64> {
        &self.forward
    }

    pub fn inverse_matrix(&self) -> &Matrix3x4<f64> {
        &self.inverse
    }

    pub fn limits(&self) -> DriveLimits {
        self.limits
    }

    pub fn config(&self) -> &DriveConfig {
        &self.config
    }
}
