use nalgebra::{Point2, Rotation2, UnitQuaternion, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Planar pose: position in world units and heading in radians.
///
/// The heading is signed and unbounded; callers normalize it when needed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl Pose2D {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }

    pub fn origin() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }

    /// Yaw-only orientation, for collaborators that publish 3D frames.
    pub fn orientation(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_euler_angles(0.0, 0.0, self.theta)
    }
}

/// Body twist (v_x, v_y, ω_z) expressed in the robot's rotating frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BodyTwist {
    pub v_x: f64,     // Linear velocity along the robot's forward axis (m/s)
    pub v_y: f64,     // Linear velocity along the robot's left axis (m/s)
    pub omega_z: f64, // Angular velocity about z-axis (rad/s)
}

impl BodyTwist {
    pub fn new(v_x: f64, v_y: f64, omega_z: f64) -> Self {
        Self { v_x, v_y, omega_z }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.v_x == 0.0 && self.v_y == 0.0 && self.omega_z == 0.0
    }

    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.v_x, self.v_y, self.omega_z)
    }

    pub fn from_vector(v: Vector3<f64>) -> Self {
        Self {
            v_x: v[0],
            v_y: v[1],
            omega_z: v[2],
        }
    }

    /// Linear part rotated into the world frame for the given heading.
    pub fn linear_in_world(&self, theta: f64) -> Vector2<f64> {
        Rotation2::new(theta) * Vector2::new(self.v_x, self.v_y)
    }
}

/// Physical state of one robot: where it is and how it is commanded to move.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RobotState {
    pub pose: Pose2D,
    pub twist: BodyTwist,
}

impl RobotState {
    pub fn at(pose: Pose2D) -> Self {
        Self {
            pose,
            twist: BodyTwist::zero(),
        }
    }

    /// Commanded linear velocity in the world frame for the current heading.
    pub fn world_velocity(&self) -> Vector2<f64> {
        self.twist.linear_in_world(self.pose.theta)
    }
}
