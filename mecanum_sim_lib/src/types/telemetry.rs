use serde::{Deserialize, Serialize};

use super::config::{OdometryConfig, ScannerConfig};
use super::robot_state::RobotState;

/// Delay between two beams of the emulated scanner (s)
const SCAN_TIME_INCREMENT: f64 = 1.0 / 5000.0;

/// Duration of one emulated sweep (s)
const SCAN_TIME: f64 = 1.0 / 500.0;

/// Planar scan shaped the way scan consumers expect it: beam 0 at `angle_min`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaserScan {
    pub angle_min: f64,
    pub angle_max: f64,
    pub angle_increment: f64,
    pub time_increment: f64,
    pub scan_time: f64,
    pub range_min: f64,
    pub range_max: f64,
    pub ranges: Vec<f64>,
    /// 1.0 for a return, 0.0 when the beam reached `range_max`
    pub intensities: Vec<f64>,
}

impl LaserScan {
    pub fn from_ranges(config: &ScannerConfig, ranges: Vec<f64>) -> Self {
        let intensities = ranges
            .iter()
            .map(|&r| if r < config.max_range { 1.0 } else { 0.0 })
            .collect();

        Self {
            angle_min: config.angle_min,
            angle_max: config.angle_max(),
            angle_increment: config.angle_increment,
            time_increment: SCAN_TIME_INCREMENT,
            scan_time: SCAN_TIME,
            range_min: 0.0,
            range_max: config.max_range,
            ranges,
            intensities,
        }
    }

    /// Number of beams that hit something
    pub fn return_count(&self) -> usize {
        self.intensities.iter().filter(|&&i| i > 0.0).count()
    }
}

/// Odometry snapshot taken right after a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Odometry {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
    /// Yaw-only orientation as (x, y, z, w)
    pub orientation: [f64; 4],
    /// Linear velocity in the world frame
    pub v_x: f64,
    pub v_y: f64,
    pub omega_z: f64,
    /// Row-major 6x6 pose covariance
    pub pose_covariance: Vec<f64>,
    /// Simulation time of the snapshot (s)
    pub stamp: f64,
}

impl Odometry {
    pub fn from_state(state: &RobotState, config: &OdometryConfig, stamp: f64) -> Self {
        let q = state.pose.orientation();
        let world_velocity = state.world_velocity();

        let mut pose_covariance = vec![0.0; 36];
        for diagonal in pose_covariance.iter_mut().step_by(7) {
            *diagonal = config.pose_variance;
        }

        Self {
            x: state.pose.x - config.frame_offset[0],
            y: state.pose.y - config.frame_offset[1],
            theta: state.pose.theta,
            orientation: [q.i, q.j, q.k, q.w],
            v_x: world_velocity.x,
            v_y: world_velocity.y,
            omega_z: state.twist.omega_z,
            pose_covariance,
            stamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::robot_state::{BodyTwist, Pose2D};
    use std::f64::consts::PI;

    #[test]
    fn test_intensity_marks_returns_only() {
        let config = ScannerConfig {
            angle_min: -0.1,
            angle_increment: 0.1,
            beam_count: 3,
            ..ScannerConfig::default()
        };
        let scan = LaserScan::from_ranges(&config, vec![1.5, 8.0, 7.99]);

        assert_eq!(scan.intensities, vec![1.0, 0.0, 1.0]);
        assert_eq!(scan.return_count(), 2);
        assert!((scan.angle_max - 0.1).abs() < 1e-12);
        assert_eq!(scan.range_min, 0.0);
    }

    #[test]
    fn test_odometry_applies_offset_and_world_twist() {
        let state = RobotState {
            pose: Pose2D::new(3.0, 2.5, PI),
            twist: BodyTwist::new(1.0, 0.0, 0.3),
        };
        let odom = Odometry::from_state(&state, &OdometryConfig::default(), 4.0);

        assert!((odom.x - 1.0).abs() < 1e-12);
        assert!((odom.y - 0.5).abs() < 1e-12);
        assert!((odom.v_x + 1.0).abs() < 1e-12);
        assert!(odom.v_y.abs() < 1e-12);
        assert_eq!(odom.omega_z, 0.3);
        // Half-turn about z
        assert!(odom.orientation[3].abs() < 1e-12);
        assert!((odom.orientation[2].abs() - 1.0).abs() < 1e-12);
        assert_eq!(odom.pose_covariance[0], 0.01);
        assert_eq!(odom.pose_covariance[7], 0.01);
        assert_eq!(odom.pose_covariance[1], 0.0);
    }
}
