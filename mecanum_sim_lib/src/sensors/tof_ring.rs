use eyre::Result;
use nalgebra::{Point2, Vector2};

use crate::types::{ObstaclePrimitive, Pose2D, TofConfig};

/// One fixed range sensor on the robot body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TofSensor {
    pub angle: f64,        // Facing relative to the heading (rad)
    pub mount_offset: f64, // Distance from the kinematic centre (m)
}

/// Geometry of one sensor for a given pose
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TofRay {
    pub facing: Vector2<f64>,
    pub mount: Point2<f64>,
    /// Point at full sensing range along the facing
    pub far: Point2<f64>,
}

/// Ring of ToF sensors measuring against analytic obstacles.
///
/// Readings are distances from each sensor's mount point. A slot keeps the
/// full range when nothing is seen.
#[derive(Debug, Clone)]
pub struct TofRing {
    sensors: Vec<TofSensor>,
    max_range: f64,
}

impl TofRing {
    pub fn new(config: &TofConfig) -> Result<Self> {
        config.validate()?;
        let sensors = config
            .angles
            .iter()
            .zip(&config.mount_offsets)
            .map(|(&angle, &mount_offset)| TofSensor {
                angle,
                mount_offset,
            })
            .collect();
        Ok(Self {
            sensors,
            max_range: config.max_range,
        })
    }

    pub fn sensors(&self) -> &[TofSensor] {
        &self.sensors
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn max_range(&self) -> f64 {
        self.max_range
    }

    /// Facing, mount point and far point of every sensor for the pose.
    /// Only the heading and the fixed mounting enter the facing.
    pub fn rays(&self, pose: &Pose2D) -> Vec<TofRay> {
        let center = pose.position();
        self.sensors
            .iter()
            .map(|sensor| {
                let (sin, cos) = (pose.theta + sensor.angle).sin_cos();
                let facing = Vector2::new(cos, sin);
                TofRay {
                    facing,
                    mount: center + facing * sensor.mount_offset,
                    far: center + facing * (sensor.mount_offset + self.max_range),
                }
            })
            .collect()
    }

    /// Fresh reading buffer, every slot at full range
    pub fn empty_readings(&self) -> Vec<f64> {
        vec![self.max_range; self.sensors.len()]
    }

    /// Lower each slot to the obstacle's hit distance where that is closer
    pub fn accumulate(&self, pose: &Pose2D, obstacle: &ObstaclePrimitive, readings: &mut Vec<f64>) {
        if readings.len() != self.sensors.len() {
            *readings = self.empty_readings();
        }
        let rays = self.rays(pose);
        Self::fold_obstacle(&rays, obstacle, readings);
    }

    /// Readings for all sensors against all obstacles
    pub fn measure(&self, pose: &Pose2D, obstacles: &[ObstaclePrimitive]) -> Vec<f64> {
        let rays = self.rays(pose);
        let mut readings = self.empty_readings();
        for obstacle in obstacles {
            Self::fold_obstacle(&rays, obstacle, &mut readings);
        }
        readings
    }

    fn fold_obstacle(rays: &[TofRay], obstacle: &ObstaclePrimitive, readings: &mut [f64]) {
        for (ray, slot) in rays.iter().zip(readings.iter_mut()) {
            if let Some(d) = obstacle.hit_distance(&ray.mount, &ray.far) {
                if d > 0.0 && d < *slot {
                    *slot = d;
                }
            }
        }
    }

    /// World points where each sensor's reading ends, for drawing.
    /// Negative or non-finite readings are drawn at full range.
    pub fn hit_points(&self, pose: &Pose2D, readings: &[f64]) -> Vec<Point2<f64>> {
        self.rays(pose)
            .iter()
            .zip(readings)
            .map(|(ray, &d)| {
                let d = if d >= 0.0 && d.is_finite() {
                    d
                } else {
                    self.max_range
                };
                ray.mount + ray.facing * d
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn single_forward_sensor() -> TofRing {
        TofRing::new(&TofConfig {
            angles: vec![0.0],
            mount_offsets: vec![0.2],
            max_range: 8.0,
        })
        .unwrap()
    }

    #[test]
    fn test_rays_follow_heading() {
        let ring = single_forward_sensor();
        let rays = ring.rays(&Pose2D::new(1.0, 1.0, FRAC_PI_2));

        assert!(rays[0].facing.x.abs() < 1e-12);
        assert!((rays[0].facing.y - 1.0).abs() < 1e-12);
        assert!((rays[0].mount.y - 1.2).abs() < 1e-12);
        assert!((rays[0].far.y - 9.2).abs() < 1e-12);
    }

    #[test]
    fn test_wall_ahead_measured_from_mount() {
        let ring = single_forward_sensor();
        let wall = ObstaclePrimitive::segment((1.0, -1.0), (1.0, 1.0));

        let readings = ring.measure(&Pose2D::origin(), &[wall]);
        assert!((readings[0] - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_nearest_obstacle_wins() {
        let ring = single_forward_sensor();
        let obstacles = [
            ObstaclePrimitive::segment((3.0, -1.0), (3.0, 1.0)),
            ObstaclePrimitive::circle((1.7, 0.0), 0.5),
            ObstaclePrimitive::segment((5.0, -1.0), (5.0, 1.0)),
        ];

        let readings = ring.measure(&Pose2D::origin(), &obstacles);
        assert!((readings[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_accumulate_is_order_independent() {
        let ring = TofRing::new(&TofConfig::default()).unwrap();
        let pose = Pose2D::new(2.0, 2.0, 0.3);
        let obstacles = [
            ObstaclePrimitive::segment((0.0, 0.0), (4.0, 0.0)),
            ObstaclePrimitive::segment((4.0, 0.0), (4.0, 4.0)),
            ObstaclePrimitive::circle((1.0, 3.0), 0.4),
        ];

        let mut forward = Vec::new();
        for obstacle in &obstacles {
            ring.accumulate(&pose, obstacle, &mut forward);
        }
        let mut backward = ring.empty_readings();
        for obstacle in obstacles.iter().rev() {
            ring.accumulate(&pose, obstacle, &mut backward);
        }

        assert_eq!(forward.len(), 8);
        assert_eq!(forward, backward);
        assert_eq!(forward, ring.measure(&pose, &obstacles));
    }

    #[test]
    fn test_nothing_in_view_keeps_full_range() {
        let ring = TofRing::new(&TofConfig::default()).unwrap();
        let behind_everything = ObstaclePrimitive::circle((100.0, 100.0), 1.0);

        let readings = ring.measure(&Pose2D::origin(), &[behind_everything]);
        assert!(readings.iter().all(|&r| r == 8.0));
    }

    #[test]
    fn test_hit_points() {
        let ring = single_forward_sensor();
        let pose = Pose2D::new(0.0, 0.0, PI);

        let points = ring.hit_points(&pose, &[0.8]);
        assert!((points[0].x + 1.0).abs() < 1e-12);
        assert!(points[0].y.abs() < 1e-12);

        let points = ring.hit_points(&pose, &[-1.0]);
        assert!((points[0].x + 8.2).abs() < 1e-12);
    }
}
