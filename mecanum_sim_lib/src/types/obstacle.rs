use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::utils::geometry::{circle_line_intersection, visible_hit_on_segment};

/// Analytic obstacle geometry seen by the ToF ring.
///
/// Obstacles belong to the world, not to a robot; they are handed to every
/// sensor query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObstaclePrimitive {
    /// Wall piece between two endpoints
    Segment {
        start: Point2<f64>,
        end: Point2<f64>,
    },

    /// Round obstacle such as another robot or a pillar
    Circle { center: Point2<f64>, radius: f64 },
}

impl ObstaclePrimitive {
    pub fn segment(start: (f64, f64), end: (f64, f64)) -> Self {
        Self::Segment {
            start: Point2::new(start.0, start.1),
            end: Point2::new(end.0, end.1),
        }
    }

    pub fn circle(center: (f64, f64), radius: f64) -> Self {
        Self::Circle {
            center: Point2::new(center.0, center.1),
            radius,
        }
    }

    /// Distance from `sensor` to the visible surface along the ray towards
    /// `far`, or `None` when the ray misses.
    pub fn hit_distance(&self, sensor: &Point2<f64>, far: &Point2<f64>) -> Option<f64> {
        match self {
            Self::Segment { start, end } => visible_hit_on_segment(start, end, sensor, far),
            Self::Circle { center, radius } => {
                circle_line_intersection(center, *radius, sensor, far)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_segment_and_circle() {
        let sensor = Point2::new(0.0, 0.0);
        let far = Point2::new(10.0, 0.0);

        let wall = ObstaclePrimitive::segment((3.0, -1.0), (3.0, 1.0));
        let pillar = ObstaclePrimitive::circle((6.0, 0.0), 0.5);

        assert!((wall.hit_distance(&sensor, &far).unwrap() - 3.0).abs() < 1e-9);
        assert!((pillar.hit_distance(&sensor, &far).unwrap() - 5.5).abs() < 1e-9);
    }

    #[test]
    fn test_toml_tagged_representation() {
        #[derive(Deserialize)]
        struct World {
            obstacles: Vec<ObstaclePrimitive>,
        }

        let world: World = toml::from_str(
            r#"
            [[obstacles]]
            type = "segment"
            start = [0.0, 1.0]
            end = [2.0, 1.0]

            [[obstacles]]
            type = "circle"
            center = [4.0, 4.0]
            radius = 0.3
            "#,
        )
        .unwrap();

        assert_eq!(world.obstacles.len(), 2);
        assert_eq!(
            world.obstacles[0],
            ObstaclePrimitive::segment((0.0, 1.0), (2.0, 1.0))
        );
        assert_eq!(world.obstacles[1], ObstaclePrimitive::circle((4.0, 4.0), 0.3));
    }
}
