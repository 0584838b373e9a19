use eyre::Result;
use mecanum_sim_lib::{
    bresenham_line, CellKind, ObstaclePrimitive, OccupancyMap, Pose2D, SimulatorConfig,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Everything one simulation run needs: robot, start pose, world
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub robot: SimulatorConfig,
    pub start: Pose2D,
    pub map: MapConfig,
    pub obstacles: Vec<ObstaclePrimitive>,
}

/// Raster world for the scanner, at the scanner's pixel resolution. Without
/// an image a blank map of the given size is created and the obstacles are
/// drawn onto it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub image: Option<String>,
    pub width_m: f64,
    pub height_m: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            image: None,
            width_m: 10.0,
            height_m: 10.0,
        }
    }
}

impl SceneConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let scene: SceneConfig = toml::from_str(&content)?;
        scene.robot.validate()?;
        Ok(scene)
    }

    pub fn build_map(&self) -> Result<OccupancyMap> {
        let ppm = self.robot.scanner.pixels_per_meter;
        if let Some(image) = &self.map.image {
            return OccupancyMap::open(image, ppm);
        }

        let width = (self.map.width_m * ppm).round().max(1.0) as u32;
        let height = (self.map.height_m * ppm).round().max(1.0) as u32;
        let mut map = OccupancyMap::blank(width, height, ppm);
        for obstacle in &self.obstacles {
            rasterize(&mut map, obstacle);
        }
        info!(
            "Blank {}x{} px map with {} obstacles drawn",
            width,
            height,
            self.obstacles.len()
        );
        Ok(map)
    }
}

fn rasterize(map: &mut OccupancyMap, obstacle: &ObstaclePrimitive) {
    match obstacle {
        ObstaclePrimitive::Segment { start, end } => {
            let (x0, y0) = map.world_to_pixel(start.x, start.y);
            let (x1, y1) = map.world_to_pixel(end.x, end.y);
            for (x, y) in bresenham_line(x0 as i64, y0 as i64, x1 as i64, y1 as i64, 1) {
                map.mark_rect(x - 1, y - 1, x + 1, y + 1, CellKind::Obstacle);
            }
        }
        ObstaclePrimitive::Circle { center, radius } => {
            let ppm = map.pixels_per_meter();
            let (cx, cy) = map.world_to_pixel(center.x, center.y);
            let r = (radius * ppm).ceil() as i64;
            let (cx, cy) = (cx as i64, cy as i64);
            for y in (cy - r)..=(cy + r) {
                for x in (cx - r)..=(cx + r) {
                    if (x - cx).pow(2) + (y - cy).pow(2) <= r * r {
                        map.mark_cell(x, y, CellKind::Obstacle);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"
[robot.integrator]
tick_rate_hz = 50.0

[start]
x = 5.0
y = 5.0
theta = 0.0

[map]
width_m = 10.0
height_m = 10.0

[[obstacles]]
type = "segment"
start = [7.0, 3.0]
end = [7.0, 7.0]

[[obstacles]]
type = "circle"
center = [3.0, 5.0]
radius = 0.5
"#;

    #[test]
    fn test_scene_parses_with_defaults() {
        let scene: SceneConfig = toml::from_str(SCENE).unwrap();
        assert_eq!(scene.robot.integrator.tick_rate_hz, 50.0);
        assert_eq!(scene.robot.integrator.command_timeout, 0.5);
        assert_eq!(scene.start, Pose2D::new(5.0, 5.0, 0.0));
        assert_eq!(scene.obstacles.len(), 2);
    }

    #[test]
    fn test_obstacles_are_drawn_into_blank_map() {
        let scene: SceneConfig = toml::from_str(SCENE).unwrap();
        let map = scene.build_map().unwrap();

        assert_eq!(map.width(), 1000);
        assert!(map.is_blocked(700, 500));
        assert!(map.is_blocked(300, 500));
        assert!(!map.is_blocked(500, 500));
    }
}
