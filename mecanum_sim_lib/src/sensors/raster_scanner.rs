//! Planar range scanner emulated by marching rasterized beams over an
//! [`OccupancyMap`].
//!
//! Beams are independent given the map and the scan origin, so a sweep fans
//! out over the rayon pool. The map is only ever borrowed immutably here;
//! painting beams for display is left to the caller via [`BeamTrace`].

use eyre::Result;
use rayon::prelude::*;
use tracing::debug;

use super::occupancy_map::OccupancyMap;
use crate::types::{ScanExecution, ScannerConfig, MAX_BEAM_PIXELS};

/// Integer line rasterization (Bresenham) from (x0, y0) to (x1, y1),
/// yielding only every `stride`-th lattice point.
///
/// The first point is always produced; the end point only when it falls on
/// the stride.
#[derive(Debug, Clone)]
pub struct RasterLine {
    x: i64,
    y: i64,
    x_end: i64,
    y_end: i64,
    dx: i64,
    dy: i64,
    sx: i64,
    sy: i64,
    err: i64,
    stride: usize,
    count: usize,
    done: bool,
}

impl RasterLine {
    pub fn new(x0: i64, y0: i64, x1: i64, y1: i64, stride: usize) -> Self {
        let dx = (x1 - x0).abs();
        let dy = (y1 - y0).abs();
        Self {
            x: x0,
            y: y0,
            x_end: x1,
            y_end: y1,
            dx,
            dy,
            sx: if x0 < x1 { 1 } else { -1 },
            sy: if y0 < y1 { 1 } else { -1 },
            err: dx - dy,
            stride: stride.max(1),
            count: 0,
            done: false,
        }
    }
}

impl Iterator for RasterLine {
    type Item = (i64, i64);

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let point = (self.x, self.y);
            let emit = self.count % self.stride == 0;
            self.count += 1;

            if self.x == self.x_end && self.y == self.y_end {
                self.done = true;
            } else {
                let e2 = self.err * 2;
                if e2 > -self.dy {
                    self.err -= self.dy;
                    self.x += self.sx;
                }
                if e2 < self.dx {
                    self.err += self.dx;
                    self.y += self.sy;
                }
            }

            if emit {
                return Some(point);
            }
        }
        None
    }
}

/// Collect a thinned rasterized line
pub fn bresenham_line(x0: i64, y0: i64, x1: i64, y1: i64, stride: usize) -> Vec<(i64, i64)> {
    RasterLine::new(x0, y0, x1, y1, stride).collect()
}

/// One beam with the cells it passed before terminating
#[derive(Debug, Clone, PartialEq)]
pub struct BeamTrace {
    /// Beam direction in the map's pixel frame (rad)
    pub angle: f64,
    /// Range in meters, `max_range` when nothing was hit
    pub distance: f64,
    /// In-bounds cells tested and found free, near to far
    pub clear_cells: Vec<(i64, i64)>,
}

/// Rotating planar range scanner
#[derive(Debug, Clone)]
pub struct RasterScanner {
    config: ScannerConfig,
}

impl RasterScanner {
    pub fn new(config: ScannerConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            "Raster scanner: {} beams over [{:.1}°, {:.1}°], range {:.2}-{:.2} m, stride {}",
            config.beam_count,
            config.angle_min.to_degrees(),
            config.angle_max().to_degrees(),
            config.min_range,
            config.max_range,
            config.raster_stride
        );
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Beam directions in the map's pixel frame, in result order.
    ///
    /// The pixel frame has y pointing down, so a counter-clockwise heading
    /// appears mirrored. Walking the pixel angles downwards from
    /// `-heading + angle_max` therefore puts beam 0 at the robot-relative
    /// `angle_min`, the same order a [`crate::LaserScan`] reports.
    ///
    /// This only holds for a symmetric field of view. An asymmetric one is
    /// swept over `[-angle_max, -angle_min]` relative to the robot while the
    /// scan still advertises `[angle_min, angle_max]`.
    pub fn beam_angles(&self, heading: f64) -> Vec<f64> {
        let start = -heading + self.config.angle_max();
        (0..self.config.beam_count)
            .map(|i| start - i as f64 * self.config.angle_increment)
            .collect()
    }

    /// Range for every beam, indexed like [`Self::beam_angles`].
    ///
    /// `origin` is the robot centre in fractional pixel coordinates.
    pub fn scan(&self, origin: (f64, f64), heading: f64, map: &OccupancyMap) -> Vec<f64> {
        let angles = self.beam_angles(heading);
        match self.config.execution {
            ScanExecution::Parallel => angles
                .par_iter()
                .map(|&angle| self.beam_distance(origin, angle, map))
                .collect(),
            ScanExecution::Serial => angles
                .iter()
                .map(|&angle| self.beam_distance(origin, angle, map))
                .collect(),
        }
    }

    /// Like [`Self::scan`] but keeps the clear cells of every beam for drawing
    pub fn trace(&self, origin: (f64, f64), heading: f64, map: &OccupancyMap) -> Vec<BeamTrace> {
        let angles = self.beam_angles(heading);
        match self.config.execution {
            ScanExecution::Parallel => angles
                .par_iter()
                .map(|&angle| self.trace_beam(origin, angle, map))
                .collect(),
            ScanExecution::Serial => angles
                .iter()
                .map(|&angle| self.trace_beam(origin, angle, map))
                .collect(),
        }
    }

    pub fn beam_distance(&self, origin: (f64, f64), angle: f64, map: &OccupancyMap) -> f64 {
        self.walk_beam(origin, angle, map, |_| {})
    }

    pub fn trace_beam(&self, origin: (f64, f64), angle: f64, map: &OccupancyMap) -> BeamTrace {
        let mut clear_cells = Vec::new();
        let distance = self.walk_beam(origin, angle, map, |cell| clear_cells.push(cell));
        BeamTrace {
            angle,
            distance,
            clear_cells,
        }
    }

    /// March from the near point to the far point and stop at the first
    /// blocked cell. Out-of-bounds cells are skipped.
    fn walk_beam<F>(&self, origin: (f64, f64), angle: f64, map: &OccupancyMap, mut on_clear: F) -> f64
    where
        F: FnMut((i64, i64)),
    {
        let ppm = map.pixels_per_meter();
        let (rx, ry) = origin;
        let (sin, cos) = angle.sin_cos();

        // Beams that cannot reach the map, or would not fit in pixel space, see nothing
        let reach = self.config.max_range * ppm;
        let in_reach = reach <= MAX_BEAM_PIXELS
            && (-reach..=map.width() as f64 + reach).contains(&rx)
            && (-reach..=map.height() as f64 + reach).contains(&ry);
        if !in_reach {
            return self.config.max_range;
        }

        // Truncation towards zero, matching integer pixel addressing
        let x_near = (rx + self.config.min_range * ppm * cos) as i64;
        let y_near = (ry + self.config.min_range * ppm * sin) as i64;
        let x_far = (rx + self.config.max_range * ppm * cos) as i64;
        let y_far = (ry + self.config.max_range * ppm * sin) as i64;

        for (x, y) in RasterLine::new(x_near, y_near, x_far, y_far, self.config.raster_stride) {
            match map.cell(x, y) {
                Some(kind) if kind.blocks_beam() => {
                    let px = ((x as f64 - rx).powi(2) + (y as f64 - ry).powi(2)).sqrt();
                    return px / ppm;
                }
                Some(_) => on_clear((x, y)),
                None => {}
            }
        }

        self.config.max_range
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::occupancy_map::{CellKind, BEAM_TINT};
    use std::f64::consts::FRAC_PI_2;

    fn scanner(execution: ScanExecution) -> RasterScanner {
        RasterScanner::new(ScannerConfig {
            execution,
            ..ScannerConfig::default()
        })
        .unwrap()
    }

    /// 10 m x 10 m room with a 3 px thick wall 2 m to the right of the centre
    fn room_with_wall() -> OccupancyMap {
        let mut map = OccupancyMap::blank(1000, 1000, 100.0);
        map.mark_rect(700, 300, 702, 700, CellKind::Obstacle);
        map
    }

    #[test]
    fn test_bresenham_horizontal() {
        let points = bresenham_line(0, 0, 4, 0, 1);
        assert_eq!(points, vec![(0, 0), (1, 0), (2, 0), (3, 0), (4, 0)]);
    }

    #[test]
    fn test_bresenham_stride_thins_points() {
        let points = bresenham_line(0, 0, 9, 0, 3);
        assert_eq!(points, vec![(0, 0), (3, 0), (6, 0), (9, 0)]);

        // End point off the stride is dropped
        let points = bresenham_line(0, 0, 7, 0, 3);
        assert_eq!(points, vec![(0, 0), (3, 0), (6, 0)]);
    }

    #[test]
    fn test_bresenham_diagonal_and_reverse() {
        assert_eq!(
            bresenham_line(3, 3, 0, 0, 1),
            vec![(3, 3), (2, 2), (1, 1), (0, 0)]
        );
        assert_eq!(bresenham_line(2, -1, 2, -1, 3), vec![(2, -1)]);
    }

    #[test]
    fn test_bresenham_steep_line_is_connected() {
        let points = bresenham_line(0, 0, 2, 7, 1);
        assert_eq!(points.first(), Some(&(0, 0)));
        assert_eq!(points.last(), Some(&(2, 7)));
        assert_eq!(points.len(), 8);
        for pair in points.windows(2) {
            assert!((pair[1].0 - pair[0].0).abs() <= 1);
            assert_eq!(pair[1].1 - pair[0].1, 1);
        }
    }

    #[test]
    fn test_beam_angles_descend() {
        let scanner = scanner(ScanExecution::Serial);
        let angles = scanner.beam_angles(0.0);

        assert_eq!(angles.len(), 271);
        assert!((angles[0] - 135.0_f64.to_radians()).abs() < 1e-9);
        assert!(angles[135].abs() < 1e-9);
        assert!((angles[270] + 135.0_f64.to_radians()).abs() < 1e-9);

        let turned = scanner.beam_angles(0.5);
        assert!((angles[10] - turned[10] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_asymmetric_fov_is_mirrored() {
        let scanner = RasterScanner::new(ScannerConfig {
            beam_count: 200,
            execution: ScanExecution::Serial,
            ..ScannerConfig::default()
        })
        .unwrap();
        let config = scanner.config();
        // At heading 0 the robot-relative direction is the negated pixel angle
        let relative: Vec<f64> = scanner.beam_angles(0.0).iter().map(|a| -a).collect();

        assert!((relative[0] + config.angle_max()).abs() < 1e-9);
        assert!((relative[199] + config.angle_min).abs() < 1e-9);
        assert!((relative[0] - config.angle_min).abs() > 1.0);
    }

    #[test]
    fn test_far_away_origin_sees_nothing() {
        let map = room_with_wall();
        let scanner = scanner(ScanExecution::Serial);

        for origin in [(1e30, 500.0), (-1e19, -1e19), (f64::NAN, 500.0), (500.0, f64::INFINITY)] {
            let ranges = scanner.scan(origin, 0.0, &map);
            assert!(ranges.iter().all(|&r| r == 8.0));
        }
    }

    #[test]
    fn test_oversized_map_scale_sees_nothing() {
        let mut map = OccupancyMap::blank(100, 100, 1e9);
        map.mark_rect(60, 0, 99, 99, CellKind::Obstacle);

        let ranges = scanner(ScanExecution::Serial).scan((50.0, 50.0), 0.0, &map);
        assert!(ranges.iter().all(|&r| r == 8.0));
    }

    #[test]
    fn test_open_space_reports_max_range() {
        let map = OccupancyMap::blank(2000, 2000, 100.0);
        let ranges = scanner(ScanExecution::Parallel).scan((1000.0, 1000.0), 0.3, &map);

        assert_eq!(ranges.len(), 271);
        assert!(ranges.iter().all(|&r| r == 8.0));
    }

    #[test]
    fn test_wall_ahead() {
        let map = room_with_wall();
        let ranges = scanner(ScanExecution::Serial).scan((500.0, 500.0), 0.0, &map);

        // Centre beam looks straight at the wall
        assert!((ranges[135] - 2.0).abs() < 0.03);
        // Rear-facing beams see nothing inside 8 m of open floor
        assert_eq!(ranges[0], 8.0);
        assert_eq!(ranges[270], 8.0);
    }

    #[test]
    fn test_heading_rotates_scan() {
        let mut map = OccupancyMap::blank(1000, 1000, 100.0);
        // Wall 2 m "up" in world terms, i.e. towards smaller pixel rows
        map.mark_rect(300, 298, 700, 300, CellKind::Obstacle);

        let ranges = scanner(ScanExecution::Serial).scan((500.0, 500.0), FRAC_PI_2, &map);
        assert!((ranges[135] - 2.0).abs() < 0.03);
    }

    #[test]
    fn test_hazard_blocks_beam() {
        let mut map = OccupancyMap::blank(1000, 1000, 100.0);
        map.mark_rect(600, 490, 602, 510, CellKind::Hazard);

        let d = scanner(ScanExecution::Serial).beam_distance((500.0, 500.0), 0.0, &map);
        assert!((d - 1.0).abs() < 0.03);
    }

    #[test]
    fn test_beam_leaving_map_reports_max_range() {
        let map = OccupancyMap::blank(100, 100, 100.0);
        let d = scanner(ScanExecution::Serial).beam_distance((50.0, 50.0), 0.0, &map);
        assert_eq!(d, 8.0);
    }

    #[test]
    fn test_parallel_matches_serial_and_repeats() {
        let map = room_with_wall();
        let parallel = scanner(ScanExecution::Parallel);
        let serial = scanner(ScanExecution::Serial);

        let first = parallel.scan((480.0, 520.0), 0.2, &map);
        let second = parallel.scan((480.0, 520.0), 0.2, &map);
        let reference = serial.scan((480.0, 520.0), 0.2, &map);

        assert_eq!(first, second);
        assert_eq!(first, reference);
    }

    #[test]
    fn test_trace_matches_scan_and_tint_is_harmless() {
        let mut map = room_with_wall();
        let scanner = scanner(ScanExecution::Parallel);

        let ranges = scanner.scan((500.0, 500.0), 0.0, &map);
        let traces = scanner.trace((500.0, 500.0), 0.0, &map);
        let traced: Vec<f64> = traces.iter().map(|t| t.distance).collect();
        assert_eq!(ranges, traced);

        let centre = &traces[135];
        assert!(!centre.clear_cells.is_empty());
        assert!(centre.clear_cells.iter().all(|&(x, y)| !map.is_blocked(x, y)));

        for trace in &traces {
            map.tint(&trace.clear_cells, BEAM_TINT);
        }
        assert_eq!(scanner.scan((500.0, 500.0), 0.0, &map), ranges);
    }
}
