//! Colour occupancy map read by the raster scanner.
//!
//! Pure black pixels are walls and pure red pixels are hazards; everything
//! else is free space. The image frame has its origin in the top-left corner
//! with y pointing down.

use eyre::Result;
use image::{Rgb, RgbImage};
use std::path::Path;
use tracing::info;

pub const OBSTACLE_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
pub const HAZARD_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const FREE_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Colour used to draw the clear part of a beam
pub const BEAM_TINT: Rgb<u8> = Rgb([0, 208, 255]);

/// Classification of one map cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Free,
    Obstacle,
    Hazard,
}

impl CellKind {
    pub fn from_color(color: &Rgb<u8>) -> Self {
        if *color == OBSTACLE_COLOR {
            Self::Obstacle
        } else if *color == HAZARD_COLOR {
            Self::Hazard
        } else {
            Self::Free
        }
    }

    pub fn color(&self) -> Rgb<u8> {
        match self {
            Self::Free => FREE_COLOR,
            Self::Obstacle => OBSTACLE_COLOR,
            Self::Hazard => HAZARD_COLOR,
        }
    }

    pub fn blocks_beam(&self) -> bool {
        !matches!(self, Self::Free)
    }
}

/// Raster world map with a fixed metric scale
#[derive(Debug, Clone)]
pub struct OccupancyMap {
    pixels: RgbImage,
    pixels_per_meter: f64,
}

impl OccupancyMap {
    pub fn new(pixels: RgbImage, pixels_per_meter: f64) -> Self {
        Self {
            pixels,
            pixels_per_meter,
        }
    }

    /// Empty (all free) map
    pub fn blank(width: u32, height: u32, pixels_per_meter: f64) -> Self {
        Self::new(
            RgbImage::from_pixel(width, height, FREE_COLOR),
            pixels_per_meter,
        )
    }

    /// Load a map from any image format the `image` crate can decode
    pub fn open<P: AsRef<Path>>(path: P, pixels_per_meter: f64) -> Result<Self> {
        let path = path.as_ref();
        let pixels = image::open(path)
            .map_err(|e| eyre::eyre!("Failed to load map image {}: {}", path.display(), e))?
            .into_rgb8();

        info!(
            "Loaded occupancy map {} ({}x{} px, {} px/m)",
            path.display(),
            pixels.width(),
            pixels.height(),
            pixels_per_meter
        );

        Ok(Self::new(pixels, pixels_per_meter))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels_per_meter(&self) -> f64 {
        self.pixels_per_meter
    }

    pub fn image(&self) -> &RgbImage {
        &self.pixels
    }

    fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.pixels.width() as i64 && y < self.pixels.height() as i64
    }

    /// Cell classification, `None` outside the map
    pub fn cell(&self, x: i64, y: i64) -> Option<CellKind> {
        if !self.in_bounds(x, y) {
            return None;
        }
        Some(CellKind::from_color(self.pixels.get_pixel(x as u32, y as u32)))
    }

    /// Out-of-bounds cells never block
    pub fn is_blocked(&self, x: i64, y: i64) -> bool {
        self.cell(x, y).is_some_and(|kind| kind.blocks_beam())
    }

    /// World position (m, y up) to fractional pixel coordinates (y down)
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x * self.pixels_per_meter,
            self.pixels.height() as f64 - y * self.pixels_per_meter,
        )
    }

    /// Pixel centre to world position (m, y up)
    pub fn pixel_to_world(&self, px: i64, py: i64) -> (f64, f64) {
        (
            px as f64 / self.pixels_per_meter,
            (self.pixels.height() as f64 - py as f64) / self.pixels_per_meter,
        )
    }

    pub fn mark_cell(&mut self, x: i64, y: i64, kind: CellKind) {
        if self.in_bounds(x, y) {
            self.pixels.put_pixel(x as u32, y as u32, kind.color());
        }
    }

    /// Fill the inclusive pixel rectangle, clipped to the map
    pub fn mark_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, kind: CellKind) {
        for y in y0.min(y1)..=y0.max(y1) {
            for x in x0.min(x1)..=x0.max(x1) {
                self.mark_cell(x, y, kind);
            }
        }
    }

    /// Paint cells for display. Obstacle and hazard cells keep their colour so
    /// tinting never changes what a later scan sees.
    pub fn tint(&mut self, cells: &[(i64, i64)], color: Rgb<u8>) {
        for &(x, y) in cells {
            if self.cell(x, y) == Some(CellKind::Free) {
                self.pixels.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_classification() {
        let mut map = OccupancyMap::blank(10, 10, 100.0);
        map.mark_cell(2, 3, CellKind::Obstacle);
        map.mark_cell(4, 5, CellKind::Hazard);

        assert_eq!(map.cell(2, 3), Some(CellKind::Obstacle));
        assert_eq!(map.cell(4, 5), Some(CellKind::Hazard));
        assert_eq!(map.cell(0, 0), Some(CellKind::Free));
        assert!(map.is_blocked(2, 3));
        assert!(map.is_blocked(4, 5));
        assert!(!map.is_blocked(1, 1));
    }

    #[test]
    fn test_out_of_bounds_is_free() {
        let map = OccupancyMap::blank(10, 10, 100.0);
        assert_eq!(map.cell(-1, 0), None);
        assert_eq!(map.cell(0, 10), None);
        assert!(!map.is_blocked(10, 3));
    }

    #[test]
    fn test_near_black_is_not_an_obstacle() {
        let mut pixels = RgbImage::from_pixel(4, 4, FREE_COLOR);
        pixels.put_pixel(1, 1, Rgb([1, 0, 0]));
        pixels.put_pixel(2, 2, Rgb([255, 0, 1]));
        let map = OccupancyMap::new(pixels, 10.0);

        assert!(!map.is_blocked(1, 1));
        assert!(!map.is_blocked(2, 2));
    }

    #[test]
    fn test_world_pixel_round_trip() {
        let map = OccupancyMap::blank(400, 300, 100.0);
        let (px, py) = map.world_to_pixel(1.5, 0.5);
        assert!((px - 150.0).abs() < 1e-9);
        assert!((py - 250.0).abs() < 1e-9);

        let (x, y) = map.pixel_to_world(150, 250);
        assert!((x - 1.5).abs() < 1e-9);
        assert!((y - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_tint_skips_blocking_cells() {
        let mut map = OccupancyMap::blank(5, 5, 100.0);
        map.mark_cell(2, 2, CellKind::Obstacle);
        map.tint(&[(1, 2), (2, 2), (9, 9)], BEAM_TINT);

        assert_eq!(*map.image().get_pixel(1, 2), BEAM_TINT);
        assert_eq!(map.cell(2, 2), Some(CellKind::Obstacle));
        assert_eq!(map.cell(1, 2), Some(CellKind::Free));
    }
}
