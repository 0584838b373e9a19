pub mod noise;
pub mod occupancy_map;
pub mod raster_scanner;
pub mod tof_ring;

pub use noise::*;
pub use occupancy_map::*;
pub use raster_scanner::*;
pub use tof_ring::*;
