//! # Mecanum Simulator Library
//!
//! Kinematic integration and range sensing for a four-wheel mecanum robot
//! living in a 2D world. Nodes that drive the simulation (schedulers,
//! publishers, renderers) build on the types re-exported here.

pub mod robot;
pub mod sensors;
pub mod types;
pub mod utils;

// Re-export everything for convenience
pub use robot::*;
pub use sensors::*;
pub use types::*;
pub use utils::*;
