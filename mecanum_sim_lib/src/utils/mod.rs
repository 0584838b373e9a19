pub mod geometry;
pub mod logging;
pub mod mecanum_kinematics;

pub use geometry::*;
pub use logging::*;
pub use mecanum_kinematics::*;
