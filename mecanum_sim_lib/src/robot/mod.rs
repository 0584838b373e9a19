pub mod clock;
pub mod integrator;
pub mod mecanum_robot;

pub use clock::*;
pub use integrator::*;
pub use mecanum_robot::*;
