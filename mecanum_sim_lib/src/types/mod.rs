pub mod config;
pub mod obstacle;
pub mod robot_state;
pub mod telemetry;

pub use config::*;
pub use obstacle::*;
pub use robot_state::*;
pub use telemetry::*;
