//! Motion control: PID loops and the speed controller built on them.

pub mod pid;
pub mod speed;

pub use pid::PidController;
pub use speed::{SpeedController, WallControl};
