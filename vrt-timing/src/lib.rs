pub mod scheduler;
pub mod timer;

pub use scheduler::{DeadlineScheduler, Fired, Scheduler, TimerHandle};
pub use timer::{HighPrecisionTimer, ManualClock, Timer};
