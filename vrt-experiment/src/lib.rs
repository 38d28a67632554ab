pub mod allocator;
pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod recorder;
pub mod state;
pub mod stats;

pub use allocator::{AllocationState, choose_side};
pub use config::{ExperimentConfig, ResponseInput};
pub use controller::ExperimentController;
pub use error::{ExperimentError, Result};
pub use export::{DirectorySink, ExportSink, MemorySink, ResultSet, TrialRow};
pub use recorder::{RecorderSnapshot, TrialRecorder};
pub use state::{ExperimentEvent, TrialState, TrialStateMachine};
pub use stats::summarize;
