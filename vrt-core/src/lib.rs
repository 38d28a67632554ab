pub mod phase;
pub mod render;
pub mod side;
pub mod trial;

pub use phase::SessionPhase;
pub use render::{ControlLabel, RenderCommand};
pub use side::Side;
pub use trial::{Summary, TrialOutcome};
