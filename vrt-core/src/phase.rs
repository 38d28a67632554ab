use serde::{Deserialize, Serialize};

/// Lifecycle of one experiment run, as seen from outside the state machine.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionPhase {
    #[default]
    NotStarted,
    Waiting,
    StimulusVisible,
    Finished,
}

impl SessionPhase {
    /// Reactions are only accepted while a stimulus is on screen.
    pub fn accepts_reaction(&self) -> bool {
        matches!(self, Self::StimulusVisible)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Waiting | Self::StimulusVisible)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}
