use crate::{Side, Summary};
use serde::{Deserialize, Serialize};

/// Caption shown on the single start/export control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlLabel {
    Start,
    Download,
}

/// Declarative instructions for whatever draws the experiment.
///
/// The experiment never touches the display; it emits these after every
/// transition and the front end folds them into its own scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RenderCommand {
    Stimulus { side: Side, active: bool },
    ClearStimuli,
    Fixation { visible: bool },
    LastLatency { latency_ms: u64 },
    Control { enabled: bool, label: ControlLabel },
    Summary {
        side_a: Summary,
        side_b: Summary,
        overall: Summary,
    },
    OfferDownload { file_name: String },
}

impl RenderCommand {
    /// Commands that light one side and darken the other.
    pub fn show(side: Side) -> [RenderCommand; 2] {
        [
            RenderCommand::Stimulus { side, active: true },
            RenderCommand::Stimulus {
                side: side.other(),
                active: false,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_pairs_active_and_inactive_sides() {
        let [on, off] = RenderCommand::show(Side::B);
        assert_eq!(
            on,
            RenderCommand::Stimulus {
                side: Side::B,
                active: true
            }
        );
        assert_eq!(
            off,
            RenderCommand::Stimulus {
                side: Side::A,
                active: false
            }
        );
    }

    #[test]
    fn commands_serialize_for_remote_renderers() {
        let json = serde_json::to_string(&RenderCommand::LastLatency { latency_ms: 312 }).unwrap();
        assert_eq!(json, r#"{"LastLatency":{"latency_ms":312}}"#);
    }
}
