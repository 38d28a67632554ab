use crate::Side;
use serde::{Deserialize, Serialize};

/// Recorded result of one captured reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub side: Side,
    pub latency_ms: u64,
}

/// Count, mean and population standard deviation of a latency sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub standard_deviation: f64,
}
