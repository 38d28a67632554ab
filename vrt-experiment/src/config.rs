use crate::error::{ExperimentError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Input that counts as a reaction to the stimulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseInput {
    #[default]
    Space,
    PointerPrimary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub total_trials: usize,
    pub per_side_quota: usize,
    /// Shortest blind wait before a stimulus, inclusive.
    pub min_delay_ms: u64,
    /// Longest blind wait before a stimulus, inclusive.
    pub max_delay_ms: u64,
    /// Grid spacing of the delay draw.
    pub delay_step_ms: u64,
    pub response_input: ResponseInput,
    pub export_file_name: String,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            total_trials: 20,
            per_side_quota: 10,
            min_delay_ms: 2000,
            max_delay_ms: 5000,
            delay_step_ms: 1000,
            response_input: ResponseInput::Space,
            export_file_name: "VisualReactionTestResults.csv".to_string(),
        }
    }
}

impl ExperimentConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Rejects configurations under which exact per-side balance is unreachable.
    pub fn validate(&self) -> Result<()> {
        if self.per_side_quota == 0 {
            return Err(ExperimentError::InvalidConfig(
                "per_side_quota must be at least 1".into(),
            ));
        }
        if self.total_trials != 2 * self.per_side_quota {
            return Err(ExperimentError::InvalidConfig(format!(
                "total_trials ({}) must equal 2 x per_side_quota ({})",
                self.total_trials, self.per_side_quota
            )));
        }
        if self.min_delay_ms > self.max_delay_ms {
            return Err(ExperimentError::InvalidConfig(format!(
                "min_delay_ms ({}) exceeds max_delay_ms ({})",
                self.min_delay_ms, self.max_delay_ms
            )));
        }
        if self.delay_step_ms == 0 {
            return Err(ExperimentError::InvalidConfig(
                "delay_step_ms must be positive".into(),
            ));
        }
        if self.export_file_name.trim().is_empty() {
            return Err(ExperimentError::InvalidConfig(
                "export_file_name must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Number of distinct delays the wait draw can produce.
    pub fn delay_slots(&self) -> u64 {
        (self.max_delay_ms - self.min_delay_ms) / self.delay_step_ms + 1
    }
}
