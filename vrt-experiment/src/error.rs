use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot summarize an empty latency sequence")]
    EmptyStatistics,

    #[error("both sides are at quota ({count_a}/{count_b} of {per_side_quota}), no trial left to allocate")]
    QuotaExhausted {
        count_a: usize,
        count_b: usize,
        per_side_quota: usize,
    },

    #[error("results are only available once the run has finished")]
    NotFinished,

    #[error("failed to encode results: {0}")]
    Json(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExperimentError>;
