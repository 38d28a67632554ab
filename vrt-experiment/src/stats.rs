use crate::error::{ExperimentError, Result};
use vrt_core::Summary;

/// Count, mean and population standard deviation (divides by `n`).
pub fn summarize(latencies: &[u64]) -> Result<Summary> {
    if latencies.is_empty() {
        return Err(ExperimentError::EmptyStatistics);
    }
    let n = latencies.len() as f64;
    let mean = latencies.iter().map(|&v| v as f64).sum::<f64>() / n;
    let variance = latencies
        .iter()
        .map(|&v| (v as f64 - mean).powi(2))
        .sum::<f64>()
        / n;

    Ok(Summary {
        count: latencies.len(),
        mean,
        standard_deviation: variance.sqrt(),
    })
}
