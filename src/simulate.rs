use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use std::time::Duration;
use tracing::info;
use vrt_core::SessionPhase;
use vrt_experiment::{DirectorySink, ExperimentConfig, ExperimentController, ResultSet};
use vrt_timing::{DeadlineScheduler, Timer};

/// Plausible human reaction latencies, in ms.
const SIMULATED_LATENCY_MS: std::ops::RangeInclusive<u64> = 180..=420;

/// Runs a whole session with a simulated participant and exports the results.
///
/// The participant presses once during every blind wait (a false start the
/// experiment must discard) and then reacts after a random latency.
pub fn run_headless<T: Timer>(
    config: ExperimentConfig,
    timer: T,
    out_dir: &Path,
    seed: Option<u64>,
) -> Result<ResultSet> {
    let rng = seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
    let mut participant = seed.map_or_else(StdRng::from_os_rng, |s| {
        StdRng::seed_from_u64(s.wrapping_add(1))
    });
    let mut sink = DirectorySink::new(out_dir);
    let mut experiment =
        ExperimentController::new(config, DeadlineScheduler::new(timer.clone()), rng)?;

    experiment.press_control(timer.now(), &mut sink)?;
    while !experiment.is_finished() {
        let wait = experiment
            .next_deadline_in()
            .context("running session has no pending stimulus")?;
        timer.sleep(wait / 2);
        experiment.handle_user_input(timer.now())?;
        while experiment.phase() == SessionPhase::Waiting {
            timer.sleep(
                experiment
                    .next_deadline_in()
                    .unwrap_or(Duration::from_millis(1)),
            );
            experiment.tick()?;
        }

        let latency = participant.random_range(SIMULATED_LATENCY_MS);
        timer.sleep(Duration::from_millis(latency));
        experiment.handle_user_input(timer.now())?;

        let (done, total) = experiment.trial_progress();
        info!("Simulated trial {done}/{total}");
    }

    let (results, _) = experiment.export(&mut sink)?;
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vrt_timing::ManualClock;

    #[test]
    fn headless_run_on_manual_clock_writes_both_files() {
        let dir = std::env::temp_dir().join(format!("vrt-headless-{}", std::process::id()));
        let config = ExperimentConfig {
            total_trials: 6,
            per_side_quota: 3,
            ..Default::default()
        };
        let results = run_headless(config, ManualClock::new(), &dir, Some(7)).unwrap();

        assert_eq!(results.rows.len(), 6);
        assert_eq!(results.side_a.count, 3);
        assert_eq!(results.side_b.count, 3);
        assert!(results
            .rows
            .iter()
            .all(|r| SIMULATED_LATENCY_MS.contains(&r.latency_ms)));

        let csv = std::fs::read_to_string(dir.join("VisualReactionTestResults.csv")).unwrap();
        assert_eq!(csv.lines().count(), 7);
        assert!(dir.join("VisualReactionTestResults.json").exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn unseeded_runs_simulate_different_participants() {
        let base = std::env::temp_dir().join(format!("vrt-unseeded-{}", std::process::id()));
        let config = ExperimentConfig {
            total_trials: 6,
            per_side_quota: 3,
            ..Default::default()
        };
        let latencies = |dir: &Path| -> Vec<u64> {
            run_headless(config.clone(), ManualClock::new(), dir, None)
                .unwrap()
                .rows
                .iter()
                .map(|r| r.latency_ms)
                .collect()
        };
        let first = latencies(&base.join("a"));
        let second = latencies(&base.join("b"));
        assert_ne!(first, second);
        std::fs::remove_dir_all(&base).unwrap();
    }
}
