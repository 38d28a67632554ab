use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::time::Duration;
use vrt_core::{SessionPhase, Side};
use vrt_experiment::{ExperimentConfig, ExperimentController, MemorySink};
use vrt_timing::{DeadlineScheduler, ManualClock, Timer};

/// Rng that returns the same word forever: every uniform draw is 0.0.
struct ZeroRng;

impl RngCore for ZeroRng {
    fn next_u32(&mut self) -> u32 {
        0
    }
    fn next_u64(&mut self) -> u64 {
        0
    }
    fn fill_bytes(&mut self, dst: &mut [u8]) {
        dst.fill(0);
    }
}

fn config(total: usize) -> ExperimentConfig {
    ExperimentConfig {
        total_trials: total,
        per_side_quota: total / 2,
        ..Default::default()
    }
}

/// Runs a whole session, reacting `latencies[i]` ms after each stimulus.
fn run<R: rand::Rng>(
    c: &mut ExperimentController<DeadlineScheduler<ManualClock>, R>,
    clock: &ManualClock,
    latencies: &[u64],
) -> Vec<Side> {
    let mut sink = MemorySink::default();
    c.press_control(clock.now(), &mut sink).unwrap();
    for &latency in latencies {
        // early press during the blind wait is a false start
        c.handle_user_input(clock.now()).unwrap();
        assert_eq!(c.phase(), SessionPhase::Waiting);

        clock.advance(c.next_deadline_in().unwrap());
        c.tick().unwrap();
        assert_eq!(c.phase(), SessionPhase::StimulusVisible);

        clock.advance(Duration::from_millis(latency));
        c.handle_user_input(clock.now()).unwrap();
    }
    assert!(c.is_finished());
    c.recorder()
        .snapshot()
        .overall
        .iter()
        .map(|o| o.side)
        .collect()
}

#[test]
fn balanced_quota_holds_for_many_seeds() {
    for seed in 0..100 {
        let clock = ManualClock::new();
        let mut c = ExperimentController::new(
            config(20),
            DeadlineScheduler::new(clock.clone()),
            StdRng::seed_from_u64(seed),
        )
        .unwrap();
        let sides = run(&mut c, &clock, &[300; 20]);

        assert_eq!(c.allocation().count_a, 10);
        assert_eq!(c.allocation().count_b, 10);
        assert_eq!(sides.iter().filter(|&&s| s == Side::A).count(), 10);

        let snap = c.recorder().snapshot();
        assert_eq!(snap.overall.len(), 20);
        assert_eq!(snap.side_a.len() + snap.side_b.len(), 20);
    }
}

#[test]
fn recorded_latency_matches_reaction_offset() {
    let clock = ManualClock::new();
    let mut c = ExperimentController::new(
        config(6),
        DeadlineScheduler::new(clock.clone()),
        StdRng::seed_from_u64(42),
    )
    .unwrap();
    let latencies = [181, 240, 0, 512, 333, 275];
    run(&mut c, &clock, &latencies);

    let recorded = c.recorder().snapshot().latencies();
    assert_eq!(recorded, latencies);
}

#[test]
fn four_trial_export_lists_sides_in_trial_order() {
    let clock = ManualClock::new();
    let mut c =
        ExperimentController::new(config(4), DeadlineScheduler::new(clock.clone()), ZeroRng)
            .unwrap();
    let sides = run(&mut c, &clock, &[250, 300, 275, 325]);
    // zero draws always pick A until it is full, then B is forced
    assert_eq!(sides, vec![Side::A, Side::A, Side::B, Side::B]);

    let mut sink = MemorySink::default();
    c.press_control(clock.now(), &mut sink).unwrap();
    let csv = String::from_utf8(sink.delivered[0].contents.clone()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], "pid,trial#,reactionTime (ms),circle");

    let pid = lines[1].split(',').next().unwrap();
    let expected = [("0", "250", "left"), ("1", "300", "left"), ("2", "275", "right"), ("3", "325", "right")];
    for (line, (trial, latency, circle)) in lines[1..].iter().zip(expected) {
        assert_eq!(*line, format!("{pid},{trial},{latency},{circle}"));
    }
}

#[test]
fn each_export_draws_its_own_pid_but_same_rows() {
    let clock = ManualClock::new();
    let mut c = ExperimentController::new(
        config(4),
        DeadlineScheduler::new(clock.clone()),
        StdRng::seed_from_u64(8),
    )
    .unwrap();
    run(&mut c, &clock, &[210, 220, 230, 240]);

    let mut sink = MemorySink::default();
    c.press_control(clock.now(), &mut sink).unwrap();
    c.press_control(clock.now(), &mut sink).unwrap();
    // each export is a CSV followed by its JSON twin
    assert_eq!(sink.delivered.len(), 4);

    let strip_pid = |bytes: &[u8]| -> Vec<String> {
        String::from_utf8(bytes.to_vec())
            .unwrap()
            .lines()
            .skip(1)
            .map(|l| l.split_once(',').unwrap().1.to_string())
            .collect()
    };
    assert_eq!(
        strip_pid(&sink.delivered[0].contents),
        strip_pid(&sink.delivered[2].contents)
    );
}
