use super::allocator::{AllocationState, choose_side};
use super::config::ExperimentConfig;
use super::error::Result;
use super::recorder::TrialRecorder;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info};
use vrt_core::{RenderCommand, SessionPhase, Side};
use vrt_timing::{Fired, Scheduler, TimerHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    Idle,
    Waiting {
        delay_ms: u64,
        armed_at: u64,
        handle: TimerHandle,
    },
    Visible {
        side: Side,
        shown_at: u64,
    },
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExperimentEvent {
    Start { now: u64 },
    TimerFired(Fired),
    Reaction { at: u64 },
    Abort,
}

/// Temporal lifecycle of a run: blind wait, stimulus, capture, repeat.
///
/// The only window in which a reaction is accepted is `Visible`. At most one
/// timer is outstanding and it belongs to the current `Waiting` state; a fired
/// handle that does not match it is dropped.
pub struct TrialStateMachine<S, R>
where
    S: Scheduler,
    R: Rng,
{
    config: ExperimentConfig,
    scheduler: S,
    rng: R,
    state: TrialState,
    allocation: AllocationState,
}

impl<S, R> TrialStateMachine<S, R>
where
    S: Scheduler,
    R: Rng,
{
    pub fn new(config: ExperimentConfig, scheduler: S, rng: R) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            scheduler,
            rng,
            state: TrialState::Idle,
            allocation: AllocationState::default(),
        })
    }

    pub fn handle_event(
        &mut self,
        event: ExperimentEvent,
        recorder: &mut TrialRecorder,
    ) -> Result<Vec<RenderCommand>> {
        match (self.state, event) {
            (TrialState::Idle, ExperimentEvent::Start { now }) => {
                info!("Experiment started");
                Ok(self.arm_wait(now))
            }

            (
                TrialState::Waiting {
                    handle, armed_at, ..
                },
                ExperimentEvent::TimerFired(fired),
            ) if handle == fired.handle => self.show_stimulus(armed_at, fired.at),

            (TrialState::Visible { side, shown_at }, ExperimentEvent::Reaction { at }) => {
                let Some(latency_ms) = at.checked_sub(shown_at) else {
                    debug!(at, shown_at, "reaction timestamp precedes stimulus, discarded");
                    return Ok(Vec::new());
                };
                Ok(self.capture(side, latency_ms, at, recorder))
            }

            (TrialState::Waiting { handle, .. }, ExperimentEvent::Abort) => {
                self.scheduler.cancel(handle);
                Ok(self.reset(recorder))
            }
            (_, ExperimentEvent::Abort) => Ok(self.reset(recorder)),

            (state, ExperimentEvent::TimerFired(fired)) => {
                debug!(handle = fired.handle.id(), ?state, "stale timer ignored");
                Ok(Vec::new())
            }
            (state, event) => {
                debug!(?state, ?event, "event not accepted in current state");
                Ok(Vec::new())
            }
        }
    }

    pub fn start(&mut self, now: u64, recorder: &mut TrialRecorder) -> Result<Vec<RenderCommand>> {
        self.handle_event(ExperimentEvent::Start { now }, recorder)
    }

    pub fn on_timer_fire(
        &mut self,
        fired: Fired,
        recorder: &mut TrialRecorder,
    ) -> Result<Vec<RenderCommand>> {
        self.handle_event(ExperimentEvent::TimerFired(fired), recorder)
    }

    pub fn react(&mut self, at: u64, recorder: &mut TrialRecorder) -> Result<Vec<RenderCommand>> {
        self.handle_event(ExperimentEvent::Reaction { at }, recorder)
    }

    pub fn abort(&mut self, recorder: &mut TrialRecorder) -> Result<Vec<RenderCommand>> {
        self.handle_event(ExperimentEvent::Abort, recorder)
    }

    /// Delivers every due timer to the machine.
    pub fn poll_timers(&mut self, recorder: &mut TrialRecorder) -> Result<Vec<RenderCommand>> {
        let mut commands = Vec::new();
        while let Some(fired) = self.scheduler.poll() {
            commands.extend(self.on_timer_fire(fired, recorder)?);
        }
        Ok(commands)
    }

    fn arm_wait(&mut self, now: u64) -> Vec<RenderCommand> {
        let delay_ms = self.draw_delay();
        let handle = self.scheduler.schedule(Duration::from_millis(delay_ms));
        self.state = TrialState::Waiting {
            delay_ms,
            armed_at: now,
            handle,
        };
        info!(
            "Trial {}. Random delay: {} ms",
            self.allocation.total(),
            delay_ms
        );
        vec![RenderCommand::ClearStimuli]
    }

    fn show_stimulus(&mut self, armed_at: u64, now: u64) -> Result<Vec<RenderCommand>> {
        let remaining = self
            .config
            .total_trials
            .saturating_sub(self.allocation.total());
        let side = choose_side(
            self.allocation.count_a,
            self.allocation.count_b,
            self.config.per_side_quota,
            remaining,
            &mut self.rng,
        )?;
        self.allocation.record(side);
        self.state = TrialState::Visible {
            side,
            shown_at: now,
        };
        info!(
            "Trial {}. Stimulus shown on {} at {} after {} ms",
            self.allocation.total() - 1,
            side,
            now,
            now.saturating_sub(armed_at)
        );
        Ok(RenderCommand::show(side).to_vec())
    }

    fn capture(
        &mut self,
        side: Side,
        latency_ms: u64,
        now: u64,
        recorder: &mut TrialRecorder,
    ) -> Vec<RenderCommand> {
        recorder.append(side, latency_ms);
        info!("User reaction captured. {} ms on {}", latency_ms, side);

        let mut commands = vec![RenderCommand::LastLatency { latency_ms }];
        if recorder.len() < self.config.total_trials {
            commands.extend(self.arm_wait(now));
        } else {
            self.state = TrialState::Done;
            info!("Experiment ended. Await download of results");
            commands.push(RenderCommand::ClearStimuli);
        }
        commands
    }

    /// Discards the run: allocation and recorded trials start over.
    fn reset(&mut self, recorder: &mut TrialRecorder) -> Vec<RenderCommand> {
        self.state = TrialState::Idle;
        self.allocation = AllocationState::default();
        *recorder = TrialRecorder::new();
        vec![RenderCommand::ClearStimuli]
    }

    /// Uniform over `min, min + step, ..., max`.
    fn draw_delay(&mut self) -> u64 {
        let slot = self.rng.random_range(0..self.config.delay_slots());
        self.config.min_delay_ms + slot * self.config.delay_step_ms
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn state(&self) -> &TrialState {
        &self.state
    }

    pub fn phase(&self) -> SessionPhase {
        match self.state {
            TrialState::Idle => SessionPhase::NotStarted,
            TrialState::Waiting { .. } => SessionPhase::Waiting,
            TrialState::Visible { .. } => SessionPhase::StimulusVisible,
            TrialState::Done => SessionPhase::Finished,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == TrialState::Done
    }

    pub fn allocation(&self) -> AllocationState {
        self.allocation
    }

    /// Side and timestamp of the stimulus on screen, if any.
    pub fn current_stimulus(&self) -> Option<(Side, u64)> {
        match self.state {
            TrialState::Visible { side, shown_at } => Some((side, shown_at)),
            _ => None,
        }
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use vrt_timing::{DeadlineScheduler, ManualClock, Timer};

    type Machine = TrialStateMachine<DeadlineScheduler<ManualClock>, StdRng>;

    fn machine(total: usize, seed: u64) -> (Machine, ManualClock) {
        let clock = ManualClock::new();
        let config = ExperimentConfig {
            total_trials: total,
            per_side_quota: total / 2,
            ..Default::default()
        };
        let m = TrialStateMachine::new(
            config,
            DeadlineScheduler::new(clock.clone()),
            StdRng::seed_from_u64(seed),
        )
        .unwrap();
        (m, clock)
    }

    /// Advances the clock to the pending deadline and delivers it.
    fn fire(m: &mut Machine, clock: &ManualClock, rec: &mut TrialRecorder) {
        let wait = m.scheduler().next_deadline_in().expect("a timer is pending");
        clock.advance(wait);
        m.poll_timers(rec).unwrap();
    }

    #[test]
    fn start_arms_a_delay_on_the_grid() {
        for seed in 0..50 {
            let (mut m, clock) = machine(4, seed);
            let mut rec = TrialRecorder::new();
            m.start(clock.now(), &mut rec).unwrap();
            let TrialState::Waiting { delay_ms, .. } = *m.state() else {
                panic!("expected waiting, got {:?}", m.state());
            };
            assert!([2000, 3000, 4000, 5000].contains(&delay_ms));
            assert_eq!(m.scheduler().pending(), 1);
        }
    }

    #[test]
    fn timer_shows_stimulus_and_updates_allocation() {
        let (mut m, clock) = machine(4, 3);
        let mut rec = TrialRecorder::new();
        m.start(0, &mut rec).unwrap();

        let wait = m.scheduler().next_deadline_in().unwrap();
        clock.advance(wait);
        let cmds = m.poll_timers(&mut rec).unwrap();

        let (side, shown_at) = m.current_stimulus().unwrap();
        assert_eq!(shown_at, wait.as_millis() as u64);
        assert_eq!(m.allocation().count(side), 1);
        assert_eq!(cmds, RenderCommand::show(side).to_vec());
        assert_eq!(m.phase(), SessionPhase::StimulusVisible);
    }

    #[test]
    fn latency_is_reaction_minus_shown() {
        let (mut m, clock) = machine(4, 5);
        let mut rec = TrialRecorder::new();
        m.start(0, &mut rec).unwrap();
        fire(&mut m, &clock, &mut rec);
        let (side, shown_at) = m.current_stimulus().unwrap();

        let cmds = m.react(shown_at + 287, &mut rec).unwrap();
        assert_eq!(rec.last().copied(), Some(vrt_core::TrialOutcome { side, latency_ms: 287 }));
        assert_eq!(cmds[0], RenderCommand::LastLatency { latency_ms: 287 });
        assert!(matches!(m.state(), TrialState::Waiting { .. }));
    }

    #[test]
    fn reactions_outside_visible_window_change_nothing() {
        let (mut m, clock) = machine(2, 9);
        let mut rec = TrialRecorder::new();

        // idle
        assert!(m.react(10, &mut rec).unwrap().is_empty());
        assert_eq!(m.phase(), SessionPhase::NotStarted);

        // waiting
        m.start(clock.now(), &mut rec).unwrap();
        assert!(m.react(clock.now() + 1, &mut rec).unwrap().is_empty());
        assert!(rec.is_empty());
        assert_eq!(m.allocation(), AllocationState::default());

        // done
        for _ in 0..2 {
            fire(&mut m, &clock, &mut rec);
            m.react(clock.now() + 200, &mut rec).unwrap();
        }
        assert!(m.is_done());
        let alloc = m.allocation();
        assert!(m.react(clock.now() + 999, &mut rec).unwrap().is_empty());
        assert_eq!(rec.len(), 2);
        assert_eq!(m.allocation(), alloc);
    }

    #[test]
    fn reaction_before_stimulus_timestamp_is_discarded() {
        let (mut m, clock) = machine(2, 1);
        let mut rec = TrialRecorder::new();
        m.start(0, &mut rec).unwrap();
        fire(&mut m, &clock, &mut rec);
        let (_, shown_at) = m.current_stimulus().unwrap();

        assert!(m.react(shown_at - 1, &mut rec).unwrap().is_empty());
        assert!(rec.is_empty());
        assert_eq!(m.phase(), SessionPhase::StimulusVisible);
    }

    #[test]
    fn two_trial_run_hits_each_side_once() {
        for seed in 0..100 {
            let (mut m, clock) = machine(2, seed);
            let mut rec = TrialRecorder::new();
            m.start(0, &mut rec).unwrap();
            while !m.is_done() {
                fire(&mut m, &clock, &mut rec);
                m.react(clock.now() + 300, &mut rec).unwrap();
            }
            let snap = rec.snapshot();
            assert_eq!(snap.side_a.len(), 1);
            assert_eq!(snap.side_b.len(), 1);
            assert_eq!(m.scheduler().pending(), 0);
        }
    }

    #[test]
    fn abort_cancels_pending_timer_and_stale_fire_is_ignored() {
        let (mut m, clock) = machine(4, 2);
        let mut rec = TrialRecorder::new();
        m.start(0, &mut rec).unwrap();
        let TrialState::Waiting { handle, .. } = *m.state() else {
            panic!("expected waiting");
        };

        m.abort(&mut rec).unwrap();
        assert_eq!(m.phase(), SessionPhase::NotStarted);
        assert_eq!(m.scheduler().pending(), 0);

        clock.advance(Duration::from_secs(10));
        assert!(m.poll_timers(&mut rec).unwrap().is_empty());

        // a late delivery of the old handle cannot resurrect the run
        let stale = Fired { handle, at: clock.now() };
        assert!(m.on_timer_fire(stale, &mut rec).unwrap().is_empty());
        assert_eq!(m.phase(), SessionPhase::NotStarted);
    }

    #[test]
    fn restart_after_abort_draws_a_fresh_handle() {
        let (mut m, clock) = machine(4, 4);
        let mut rec = TrialRecorder::new();
        m.start(0, &mut rec).unwrap();
        let TrialState::Waiting { handle: old, .. } = *m.state() else {
            panic!("expected waiting");
        };
        m.abort(&mut rec).unwrap();
        m.start(clock.now(), &mut rec).unwrap();

        let stale = Fired { handle: old, at: clock.now() + 6000 };
        assert!(m.on_timer_fire(stale, &mut rec).unwrap().is_empty());
        assert_eq!(m.phase(), SessionPhase::Waiting);

        fire(&mut m, &clock, &mut rec);
        assert_eq!(m.phase(), SessionPhase::StimulusVisible);
    }

    #[test]
    fn abort_discards_recorded_trials_so_restart_stays_balanced() {
        let (mut m, clock) = machine(2, 12);
        let mut rec = TrialRecorder::new();
        m.start(0, &mut rec).unwrap();
        fire(&mut m, &clock, &mut rec);
        m.react(clock.now() + 200, &mut rec).unwrap();
        assert_eq!(rec.len(), 1);

        m.abort(&mut rec).unwrap();
        assert!(rec.is_empty());

        m.start(clock.now(), &mut rec).unwrap();
        fire(&mut m, &clock, &mut rec);
        m.react(clock.now() + 200, &mut rec).unwrap();
        assert_eq!(m.phase(), SessionPhase::Waiting);

        fire(&mut m, &clock, &mut rec);
        m.react(clock.now() + 200, &mut rec).unwrap();
        assert!(m.is_done());
        assert_eq!(rec.len(), 2);
        assert_eq!(m.allocation(), AllocationState { count_a: 1, count_b: 1 });
    }

    #[test]
    fn config_is_readable_but_fixed_after_construction() {
        let (m, _) = machine(4, 0);
        assert_eq!(m.config().total_trials, 4);
        assert_eq!(m.config().per_side_quota, 2);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ExperimentConfig {
            total_trials: 3,
            per_side_quota: 1,
            ..Default::default()
        };
        let res = TrialStateMachine::new(
            config,
            DeadlineScheduler::new(ManualClock::new()),
            StdRng::seed_from_u64(0),
        );
        assert!(res.is_err());
    }
}
