use crate::allocator::AllocationState;
use crate::config::ExperimentConfig;
use crate::error::{ExperimentError, Result};
use crate::export::{ExportSink, ResultSet, TrialRow};
use crate::recorder::TrialRecorder;
use crate::state::TrialStateMachine;
use crate::stats::summarize;
use rand::Rng;
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use vrt_core::{ControlLabel, RenderCommand, SessionPhase};
use vrt_timing::Scheduler;

const PARTICIPANT_ID_RANGE: RangeInclusive<u32> = 100_000..=999_999;

/// Entry point for the front end: owns the run, its log and the control state.
pub struct ExperimentController<S, R>
where
    S: Scheduler,
    R: Rng,
{
    machine: TrialStateMachine<S, R>,
    recorder: TrialRecorder,
    control_enabled: bool,
}

impl<S, R> ExperimentController<S, R>
where
    S: Scheduler,
    R: Rng,
{
    pub fn new(config: ExperimentConfig, scheduler: S, rng: R) -> Result<Self> {
        Ok(Self {
            machine: TrialStateMachine::new(config, scheduler, rng)?,
            recorder: TrialRecorder::new(),
            control_enabled: true,
        })
    }

    /// Initial scene, before anything has happened.
    pub fn initial_commands(&self) -> Vec<RenderCommand> {
        vec![
            RenderCommand::ClearStimuli,
            RenderCommand::Fixation { visible: false },
            RenderCommand::Control {
                enabled: true,
                label: ControlLabel::Start,
            },
        ]
    }

    pub fn start(&mut self, now: u64) -> Result<Vec<RenderCommand>> {
        if self.phase() != SessionPhase::NotStarted {
            debug!(phase = ?self.phase(), "start ignored, run already begun");
            return Ok(Vec::new());
        }
        self.control_enabled = false;
        let mut commands = vec![
            RenderCommand::Control {
                enabled: false,
                label: ControlLabel::Start,
            },
            RenderCommand::Fixation { visible: true },
        ];
        commands.extend(self.machine.start(now, &mut self.recorder)?);
        Ok(commands)
    }

    /// The single start/download control.
    ///
    /// Starts the run when nothing has happened yet and exports once the run
    /// is over. Presses while the control is disabled are dropped.
    pub fn press_control<E: ExportSink>(
        &mut self,
        now: u64,
        sink: &mut E,
    ) -> Result<Vec<RenderCommand>> {
        if !self.control_enabled {
            debug!("control press ignored while disabled");
            return Ok(Vec::new());
        }
        match self.phase() {
            SessionPhase::NotStarted => self.start(now),
            SessionPhase::Finished => self.export(sink).map(|(_, commands)| commands),
            phase => {
                debug!(?phase, "control press ignored mid-run");
                Ok(Vec::new())
            }
        }
    }

    pub fn handle_user_input(&mut self, timestamp: u64) -> Result<Vec<RenderCommand>> {
        let phase = self.phase();
        if !phase.accepts_reaction() {
            debug!(?phase, timestamp, "input outside the stimulus window discarded");
            return Ok(Vec::new());
        }
        let mut commands = self.machine.react(timestamp, &mut self.recorder)?;
        self.finalize_if_done(&mut commands);
        Ok(commands)
    }

    /// Delivers due timers. Call from the event loop whenever it wakes.
    pub fn tick(&mut self) -> Result<Vec<RenderCommand>> {
        self.machine.poll_timers(&mut self.recorder)
    }

    /// Drops the current run and cancels its pending timer.
    pub fn abort(&mut self) -> Result<Vec<RenderCommand>> {
        let mut commands = self.machine.abort(&mut self.recorder)?;
        self.control_enabled = true;
        info!("Experiment aborted");
        commands.push(RenderCommand::Fixation { visible: false });
        commands.push(RenderCommand::Control {
            enabled: true,
            label: ControlLabel::Start,
        });
        Ok(commands)
    }

    pub fn is_finished(&self) -> bool {
        self.phase().is_finished()
    }

    /// Packages the finished run; a new participant id is drawn on every call.
    pub fn build_result_set(&mut self) -> Result<ResultSet> {
        if !self.is_finished() {
            return Err(ExperimentError::NotFinished);
        }
        let snapshot = self.recorder.snapshot();
        let rows = snapshot
            .overall
            .iter()
            .enumerate()
            .map(|(trial, outcome)| TrialRow {
                trial,
                latency_ms: outcome.latency_ms,
                circle: outcome.side,
            })
            .collect();

        let side_a = summarize(snapshot.side_a)?;
        let side_b = summarize(snapshot.side_b)?;
        let overall = summarize(&snapshot.latencies())?;
        let participant_id = self.machine.rng_mut().random_range(PARTICIPANT_ID_RANGE);

        Ok(ResultSet {
            participant_id,
            rows,
            side_a,
            side_b,
            overall,
        })
    }

    /// Builds the result set, hands the CSV and its JSON twin to `sink` and
    /// reports the summary.
    pub fn export<E: ExportSink>(&mut self, sink: &mut E) -> Result<(ResultSet, Vec<RenderCommand>)> {
        let results = self.build_result_set()?;
        let file_name = self.machine.config().export_file_name.clone();
        sink.deliver(&file_name, "text/csv", results.to_csv().as_bytes())?;

        let json_name = Path::new(&file_name).with_extension("json");
        sink.deliver(
            &json_name.to_string_lossy(),
            "application/json",
            results.to_json()?.as_bytes(),
        )?;

        info!(pid = results.participant_id, "Exported {} trials", results.rows.len());
        for line in results.summary_lines() {
            info!("{line}");
        }

        let commands = vec![
            RenderCommand::Summary {
                side_a: results.side_a,
                side_b: results.side_b,
                overall: results.overall,
            },
            RenderCommand::OfferDownload { file_name },
        ];
        Ok((results, commands))
    }

    fn finalize_if_done(&mut self, commands: &mut Vec<RenderCommand>) {
        if self.machine.is_done() && !self.control_enabled {
            self.control_enabled = true;
            commands.push(RenderCommand::Control {
                enabled: true,
                label: ControlLabel::Download,
            });
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.machine.phase()
    }

    pub fn control_enabled(&self) -> bool {
        self.control_enabled
    }

    pub fn allocation(&self) -> AllocationState {
        self.machine.allocation()
    }

    pub fn recorder(&self) -> &TrialRecorder {
        &self.recorder
    }

    pub fn config(&self) -> &ExperimentConfig {
        self.machine.config()
    }

    /// How long the event loop may sleep before the next timer is due.
    pub fn next_deadline_in(&self) -> Option<Duration> {
        self.machine.scheduler().next_deadline_in()
    }

    pub fn trial_progress(&self) -> (usize, usize) {
        (self.recorder.len(), self.machine.config().total_trials)
    }
}
