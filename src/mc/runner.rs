// src/mc/runner.rs
//! Incremental simulation runner
//!
//! # State machine
//!
//! ```text
//! Idle ──start──▶ Running ──all samples──▶ Completed
//!                    │
//!                    ├──cancel observed──▶ Cancelled
//!                    └──batch failure────▶ Failed
//! ```
//!
//! A run is driven by pulling events from [`RunEvents`]. Every call to
//! `next()` advances the batch loop until the next event is due, so control
//! returns to the consumer at each emission. Cancellation is an atomic flag
//! checked before every batch; it can be raised from any thread through
//! [`SimulationRunner::cancel`] or a cloned [`RunnerHandle`].
//!
//! # Batch loop
//!
//! ```text
//! size  = min(batch_size, n_simulations - iteration)
//! batch = estimator.generate_batch(size, rng)
//! stats.update(v) for v in batch.counted()
//! iteration += size
//! emit progress when iteration % update_frequency == 0 or iteration == n_simulations
//! ```

use crate::config::{ParameterRecord, SimulationKind};
use crate::error::{McError, McResult};
use crate::estimators::{build_estimator, Estimator};
use crate::mc::events::{
    EventSink, FinalResults, ProgressDetail, ProgressUpdate, SimulationEvent,
};
use crate::rng::RandomSource;
use crate::stats::{ConvergencePoint, RunningStatistics};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

const NO_KIND: u8 = u8::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RunState {
    Idle = 0,
    Running = 1,
    Completed = 2,
    Cancelled = 3,
    Failed = 4,
}

impl RunState {
    fn from_u8(v: u8) -> RunState {
        match v {
            1 => RunState::Running,
            2 => RunState::Completed,
            3 => RunState::Cancelled,
            4 => RunState::Failed,
            _ => RunState::Idle,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Cancelled | RunState::Failed
        )
    }
}

/// Snapshot of the runner, readable from any thread
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    pub state: RunState,
    pub simulation_type: Option<SimulationKind>,
    pub iteration: u64,
    pub total: u64,
}

impl RunStatus {
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.iteration as f64 / self.total as f64
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(Box<FinalResults>),
    Cancelled { iteration: u64 },
    Failed { message: String },
}

impl RunOutcome {
    pub fn state(&self) -> RunState {
        match self {
            RunOutcome::Completed(_) => RunState::Completed,
            RunOutcome::Cancelled { .. } => RunState::Cancelled,
            RunOutcome::Failed { .. } => RunState::Failed,
        }
    }

    pub fn results(&self) -> Option<&FinalResults> {
        match self {
            RunOutcome::Completed(results) => Some(results.as_ref()),
            _ => None,
        }
    }

    pub fn into_results(self) -> Option<FinalResults> {
        match self {
            RunOutcome::Completed(results) => Some(*results),
            _ => None,
        }
    }

    fn from_terminal(event: &SimulationEvent) -> Option<RunOutcome> {
        match event {
            SimulationEvent::Completed(results) => {
                Some(RunOutcome::Completed(Box::new(results.clone())))
            }
            SimulationEvent::Stopped { iteration } => Some(RunOutcome::Cancelled {
                iteration: *iteration,
            }),
            SimulationEvent::Error { message } => Some(RunOutcome::Failed {
                message: message.clone(),
            }),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct RunnerShared {
    state: AtomicU8,
    cancel: AtomicBool,
    iteration: AtomicU64,
    total: AtomicU64,
    kind: AtomicU8,
}

impl RunnerShared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(RunState::Idle as u8),
            cancel: AtomicBool::new(false),
            iteration: AtomicU64::new(0),
            total: AtomicU64::new(0),
            kind: AtomicU8::new(NO_KIND),
        }
    }

    fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: RunState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn request_cancel(&self) -> bool {
        if self.state() == RunState::Running {
            self.cancel.store(true, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    fn status(&self) -> RunStatus {
        let kind = self.kind.load(Ordering::SeqCst);
        RunStatus {
            state: self.state(),
            simulation_type: SimulationKind::ALL.get(kind as usize).copied(),
            iteration: self.iteration.load(Ordering::SeqCst),
            total: self.total.load(Ordering::SeqCst),
        }
    }
}

/// Cloneable cancel/status handle for another thread
#[derive(Debug, Clone)]
pub struct RunnerHandle {
    shared: Arc<RunnerShared>,
}

impl RunnerHandle {
    /// Request cancellation; `false` when no run is active
    pub fn cancel(&self) -> bool {
        self.shared.request_cancel()
    }

    pub fn status(&self) -> RunStatus {
        self.shared.status()
    }
}

/// Owns at most one active run at a time
#[derive(Debug)]
pub struct SimulationRunner {
    shared: Arc<RunnerShared>,
    detail: ProgressDetail,
}

impl Default for SimulationRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationRunner {
    pub fn new() -> Self {
        Self::with_detail(ProgressDetail::default())
    }

    pub fn with_detail(detail: ProgressDetail) -> Self {
        Self {
            shared: Arc::new(RunnerShared::new()),
            detail,
        }
    }

    pub fn detail(&self) -> ProgressDetail {
        self.detail
    }

    pub fn handle(&self) -> RunnerHandle {
        RunnerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn status(&self) -> RunStatus {
        self.shared.status()
    }

    /// Request cancellation of the active run. Observed before the next
    /// batch; a no-op (returning `false`) when nothing is running.
    pub fn cancel(&self) -> bool {
        let requested = self.shared.request_cancel();
        if requested {
            info!(
                iteration = self.shared.iteration.load(Ordering::SeqCst),
                "cancel requested"
            );
        }
        requested
    }

    /// Validate `params` and begin a run. The returned iterator yields the
    /// run's events, `started` first.
    ///
    /// # Errors
    ///
    /// - `AlreadyRunning` while a previous run has not finished
    /// - a validation error naming the offending field; the runner is left
    ///   untouched and no random numbers are drawn
    pub fn start(&self, params: ParameterRecord) -> McResult<RunEvents> {
        self.begin(params, build_estimator)
    }

    /// Like [`start`](Self::start), but drive `estimator` instead of the one
    /// `params` would build. `params` still supplies the run configuration.
    pub fn start_with(
        &self,
        params: ParameterRecord,
        estimator: Box<dyn Estimator>,
    ) -> McResult<RunEvents> {
        self.begin(params, |_| estimator)
    }

    fn begin<F>(&self, params: ParameterRecord, make_estimator: F) -> McResult<RunEvents>
    where
        F: FnOnce(&ParameterRecord) -> Box<dyn Estimator>,
    {
        if self.shared.state() == RunState::Running {
            return Err(McError::AlreadyRunning);
        }
        params.validate()?;

        let running = RunState::Running as u8;
        self.shared
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |s| {
                (s != running).then_some(running)
            })
            .map_err(|_| McError::AlreadyRunning)?;

        let kind = params.kind();
        let run = *params.run();
        self.shared.cancel.store(false, Ordering::SeqCst);
        self.shared.iteration.store(0, Ordering::SeqCst);
        self.shared.total.store(run.n_simulations, Ordering::SeqCst);
        let kind_index = SimulationKind::ALL
            .iter()
            .position(|k| *k == kind)
            .map_or(NO_KIND, |i| i as u8);
        self.shared.kind.store(kind_index, Ordering::SeqCst);

        info!(
            simulation_type = %kind,
            n_simulations = run.n_simulations,
            batch_size = run.batch_size,
            seed = ?run.seed,
            "simulation started"
        );

        Ok(RunEvents {
            shared: Arc::clone(&self.shared),
            estimator: make_estimator(&params),
            rng: RandomSource::new(run.seed),
            running: RunningStatistics::new(),
            history: Vec::new(),
            iteration: 0,
            total: run.n_simulations,
            batch_size: run.batch_size,
            update_frequency: run.update_frequency,
            detail: self.detail,
            params,
            phase: Phase::Start,
        })
    }

    /// Run to the end on the calling thread, delivering every event to `sink`.
    /// A sink that reports its consumer gone cancels the run.
    pub fn run<S: EventSink>(
        &self,
        params: ParameterRecord,
        sink: &mut S,
    ) -> McResult<RunOutcome> {
        let mut events = self.start(params)?;
        let mut connected = true;
        for event in events.by_ref() {
            let outcome = RunOutcome::from_terminal(&event);
            if connected && !sink.emit(event) {
                connected = false;
                warn!("event consumer disconnected, cancelling run");
                self.shared.request_cancel();
            }
            if let Some(outcome) = outcome {
                return Ok(outcome);
            }
        }
        Ok(events.abandoned_outcome())
    }

    /// Run on a background thread. Events arrive on the returned channel; the
    /// join handle yields the outcome.
    pub fn spawn(
        &self,
        params: ParameterRecord,
    ) -> McResult<(Receiver<SimulationEvent>, JoinHandle<RunOutcome>)> {
        let events = self.start(params)?;
        let (tx, rx) = channel();
        let handle = thread::spawn(move || {
            let mut tx = tx;
            let mut events = events;
            let shared = Arc::clone(&events.shared);
            let mut connected = true;
            for event in events.by_ref() {
                let outcome = RunOutcome::from_terminal(&event);
                if connected && !tx.emit(event) {
                    connected = false;
                    shared.request_cancel();
                }
                if let Some(outcome) = outcome {
                    return outcome;
                }
            }
            events.abandoned_outcome()
        });
        Ok((rx, handle))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    Looping,
    Done,
}

/// One active run. Yields `started`, then `progress` events, then exactly
/// one terminal event. Dropping it before the terminal event cancels the run.
pub struct RunEvents {
    shared: Arc<RunnerShared>,
    params: ParameterRecord,
    estimator: Box<dyn Estimator>,
    rng: RandomSource,
    running: RunningStatistics,
    history: Vec<ConvergencePoint>,
    iteration: u64,
    total: u64,
    batch_size: u64,
    update_frequency: u64,
    detail: ProgressDetail,
    phase: Phase,
}

impl fmt::Debug for RunEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunEvents")
            .field("simulation_type", &self.params.kind())
            .field("iteration", &self.iteration)
            .field("total", &self.total)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl RunEvents {
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn running(&self) -> &RunningStatistics {
        &self.running
    }

    pub fn convergence_history(&self) -> &[ConvergencePoint] {
        &self.history
    }

    pub fn handle(&self) -> RunnerHandle {
        RunnerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Consume the remaining events and return how the run ended
    pub fn drain_final(mut self) -> RunOutcome {
        for event in self.by_ref() {
            if let Some(outcome) = RunOutcome::from_terminal(&event) {
                return outcome;
            }
        }
        self.abandoned_outcome()
    }

    fn abandoned_outcome(&self) -> RunOutcome {
        RunOutcome::Cancelled {
            iteration: self.iteration,
        }
    }

    fn finish(&mut self, state: RunState) {
        self.phase = Phase::Done;
        self.shared.set_state(state);
    }

    fn advance(&mut self) -> SimulationEvent {
        loop {
            if self.iteration >= self.total {
                return self.complete();
            }
            if self.shared.cancel.load(Ordering::SeqCst) {
                self.finish(RunState::Cancelled);
                info!(
                    simulation_type = %self.params.kind(),
                    iteration = self.iteration,
                    "simulation stopped"
                );
                return SimulationEvent::Stopped {
                    iteration: self.iteration,
                };
            }

            let size = self.batch_size.min(self.total - self.iteration);
            let batch = match self.estimator.generate_batch(size as usize, &mut self.rng) {
                Ok(batch) => batch,
                Err(e) => {
                    self.finish(RunState::Failed);
                    warn!(
                        simulation_type = %self.params.kind(),
                        iteration = self.iteration,
                        error = %e,
                        "simulation failed"
                    );
                    return SimulationEvent::Error {
                        message: e.to_string(),
                    };
                }
            };
            self.running.update_all(batch.counted());
            self.iteration += size;
            self.shared.iteration.store(self.iteration, Ordering::SeqCst);

            if self.iteration % self.update_frequency == 0 || self.iteration == self.total {
                return self.progress();
            }
        }
    }

    fn progress(&mut self) -> SimulationEvent {
        let statistics = self.estimator.statistics(&self.running);
        let point = ConvergencePoint {
            iteration: self.iteration,
            estimate: statistics.estimate,
            std_error: statistics.std_error,
        };
        self.history.push(point);
        debug!(
            iteration = self.iteration,
            estimate = statistics.estimate,
            std_error = statistics.std_error,
            "progress"
        );

        let visualization = self
            .detail
            .contains(ProgressDetail::VISUALIZATION)
            .then(|| self.estimator.visualization());
        let convergence_history = if self.detail.contains(ProgressDetail::CONVERGENCE_HISTORY) {
            self.history.clone()
        } else {
            vec![point]
        };
        SimulationEvent::Progress(ProgressUpdate {
            iteration: self.iteration,
            progress: self.iteration as f64 / self.total as f64,
            statistics,
            visualization,
            convergence_history,
        })
    }

    fn complete(&mut self) -> SimulationEvent {
        let statistics = self.estimator.statistics(&self.running);
        let results = FinalResults {
            simulation_type: self.params.kind(),
            total_iterations: self.iteration,
            statistics,
            running: self.running,
            summary: self.estimator.summary(&statistics, &self.running),
            convergence_history: self.history.clone(),
            visualization: self.estimator.visualization(),
        };
        self.finish(RunState::Completed);
        info!(
            simulation_type = %self.params.kind(),
            iterations = self.iteration,
            estimate = statistics.estimate,
            std_error = statistics.std_error,
            "simulation completed"
        );
        SimulationEvent::Completed(results)
    }
}

impl Iterator for RunEvents {
    type Item = SimulationEvent;

    fn next(&mut self) -> Option<SimulationEvent> {
        match self.phase {
            Phase::Start => {
                self.phase = Phase::Looping;
                Some(SimulationEvent::Started {
                    simulation_type: self.params.kind(),
                    parameters: self.params.clone(),
                })
            }
            Phase::Looping => Some(self.advance()),
            Phase::Done => None,
        }
    }
}

impl Drop for RunEvents {
    fn drop(&mut self) {
        if self.phase != Phase::Done {
            warn!(
                simulation_type = %self.params.kind(),
                iteration = self.iteration,
                total = self.total,
                unfinished = self.total - self.iteration,
                "run dropped before finishing, marking cancelled"
            );
            self.shared.set_state(RunState::Cancelled);
        }
    }
}
