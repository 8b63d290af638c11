// src/mc/events.rs
//! Outbound run events
//!
//! A run emits, strictly in order:
//!
//! ```text
//! started → progress* → (completed | stopped | error)
//! ```
//!
//! Events serialize as JSON objects tagged by `type`, matching what a
//! streaming client consumes.

use crate::config::{ParameterRecord, SimulationKind};
use crate::estimators::{Summary, Visualization};
use crate::stats::{ConvergencePoint, RunningStatistics, Statistics};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{Sender, SyncSender};

bitflags! {
    /// Optional parts of each progress payload
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ProgressDetail: u32 {
        const NONE                = 0;
        const VISUALIZATION       = 1 << 0;
        /// Full history; without it only the newest point is sent
        const CONVERGENCE_HISTORY = 1 << 1;
    }
}

impl Default for ProgressDetail {
    fn default() -> Self {
        ProgressDetail::all()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub iteration: u64,
    /// Fraction of `n_simulations` done, in [0, 1]
    pub progress: f64,
    pub statistics: Statistics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualization: Option<Visualization>,
    pub convergence_history: Vec<ConvergencePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResults {
    pub simulation_type: SimulationKind,
    pub total_iterations: u64,
    pub statistics: Statistics,
    /// Raw accumulator behind `statistics`, for pooling runs
    pub running: RunningStatistics,
    pub summary: Summary,
    pub convergence_history: Vec<ConvergencePoint>,
    pub visualization: Visualization,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimulationEvent {
    Started {
        simulation_type: SimulationKind,
        parameters: ParameterRecord,
    },
    Progress(ProgressUpdate),
    Completed(FinalResults),
    Stopped {
        iteration: u64,
    },
    Error {
        message: String,
    },
}

impl SimulationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SimulationEvent::Started { .. } => "started",
            SimulationEvent::Progress(_) => "progress",
            SimulationEvent::Completed(_) => "completed",
            SimulationEvent::Stopped { .. } => "stopped",
            SimulationEvent::Error { .. } => "error",
        }
    }

    /// True for the last event of a run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SimulationEvent::Completed(_)
                | SimulationEvent::Stopped { .. }
                | SimulationEvent::Error { .. }
        )
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Consumer of run events
pub trait EventSink {
    /// Deliver one event; `false` once the consumer has gone away
    fn emit(&mut self, event: SimulationEvent) -> bool;
}

impl EventSink for Vec<SimulationEvent> {
    fn emit(&mut self, event: SimulationEvent) -> bool {
        self.push(event);
        true
    }
}

impl EventSink for Sender<SimulationEvent> {
    fn emit(&mut self, event: SimulationEvent) -> bool {
        self.send(event).is_ok()
    }
}

impl EventSink for SyncSender<SimulationEvent> {
    fn emit(&mut self, event: SimulationEvent) -> bool {
        self.send(event).is_ok()
    }
}
