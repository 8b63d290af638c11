// src/mc/mod.rs
pub mod ensemble;
pub mod events;
pub mod runner;

pub use ensemble::{Ensemble, EnsembleMember};
pub use events::{EventSink, FinalResults, ProgressDetail, ProgressUpdate, SimulationEvent};
pub use runner::{RunEvents, RunOutcome, RunState, RunStatus, RunnerHandle, SimulationRunner};
