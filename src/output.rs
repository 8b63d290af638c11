// src/output.rs
//! Export of finished runs
//!
//! A [`RunRecord`] is the persisted form of a completed run: its parameters,
//! final statistics, variant summary and convergence trace, stamped with the
//! creation time. Records serialize to JSON; the convergence trace can also
//! be written as CSV (`iteration,estimate,std_error`).

use crate::config::{ParameterRecord, SimulationKind};
use crate::estimators::Summary;
use crate::mc::events::FinalResults;
use crate::stats::{ConvergencePoint, Statistics};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub simulation_type: SimulationKind,
    pub parameters: ParameterRecord,
    pub total_iterations: u64,
    pub statistics: Statistics,
    pub summary: Summary,
    pub convergence_history: Vec<ConvergencePoint>,
    pub created_at: DateTime<Utc>,
}

impl RunRecord {
    pub fn new(parameters: ParameterRecord, results: &FinalResults) -> Self {
        Self {
            simulation_type: parameters.kind(),
            parameters,
            total_iterations: results.total_iterations,
            statistics: results.statistics,
            summary: results.summary.clone(),
            convergence_history: results.convergence_history.clone(),
            created_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut file, self)?;
        writeln!(file)?;
        file.flush()
    }

    pub fn write_convergence_csv<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = BufWriter::new(File::create(path)?);
        write_convergence_csv(&mut file, &self.convergence_history)?;
        file.flush()
    }
}

pub fn write_convergence_csv<W: Write>(
    out: &mut W,
    history: &[ConvergencePoint],
) -> io::Result<()> {
    writeln!(out, "iteration,estimate,std_error")?;
    for point in history {
        writeln!(out, "{},{},{}", point.iteration, point.estimate, point.std_error)?;
    }
    Ok(())
}
