// demos/stream_demo.rs
//! Run one simulation and print its events as NDJSON on stdout.
//!
//! ```text
//! cargo run --example stream_demo -- --kind option-pricing -n 200000 --seed 7
//! cargo run --example stream_demo -- --kind markov --params '{"distribution_type":"bimodal"}'
//! RUST_LOG=mc_stream=debug cargo run --example stream_demo -- --kind risk --stop-after 3
//! ```

use clap::Parser;
use mc_stream::config::{ParameterRecord, SimulationKind};
use mc_stream::mc::{ProgressDetail, RunOutcome, SimulationEvent, SimulationRunner};
use mc_stream::output::RunRecord;
use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "stream_demo")]
#[command(about = "Stream a Monte Carlo run as newline-delimited JSON events")]
struct Args {
    /// Estimator: pi, integration, option-pricing, hypothesis, risk, markov
    #[arg(short, long, default_value = "pi")]
    kind: SimulationKind,

    /// Extra parameters as a JSON object
    #[arg(short, long)]
    params: Option<String>,

    /// Total number of samples
    #[arg(short)]
    n: Option<u64>,

    #[arg(long)]
    seed: Option<u64>,

    /// Cancel from another thread after this many progress events
    #[arg(long)]
    stop_after: Option<usize>,

    /// Leave visualization payloads out of progress events
    #[arg(long)]
    no_visualization: bool,

    /// Write the finished run as JSON plus a convergence CSV next to it
    #[arg(long)]
    export: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let mut raw: serde_json::Value = match &args.params {
        Some(text) => serde_json::from_str(text)?,
        None => serde_json::json!({}),
    };
    if let Some(obj) = raw.as_object_mut() {
        if let Some(n) = args.n {
            obj.insert("n_simulations".into(), n.into());
        }
        if let Some(seed) = args.seed {
            obj.insert("seed".into(), seed.into());
        }
    }
    let params = ParameterRecord::from_json(args.kind.as_str(), &raw)?;

    let detail = if args.no_visualization {
        ProgressDetail::CONVERGENCE_HISTORY
    } else {
        ProgressDetail::default()
    };
    let runner = SimulationRunner::with_detail(detail);
    let handle = runner.handle();
    let (events, worker) = runner.spawn(params.clone())?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut progress_seen = 0;
    for event in events {
        writeln!(out, "{}", event.to_json()?)?;
        if let SimulationEvent::Progress(_) = event {
            progress_seen += 1;
            if args.stop_after == Some(progress_seen) {
                handle.cancel();
            }
        }
    }
    out.flush()?;

    let outcome = worker
        .join()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "simulation thread panicked"))?;
    match outcome {
        RunOutcome::Completed(results) => {
            tracing::info!(
                estimate = results.statistics.estimate,
                std_error = results.statistics.std_error,
                "done"
            );
            if let Some(path) = args.export {
                let record = RunRecord::new(params, &results);
                record.write_json(&path)?;
                record.write_convergence_csv(path.with_extension("csv"))?;
                tracing::info!(path = %path.display(), "run exported");
            }
        }
        RunOutcome::Cancelled { iteration } => tracing::warn!(iteration, "run cancelled"),
        RunOutcome::Failed { message } => tracing::error!(%message, "run failed"),
    }
    Ok(())
}
