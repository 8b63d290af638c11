//! # mc-stream: Incremental Monte Carlo Estimation
//!
//! A Rust library for running Monte Carlo estimators in batches and streaming
//! their convergence as it happens: running estimates, confidence intervals
//! and variant-specific visualization payloads after every few thousand
//! samples, with cooperative cancellation between batches.
//!
//! ## Key Features
//!
//! - **Online Statistics**: Welford accumulator, never recomputed from history
//! - **Six Estimators**: π by area, 1-D integration, European options,
//!   z-test power, Value-at-Risk / Expected Shortfall, Metropolis-Hastings
//! - **Run State Machine**: `Idle → Running → Completed | Cancelled | Failed`
//! - **Reproducible**: seeded runs replay bit-for-bit
//! - **Parallel Ensembles**: independent seeded replications on Rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use mc_stream::config::{OptionPricingParams, ParameterRecord, RunConfig};
//! use mc_stream::mc::{SimulationEvent, SimulationRunner};
//!
//! let params = ParameterRecord::OptionPricing(OptionPricingParams {
//!     run: RunConfig {
//!         n_simulations: 20_000,
//!         seed: Some(42),
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! });
//!
//! let runner = SimulationRunner::new();
//! for event in runner.start(params).expect("Valid parameters") {
//!     if let SimulationEvent::Progress(p) = &event {
//!         println!("{:>6}: {:.4} ± {:.4}", p.iteration, p.statistics.estimate, p.statistics.std_error);
//!     }
//! }
//! ```
//!
//! ## Mathematical Foundation
//!
//! Every estimator reduces to the mean of i.i.d. (or, for the Markov chain,
//! correlated) per-sample values. The standard error `sqrt(s² / n)` shrinks
//! as `1/√n`, and the 95% interval is `estimate ± 1.96 · SE`. Value-at-Risk is
//! the exception: its estimate is a quantile of the retained losses.

// Module declarations
pub mod error;
pub mod rng;
pub mod math_utils;
pub mod config;
pub mod stats;
pub mod models;
pub mod analytics;
pub mod estimators;
pub mod mc;
pub mod output;

// Re-export commonly used types for convenience
pub use config::{ParameterRecord, RunConfig, SimulationKind};
pub use error::{McError, McResult};
pub use mc::{Ensemble, ProgressDetail, RunOutcome, RunState, SimulationEvent, SimulationRunner};
pub use output::RunRecord;
pub use stats::{RunningStatistics, Statistics};
