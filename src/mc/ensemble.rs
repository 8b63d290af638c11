// src/mc/ensemble.rs
//! Independent replications of one parameter record
//!
//! Each member is a full run with its own runner and its own seed
//! (`base_seed + i`), executed in parallel on the rayon pool. Members share
//! nothing, so the pooled accumulator is the exact Welford merge of their
//! running statistics.

use crate::config::ParameterRecord;
use crate::error::{McError, McResult};
use crate::estimators::build_estimator;
use crate::mc::events::{FinalResults, ProgressDetail};
use crate::mc::runner::{RunOutcome, SimulationRunner};
use crate::rng::RngFactory;
use crate::stats::{RunningStatistics, Statistics, Z_95};
use rayon::prelude::*;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct EnsembleMember {
    pub seed: u64,
    pub results: FinalResults,
}

#[derive(Debug, Clone)]
pub struct Ensemble {
    params: ParameterRecord,
    members: Vec<EnsembleMember>,
}

impl Ensemble {
    /// Run `replications` seeded copies of `params` in parallel
    pub fn run(params: &ParameterRecord, base_seed: u64, replications: usize) -> McResult<Self> {
        params.validate()?;
        let seeds = RngFactory::new(base_seed).seeds(replications);
        info!(
            simulation_type = %params.kind(),
            replications,
            base_seed,
            threads = rayon::current_num_threads(),
            "ensemble started"
        );

        let members = seeds
            .par_iter()
            .map(|&seed| {
                let runner = SimulationRunner::with_detail(ProgressDetail::NONE);
                let outcome = runner.start(params.with_seed(Some(seed)))?.drain_final();
                member_of(params, seed, outcome)
            })
            .collect::<McResult<Vec<_>>>()?;

        Ok(Self {
            params: params.clone(),
            members,
        })
    }

    pub fn members(&self) -> &[EnsembleMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Merge of every member's accumulator
    pub fn pooled(&self) -> RunningStatistics {
        self.members
            .iter()
            .fold(RunningStatistics::new(), |acc, m| acc.merge(&m.results.running))
    }

    /// Pooled accumulator mapped through the estimator's mean transform
    pub fn pooled_statistics(&self) -> Statistics {
        build_estimator(&self.params)
            .transform()
            .apply(&self.pooled(), Z_95)
    }

    /// Fraction of members whose 95% interval contains `truth`
    pub fn coverage(&self, truth: f64) -> f64 {
        if self.members.is_empty() {
            return 0.0;
        }
        let hits = self
            .members
            .iter()
            .filter(|m| m.results.statistics.contains(truth))
            .count();
        hits as f64 / self.members.len() as f64
    }
}

fn member_of(
    params: &ParameterRecord,
    seed: u64,
    outcome: RunOutcome,
) -> McResult<EnsembleMember> {
    match outcome {
        RunOutcome::Completed(results) => Ok(EnsembleMember {
            seed,
            results: *results,
        }),
        RunOutcome::Failed { message } => {
            warn!(seed, %message, "ensemble member failed");
            Err(McError::numeric(params.kind().as_str(), message))
        }
        RunOutcome::Cancelled { iteration } => {
            warn!(seed, iteration, "ensemble member stopped early");
            Err(McError::Cancelled { iteration })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PiParams, RunConfig};
    use std::f64::consts::PI;

    #[test]
    fn test_pooled_matches_member_sum() {
        let params = ParameterRecord::Pi(PiParams {
            run: RunConfig {
                n_simulations: 2_000,
                ..Default::default()
            },
        });
        let ensemble = Ensemble::run(&params, 10, 8).unwrap();
        assert_eq!(ensemble.len(), 8);
        let pooled = ensemble.pooled();
        assert_eq!(pooled.count(), 16_000);
        let mean: f64 = ensemble
            .members()
            .iter()
            .map(|m| m.results.running.estimate())
            .sum::<f64>()
            / 8.0;
        assert!((pooled.estimate() - mean).abs() < 1e-12);
        let stats = ensemble.pooled_statistics();
        assert!((stats.estimate - 4.0 * mean).abs() < 1e-12);
        assert!((stats.estimate - PI).abs() < 0.1);
    }

    #[test]
    fn test_members_are_reproducible() {
        let params = ParameterRecord::defaults(crate::config::SimulationKind::Hypothesis);
        let a = Ensemble::run(&params, 77, 3).unwrap();
        let b = Ensemble::run(&params, 77, 3).unwrap();
        for (x, y) in a.members().iter().zip(b.members()) {
            assert_eq!(x.seed, y.seed);
            assert_eq!(x.results.convergence_history, y.results.convergence_history);
        }
    }

    #[test]
    fn test_stopped_member_is_reported_as_cancelled() {
        let params = ParameterRecord::defaults(crate::config::SimulationKind::Pi);
        let err = member_of(&params, 3, RunOutcome::Cancelled { iteration: 4_000 }).unwrap_err();
        assert_eq!(err, McError::Cancelled { iteration: 4_000 });
        assert!(!err.is_validation());
        assert!(err.to_string().contains("4000"));

        let err = member_of(
            &params,
            3,
            RunOutcome::Failed {
                message: "sample was NaN".to_string(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, McError::NumericDomain { .. }));
    }
}
