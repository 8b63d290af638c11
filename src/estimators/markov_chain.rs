// src/estimators/markov_chain.rs
//! Random-walk Metropolis-Hastings sampler
//!
//! ```text
//! x' = x + step · Z
//! accept with probability min(1, π(x') / π(x))
//! ```
//!
//! π is the unnormalised target density. Every step yields the chain position
//! as a sample; steps with a global index below `burn_in` are reported as the
//! batch's excluded prefix and never reach the statistics or the density
//! estimate. The chain state persists across batches.

use super::{Estimator, SampleBatch, Summary, Visualization};
use crate::config::{MarkovParams, SimulationKind, TargetDistribution};
use crate::error::{McError, McResult};
use crate::math_utils::{linspace, percentile_sorted, trapezoid, Histogram};
use crate::rng::RandomSource;
use crate::stats::{RunningStatistics, Statistics};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f64::consts::PI;

const WINDOW: usize = 5_000;
const TRACE: usize = 1_000;
const MAX_ACF_LAG: usize = 50;
const DENSITY_BINS: usize = 50;
const CURVE_POINTS: usize = 200;

impl TargetDistribution {
    /// Unnormalised density
    pub fn density(&self, x: f64) -> f64 {
        match self {
            TargetDistribution::Normal => (-0.5 * x * x).exp(),
            // Gamma(2, 1)
            TargetDistribution::Gamma => {
                if x > 0.0 {
                    x * (-x).exp()
                } else {
                    0.0
                }
            }
            // Beta(3, 3)
            TargetDistribution::Beta => {
                if x > 0.0 && x < 1.0 {
                    30.0 * x * x * (1.0 - x) * (1.0 - x)
                } else {
                    0.0
                }
            }
            TargetDistribution::Bimodal => {
                0.5 * (-0.5 * (x - 2.0).powi(2)).exp() + 0.5 * (-0.5 * (x + 2.0).powi(2)).exp()
            }
            TargetDistribution::Cauchy => 1.0 / (PI * (1.0 + x * x)),
            TargetDistribution::Exponential => {
                if x > 0.0 {
                    (-x).exp()
                } else {
                    0.0
                }
            }
        }
    }

    /// Mean and variance, where defined
    pub fn moments(&self) -> Option<(f64, f64)> {
        match self {
            TargetDistribution::Normal => Some((0.0, 1.0)),
            TargetDistribution::Gamma => Some((2.0, 2.0)),
            TargetDistribution::Beta => Some((0.5, 1.0 / 28.0)),
            TargetDistribution::Bimodal => Some((0.0, 5.0)),
            TargetDistribution::Cauchy => None,
            TargetDistribution::Exponential => Some((1.0, 1.0)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LagCorrelation {
    pub lag: usize,
    pub acf: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityCurve {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainView {
    pub histogram: Histogram,
    pub trace_plot: Vec<f64>,
    pub autocorrelation: Vec<LagCorrelation>,
    pub target_density: DensityCurve,
    pub acceptance_rate: f64,
    pub current_state: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p2_5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p97_5: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainSummary {
    pub distribution_type: TargetDistribution,
    pub acceptance_rate: f64,
    pub post_burn_in_samples: u64,
    pub variance: f64,
    pub effective_sample_size: f64,
    /// Standard error of the mean with the sample size replaced by the ESS
    pub ess_std_error: f64,
    pub percentiles: Percentiles,
    pub theoretical_mean: Option<f64>,
    pub theoretical_variance: Option<f64>,
    pub mean_error: Option<f64>,
    pub variance_error: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct MarkovChainEstimator {
    target: TargetDistribution,
    burn_in: u64,
    step_size: f64,
    state: f64,
    steps: u64,
    accepted: u64,
    window: VecDeque<f64>,
    trace: VecDeque<f64>,
}

impl MarkovChainEstimator {
    pub fn new(params: &MarkovParams) -> Self {
        Self {
            target: params.distribution_type,
            burn_in: params.burn_in,
            step_size: params.step_size,
            state: params.initial_value,
            steps: 0,
            accepted: 0,
            window: VecDeque::with_capacity(WINDOW),
            trace: VecDeque::with_capacity(TRACE),
        }
    }

    pub fn current_state(&self) -> f64 {
        self.state
    }

    pub fn acceptance_rate(&self) -> f64 {
        if self.steps > 0 {
            self.accepted as f64 / self.steps as f64
        } else {
            0.0
        }
    }

    fn density(&self, x: f64) -> McResult<f64> {
        let d = self.target.density(x);
        if !d.is_finite() || d < 0.0 {
            return Err(McError::numeric(
                "markov",
                format!("target density {:?} is {} at x = {}", self.target, d, x),
            ));
        }
        Ok(d)
    }

    fn step(&mut self, rng: &mut RandomSource) -> McResult<f64> {
        let proposed = self.state + self.step_size * rng.normal();
        let current = self.density(self.state)?;
        let candidate = self.density(proposed)?;
        let ratio = if current > 0.0 {
            candidate / current
        } else {
            f64::INFINITY
        };
        if rng.uniform() < ratio {
            self.state = proposed;
            self.accepted += 1;
        }
        self.steps += 1;
        Ok(self.state)
    }

    fn window_sorted(&self) -> Vec<f64> {
        let mut sorted: Vec<f64> = self.window.iter().copied().collect();
        sorted.sort_unstable_by(|a, b| a.total_cmp(b));
        sorted
    }
}

/// Sample autocorrelation at `lag`, normalised by the lag-0 variance
fn autocorrelation(samples: &[f64], mean: f64, var: f64, lag: usize) -> f64 {
    if lag == 0 {
        return 1.0;
    }
    let n = samples.len() - lag;
    let cov: f64 = samples[..n]
        .iter()
        .zip(&samples[lag..])
        .map(|(a, b)| (a - mean) * (b - mean))
        .sum();
    cov / n as f64 / var
}

fn mean_and_population_variance(samples: &[f64]) -> (f64, f64) {
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, var)
}

/// Effective sample size from the initial positive autocorrelation sequence,
/// truncated once |ρ_k| < 0.05
pub fn effective_sample_size(samples: &[f64]) -> f64 {
    let n = samples.len();
    if n < 10 {
        return n as f64;
    }
    let (mean, var) = mean_and_population_variance(samples);
    if var == 0.0 {
        return 1.0;
    }
    let max_lag = (n / 4).min(1_000);
    let mut sum = 0.0;
    for lag in 1..max_lag {
        let rho = autocorrelation(samples, mean, var, lag);
        sum += rho;
        if rho.abs() < 0.05 {
            break;
        }
    }
    let tau = 1.0 + 2.0 * sum;
    if tau > 0.0 {
        (n as f64 / tau).min(n as f64)
    } else {
        n as f64
    }
}

impl Estimator for MarkovChainEstimator {
    fn kind(&self) -> SimulationKind {
        SimulationKind::Markov
    }

    fn generate_batch(
        &mut self,
        batch_size: usize,
        rng: &mut RandomSource,
    ) -> McResult<SampleBatch> {
        let excluded = self.burn_in.saturating_sub(self.steps).min(batch_size as u64) as usize;
        let mut values = Vec::with_capacity(batch_size);
        for i in 0..batch_size {
            let x = self.step(rng)?;
            if self.trace.len() == TRACE {
                self.trace.pop_front();
            }
            self.trace.push_back(x);
            if i >= excluded {
                if self.window.len() == WINDOW {
                    self.window.pop_front();
                }
                self.window.push_back(x);
            }
            values.push(x);
        }
        Ok(SampleBatch::with_excluded(values, excluded))
    }

    fn visualization(&self) -> Visualization {
        let samples: Vec<f64> = self.window.iter().copied().collect();
        let (histogram, target_density, autocorrelation) = if samples.is_empty() {
            (
                Histogram::default(),
                DensityCurve {
                    x: Vec::new(),
                    y: Vec::new(),
                },
                Vec::new(),
            )
        } else {
            let (lo, hi) = samples
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                });
            let x = linspace(lo - 1.0, hi + 1.0, CURVE_POINTS);
            let mut y: Vec<f64> = x.iter().map(|&v| self.target.density(v)).collect();
            let norm = trapezoid(&y, &x);
            if norm > 0.0 {
                y.iter_mut().for_each(|v| *v /= norm);
            }

            let mut acf = Vec::new();
            if samples.len() > 20 {
                let (mean, var) = mean_and_population_variance(&samples);
                if var > 0.0 {
                    for lag in 0..MAX_ACF_LAG.min(samples.len() / 2) {
                        acf.push(LagCorrelation {
                            lag,
                            acf: autocorrelation(&samples, mean, var, lag),
                        });
                    }
                }
            }
            (
                Histogram::from_values(&samples, DENSITY_BINS, None, true),
                DensityCurve { x, y },
                acf,
            )
        };

        Visualization::MarkovChain(ChainView {
            histogram,
            trace_plot: self.trace.iter().copied().collect(),
            autocorrelation,
            target_density,
            acceptance_rate: self.acceptance_rate(),
            current_state: self.state,
        })
    }

    fn summary(&self, statistics: &Statistics, running: &RunningStatistics) -> Summary {
        let samples: Vec<f64> = self.window.iter().copied().collect();
        let n = running.count();
        let variance = running.variance();

        // ESS measured on the window, scaled to the full post-burn-in count
        let effective_sample_size = if samples.is_empty() {
            0.0
        } else {
            effective_sample_size(&samples) / samples.len() as f64 * n as f64
        };
        let ess_std_error = if effective_sample_size > 0.0 && n > 1 {
            (variance / effective_sample_size).sqrt()
        } else {
            0.0
        };

        let sorted = self.window_sorted();
        let percentiles = Percentiles {
            p2_5: percentile_sorted(&sorted, 0.025),
            p25: percentile_sorted(&sorted, 0.25),
            p50: percentile_sorted(&sorted, 0.5),
            p75: percentile_sorted(&sorted, 0.75),
            p97_5: percentile_sorted(&sorted, 0.975),
        };

        let moments = self.target.moments();
        let has_samples = n > 0;
        Summary::Markov(ChainSummary {
            distribution_type: self.target,
            acceptance_rate: self.acceptance_rate(),
            post_burn_in_samples: n,
            variance,
            effective_sample_size,
            ess_std_error,
            percentiles,
            theoretical_mean: moments.map(|(m, _)| m),
            theoretical_variance: moments.map(|(_, v)| v),
            mean_error: moments
                .filter(|_| has_samples)
                .map(|(m, _)| (statistics.estimate - m).abs()),
            variance_error: moments
                .filter(|_| has_samples)
                .map(|(_, v)| (variance - v).abs()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(target: TargetDistribution) -> MarkovParams {
        MarkovParams {
            distribution_type: target,
            ..Default::default()
        }
    }

    #[test]
    fn test_burn_in_prefix_spans_batches() {
        let mut p = params(TargetDistribution::Normal);
        p.burn_in = 250;
        let mut est = MarkovChainEstimator::new(&p);
        let mut rng = RandomSource::seeded(1);
        let first = est.generate_batch(100, &mut rng).unwrap();
        let second = est.generate_batch(100, &mut rng).unwrap();
        let third = est.generate_batch(100, &mut rng).unwrap();
        assert_eq!(first.excluded, 100);
        assert_eq!(second.excluded, 100);
        assert_eq!(third.excluded, 50);
        assert_eq!(third.counted().len(), 50);
    }

    #[test]
    fn test_zero_density_start_always_moves() {
        let mut p = params(TargetDistribution::Exponential);
        p.initial_value = -5.0;
        p.step_size = 0.1;
        let mut est = MarkovChainEstimator::new(&p);
        let mut rng = RandomSource::seeded(9);
        est.generate_batch(1, &mut rng).unwrap();
        assert!(est.current_state() != -5.0);
        assert_eq!(est.acceptance_rate(), 1.0);
    }

    #[test]
    fn test_chain_recovers_target_moments() {
        for target in [
            TargetDistribution::Normal,
            TargetDistribution::Gamma,
            TargetDistribution::Beta,
            TargetDistribution::Exponential,
        ] {
            let mut p = params(target);
            p.initial_value = 0.5;
            let mut est = MarkovChainEstimator::new(&p);
            let mut rng = RandomSource::seeded(21);
            let mut stats = RunningStatistics::new();
            for _ in 0..100 {
                stats.update_all(est.generate_batch(2_000, &mut rng).unwrap().counted());
            }
            let (mean, variance) = target.moments().unwrap();
            println!(
                "{:?}: mean {:.4} (theory {}), var {:.4} (theory {}), acc {:.3}",
                target,
                stats.estimate(),
                mean,
                stats.variance(),
                variance,
                est.acceptance_rate()
            );
            assert!((stats.estimate() - mean).abs() < 0.1 * variance.sqrt().max(0.5));
            assert!((stats.variance() - variance).abs() < 0.2 * variance);
        }
    }

    #[test]
    fn test_ess_of_independent_draws_is_near_n() {
        let mut rng = RandomSource::seeded(5);
        let iid: Vec<f64> = (0..4_000).map(|_| rng.normal()).collect();
        let ess = effective_sample_size(&iid);
        assert!(ess > 3_000.0, "ess = {}", ess);

        let mut correlated = Vec::with_capacity(4_000);
        let mut x = 0.0;
        for _ in 0..4_000 {
            x = 0.95 * x + rng.normal();
            correlated.push(x);
        }
        assert!(effective_sample_size(&correlated) < 400.0);
    }

    #[test]
    fn test_visualization_and_summary() {
        let mut est = MarkovChainEstimator::new(&params(TargetDistribution::Bimodal));
        let mut rng = RandomSource::seeded(13);
        let mut stats = RunningStatistics::new();
        for _ in 0..8 {
            stats.update_all(est.generate_batch(1_000, &mut rng).unwrap().counted());
        }
        match est.visualization() {
            Visualization::MarkovChain(view) => {
                assert_eq!(view.trace_plot.len(), TRACE);
                assert_eq!(view.histogram.counts.len(), DENSITY_BINS);
                assert_eq!(view.autocorrelation.len(), MAX_ACF_LAG);
                assert_eq!(view.autocorrelation[0].acf, 1.0);
                let area = trapezoid(&view.target_density.y, &view.target_density.x);
                assert!((area - 1.0).abs() < 1e-9);
            }
            other => panic!("unexpected view {:?}", other),
        }
        match est.summary(&est.statistics(&stats), &stats) {
            Summary::Markov(s) => {
                assert_eq!(s.post_burn_in_samples, 7_000);
                assert!(s.effective_sample_size > 0.0);
                assert!(s.effective_sample_size <= 7_000.0);
                assert!(s.ess_std_error >= stats.standard_error());
                assert!(s.percentiles.p2_5 <= s.percentiles.p50);
                assert!(s.percentiles.p50 <= s.percentiles.p97_5);
                assert_eq!(s.theoretical_variance, Some(5.0));
            }
            other => panic!("unexpected summary {:?}", other),
        }
    }

    #[test]
    fn test_cauchy_has_no_moments() {
        let est = MarkovChainEstimator::new(&params(TargetDistribution::Cauchy));
        match est.summary(&Statistics::default(), &RunningStatistics::new()) {
            Summary::Markov(s) => {
                assert_eq!(s.theoretical_mean, None);
                assert_eq!(s.mean_error, None);
                assert_eq!(s.effective_sample_size, 0.0);
            }
            other => panic!("unexpected summary {:?}", other),
        }
    }
}
