// src/estimators/value_at_risk.rs
//! Portfolio Value-at-Risk and Expected Shortfall
//!
//! Daily returns have drift μ/252 and volatility σ/√252 and are compounded
//! over the horizon:
//!
//! ```text
//! R = Π (1 + r_d) - 1,     loss = -V · R
//! VaR_c = c-quantile of loss
//! ES_c  = E[loss | loss > VaR_c]
//! ```
//!
//! Losses feed both the running statistics (mean loss) and a bounded
//! reservoir; the reported estimate is the quantile of the retained losses,
//! with a distribution-free order-statistic confidence interval.

use super::{errors_against, Estimator, SampleBatch, Summary, Visualization};
use crate::config::{ReturnDistribution, RiskParams, SimulationKind};
use crate::error::{McError, McResult};
use crate::math_utils::{norm_ppf, Histogram};
use crate::rng::RandomSource;
use crate::stats::{quantile_interval, Reservoir, RunningStatistics, Statistics, Z_95};
use rand_distr::StudentT;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

const TRADING_DAYS: f64 = 252.0;
const T_DOF: f64 = 5.0;
const STRESS_PROBABILITY: f64 = 0.05;
const STRESS_DRIFT: f64 = -0.02;
const STRESS_VOL_MULTIPLIER: f64 = 3.0;
const HISTOGRAM_WINDOW: usize = 5_000;
const RETURN_SERIES: usize = 1_000;
const HISTOGRAM_BINS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskView {
    pub returns_histogram: Histogram,
    pub losses_histogram: Histogram,
    pub return_series: Vec<f64>,
    pub var_line: f64,
    pub es_line: f64,
    pub confidence_level: f64,
    pub portfolio_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskSummary {
    pub value_at_risk: f64,
    pub expected_shortfall: f64,
    /// Closed form under normal returns only
    pub analytical_var: Option<f64>,
    pub absolute_error: Option<f64>,
    pub relative_error: Option<f64>,
    pub confidence_level: f64,
    pub time_horizon: u64,
    /// Percent
    pub mean_return: f64,
    /// Percent
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub max_loss: f64,
    pub retained_samples: usize,
    pub rank_error_bound: f64,
}

#[derive(Debug, Clone)]
pub struct ValueAtRiskEstimator {
    params: RiskParams,
    daily_drift: f64,
    daily_vol: f64,
    losses: Reservoir,
    returns: RunningStatistics,
    recent_returns: VecDeque<f64>,
    max_loss: f64,
}

impl ValueAtRiskEstimator {
    pub fn new(params: &RiskParams) -> Self {
        Self {
            daily_drift: params.expected_return / TRADING_DAYS,
            daily_vol: params.portfolio_volatility / TRADING_DAYS.sqrt(),
            losses: Reservoir::new(params.max_retained_losses as usize),
            returns: RunningStatistics::new(),
            recent_returns: VecDeque::with_capacity(HISTOGRAM_WINDOW),
            max_loss: f64::NEG_INFINITY,
            params: params.clone(),
        }
    }

    /// V · (−μ_h + σ_h · Φ⁻¹(c)) with μ, σ scaled linearly to the horizon
    pub fn analytical_var(&self) -> Option<f64> {
        match self.params.distribution {
            ReturnDistribution::Normal => {
                let h = self.params.time_horizon as f64;
                let mu_h = self.daily_drift * h;
                let sigma_h = self.daily_vol * h.sqrt();
                Some(
                    self.params.portfolio_value
                        * (-mu_h + sigma_h * norm_ppf(self.params.confidence_level)),
                )
            }
            ReturnDistribution::T | ReturnDistribution::Historical => None,
        }
    }

    pub fn reservoir(&self) -> &Reservoir {
        &self.losses
    }

    fn horizon_return(&self, rng: &mut RandomSource, student: Option<&StudentT<f64>>) -> f64 {
        let days = self.params.time_horizon;
        let (drift, vol) = match self.params.distribution {
            ReturnDistribution::Historical if rng.uniform() < STRESS_PROBABILITY => (
                self.daily_drift + STRESS_DRIFT,
                self.daily_vol * STRESS_VOL_MULTIPLIER,
            ),
            _ => (self.daily_drift, self.daily_vol),
        };
        // unit-variance rescaling of t(ν): Var = ν / (ν - 2)
        let t_scale = (T_DOF / (T_DOF - 2.0)).sqrt();
        let mut growth = 1.0;
        for _ in 0..days {
            let shock = match student {
                Some(t) => rng.sample(t) / t_scale,
                None => rng.normal(),
            };
            growth *= 1.0 + drift + vol * shock;
        }
        growth - 1.0
    }

    /// VaR and ES from the retained losses
    fn tail(&self, sorted: &[f64]) -> (f64, f64) {
        if sorted.is_empty() {
            return (0.0, 0.0);
        }
        let var = quantile_interval(sorted, self.params.confidence_level, Z_95).value;
        // ascending, so the tail is a suffix
        let start = sorted.partition_point(|l| *l <= var);
        let beyond = &sorted[start..];
        let es = if beyond.is_empty() {
            var
        } else {
            beyond.iter().sum::<f64>() / beyond.len() as f64
        };
        (var, es)
    }
}

impl Estimator for ValueAtRiskEstimator {
    fn kind(&self) -> SimulationKind {
        SimulationKind::Risk
    }

    fn generate_batch(
        &mut self,
        batch_size: usize,
        rng: &mut RandomSource,
    ) -> McResult<SampleBatch> {
        let student = match self.params.distribution {
            ReturnDistribution::T => Some(
                StudentT::new(T_DOF)
                    .map_err(|e| McError::numeric("risk", format!("student-t: {:?}", e)))?,
            ),
            _ => None,
        };
        let value = self.params.portfolio_value;
        let mut values = Vec::with_capacity(batch_size);
        for _ in 0..batch_size {
            let r = self.horizon_return(rng, student.as_ref());
            let loss = -value * r;
            if !loss.is_finite() {
                return Err(McError::numeric(
                    "risk",
                    format!("horizon return {} produced a non-finite loss", r),
                ));
            }
            self.returns.update(r);
            if self.recent_returns.len() == HISTOGRAM_WINDOW {
                self.recent_returns.pop_front();
            }
            self.recent_returns.push_back(r);
            self.max_loss = self.max_loss.max(loss);
            values.push(loss);
        }
        // reservoir replacement draws come after the batch's return draws
        for &loss in &values {
            self.losses.offer(loss, rng);
        }
        Ok(SampleBatch::new(values))
    }

    fn statistics(&self, running: &RunningStatistics) -> Statistics {
        if running.count() == 0 || self.losses.is_empty() {
            return Statistics::default();
        }
        let q = self
            .losses
            .with_sorted(|sorted| quantile_interval(sorted, self.params.confidence_level, Z_95));
        Statistics {
            estimate: q.value,
            std_error: (q.upper - q.lower) / (2.0 * Z_95),
            lower_ci: q.lower,
            upper_ci: q.upper,
        }
    }

    fn visualization(&self) -> Visualization {
        let returns: Vec<f64> = self.recent_returns.iter().copied().collect();
        let value = self.params.portfolio_value;
        let losses: Vec<f64> = returns.iter().map(|r| -value * r).collect();
        let (var_line, es_line) = self.losses.with_sorted(|sorted| self.tail(sorted));
        let skip = returns.len().saturating_sub(RETURN_SERIES);
        Visualization::ValueAtRisk(RiskView {
            returns_histogram: Histogram::from_values(&returns, HISTOGRAM_BINS, None, false),
            losses_histogram: Histogram::from_values(&losses, HISTOGRAM_BINS, None, false),
            return_series: returns[skip..].to_vec(),
            var_line,
            es_line,
            confidence_level: self.params.confidence_level,
            portfolio_value: value,
        })
    }

    fn summary(&self, statistics: &Statistics, _running: &RunningStatistics) -> Summary {
        let (_, expected_shortfall) = self.losses.with_sorted(|sorted| self.tail(sorted));
        let analytical_var = self.analytical_var();
        let errors = analytical_var.map(|a| errors_against(statistics.estimate, a));
        let mean = self.returns.estimate();
        let vol = self.returns.std_dev();
        Summary::Risk(RiskSummary {
            value_at_risk: statistics.estimate,
            expected_shortfall,
            analytical_var,
            absolute_error: errors.map(|e| e.0),
            relative_error: errors.map(|e| e.1),
            confidence_level: self.params.confidence_level,
            time_horizon: self.params.time_horizon,
            mean_return: mean * 100.0,
            volatility: vol * 100.0,
            sharpe_ratio: if vol > 0.0 { mean / vol } else { 0.0 },
            max_loss: if self.returns.count() > 0 {
                self.max_loss
            } else {
                0.0
            },
            retained_samples: self.losses.len(),
            rank_error_bound: self.losses.rank_error_bound(self.params.confidence_level),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulate(
        params: &RiskParams,
        batches: usize,
        seed: u64,
    ) -> (ValueAtRiskEstimator, RunningStatistics) {
        let mut est = ValueAtRiskEstimator::new(params);
        let mut rng = RandomSource::seeded(seed);
        let mut stats = RunningStatistics::new();
        for _ in 0..batches {
            stats.update_all(est.generate_batch(5_000, &mut rng).unwrap().counted());
        }
        (est, stats)
    }

    #[test]
    fn test_normal_var_close_to_analytical() {
        let params = RiskParams::default();
        let (est, stats) = simulate(&params, 20, 42);
        let out = est.statistics(&stats);
        let analytical = est.analytical_var().unwrap();
        println!(
            "VaR {:.0} [{:.0}, {:.0}], analytical {:.0}",
            out.estimate, out.lower_ci, out.upper_ci, analytical
        );
        assert!(out.lower_ci <= out.estimate && out.estimate <= out.upper_ci);
        assert!((out.estimate - analytical).abs() / analytical < 0.05);
    }

    #[test]
    fn test_expected_shortfall_exceeds_var() {
        let (est, stats) = simulate(&RiskParams::default(), 4, 1);
        let out = est.statistics(&stats);
        match est.summary(&out, &stats) {
            Summary::Risk(s) => {
                assert!(s.expected_shortfall > s.value_at_risk);
                assert!(s.max_loss >= s.expected_shortfall);
                assert_eq!(s.retained_samples, 20_000);
                assert_eq!(s.rank_error_bound, 0.0);
            }
            other => panic!("unexpected summary {:?}", other),
        }
    }

    #[test]
    fn test_reservoir_bounds_retained_losses() {
        let params = RiskParams {
            max_retained_losses: 1_000,
            ..Default::default()
        };
        let (est, stats) = simulate(&params, 2, 3);
        assert_eq!(stats.count(), 10_000);
        assert_eq!(est.reservoir().len(), 1_000);
        assert_eq!(est.reservoir().seen(), 10_000);
        let bound = est.reservoir().rank_error_bound(0.95);
        assert!((bound - (0.95 * 0.05 / 1_000.0_f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_stress_regime_raises_var() {
        let normal = simulate(&RiskParams::default(), 10, 8);
        let historical = simulate(
            &RiskParams {
                distribution: ReturnDistribution::Historical,
                ..Default::default()
            },
            10,
            8,
        );
        let var_normal = normal.0.statistics(&normal.1).estimate;
        let var_hist = historical.0.statistics(&historical.1).estimate;
        println!("normal VaR {:.0}, historical VaR {:.0}", var_normal, var_hist);
        assert!(var_hist > var_normal);
        assert!(historical.0.analytical_var().is_none());
    }

    #[test]
    fn test_student_t_runs() {
        let params = RiskParams {
            distribution: ReturnDistribution::T,
            ..Default::default()
        };
        let (est, stats) = simulate(&params, 2, 5);
        let out = est.statistics(&stats);
        assert!(out.estimate > 0.0);
        assert!(out.std_error > 0.0);
    }

    #[test]
    fn test_one_merge_per_emission() {
        let params = RiskParams {
            max_retained_losses: 2_000,
            ..Default::default()
        };
        let mut est = ValueAtRiskEstimator::new(&params);
        let mut rng = RandomSource::seeded(13);
        let mut stats = RunningStatistics::new();
        for emission in 1..=20u64 {
            stats.update_all(est.generate_batch(500, &mut rng).unwrap().counted());
            let out = est.statistics(&stats);
            let view = est.visualization();
            let summary = est.summary(&out, &stats);
            // reads share one ordered view between batches
            assert_eq!(est.reservoir().merges(), emission);
            match (view, summary) {
                (Visualization::ValueAtRisk(v), Summary::Risk(s)) => {
                    assert_eq!(v.var_line, out.estimate);
                    assert_eq!(v.es_line, s.expected_shortfall);
                }
                other => panic!("unexpected payloads {:?}", other),
            }
        }
        assert_eq!(est.reservoir().len(), 2_000);
        assert_eq!(est.reservoir().seen(), 10_000);
    }
}
