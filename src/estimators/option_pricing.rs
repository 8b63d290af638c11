// src/estimators/option_pricing.rs
//! European option pricing by risk-neutral simulation
//!
//! Each sample is one discounted payoff:
//!
//! ```text
//! S_T = S_0 · exp((r - σ²/2) T + σ √T · Z)
//! sample = e^{-rT} · max(S_T - K, 0)      (call)
//!        = e^{-rT} · max(K - S_T, 0)      (put)
//! ```
//!
//! The running mean converges to the Black-Scholes price.

use super::{errors_against, Estimator, SampleBatch, Summary, Visualization};
use crate::analytics::bs_analytic::bs_price;
use crate::config::{OptionPricingParams, OptionType, SimulationKind};
use crate::error::McResult;
use crate::math_utils::{linspace, Histogram};
use crate::models::Gbm;
use crate::rng::RandomSource;
use crate::stats::{RunningStatistics, Statistics};
use serde::{Deserialize, Serialize};

const MAX_PATHS: usize = 100;
const PATHS_PER_BATCH: usize = 10;
const PATH_STEPS: usize = 50;
const MAX_PAYOFFS: usize = 5_000;
const PAYOFF_BINS: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePath {
    pub times: Vec<f64>,
    pub prices: Vec<f64>,
    /// Undiscounted payoff at the path's last price
    pub final_payoff: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsView {
    pub paths: Vec<SamplePath>,
    pub strike_price: f64,
    pub initial_price: f64,
    pub payoff_distribution: Histogram,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionSummary {
    pub option_type: OptionType,
    pub analytical_price: f64,
    pub absolute_error: f64,
    /// Percent; 0 when the analytical price is 0
    pub relative_error: f64,
}

#[derive(Debug, Clone)]
pub struct OptionPricingEstimator {
    params: OptionPricingParams,
    gbm: Gbm,
    discount: f64,
    paths: Vec<SamplePath>,
    payoffs: Vec<f64>,
}

impl OptionPricingEstimator {
    pub fn new(params: &OptionPricingParams) -> Self {
        Self {
            gbm: Gbm::new(params.stock_price, params.risk_free_rate, params.volatility),
            discount: (-params.risk_free_rate * params.time_to_maturity).exp(),
            params: params.clone(),
            paths: Vec::new(),
            payoffs: Vec::new(),
        }
    }

    fn payoff(&self, s_t: f64) -> f64 {
        let k = self.params.strike_price;
        match self.params.option_type {
            OptionType::Call => (s_t - k).max(0.0),
            OptionType::Put => (k - s_t).max(0.0),
        }
    }

    pub fn analytical_price(&self) -> f64 {
        let p = &self.params;
        bs_price(
            p.option_type,
            p.stock_price,
            p.strike_price,
            p.risk_free_rate,
            p.volatility,
            p.time_to_maturity,
        )
    }
}

impl Estimator for OptionPricingEstimator {
    fn kind(&self) -> SimulationKind {
        SimulationKind::OptionPricing
    }

    fn generate_batch(
        &mut self,
        batch_size: usize,
        rng: &mut RandomSource,
    ) -> McResult<SampleBatch> {
        let t = self.params.time_to_maturity;
        let mut values = Vec::with_capacity(batch_size);
        for _ in 0..batch_size {
            let s_t = self.gbm.terminal(t, rng.normal());
            values.push(self.discount * self.payoff(s_t));
        }

        let room = MAX_PAYOFFS.saturating_sub(self.payoffs.len());
        self.payoffs.extend(values.iter().take(room).copied());

        // display paths draw after the priced samples
        let n_paths = PATHS_PER_BATCH
            .min(batch_size)
            .min(MAX_PATHS - self.paths.len());
        if n_paths > 0 {
            let times = linspace(0.0, t, PATH_STEPS + 1);
            for _ in 0..n_paths {
                let prices = self.gbm.sample_path(t, PATH_STEPS, rng);
                let last = prices.last().copied().unwrap_or(self.gbm.s0);
                self.paths.push(SamplePath {
                    times: times.clone(),
                    final_payoff: self.payoff(last),
                    prices,
                });
            }
        }
        Ok(SampleBatch::new(values))
    }

    fn visualization(&self) -> Visualization {
        Visualization::Paths(PathsView {
            paths: self.paths.clone(),
            strike_price: self.params.strike_price,
            initial_price: self.params.stock_price,
            payoff_distribution: Histogram::from_values(&self.payoffs, PAYOFF_BINS, None, false),
        })
    }

    fn summary(&self, statistics: &Statistics, _running: &RunningStatistics) -> Summary {
        let analytical_price = self.analytical_price();
        let (absolute_error, relative_error) =
            errors_against(statistics.estimate, analytical_price);
        Summary::OptionPricing(OptionSummary {
            option_type: self.params.option_type,
            analytical_price,
            absolute_error,
            relative_error,
        })
    }
}
