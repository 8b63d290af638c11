// src/estimators/mod.rs
//! Estimator variants
//!
//! Each variant turns random draws into raw per-sample values. The runner
//! folds those values into a [`RunningStatistics`]; the estimator maps the
//! accumulator to its target quantity (π = 4·mean, ∫f = width·mean, …) and
//! builds the visualization and closing summary from its own cumulative state.
//!
//! | kind | sample | estimate |
//! |---|---|---|
//! | `pi` | 1 if (x,y) lands in the unit circle | 4 · mean |
//! | `integration` | f(x), x ~ U[a,b] | (b − a) · mean |
//! | `option-pricing` | discounted payoff of a GBM terminal price | mean |
//! | `hypothesis` | 1 if the z-test rejects H₀ | mean (power) |
//! | `risk` | portfolio loss over the horizon | empirical quantile (VaR) |
//! | `markov` | Metropolis-Hastings chain position | post-burn-in mean |

pub mod area;
pub mod hypothesis;
pub mod integration;
pub mod markov_chain;
pub mod option_pricing;
pub mod value_at_risk;

use crate::config::{ParameterRecord, SimulationKind};
use crate::error::McResult;
use crate::rng::RandomSource;
use crate::stats::{RunningStatistics, Statistics, Transform, Z_95};
use serde::{Deserialize, Serialize};

pub use area::AreaEstimator;
pub use hypothesis::HypothesisEstimator;
pub use integration::IntegrationEstimator;
pub use markov_chain::MarkovChainEstimator;
pub use option_pricing::OptionPricingEstimator;
pub use value_at_risk::ValueAtRiskEstimator;

/// Raw values from one batch. The first `excluded` values are generated but
/// must not reach the statistics (Markov chain burn-in).
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBatch {
    pub values: Vec<f64>,
    pub excluded: usize,
}

impl SampleBatch {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            excluded: 0,
        }
    }

    pub fn with_excluded(values: Vec<f64>, excluded: usize) -> Self {
        let excluded = excluded.min(values.len());
        Self { values, excluded }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values that contribute to the running statistics
    pub fn counted(&self) -> &[f64] {
        &self.values[self.excluded..]
    }
}

/// Per-sample generation plus the variant-specific views of the run
pub trait Estimator: Send {
    fn kind(&self) -> SimulationKind;

    /// Draw exactly `batch_size` samples, advancing the estimator's own state
    fn generate_batch(
        &mut self,
        batch_size: usize,
        rng: &mut RandomSource,
    ) -> McResult<SampleBatch>;

    /// Map from the running mean to the reported estimate
    fn transform(&self) -> Transform {
        Transform::IDENTITY
    }

    fn statistics(&self, running: &RunningStatistics) -> Statistics {
        self.transform().apply(running, Z_95)
    }

    /// Snapshot of cumulative state for the client
    fn visualization(&self) -> Visualization;

    /// Derived metrics reported on completion
    fn summary(&self, statistics: &Statistics, running: &RunningStatistics) -> Summary;
}

/// Instantiate the estimator for a validated record
pub fn build_estimator(params: &ParameterRecord) -> Box<dyn Estimator> {
    match params {
        ParameterRecord::Pi(_) => Box::new(AreaEstimator::new()),
        ParameterRecord::Integration(p) => Box::new(IntegrationEstimator::new(p)),
        ParameterRecord::OptionPricing(p) => Box::new(OptionPricingEstimator::new(p)),
        ParameterRecord::Hypothesis(p) => Box::new(HypothesisEstimator::new(p)),
        ParameterRecord::Risk(p) => Box::new(ValueAtRiskEstimator::new(p)),
        ParameterRecord::Markov(p) => Box::new(MarkovChainEstimator::new(p)),
    }
}

/// Variant-shaped visualization payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Visualization {
    Scatter(area::ScatterView),
    FunctionIntegration(integration::IntegrationView),
    Paths(option_pricing::PathsView),
    HypothesisTest(hypothesis::HypothesisView),
    ValueAtRisk(value_at_risk::RiskView),
    MarkovChain(markov_chain::ChainView),
}

/// Variant-specific derived metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Summary {
    Pi(area::PiSummary),
    Integration(integration::IntegrationSummary),
    OptionPricing(option_pricing::OptionSummary),
    Hypothesis(hypothesis::PowerSummary),
    Risk(value_at_risk::RiskSummary),
    Markov(markov_chain::ChainSummary),
}

/// Absolute and relative (%) error against a reference value
pub(crate) fn errors_against(estimate: f64, reference: f64) -> (f64, f64) {
    let abs = (estimate - reference).abs();
    let rel = if reference != 0.0 {
        abs / reference.abs() * 100.0
    } else {
        0.0
    };
    (abs, rel)
}
