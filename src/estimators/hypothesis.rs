// src/estimators/hypothesis.rs
//! Power of a one-sample z-test
//!
//! Each sample simulates one experiment under the alternative: the sample
//! mean is drawn from N(μ₁, σ/√n), standardised against μ₀, and tested at
//! level α. The sample is 1 when H₀ is rejected, so the running mean is the
//! empirical power.

use super::{errors_against, Estimator, SampleBatch, Summary, Visualization};
use crate::config::{HypothesisParams, SimulationKind, TestType};
use crate::error::McResult;
use crate::math_utils::{linspace, norm_cdf, norm_pdf, norm_ppf};
use crate::rng::RandomSource;
use crate::stats::{RunningStatistics, Statistics};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

const P_VALUE_BINS: usize = 20;
const RECENT_STATISTICS: usize = 1_000;
const DENSITY_POINTS: usize = 100;
const Z_LIMIT: f64 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PValueHistogram {
    pub bins: Vec<f64>,
    pub counts: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingDistributions {
    pub x: Vec<f64>,
    pub null: Vec<f64>,
    pub alternative: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisView {
    pub p_value_histogram: PValueHistogram,
    pub test_statistics: Vec<f64>,
    pub sampling_distributions: SamplingDistributions,
    pub critical_regions: Vec<[f64; 2]>,
    pub critical_value: f64,
    pub alpha: f64,
    pub rejection_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerSummary {
    pub theoretical_power: f64,
    pub absolute_error: f64,
    /// Percent; 0 when the theoretical power is 0
    pub relative_error: f64,
    pub type_i_error_rate: f64,
    /// Cohen's d: (μ₁ - μ₀) / σ
    pub effect_size: f64,
    pub test_type: TestType,
}

#[derive(Debug, Clone)]
pub struct HypothesisEstimator {
    params: HypothesisParams,
    std_error: f64,
    critical_z: f64,
    p_value_counts: [u64; P_VALUE_BINS],
    recent: VecDeque<f64>,
    rejected: u64,
    total: u64,
}

impl HypothesisEstimator {
    pub fn new(params: &HypothesisParams) -> Self {
        let critical_z = match params.test_type {
            TestType::TwoSided => norm_ppf(1.0 - params.alpha / 2.0),
            TestType::RightTailed => norm_ppf(1.0 - params.alpha),
            TestType::LeftTailed => -norm_ppf(1.0 - params.alpha),
        };
        Self {
            std_error: params.std_dev / (params.sample_size as f64).sqrt(),
            critical_z,
            params: params.clone(),
            p_value_counts: [0; P_VALUE_BINS],
            recent: VecDeque::with_capacity(RECENT_STATISTICS),
            rejected: 0,
            total: 0,
        }
    }

    pub fn critical_value(&self) -> f64 {
        self.critical_z
    }

    /// Standardised mean shift under the alternative
    fn shift(&self) -> f64 {
        (self.params.alt_mean - self.params.null_mean) / self.std_error
    }

    pub fn theoretical_power(&self) -> f64 {
        let c = self.critical_z;
        let d = self.shift();
        match self.params.test_type {
            TestType::TwoSided => 1.0 - norm_cdf(c - d) + norm_cdf(-c - d),
            TestType::RightTailed => 1.0 - norm_cdf(c - d),
            TestType::LeftTailed => norm_cdf(c - d),
        }
    }

    /// p-value and decision for one standardised statistic
    fn test(&self, z: f64) -> (f64, bool) {
        let c = self.critical_z;
        match self.params.test_type {
            TestType::TwoSided => (2.0 * (1.0 - norm_cdf(z.abs())), z.abs() > c),
            TestType::RightTailed => (1.0 - norm_cdf(z), z > c),
            TestType::LeftTailed => (norm_cdf(z), z < c),
        }
    }

    fn record(&mut self, z: f64, p_value: f64, reject: bool) {
        let bin = ((p_value * P_VALUE_BINS as f64) as usize).min(P_VALUE_BINS - 1);
        self.p_value_counts[bin] += 1;
        if self.recent.len() == RECENT_STATISTICS {
            self.recent.pop_front();
        }
        self.recent.push_back(z);
        if reject {
            self.rejected += 1;
        }
        self.total += 1;
    }
}

impl Estimator for HypothesisEstimator {
    fn kind(&self) -> SimulationKind {
        SimulationKind::Hypothesis
    }

    fn generate_batch(
        &mut self,
        batch_size: usize,
        rng: &mut RandomSource,
    ) -> McResult<SampleBatch> {
        let mut values = Vec::with_capacity(batch_size);
        for _ in 0..batch_size {
            let sample_mean = self.params.alt_mean + self.std_error * rng.normal();
            let z = (sample_mean - self.params.null_mean) / self.std_error;
            let (p_value, reject) = self.test(z);
            self.record(z, p_value, reject);
            values.push(if reject { 1.0 } else { 0.0 });
        }
        Ok(SampleBatch::new(values))
    }

    fn visualization(&self) -> Visualization {
        let width = 1.0 / P_VALUE_BINS as f64;
        let x = linspace(-Z_LIMIT, Z_LIMIT, DENSITY_POINTS);
        let shift = self.shift();
        let c = self.critical_z;
        let critical_regions = match self.params.test_type {
            TestType::TwoSided => vec![[-Z_LIMIT, -c], [c, Z_LIMIT]],
            TestType::RightTailed => vec![[c, Z_LIMIT]],
            TestType::LeftTailed => vec![[-Z_LIMIT, c]],
        };
        Visualization::HypothesisTest(HypothesisView {
            p_value_histogram: PValueHistogram {
                bins: (0..P_VALUE_BINS)
                    .map(|i| width * (i as f64 + 0.5))
                    .collect(),
                counts: self.p_value_counts.to_vec(),
            },
            test_statistics: self.recent.iter().copied().collect(),
            sampling_distributions: SamplingDistributions {
                null: x.iter().map(|&v| norm_pdf(v)).collect(),
                alternative: x.iter().map(|&v| norm_pdf(v - shift)).collect(),
                x,
            },
            critical_regions,
            critical_value: c,
            alpha: self.params.alpha,
            rejection_rate: if self.total > 0 {
                self.rejected as f64 / self.total as f64
            } else {
                0.0
            },
        })
    }

    fn summary(&self, statistics: &Statistics, _running: &RunningStatistics) -> Summary {
        let theoretical_power = self.theoretical_power();
        let (absolute_error, relative_error) =
            errors_against(statistics.estimate, theoretical_power);
        Summary::Hypothesis(PowerSummary {
            theoretical_power,
            absolute_error,
            relative_error,
            type_i_error_rate: self.params.alpha,
            effect_size: (self.params.alt_mean - self.params.null_mean) / self.params.std_dev,
            test_type: self.params.test_type,
        })
    }
}
