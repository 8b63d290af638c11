// src/estimators/integration.rs
//! Plain Monte Carlo quadrature
//!
//! ```text
//! ∫ₐᵇ f(x) dx ≈ (b - a) · (1/n) Σ f(xᵢ),   xᵢ ~ U[a, b]
//! ```
//!
//! Every supported integrand has a closed-form antiderivative, used for the
//! completion summary.

use super::{errors_against, Estimator, SampleBatch, Summary, Visualization};
use crate::config::{FunctionType, IntegrationParams, SimulationKind};
use crate::error::{McError, McResult};
use crate::math_utils::linspace;
use crate::rng::RandomSource;
use crate::stats::{RunningStatistics, Statistics, Transform};
use serde::{Deserialize, Serialize};
use statrs::function::erf::erf;
use std::f64::consts::PI;

const MAX_SAMPLE_POINTS: usize = 1_000;
const POINTS_PER_BATCH: usize = 50;
const CURVE_POINTS: usize = 200;

impl FunctionType {
    pub fn eval(&self, x: f64) -> f64 {
        match self {
            FunctionType::Gaussian => (-x * x).exp(),
            FunctionType::Sine => x.sin(),
            FunctionType::Polynomial => x * x * x - 2.0 * x * x + x,
            FunctionType::Exponential => (-x.abs()).exp(),
            FunctionType::Reciprocal => 1.0 / (1.0 + x * x),
        }
    }

    fn antiderivative(&self, x: f64) -> f64 {
        match self {
            FunctionType::Gaussian => 0.5 * PI.sqrt() * erf(x),
            FunctionType::Sine => -x.cos(),
            FunctionType::Polynomial => x.powi(4) / 4.0 - 2.0 * x.powi(3) / 3.0 + x * x / 2.0,
            // d/dx sign(x)(1 - e^{-|x|}) = e^{-|x|} on both sides of 0
            FunctionType::Exponential => x.signum() * (1.0 - (-x.abs()).exp()),
            FunctionType::Reciprocal => x.atan(),
        }
    }

    /// Exact ∫ₐᵇ f(x) dx
    pub fn exact_integral(&self, a: f64, b: f64) -> f64 {
        self.antiderivative(b) - self.antiderivative(a)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationView {
    pub function_curve: Curve,
    pub sample_points: Vec<[f64; 2]>,
    pub bounds: [f64; 2],
    pub shaded_area: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegrationSummary {
    pub function_type: FunctionType,
    pub bounds: [f64; 2],
    pub analytical_result: f64,
    pub absolute_error: f64,
    /// Percent; 0 when the exact integral is 0
    pub relative_error: f64,
}

#[derive(Debug, Clone)]
pub struct IntegrationEstimator {
    function: FunctionType,
    lower: f64,
    upper: f64,
    sample_points: Vec<[f64; 2]>,
}

impl IntegrationEstimator {
    pub fn new(params: &IntegrationParams) -> Self {
        Self {
            function: params.function_type,
            lower: params.lower_bound,
            upper: params.upper_bound,
            sample_points: Vec::new(),
        }
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

impl Estimator for IntegrationEstimator {
    fn kind(&self) -> SimulationKind {
        SimulationKind::Integration
    }

    fn generate_batch(
        &mut self,
        batch_size: usize,
        rng: &mut RandomSource,
    ) -> McResult<SampleBatch> {
        let keep = POINTS_PER_BATCH
            .min(batch_size)
            .min(MAX_SAMPLE_POINTS - self.sample_points.len());
        let mut values = Vec::with_capacity(batch_size);
        for i in 0..batch_size {
            let x = rng.uniform_range(self.lower, self.upper);
            let y = self.function.eval(x);
            if !y.is_finite() {
                return Err(McError::numeric(
                    "integration",
                    format!("integrand {:?} is not finite at x = {}", self.function, x),
                ));
            }
            if i < keep {
                self.sample_points.push([x, y]);
            }
            values.push(y);
        }
        Ok(SampleBatch::new(values))
    }

    fn transform(&self) -> Transform {
        Transform::scaled(self.width())
    }

    fn visualization(&self) -> Visualization {
        let x = linspace(self.lower, self.upper, CURVE_POINTS);
        let y = x.iter().map(|&v| self.function.eval(v)).collect();
        Visualization::FunctionIntegration(IntegrationView {
            function_curve: Curve { x, y },
            sample_points: self.sample_points.clone(),
            bounds: [self.lower, self.upper],
            shaded_area: true,
        })
    }

    fn summary(&self, statistics: &Statistics, _running: &RunningStatistics) -> Summary {
        let exact = self.function.exact_integral(self.lower, self.upper);
        let (absolute_error, relative_error) = errors_against(statistics.estimate, exact);
        Summary::Integration(IntegrationSummary {
            function_type: self.function,
            bounds: [self.lower, self.upper],
            analytical_result: exact,
            absolute_error,
            relative_error,
        })
    }
}
