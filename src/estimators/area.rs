// src/estimators/area.rs
//! Area estimation of π
//!
//! Points are drawn uniformly in the square [-1, 1]²; the fraction landing in
//! the unit circle estimates π/4. Each sample is an indicator, so the running
//! mean is the hit rate and π̂ = 4 · mean with standard error 4 · SE(mean).

use super::{errors_against, Estimator, SampleBatch, Summary, Visualization};
use crate::config::SimulationKind;
use crate::error::McResult;
use crate::rng::RandomSource;
use crate::stats::{RunningStatistics, Statistics, Transform};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const MAX_SCATTER_POINTS: usize = 5_000;
const POINTS_PER_BATCH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    pub inside: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterView {
    pub points: Vec<ScatterPoint>,
    pub x_range: [f64; 2],
    pub y_range: [f64; 2],
    pub inside_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PiSummary {
    pub true_value: f64,
    pub absolute_error: f64,
    /// Percent
    pub relative_error: f64,
}

#[derive(Debug, Clone, Default)]
pub struct AreaEstimator {
    points: Vec<ScatterPoint>,
    inside: u64,
    total: u64,
}

impl AreaEstimator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Estimator for AreaEstimator {
    fn kind(&self) -> SimulationKind {
        SimulationKind::Pi
    }

    fn generate_batch(
        &mut self,
        batch_size: usize,
        rng: &mut RandomSource,
    ) -> McResult<SampleBatch> {
        let keep = POINTS_PER_BATCH
            .min(batch_size)
            .min(MAX_SCATTER_POINTS - self.points.len());
        let mut values = Vec::with_capacity(batch_size);
        for i in 0..batch_size {
            let x = rng.uniform_range(-1.0, 1.0);
            let y = rng.uniform_range(-1.0, 1.0);
            let inside = x * x + y * y <= 1.0;
            if inside {
                self.inside += 1;
            }
            if i < keep {
                self.points.push(ScatterPoint { x, y, inside });
            }
            values.push(if inside { 1.0 } else { 0.0 });
        }
        self.total += batch_size as u64;
        Ok(SampleBatch::new(values))
    }

    fn transform(&self) -> Transform {
        Transform::scaled(4.0)
    }

    fn visualization(&self) -> Visualization {
        Visualization::Scatter(ScatterView {
            points: self.points.clone(),
            x_range: [-1.0, 1.0],
            y_range: [-1.0, 1.0],
            inside_ratio: if self.total > 0 {
                self.inside as f64 / self.total as f64
            } else {
                0.0
            },
        })
    }

    fn summary(&self, statistics: &Statistics, _running: &RunningStatistics) -> Summary {
        let (absolute_error, relative_error) = errors_against(statistics.estimate, PI);
        Summary::Pi(PiSummary {
            true_value: PI,
            absolute_error,
            relative_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_are_indicators_and_scatter_is_capped() {
        let mut est = AreaEstimator::new();
        let mut rng = RandomSource::seeded(42);
        let mut stats = RunningStatistics::new();
        for _ in 0..60 {
            let batch = est.generate_batch(1_000, &mut rng).unwrap();
            assert!(batch.values.iter().all(|&v| v == 0.0 || v == 1.0));
            stats.update_all(batch.counted());
        }
        match est.visualization() {
            Visualization::Scatter(view) => {
                assert_eq!(view.points.len(), MAX_SCATTER_POINTS);
                assert!((view.inside_ratio - stats.estimate()).abs() < 1e-12);
                assert!(view
                    .points
                    .iter()
                    .all(|p| p.inside == (p.x * p.x + p.y * p.y <= 1.0)));
            }
            other => panic!("unexpected view {:?}", other),
        }
        let pi_hat = est.statistics(&stats).estimate;
        assert!((pi_hat - PI).abs() < 0.05, "pi estimate {}", pi_hat);
    }

    #[test]
    fn test_summary_reports_error_against_pi() {
        let est = AreaEstimator::new();
        let stats = Statistics::from_estimate(3.0, 0.01, 1.96);
        match est.summary(&stats, &RunningStatistics::new()) {
            Summary::Pi(s) => {
                assert_eq!(s.true_value, PI);
                assert!((s.absolute_error - (PI - 3.0)).abs() < 1e-12);
                assert!((s.relative_error - (PI - 3.0) / PI * 100.0).abs() < 1e-9);
            }
            other => panic!("unexpected summary {:?}", other),
        }
    }
}
