// src/stats/running.rs
//! Online (Welford) statistics
//!
//! # Update rule
//!
//! For each new value x:
//! ```text
//! n    ← n + 1
//! δ    = x - mean
//! mean ← mean + δ / n
//! M2   ← M2 + δ (x - mean)
//! ```
//!
//! Sample variance is `M2 / (n - 1)`; the standard error of the mean is
//! `sqrt(variance / n)`. No samples are retained, and feeding N values in one
//! batch or in N batches gives the same accumulator.

use serde::{Deserialize, Serialize};

/// z-score of a two-sided 95% normal interval
pub const Z_95: f64 = 1.96;

/// Welford accumulator of count, mean and sum of squared deviations
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningStatistics {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// O(1) update with one value
    pub fn update(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn update_all(&mut self, values: &[f64]) {
        for &v in values {
            self.update(v);
        }
    }

    /// Combine two accumulators (Chan et al. pairwise update)
    pub fn merge(&self, other: &RunningStatistics) -> RunningStatistics {
        let count = self.count + other.count;
        if count == 0 {
            return RunningStatistics::new();
        }
        let (na, nb) = (self.count as f64, other.count as f64);
        let delta = other.mean - self.mean;
        let mean = self.mean + delta * nb / count as f64;
        let m2 = self.m2 + other.m2 + delta * delta * na * nb / count as f64;
        RunningStatistics { count, mean, m2 }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Current mean; 0 before the first update
    pub fn estimate(&self) -> f64 {
        self.mean
    }

    /// Sample variance, reported as 0 for n ≤ 1
    pub fn variance(&self) -> f64 {
        if self.count <= 1 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Standard error of the mean, 0 for n ≤ 1
    pub fn standard_error(&self) -> f64 {
        if self.count <= 1 {
            0.0
        } else {
            (self.variance() / self.count as f64).sqrt()
        }
    }

    pub fn confidence_interval(&self, z: f64) -> (f64, f64) {
        let half = z * self.standard_error();
        (self.mean - half, self.mean + half)
    }
}

/// Affine map from the running mean to the reported quantity:
/// `estimate = offset + scale · mean`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale: f64,
    pub offset: f64,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        scale: 1.0,
        offset: 0.0,
    };

    pub fn scaled(scale: f64) -> Self {
        Transform { scale, offset: 0.0 }
    }

    pub fn apply(&self, running: &RunningStatistics, z: f64) -> Statistics {
        if running.count() == 0 {
            return Statistics::default();
        }
        let estimate = self.offset + self.scale * running.estimate();
        let std_error = self.scale.abs() * running.standard_error();
        Statistics::from_estimate(estimate, std_error, z)
    }
}

/// Statistics block carried by progress and completion events
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub estimate: f64,
    pub std_error: f64,
    pub lower_ci: f64,
    pub upper_ci: f64,
}

impl Statistics {
    pub fn from_estimate(estimate: f64, std_error: f64, z: f64) -> Self {
        Statistics {
            estimate,
            std_error,
            lower_ci: estimate - z * std_error,
            upper_ci: estimate + z * std_error,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lower_ci <= value && value <= self.upper_ci
    }
}

/// One point of the convergence trace
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergencePoint {
    pub iteration: u64,
    pub estimate: f64,
    pub std_error: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_single_sample() {
        let mut stats = RunningStatistics::new();
        assert_eq!(stats.count(), 0);
        assert_eq!(stats.estimate(), 0.0);
        assert_eq!(stats.variance(), 0.0);
        assert_eq!(stats.standard_error(), 0.0);

        stats.update(5.0);
        assert_eq!(stats.estimate(), 5.0);
        assert_eq!(stats.variance(), 0.0);
        assert_eq!(stats.standard_error(), 0.0);
        assert_eq!(stats.confidence_interval(Z_95), (5.0, 5.0));
    }

    #[test]
    fn test_known_values() {
        let mut stats = RunningStatistics::new();
        stats.update_all(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(stats.count(), 8);
        assert!((stats.estimate() - 5.0).abs() < 1e-12);
        // sum of squared deviations = 32, sample variance = 32 / 7
        assert!((stats.variance() - 32.0 / 7.0).abs() < 1e-12);
        assert!((stats.standard_error() - (32.0 / 7.0 / 8.0_f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_merge_matches_sequential() {
        let values: Vec<f64> = (0..1000).map(|i| ((i * 37) % 101) as f64 * 0.25).collect();
        let mut whole = RunningStatistics::new();
        whole.update_all(&values);

        let mut left = RunningStatistics::new();
        let mut right = RunningStatistics::new();
        left.update_all(&values[..313]);
        right.update_all(&values[313..]);
        let merged = left.merge(&right);

        assert_eq!(merged.count(), whole.count());
        assert!((merged.estimate() - whole.estimate()).abs() < 1e-9);
        assert!((merged.variance() - whole.variance()).abs() / whole.variance() < 1e-9);
        assert_eq!(RunningStatistics::new().merge(&RunningStatistics::new()).count(), 0);
    }

    #[test]
    fn test_transform_scales_error() {
        let mut stats = RunningStatistics::new();
        stats.update_all(&[0.0, 1.0, 1.0, 0.0]);
        let out = Transform::scaled(4.0).apply(&stats, Z_95);
        assert!((out.estimate - 2.0).abs() < 1e-12);
        assert!((out.std_error - 4.0 * stats.standard_error()).abs() < 1e-12);
        assert!(out.contains(2.0));
        assert_eq!(
            Transform::scaled(4.0).apply(&RunningStatistics::new(), Z_95),
            Statistics::default()
        );
    }
}
