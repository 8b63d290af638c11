// src/math_utils.rs
use serde::{Deserialize, Serialize};
use statrs::function::erf;
use std::f64::consts::{PI, SQRT_2};

pub fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf::erf(x / SQRT_2))
}

/// Standard normal probability density φ(x) = exp(-x²/2) / √(2π)
pub fn norm_pdf(x: f64) -> f64 {
    (1.0 / (2.0 * PI).sqrt()) * (-0.5 * x * x).exp()
}

/// Inverse of the standard normal CDF, for p in (0, 1)
pub fn norm_ppf(p: f64) -> f64 {
    SQRT_2 * erf::erf_inv(2.0 * p - 1.0)
}

/// `n` evenly spaced points from `start` to `end` inclusive
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Trapezoid-rule integral of sampled `y` over `x`
pub fn trapezoid(y: &[f64], x: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| 0.5 * (ys[0] + ys[1]) * (xs[1] - xs[0]))
        .sum()
}

/// Percentile of an ascending-sorted slice, linear interpolation between
/// order statistics. `q` is a fraction in [0, 1].
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Equal-width histogram: `bins` holds bin centres
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub bins: Vec<f64>,
    pub counts: Vec<f64>,
}

impl Histogram {
    /// Bin `values` into `n_bins` over `range` (or the data's min/max).
    /// The last bin is closed on the right; values outside the range are dropped.
    /// With `density` the counts are scaled so the histogram integrates to one.
    pub fn from_values(
        values: &[f64],
        n_bins: usize,
        range: Option<(f64, f64)>,
        density: bool,
    ) -> Self {
        if values.is_empty() || n_bins == 0 {
            return Self::default();
        }
        let (mut lo, mut hi) = range.unwrap_or_else(|| {
            values
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                })
        });
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }
        let width = (hi - lo) / n_bins as f64;
        let mut counts = vec![0.0; n_bins];
        let mut total = 0.0;
        for &v in values {
            if v < lo || v > hi || !v.is_finite() {
                continue;
            }
            let idx = (((v - lo) / width) as usize).min(n_bins - 1);
            counts[idx] += 1.0;
            total += 1.0;
        }
        if density && total > 0.0 {
            for c in counts.iter_mut() {
                *c /= total * width;
            }
        }
        let bins = (0..n_bins)
            .map(|i| lo + width * (i as f64 + 0.5))
            .collect();
        Self { bins, counts }
    }
}

pub struct Timer {
    start_time: std::time::Instant,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Timer {
        Timer {
            start_time: std::time::Instant::now(),
        }
    }

    pub fn start(&mut self) {
        self.start_time = std::time::Instant::now();
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64() * 1000.0
    }
}
