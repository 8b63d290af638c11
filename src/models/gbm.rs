// src/models/gbm.rs
//! Geometric Brownian motion under the risk-neutral measure
//!
//! ```text
//! dS_t = μ S_t dt + σ S_t dW_t
//! S_{t+dt} = S_t · exp((μ - σ²/2) dt + σ √dt · Z),   Z ~ N(0,1)
//! ```
//!
//! The exact solution is used for both the terminal price (one draw per
//! sample) and the multi-step paths shown to the client.

use crate::rng::RandomSource;
use std::f64;

#[derive(Debug, Clone, Copy)]
pub struct Gbm {
    pub s0: f64,
    pub mu: f64,
    pub sigma: f64,
}

impl Gbm {
    pub fn new(s0: f64, mu: f64, sigma: f64) -> Self {
        Gbm { s0, mu, sigma }
    }

    pub fn exact_step(&self, s_t: f64, dt: f64, normal_draw: f64) -> f64 {
        s_t * ((self.mu - 0.5 * self.sigma * self.sigma) * dt
            + self.sigma * dt.sqrt() * normal_draw)
            .exp()
    }

    /// S_T from S_0 in a single exact step
    pub fn terminal(&self, t: f64, normal_draw: f64) -> f64 {
        self.exact_step(self.s0, t, normal_draw)
    }

    /// Path of `steps + 1` prices on an even grid over [0, t]
    pub fn sample_path(&self, t: f64, steps: usize, rng: &mut RandomSource) -> Vec<f64> {
        let dt = t / steps as f64;
        let mut path = Vec::with_capacity(steps + 1);
        path.push(self.s0);
        let mut current_s = self.s0;
        for _ in 0..steps {
            current_s = self.exact_step(current_s, dt, rng.normal());
            path.push(current_s);
        }
        path
    }
}
