// src/rng.rs
//! Random Number Generation for Incremental Simulations
//!
//! # Design Philosophy
//!
//! Every run owns exactly one [`RandomSource`]. All estimator draws for that
//! run go through it, in batch order, so a seeded run replays bit-for-bit:
//! same seed + same call sequence → same samples → same convergence history.
//!
//! Unseeded runs draw their key from operating-system entropy.
//!
//! # Independent Streams
//!
//! [`RngFactory`] derives one seed per stream (`base + stream_id`) for the
//! ensemble runner, where each member run is an independent replication.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

/// Seeded pseudo-random source used by the estimators
#[derive(Debug, Clone)]
pub struct RandomSource {
    rng: StdRng,
    seed: Option<u64>,
    draws: u64,
}

impl RandomSource {
    /// Deterministic when `seed` is given, entropy-seeded otherwise
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            seed,
            draws: 0,
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(Some(seed))
    }

    /// Restart the stream from `seed` (or fresh entropy)
    pub fn reseed(&mut self, seed: Option<u64>) {
        *self = Self::new(seed);
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Number of variates handed out since construction
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Uniform variate in [0, 1)
    pub fn uniform(&mut self) -> f64 {
        self.draws += 1;
        self.rng.gen::<f64>()
    }

    /// Uniform variate in [low, high)
    pub fn uniform_range(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.uniform()
    }

    /// Standard normal variate
    pub fn normal(&mut self) -> f64 {
        self.draws += 1;
        StandardNormal.sample(&mut self.rng)
    }

    /// Uniform integer in [0, n)
    pub fn below(&mut self, n: u64) -> u64 {
        self.draws += 1;
        self.rng.gen_range(0..n)
    }

    /// Draw from any `f64` distribution (Student-t, etc.)
    pub fn sample<D: Distribution<f64>>(&mut self, dist: &D) -> f64 {
        self.draws += 1;
        dist.sample(&mut self.rng)
    }
}

/// Seed factory for independent, reproducible replications
#[derive(Debug, Clone, Copy)]
pub struct RngFactory {
    base_seed: u64,
}

impl RngFactory {
    pub fn new(base_seed: u64) -> Self {
        Self { base_seed }
    }

    /// Seed for a specific stream
    pub fn seed_for(&self, stream_id: u64) -> u64 {
        self.base_seed.wrapping_add(stream_id)
    }

    /// Create a random source for a specific stream
    pub fn create(&self, stream_id: u64) -> RandomSource {
        RandomSource::seeded(self.seed_for(stream_id))
    }

    /// Seeds for `count` consecutive streams
    pub fn seeds(&self, count: usize) -> Vec<u64> {
        (0..count as u64).map(|i| self.seed_for(i)).collect()
    }
}
