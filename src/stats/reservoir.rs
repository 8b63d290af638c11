// src/stats/reservoir.rs
//! Bounded sample retention for quantile estimates
//!
//! Quantiles need order statistics, which the online accumulator cannot
//! provide. The reservoir keeps at most `capacity` values using Algorithm R:
//! the first `capacity` values are stored verbatim, after which the k-th value
//! replaces a uniformly chosen slot with probability `capacity / k`. The
//! retained set is then a uniform sample of everything seen.
//!
//! # Ordered view
//!
//! An ascending copy of the retained values is kept alongside them. Offers
//! only log what entered and what was evicted; the next read sorts that log
//! and merges it into the copy in one linear pass, so a read after a batch of
//! b offers costs O(m + b log b) rather than a full sort of m values.
//!
//! # Error bound
//!
//! While `seen ≤ capacity` the quantile is exact (for the data seen). Past
//! that point the retained sample of size m estimates the p-quantile with a
//! rank error whose standard deviation is `sqrt(p (1 - p) / m)` in
//! probability units, e.g. ≈ 0.069 percentage points for p = 0.95,
//! m = 100 000.

use crate::math_utils::percentile_sorted;
use crate::rng::RandomSource;
use rayon::prelude::*;
use std::cell::RefCell;
use std::cmp::Ordering;

#[derive(Debug, Clone, Default)]
struct OrderedView {
    sorted: Vec<f64>,
    added: Vec<f64>,
    evicted: Vec<f64>,
    merges: u64,
}

impl OrderedView {
    fn refresh(&mut self) {
        if self.added.is_empty() && self.evicted.is_empty() {
            return;
        }
        self.added.par_sort_unstable_by(|a, b| a.total_cmp(b));
        self.evicted.par_sort_unstable_by(|a, b| a.total_cmp(b));

        let mut merged = Vec::with_capacity(self.sorted.len() + self.added.len());
        let (mut i, mut j, mut k) = (0, 0, 0);
        while i < self.sorted.len() || j < self.added.len() {
            let next = match (self.sorted.get(i), self.added.get(j)) {
                (Some(a), Some(b)) if a.total_cmp(b) != Ordering::Greater => {
                    i += 1;
                    *a
                }
                (Some(a), None) => {
                    i += 1;
                    *a
                }
                (_, Some(b)) => {
                    j += 1;
                    *b
                }
                (None, None) => break,
            };
            // every evicted value is present in the merged stream
            if k < self.evicted.len() && self.evicted[k].total_cmp(&next) == Ordering::Equal {
                k += 1;
            } else {
                merged.push(next);
            }
        }
        self.sorted = merged;
        self.added.clear();
        self.evicted.clear();
        self.merges += 1;
    }
}

#[derive(Debug, Clone)]
pub struct Reservoir {
    capacity: usize,
    seen: u64,
    values: Vec<f64>,
    ordered: RefCell<OrderedView>,
}

impl Reservoir {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            seen: 0,
            values: Vec::with_capacity(capacity.min(1 << 16)),
            ordered: RefCell::new(OrderedView::default()),
        }
    }

    /// Offer a value; draws from `rng` only once the reservoir is full
    pub fn offer(&mut self, value: f64, rng: &mut RandomSource) {
        self.seen += 1;
        let ordered = self.ordered.get_mut();
        if self.values.len() < self.capacity {
            self.values.push(value);
            ordered.added.push(value);
        } else {
            let slot = rng.below(self.seen);
            if (slot as usize) < self.capacity {
                let evicted = std::mem::replace(&mut self.values[slot as usize], value);
                ordered.evicted.push(evicted);
                ordered.added.push(value);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn seen(&self) -> u64 {
        self.seen
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True while every value offered is still retained
    pub fn is_exact(&self) -> bool {
        self.seen as usize <= self.capacity
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Run `f` over the retained values in ascending order
    pub fn with_sorted<R>(&self, f: impl FnOnce(&[f64]) -> R) -> R {
        let mut ordered = self.ordered.borrow_mut();
        ordered.refresh();
        f(&ordered.sorted)
    }

    /// Retained values in ascending order
    pub fn sorted(&self) -> Vec<f64> {
        self.with_sorted(|sorted| sorted.to_vec())
    }

    /// Number of times pending offers were merged into the ordered view
    pub fn merges(&self) -> u64 {
        self.ordered.borrow().merges
    }

    /// Standard deviation of the rank error, in probability units, of the
    /// p-quantile estimated from the retained subsample
    pub fn rank_error_bound(&self, p: f64) -> f64 {
        if self.is_exact() || self.values.is_empty() {
            0.0
        } else {
            (p * (1.0 - p) / self.values.len() as f64).sqrt()
        }
    }
}

/// Quantile estimate with a distribution-free confidence interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantileEstimate {
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

/// p-quantile of ascending `sorted` plus the order-statistic interval with
/// ranks `m p ± z sqrt(m p (1 - p))`
pub fn quantile_interval(sorted: &[f64], p: f64, z: f64) -> QuantileEstimate {
    if sorted.is_empty() {
        return QuantileEstimate {
            value: 0.0,
            lower: 0.0,
            upper: 0.0,
        };
    }
    let m = sorted.len() as f64;
    let spread = z * (m * p * (1.0 - p)).sqrt();
    let last = sorted.len() - 1;
    let lo_rank = ((m * p - spread).floor().max(0.0) as usize).min(last);
    let hi_rank = ((m * p + spread).ceil().max(0.0) as usize).min(last);
    QuantileEstimate {
        value: percentile_sorted(sorted, p),
        lower: sorted[lo_rank],
        upper: sorted[hi_rank],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_until_full() {
        let mut rng = RandomSource::seeded(3);
        let mut res = Reservoir::new(10);
        for i in 0..10 {
            res.offer(i as f64, &mut rng);
        }
        assert!(res.is_exact());
        assert_eq!(rng.draws(), 0);
        assert_eq!(res.rank_error_bound(0.95), 0.0);

        res.offer(10.0, &mut rng);
        assert!(!res.is_exact());
        assert_eq!(res.len(), 10);
        assert_eq!(res.seen(), 11);
        assert_eq!(rng.draws(), 1);
        assert!(res.rank_error_bound(0.95) > 0.0);
    }

    #[test]
    fn test_reservoir_is_roughly_uniform() {
        let mut rng = RandomSource::seeded(11);
        let mut res = Reservoir::new(1_000);
        for i in 0..100_000 {
            res.offer(i as f64, &mut rng);
        }
        let sorted = res.sorted();
        let median = percentile_sorted(&sorted, 0.5);
        assert!(
            (median - 50_000.0).abs() < 5_000.0,
            "retained median {} far from population median",
            median
        );
    }

    #[test]
    fn test_quantile_interval_brackets_value() {
        let sorted: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        let q = quantile_interval(&sorted, 0.95, 1.96);
        assert!((q.value - 949.05).abs() < 1e-9);
        assert!(q.lower <= q.value && q.value <= q.upper);
        assert!(q.upper <= 999.0);
        let empty = quantile_interval(&[], 0.95, 1.96);
        assert_eq!(empty.value, 0.0);
    }

    #[test]
    fn test_ordered_view_tracks_replacements() {
        let mut rng = RandomSource::seeded(17);
        let mut res = Reservoir::new(500);
        for batch in 0..40 {
            for i in 0..250 {
                // repeated values exercise duplicate eviction
                res.offer(((batch * 250 + i) % 97) as f64 * rng.uniform().round(), &mut rng);
            }
            let mut expected = res.values().to_vec();
            expected.sort_by(|a, b| a.total_cmp(b));
            assert_eq!(res.sorted(), expected, "ordered view diverged at batch {}", batch);
        }
        assert!(res.merges() > 0 && res.merges() <= 40);
    }

    #[test]
    fn test_reads_without_offers_do_not_merge() {
        let mut rng = RandomSource::seeded(2);
        let mut res = Reservoir::new(100);
        for i in 0..1_000 {
            res.offer(i as f64, &mut rng);
        }
        let first = res.with_sorted(|s| s[s.len() / 2]);
        let second = res.with_sorted(|s| s[s.len() / 2]);
        assert_eq!(first, second);
        assert_eq!(res.merges(), 1);
        assert_eq!(res.len(), 100);
    }
}
