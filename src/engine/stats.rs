#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Statistics of the closed zones of a manager.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RrStatistics {
    closed: usize,
    positive: usize,
    best_cap: i64,
    best_sum: i64,
    current_sum: i64,
}

impl Default for RrStatistics {
    fn default() -> Self {
        Self {
            closed: 0,
            positive: 0,
            best_cap: 1,
            best_sum: 0,
            current_sum: 0,
        }
    }
}

impl RrStatistics {
    /// Computes the statistics of closed zones.
    ///
    /// ### Arguments
    /// * `realized` - Realized RR of each closed zone. Caps are tested against its floor.
    /// * `rr_cap` - The configured cap, compared unrounded.
    pub fn compute(realized: &[f64], rr_cap: f64) -> Self {
        let rrs = realized.iter().map(|rr| rr.floor() as i64).collect::<Vec<_>>();
        let (best_cap, best_sum) = best_cap(&rrs);
        Self {
            closed: realized.len(),
            positive: realized.iter().filter(|rr| **rr > 0.0).count(),
            best_cap,
            best_sum,
            current_sum: capped_sum(&rrs, rr_cap),
        }
    }

    /// Number of closed zones.
    pub fn closed(&self) -> usize {
        self.closed
    }

    /// Closed zones that realized a positive RR.
    pub fn positive(&self) -> usize {
        self.positive
    }

    /// The integer cap that would have paid the most.
    pub fn best_cap(&self) -> i64 {
        self.best_cap
    }

    pub fn best_sum(&self) -> i64 {
        self.best_sum
    }

    /// Sum paid by the configured cap.
    pub fn current_sum(&self) -> i64 {
        self.current_sum
    }
}

/// Contribution of one closed zone to the sum of a target `cap`.
///
/// Losers pay -1 and a zone that reached the cap pays its integer part. Positive
/// zones below the cap never hit the target and pay nothing.
fn contribution(rr: i64, cap: f64) -> i64 {
    if rr > 0 && (rr as f64) < cap {
        0
    } else if rr as f64 >= cap {
        cap as i64
    } else {
        -1
    }
}

/// Sum over `rrs` of what a take-profit at `cap` RR would have paid.
pub fn capped_sum(rrs: &[i64], cap: f64) -> i64 {
    rrs.iter().map(|rr| contribution(*rr, cap)).sum()
}

/// Best integer cap in `1..=max(max RR, 1)` and its sum; the first cap wins ties.
pub fn best_cap(rrs: &[i64]) -> (i64, i64) {
    let max = rrs.iter().copied().max().unwrap_or(0).max(1);
    let mut best = (1, capped_sum(rrs, 1.0));
    for cap in 2..=max {
        let sum = capped_sum(rrs, cap as f64);
        if sum > best.1 {
            best = (cap, sum);
        }
    }
    best
}
