//! Performance metrics of closed zones.
//!
//! This module provides tools to calculate:
//! - Win rate
//! - Average and total realized RR
//! - Profit factor
//! - Max drawdown, in RR units
//! - The best RR cap and what the configured cap paid
//!
//! It needs the `metrics` feature (on by default).

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::{OrderFactory, RrStatistics, ZoneManager};

/// Trading metrics computed from the realized RR of closed zones, in closing order.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    realized: Vec<f64>,
    rr_cap: f64,
    statistics: RrStatistics,
}

impl<F: OrderFactory> From<&ZoneManager<F>> for Metrics {
    fn from(manager: &ZoneManager<F>) -> Self {
        let realized = manager
            .closed_zones()
            .iter()
            .map(|zone| zone.order().realized_rr())
            .collect();
        Self::new(realized, manager.config().rr_cap)
    }
}

impl Metrics {
    /// Creates metrics from realized RRs.
    ///
    /// ### Arguments
    /// * `realized` - Realized RR of each closed zone, in closing order.
    /// * `rr_cap` - The configured RR cap.
    pub fn new(realized: Vec<f64>, rr_cap: f64) -> Self {
        Self {
            statistics: RrStatistics::compute(&realized, rr_cap),
            realized,
            rr_cap,
        }
    }

    /// Returns the realized RRs.
    pub fn realized(&self) -> std::slice::Iter<'_, f64> {
        self.realized.iter()
    }

    pub fn rr_cap(&self) -> f64 {
        self.rr_cap
    }

    pub fn statistics(&self) -> &RrStatistics {
        &self.statistics
    }

    /// Sum of the realized RRs.
    pub fn total_rr(&self) -> f64 {
        self.realized.iter().sum()
    }

    /// Mean realized RR, zero without closed zones.
    pub fn average_rr(&self) -> f64 {
        if self.realized.is_empty() {
            return 0.0;
        }
        self.total_rr() / self.realized.len() as f64
    }

    /// Computes the win rate as a percentage of zones closed with a positive RR.
    pub fn win_rate(&self) -> f64 {
        if self.realized.is_empty() {
            return 0.0;
        }
        let winning = self.realized.iter().filter(|rr| **rr > 0.0).count();
        (winning as f64 / self.realized.len() as f64) * 100.0
    }

    /// Computes the profit factor: gained RR over lost RR.
    pub fn profit_factor(&self) -> f64 {
        let (gains, losses) = self.realized.iter().fold((0.0_f64, 0.0_f64), |(gains, losses), &rr| {
            if rr > 0.0 { (gains + rr, losses) } else { (gains, losses + rr.abs()) }
        });

        if losses == 0.0 {
            return f64::INFINITY;
        }

        gains / losses
    }

    /// Computes the deepest peak-to-trough fall of the cumulative RR curve.
    pub fn max_drawdown(&self) -> f64 {
        let mut equity = 0.0;
        let mut max_peak = 0.0;
        let mut max_drawdown = 0.0;

        for &rr in &self.realized {
            equity += rr;
            if equity > max_peak {
                max_peak = equity;
            }
            let drawdown = max_peak - equity;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }

        max_drawdown
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Zone Metrics ===")?;
        writeln!(f, "Closed Zones: {}", self.statistics.closed())?;
        writeln!(f, "Positive Zones: {}", self.statistics.positive())?;
        writeln!(f, "Win Rate: {:.2}%", self.win_rate())?;
        writeln!(f, "Average RR: {:.2}", self.average_rr())?;
        writeln!(f, "Total RR: {:.2}", self.total_rr())?;
        #[allow(clippy::writeln_empty_string)]
        writeln!(f, "")?;
        writeln!(f, "Profit Factor: {:.2}", self.profit_factor())?;
        writeln!(f, "Max Drawdown: {:.2} RR", self.max_drawdown())?;
        writeln!(
            f,
            "Best Cap: {} RR (sum {})",
            self.statistics.best_cap(),
            self.statistics.best_sum()
        )?;
        writeln!(f, "Current Cap: {} RR (sum {})", self.rr_cap, self.statistics.current_sum())
    }
}

#[cfg(test)]
#[test]
fn win_rate() {
    let metrics = Metrics::new(vec![2.4, -1.0, 0.0, 3.1], 5.0);
    assert_eq!(metrics.win_rate(), 50.0);
    assert_eq!(metrics.statistics().positive(), 2);
}

#[cfg(test)]
#[test]
fn win_rate_no_zones() {
    let metrics = Metrics::new(vec![], 5.0);
    assert_eq!(metrics.win_rate(), 0.0);
    assert_eq!(metrics.average_rr(), 0.0);
    assert_eq!(metrics.profit_factor(), f64::INFINITY);
}

#[cfg(test)]
#[test]
fn profit_factor() {
    let metrics = Metrics::new(vec![3.0, -1.0, 1.5, -1.0], 5.0);
    assert_eq!(metrics.profit_factor(), 2.25);
    assert_eq!(metrics.total_rr(), 2.5);
    assert_eq!(metrics.average_rr(), 0.625);
}

#[cfg(test)]
#[test]
fn max_drawdown() {
    // equity: 2, 1, 0, 4, 3
    let metrics = Metrics::new(vec![2.0, -1.0, -1.0, 4.0, -1.0], 5.0);
    assert_eq!(metrics.max_drawdown(), 2.0);
}

#[cfg(test)]
#[test]
fn statistics_use_floored_rr() {
    let metrics = Metrics::new(vec![2.9, 2.1, -1.0, 5.5], 5.0);
    let stats = metrics.statistics();
    assert_eq!(stats.best_cap(), 2);
    assert_eq!(stats.best_sum(), 5);
    assert_eq!(stats.current_sum(), 4);
}

#[cfg(test)]
#[test]
fn display() {
    let metrics = Metrics::new(vec![2.0, -1.0], 5.0);
    let report = metrics.to_string();
    assert!(report.starts_with("=== Zone Metrics ==="));
    assert!(report.contains("Win Rate: 50.00%"));
    assert!(report.contains("Best Cap: 2 RR (sum 1)"));
}
