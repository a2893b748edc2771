//! # BOS: Break of Structure and Interest Zones
//!
//! **BOS** is a Rust library that reads price-action structure from candlestick (OHLCV) data.
//! It detects swing points, watches which of them are still unbroken, reports **breaks of
//! structure** and draws an **interest zone** at the swing point the break reveals. Every zone
//! carries an order measured in **RR** (reward over initial risk), so you can see how the zones
//! would have traded and which RR target would have paid the most.
//!
//! ## Core Components
//! | Component   | Description                                                                                     |
//! |-------------|-------------------------------------------------------------------------------------------------|
//! | **`Bar`** | OHLCV data for a single period, with body and wick measures.                                        |
//! | **`FractalChain`** | Swing points linked in detection order, with "best of a same-side run" queries.          |
//! | **`FractalDetector`** | Finds local extremes over a symmetric window, with optional confirmation.             |
//! | **`ZoneOrder`** | Order contract of a zone: a `SimulatedOrder` or a venue-backed `VenueOrder`.                |
//! | **`ZoneManager`** | Owns bars, unbroken swings and zones; runs the break scan and the order bookkeeping.      |
//! | **`RrStatistics`** | Closed-zone statistics and the best RR cap found by back-optimization.                   |
//! | **`Metrics`** | A printable report of the closed zones.                                                       |
//! | **`Optimizer`** | Sweeps zone parameters over historical bars.                                                |
//!
//! ## Zone Lifecycle
//! | Step               | Description                                                                                     |
//! |--------------------|-------------------------------------------------------------------------------------------------|
//! | **Fractal**        | A bar whose high (low) is the extreme of its window becomes an unbroken swing point.           |
//! | **Break**          | Price trades beyond an unbroken swing point.                                                   |
//! | **Zone**           | A rectangle is anchored at the next opposite swing point, if its level is still untested.     |
//! | **Mitigation**     | Price trades back into the zone and the order opens.                                           |
//! | **Close**          | The order stops out; its peak RR is kept when it passed the break-even threshold.             |
//!
//! ## Getting Started
//! ```rust
//! use bos_rs::prelude::*;
//! use chrono::{DateTime, Duration};
//!
//! let bars = (0..40)
//!     .map(|i| {
//!         let mid = 100.0 + 10.0 * (i as f64 * 0.5).sin();
//!         BarBuilder::builder()
//!             .open(mid - 0.5)
//!             .high(mid + 1.0)
//!             .low(mid - 1.0)
//!             .close(mid + 0.5)
//!             .volume(1.0)
//!             .open_time(DateTime::default() + Duration::minutes(i))
//!             .build()
//!             .unwrap()
//!     })
//!     .collect::<Vec<_>>();
//!
//! let config = ZoneConfig {
//!     pivot_period: 4,
//!     ..Default::default()
//! };
//! let factory = SimulatedOrderFactory::from(&config);
//! let mut manager = ZoneManager::new(config, factory).unwrap();
//! manager.replay(bars).unwrap();
//!
//! for event in manager.take_events() {
//!     if let Event::StructureBreak(bos) = event {
//!         println!("broke {:?} at bar {}", bos.fractal().side(), bos.index());
//!     }
//! }
//! println!("{:?}", manager.statistics());
//! ```
//!
//! ## Error Handling
//! BOS uses custom error types to handle:
//! - Invalid bars and prices.
//! - Invalid configuration (e.g., a zero pivot period).
//! - Zones whose entry would sit on their stop (zero risk).
//!
//! Venue failures are never returned: they are logged with [`tracing`] and the zone keeps
//! going.
//!
//! ## License
//! MIT

/// Core components: bars, fractals, orders, zones and the zone manager.
pub mod engine;

/// Error types for the library.
pub mod errors;

/// Utility functions and helpers.
mod utils;

/// Report of closed zones: win rate, average RR, best cap.
#[cfg(feature = "metrics")]
pub mod metrics;

/// Zone parameter optimization.
#[cfg(feature = "optimizer")]
pub mod optimizer;

/// Re-exports of commonly used types and traits for convenience.
pub mod prelude {
    pub use super::*;
    pub use crate::engine::*;
    pub use crate::errors::*;

    #[cfg(feature = "metrics")]
    pub use crate::metrics::*;

    #[cfg(feature = "optimizer")]
    pub use crate::optimizer::*;
}

use std::ops::{Div, Mul, Sub};

/// Trait for risk/reward arithmetic on prices.
pub trait RiskReward<Rhs = Self> {
    /// Distance between the price and its stop.
    ///
    /// ### Arguments
    /// * `stop` - The protective stop.
    ///
    /// ### Returns
    /// The absolute distance, the risk of one unit.
    fn risk(self, stop: Rhs) -> Self;

    /// Unsigned RR of the price measured from an entry.
    ///
    /// ### Arguments
    /// * `entry` - The entry price.
    /// * `stop` - The stop defining one unit of risk.
    ///
    /// ### Returns
    /// `|price - entry| / |entry - stop|`.
    fn rr(self, entry: Rhs, stop: Rhs) -> Self;

    /// Converts a number of ticks into a price offset.
    ///
    /// ### Arguments
    /// * `tick_size` - The instrument tick size.
    fn ticks(self, tick_size: Rhs) -> Self;
}

impl RiskReward for f64 {
    fn risk(self, stop: Self) -> Self {
        self.sub(stop).abs()
    }

    fn rr(self, entry: Self, stop: Self) -> Self {
        self.risk(entry).div(entry.risk(stop))
    }

    fn ticks(self, tick_size: Self) -> Self {
        self.mul(tick_size)
    }
}

#[cfg(test)]
mod rr {
    use super::*;

    #[test]
    fn risk() {
        assert_eq!(5.0, 100.0.risk(95.0));
        assert_eq!(5.0, 95.0.risk(100.0))
    }

    #[test]
    fn rr() {
        assert_eq!(2.0, 110.0.rr(100.0, 95.0));
        assert_eq!(1.0, 95.0.rr(100.0, 95.0))
    }

    #[test]
    fn ticks() {
        assert_eq!(1.25, 5.0.ticks(0.25))
    }
}
