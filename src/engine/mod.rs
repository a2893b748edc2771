//! Core structure-break components.
//!
//! This module provides the fundamental types for zone tracking:
//! - `Bar`: OHLCV data with body and wick measures.
//! - `FractalChain` / `FractalDetector`: swing points and how they are found.
//! - `ZoneOrder`: the order attached to a zone, simulated or venue-backed.
//! - `ZoneManager`: bars, unbroken swings, zones and statistics.

mod bar;
mod config;
mod detector;
mod event;
mod fractal;
mod manager;
mod order;
mod stats;
mod venue;
mod zone;

pub use bar::*;
pub use config::*;
pub use detector::*;
pub use event::*;
pub use fractal::*;
pub use manager::*;
pub use order::*;
pub use stats::*;
pub use venue::*;
pub use zone::*;
