use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// A finalized (or still forming) OHLCV price bar.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    open_time: DateTime<Utc>,
}

impl Bar {
    pub fn open(&self) -> f64 {
        self.open
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn close(&self) -> f64 {
        self.close
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn open_time(&self) -> DateTime<Utc> {
        self.open_time
    }

    /// Top of the body, `max(open, close)`.
    pub fn body_top(&self) -> f64 {
        self.open.max(self.close)
    }

    /// Bottom of the body, `min(open, close)`.
    pub fn body_bottom(&self) -> f64 {
        self.open.min(self.close)
    }

    /// Length of the wick between the body top and the high.
    pub fn upper_wick(&self) -> f64 {
        self.high - self.body_top()
    }

    /// Length of the wick between the low and the body bottom.
    pub fn lower_wick(&self) -> f64 {
        self.body_bottom() - self.low
    }

    /// Full bar range, `high - low`.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

/// Builder for [`Bar`]; `build` checks that the prices are consistent.
///
/// ```rust
/// use bos_rs::prelude::*;
/// use chrono::DateTime;
///
/// let bar = BarBuilder::builder()
///     .open(100.0)
///     .high(110.0)
///     .low(95.0)
///     .close(105.0)
///     .volume(1.0)
///     .open_time(DateTime::default())
///     .build()
///     .unwrap();
///
/// assert!(bar.is_bullish());
/// assert_eq!(bar.upper_wick(), 5.0);
/// ```
#[derive(Debug, Default)]
pub struct BarBuilder {
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
    open_time: Option<DateTime<Utc>>,
}

impl BarBuilder {
    pub fn builder() -> Self {
        Self::default()
    }

    pub fn open(mut self, open: f64) -> Self {
        self.open = Some(open);
        self
    }

    pub fn high(mut self, high: f64) -> Self {
        self.high = Some(high);
        self
    }

    pub fn low(mut self, low: f64) -> Self {
        self.low = Some(low);
        self
    }

    pub fn close(mut self, close: f64) -> Self {
        self.close = Some(close);
        self
    }

    /// Defaults to zero when never set.
    pub fn volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn open_time(mut self, open_time: DateTime<Utc>) -> Self {
        self.open_time = Some(open_time);
        self
    }

    pub fn build(self) -> Result<Bar> {
        let open = self.open.ok_or(Error::MissingField("open"))?;
        let high = self.high.ok_or(Error::MissingField("high"))?;
        let low = self.low.ok_or(Error::MissingField("low"))?;
        let close = self.close.ok_or(Error::MissingField("close"))?;
        let open_time = self.open_time.ok_or(Error::MissingField("open_time"))?;
        let volume = self.volume.unwrap_or_default();

        for price in [open, high, low, close] {
            if !price.is_finite() {
                return Err(Error::InvalidPrice(price));
            }
        }
        if !volume.is_finite() || volume < 0.0 {
            return Err(Error::InvalidPrice(volume));
        }
        if high < open.max(close) || low > open.min(close) {
            return Err(Error::InvalidBar { open, high, low, close });
        }

        Ok(Bar {
            open,
            high,
            low,
            close,
            volume,
            open_time,
        })
    }
}

#[cfg(test)]
fn builder(open: f64, high: f64, low: f64, close: f64) -> BarBuilder {
    BarBuilder::builder()
        .open(open)
        .high(high)
        .low(low)
        .close(close)
        .volume(1.0)
        .open_time(DateTime::from_timestamp_secs(1515151515).unwrap())
}

#[cfg(test)]
#[test]
fn derived_measures_bullish() {
    let bar = builder(100.0, 112.0, 96.0, 108.0).build().unwrap();
    assert!(bar.is_bullish());
    assert_eq!(bar.body_top(), 108.0);
    assert_eq!(bar.body_bottom(), 100.0);
    assert_eq!(bar.upper_wick(), 4.0);
    assert_eq!(bar.lower_wick(), 4.0);
    assert_eq!(bar.range(), 16.0);
}

#[cfg(test)]
#[test]
fn derived_measures_bearish() {
    let bar = builder(108.0, 110.0, 99.0, 100.0).build().unwrap();
    assert!(!bar.is_bullish());
    assert_eq!(bar.body_top(), 108.0);
    assert_eq!(bar.body_bottom(), 100.0);
    assert_eq!(bar.upper_wick(), 2.0);
    assert_eq!(bar.lower_wick(), 1.0);
}

#[cfg(test)]
#[test]
fn doji_is_not_bullish() {
    let bar = builder(100.0, 101.0, 99.0, 100.0).build().unwrap();
    assert!(!bar.is_bullish());
}

#[cfg(test)]
#[test]
fn build_rejects_high_below_body() {
    let result = builder(100.0, 104.0, 95.0, 105.0).build();
    assert!(matches!(result, Err(Error::InvalidBar { .. })));
}

#[cfg(test)]
#[test]
fn build_rejects_low_above_body() {
    let result = builder(100.0, 110.0, 101.0, 105.0).build();
    assert!(matches!(result, Err(Error::InvalidBar { .. })));
}

#[cfg(test)]
#[test]
fn build_rejects_nan() {
    let result = builder(f64::NAN, 110.0, 90.0, 105.0).build();
    assert!(matches!(result, Err(Error::InvalidPrice(_))));
}

#[cfg(test)]
#[test]
fn build_requires_open_time() {
    let result = BarBuilder::builder().open(1.0).high(1.0).low(1.0).close(1.0).build();
    assert!(matches!(result, Err(Error::MissingField("open_time"))));
}
