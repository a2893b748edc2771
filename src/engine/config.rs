#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    engine::FractalOptions,
    errors::{Error, Result},
};

/// How the zone height is chosen.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HeightMode {
    /// The anchor-side wick, unless it is much smaller than the average range.
    #[default]
    Auto,
    /// Always the average range.
    AverageOnly,
}

/// Parameters of a [`ZoneManager`](crate::engine::ZoneManager), fixed for its lifetime.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneConfig {
    /// Width of the fractal window.
    pub pivot_period: usize,
    /// Hold fractal events until the opposite side prints.
    pub require_confirmation: bool,
    pub height_mode: HeightMode,
    /// A stopped order keeps its peak RR only when the peak went beyond this.
    pub break_even_rr: f64,
    /// RR target the current-cap sum is measured with.
    pub rr_cap: f64,
    /// Bars averaged for the nominal zone height.
    pub average_period: usize,
    pub average_multiplier: f64,
    /// Stop distance beyond the anchor level, in ticks.
    pub extra_room: u32,
    pub tick_size: f64,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            pivot_period: 10,
            require_confirmation: false,
            height_mode: HeightMode::Auto,
            break_even_rr: 1.0,
            rr_cap: 5.0,
            average_period: 10,
            average_multiplier: 0.8,
            extra_room: 0,
            tick_size: 0.01,
        }
    }
}

impl ZoneConfig {
    /// Checks every value is usable.
    pub fn validate(&self) -> Result<()> {
        if self.pivot_period == 0 {
            return Err(Error::InvalidPeriod(self.pivot_period));
        }
        if !(self.average_multiplier.is_finite() && self.average_multiplier > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "average multiplier must be positive (got: {})",
                self.average_multiplier
            )));
        }
        if !(self.tick_size.is_finite() && self.tick_size > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "tick size must be positive (got: {})",
                self.tick_size
            )));
        }
        if !(self.rr_cap.is_finite() && self.rr_cap >= 1.0) {
            return Err(Error::InvalidConfig(format!("RR cap must be at least 1 (got: {})", self.rr_cap)));
        }
        if !(self.break_even_rr.is_finite() && self.break_even_rr >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "break-even RR cannot be negative (got: {})",
                self.break_even_rr
            )));
        }
        Ok(())
    }

    /// Detector options derived from the pivot settings.
    pub fn fractal_options(&self) -> Result<FractalOptions> {
        FractalOptions::new(self.pivot_period, self.require_confirmation)
    }

    /// Bars needed before prices are scanned for breaks.
    pub fn warm_up(&self) -> usize {
        self.pivot_period * 2 + 1
    }

    /// Reads a configuration from JSON; missing keys take their default.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
#[test]
fn default_config_is_valid() {
    let config = ZoneConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.warm_up(), 21);
    assert_eq!(config.fractal_options().unwrap().half_period(), 5);
}

#[cfg(test)]
#[test]
fn invalid_values_are_rejected() {
    let config = ZoneConfig {
        pivot_period: 0,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(Error::InvalidPeriod(0))));

    let config = ZoneConfig {
        tick_size: 0.0,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

    let config = ZoneConfig {
        rr_cap: 0.5,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

    let config = ZoneConfig {
        average_multiplier: f64::NAN,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

    let config = ZoneConfig {
        break_even_rr: -1.0,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
}

#[cfg(all(test, feature = "serde"))]
#[test]
fn from_json_fills_defaults() {
    let config = ZoneConfig::from_json(r#"{ "pivot_period": 6, "height_mode": "AverageOnly" }"#).unwrap();
    assert_eq!(config.pivot_period, 6);
    assert_eq!(config.height_mode, HeightMode::AverageOnly);
    assert_eq!(config.rr_cap, 5.0);

    assert!(ZoneConfig::from_json(r#"{ "tick_size": -1.0 }"#).is_err());
}
