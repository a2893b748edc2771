//! Zone parameter optimization.
//!
//! This module replays the same historical bars under many zone configurations.
//! The `Optimizer` struct runs one simulated `ZoneManager` per combination, while the
//! `ParameterCombination` trait defines how to generate parameter sets.

use std::marker::PhantomData;

use rayon::prelude::*;
use tracing::debug;

use crate::{
    engine::{Bar, OrderFactory, RrStatistics, SimulatedOrderFactory, ZoneConfig, ZoneManager},
    errors::Result,
};

/// Trait defining how to generate parameter combinations for optimization.
///
/// Implement this trait for your parameter types to define how combinations should be generated.
/// The associated type `Output` represents a single parameter combination (e.g., a tuple of values).
pub trait ParameterCombination: Sync {
    /// Type representing a single parameter combination (e.g., `(usize, f64)`).
    type Output: Clone + Send + Sync;

    /// Generates all possible parameter combinations to test.
    ///
    /// ### Returns
    /// A vector containing all parameter combinations.
    fn generate() -> Vec<Self::Output>;
}

/// Replays bars under every parameter combination and collects the zone statistics.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Optimizer<PC: ParameterCombination> {
    bars: Vec<Bar>,
    config: ZoneConfig,
    _marker: PhantomData<PC>,
}

impl<PC: ParameterCombination, F: OrderFactory> From<&ZoneManager<F>> for Optimizer<PC> {
    fn from(manager: &ZoneManager<F>) -> Self {
        Self::new(manager.bars().to_vec(), *manager.config())
    }
}

impl<PC: ParameterCombination> Optimizer<PC> {
    /// Creates a new `Optimizer`.
    ///
    /// ### Arguments
    /// * `bars` - Historical bars, sorted by open time.
    /// * `config` - Base configuration the combinations are applied to.
    pub fn new(bars: Vec<Bar>, config: ZoneConfig) -> Self {
        Self {
            bars,
            config,
            _marker: PhantomData,
        }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn config(&self) -> &ZoneConfig {
        &self.config
    }

    /// Replays the bars once per parameter combination.
    ///
    /// ### Arguments
    /// * `combinator` - Turns a parameter combination and the base configuration into the
    ///   configuration to replay with.
    ///
    /// ### Returns
    /// Each parameter combination with the statistics of its replay, in generation order.
    ///
    /// ### Errors
    /// Returns an error if a configuration is invalid or a replay fails.
    pub fn with<C>(&self, combinator: C) -> Result<Vec<(PC::Output, RrStatistics)>>
    where
        C: Fn(&PC::Output, &ZoneConfig) -> Result<ZoneConfig> + Sync,
    {
        let num_cpus = num_cpus::get();
        let combinations = PC::generate();
        let chunk_size = combinations.len().div_ceil(num_cpus).max(1);

        combinations
            .par_chunks(chunk_size)
            .map::<_, Result<_>>(|par_combinations| {
                let mut local_results = Vec::with_capacity(par_combinations.len());

                for param_set in par_combinations {
                    let config = combinator(param_set, &self.config)?;
                    let mut manager = ZoneManager::new(config, SimulatedOrderFactory::from(&config))?;
                    manager.replay(self.bars.iter().copied())?;
                    local_results.push((param_set.clone(), *manager.statistics()));
                }

                debug!("Optimizer chunk of {} combinations done", par_combinations.len());
                Ok(local_results)
            })
            .collect::<Result<Vec<_>>>()
            .map(|chunks| chunks.into_iter().flatten().collect())
    }
}

#[cfg(test)]
#[derive(Clone)]
struct Parameters;

#[cfg(test)]
impl ParameterCombination for Parameters {
    type Output = (usize, f64);

    fn generate() -> Vec<Self::Output> {
        (2..=6)
            .flat_map(|period| [2.0, 3.0, 5.0].into_iter().map(move |cap| (period, cap)))
            .collect()
    }
}

#[cfg(test)]
fn get_data() -> Vec<Bar> {
    use crate::engine::BarBuilder;
    use chrono::{DateTime, Duration};

    (0..300)
        .map(|i| {
            let t = i as f64;
            let mid = 100.0 + 8.0 * (t * 0.21).sin() + 3.0 * (t * 0.57).cos() + 0.02 * t;
            let open = mid + 0.6 * (t * 1.3).sin();
            let close = mid - 0.6 * (t * 1.3).sin();
            BarBuilder::builder()
                .open(open)
                .high(open.max(close) + 0.5 + 0.3 * (t * 0.7).cos().abs())
                .low(open.min(close) - 0.5 - 0.3 * (t * 0.9).sin().abs())
                .close(close)
                .volume(1.0)
                .open_time(DateTime::default() + Duration::minutes(i))
                .build()
                .unwrap()
        })
        .collect()
}

#[cfg(test)]
#[test]
fn optimizer_sweeps_pivot_and_cap() {
    let opt = Optimizer::<Parameters>::new(get_data(), ZoneConfig::default());

    let result = opt
        .with(|&(pivot_period, rr_cap), base| {
            Ok(ZoneConfig {
                pivot_period,
                rr_cap,
                ..*base
            })
        })
        .unwrap();

    assert_eq!(result.len(), Parameters::generate().len());
    assert_eq!(result[0].0, (2, 2.0));

    // the cap only changes the current-cap sum, never the replay itself
    for chunk in result.chunks(3) {
        let stats = chunk.iter().map(|(_, stats)| stats).collect::<Vec<_>>();
        assert!(stats.iter().all(|s| s.closed() == stats[0].closed()));
        assert!(stats.iter().all(|s| s.best_cap() == stats[0].best_cap()));
    }
}

#[cfg(test)]
#[test]
fn optimizer_reports_invalid_config() {
    let opt = Optimizer::<Parameters>::new(get_data(), ZoneConfig::default());
    let result = opt.with(|_, base| {
        Ok(ZoneConfig {
            tick_size: 0.0,
            ..*base
        })
    });
    assert!(result.is_err());
}
