//! # Zone Parameter Optimization
//!
//! Sweeps the pivot period and the average-range multiplier over the same bars and ranks
//! the combinations by the capped RR sum at their best cap.
mod utils;

use bos_rs::prelude::*;

const PERIODS: std::ops::RangeInclusive<usize> = 4..=16;
const MULTIPLIERS: [f64; 4] = [0.5, 0.8, 1.0, 1.5];

#[derive(Clone)]
struct Parameters;

impl ParameterCombination for Parameters {
    type Output = (usize, f64);

    fn generate() -> Vec<Self::Output> {
        PERIODS
            .flat_map(|period| MULTIPLIERS.into_iter().map(move |multiplier| (period, multiplier)))
            .collect()
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let bars = utils::example_bars();
    let opt = Optimizer::<Parameters>::new(bars, ZoneConfig::default());

    let mut result = opt.with(|&(pivot_period, average_multiplier), base| {
        let config = ZoneConfig {
            pivot_period,
            average_multiplier,
            ..*base
        };
        config.validate()?;
        Ok(config)
    })?;

    result.sort_by(|(_, a), (_, b)| b.best_sum().cmp(&a.best_sum()).then(b.closed().cmp(&a.closed())));

    println!("\n=== TOP 5 ZONE PARAMETERS ===");
    for ((period, multiplier), stats) in result.iter().take(5) {
        println!(
            "pivot {period:>2} x{multiplier:.1} | {} zones, {} positive | best cap {} RR sum {} | cap {} sum {}",
            stats.closed(),
            stats.positive(),
            stats.best_cap(),
            stats.best_sum(),
            opt.config().rr_cap,
            stats.current_sum()
        );
    }

    Ok(())
}
