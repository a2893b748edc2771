//! # Historical Replay
//!
//! Replays generated bars through a `ZoneManager` with simulated orders, prints every
//! break of structure and finishes with the closed-zone report.
//!
//! Set `RUST_LOG=bos_rs=debug` to watch rejected anchors and zone updates.

mod utils;

use bos_rs::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let bars = utils::example_bars();
    let config = ZoneConfig {
        pivot_period: 8,
        average_period: 14,
        ..Default::default()
    };
    let mut manager = ZoneManager::new(config, SimulatedOrderFactory::from(&config))?;

    for bar in bars {
        manager.replay_bar(bar)?;

        for event in manager.take_events() {
            match event {
                Event::StructureBreak(bos) => println!(
                    "{} BOS {:?} of {:.2} ({:?})",
                    bos.time(),
                    bos.direction(),
                    bos.fractal().value(),
                    bos.fractal().side()
                ),
                Event::ZoneClosed(id) => {
                    if let Some(zone) = manager.zone(id) {
                        println!("zone #{} closed at {:+.2} RR", id.get(), zone.order().realized_rr());
                    }
                }
                _ => {}
            }
        }
    }

    println!("\nopen zones: {}", manager.open_zones().len());

    #[cfg(feature = "metrics")]
    {
        let metrics = Metrics::from(&manager);
        utils::print_metrics(&metrics);
    }

    #[cfg(not(feature = "metrics"))]
    println!("{:?}", manager.statistics());

    Ok(())
}
