use bos_rs::engine::{Bar, BarBuilder};
#[cfg(feature = "metrics")]
use bos_rs::metrics::Metrics;
use chrono::{DateTime, Duration};

/// Generates deterministic bar data with swings wide enough to break structure.
pub fn generate_sample_bars(max: i32, seed: i32, base_price: f64) -> Vec<Bar> {
    let mut open_time = DateTime::default();
    let mut open = base_price;

    (0..=max)
        .map(|i| {
            let t = i as f64;
            // slow drift plus two swing cycles
            let trend = base_price + 0.02 * t;
            let swing = 6.0 * (t * 0.11 + seed as f64).sin() + 2.5 * (t * 0.37 + seed as f64 * 0.5).cos();

            let close = trend + swing;
            let wick = 0.4 + 0.3 * (t * 0.7 + seed as f64).sin().abs();
            let high = open.max(close) + wick;
            let low = open.min(close) - wick;
            let volume = 1000.0 + 500.0 * (t * 0.2).sin().abs();

            let bar = BarBuilder::builder()
                .open(open)
                .high(high)
                .low(low)
                .close(close)
                .volume(volume)
                .open_time(open_time)
                .build()
                .unwrap();

            open_time += Duration::minutes(15);
            open = close;
            bar
        })
        .collect()
}

pub fn example_bars() -> Vec<Bar> {
    generate_sample_bars(3000, 42, 100.0)
}

/// Pretty print Metrics
#[cfg(feature = "metrics")]
#[allow(dead_code)]
pub fn print_metrics(metrics: &Metrics) {
    println!("=== Replay Metrics ===");
    println!("Closed Zones: {}", metrics.statistics().closed());
    println!("Win Rate: {:.2}%", metrics.win_rate());
    println!("Profit Factor: {:.2}", metrics.profit_factor());
    println!("Max Drawdown: {:.2} RR", metrics.max_drawdown());
    println!(
        "Best Cap: {} RR (sum {}) | Current Cap: {} RR (sum {})",
        metrics.statistics().best_cap(),
        metrics.statistics().best_sum(),
        metrics.rr_cap(),
        metrics.statistics().current_sum()
    );
}

#[allow(dead_code)]
fn main() {}
