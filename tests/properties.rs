//! Property tests for detector, chain, order and manager invariants.
//!
//! Uses proptest to verify:
//! 1. Fractal detection matches a brute-force window max/min
//! 2. Chain links are symmetric and same-side neighbours only ever get more extreme
//! 3. Orders realize either -1 or their peak RR
//! 4. A fractal is broken at most once

use bos_rs::prelude::*;
use chrono::{DateTime, Duration};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_bars() -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec((-2.0..2.0_f64, 0.2..1.5_f64, 0.2..1.5_f64), 5..120).prop_map(|steps| {
        let mut price: f64 = 100.0;
        steps
            .into_iter()
            .enumerate()
            .map(|(i, (step, up, down))| {
                // quarter ticks keep equal highs/lows likely
                let open = price;
                let close = ((price + step) * 4.0).round() / 4.0;
                price = close;
                BarBuilder::builder()
                    .open(open)
                    .high(((open.max(close) + up) * 4.0).round() / 4.0)
                    .low(((open.min(close) - down) * 4.0).round() / 4.0)
                    .close(close)
                    .open_time(DateTime::default() + Duration::minutes(i as i64))
                    .build()
                    .unwrap()
            })
            .collect()
    })
}

fn arb_prices() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(80.0..120.0_f64, 1..60)
}

// ── 1. Brute-force fractals ──────────────────────────────────────────

proptest! {
    /// Every chained fractal is a window extreme, and every window extreme
    /// that was not chained lost to an at-least-as-extreme tail on its side.
    #[test]
    fn fractals_match_brute_force(bars in arb_bars(), period in 1usize..8) {
        let mut detector = FractalDetector::new(FractalOptions::new(period, false).unwrap());
        let half = period / 2;

        for i in 0..bars.len() {
            let before = detector.chain().len();
            let tail = detector.chain().last(false).map(|id| detector.chain()[id]);
            let events = detector.process_index(&bars, i).unwrap();
            if i < period {
                prop_assert!(events.is_empty());
                continue;
            }

            let m = i - half;
            let window = &bars[m - half..=m + half];
            let is_low = window.iter().all(|b| b.low() >= bars[m].low());
            let is_high = window.iter().all(|b| b.high() <= bars[m].high());

            let added = detector.chain().iter().skip(before).map(|(_, f)| *f).collect::<Vec<_>>();
            for fractal in &added {
                prop_assert_eq!(fractal.index(), m);
                match fractal.side() {
                    FractalSide::Low => prop_assert!(is_low && fractal.value() == bars[m].low()),
                    FractalSide::High => prop_assert!(is_high && fractal.value() == bars[m].high()),
                }
            }

            let low = added.iter().find(|f| f.is_low()).copied();
            let high = added.iter().find(|f| f.is_high()).copied();

            if is_low && low.is_none() {
                let tail = tail.unwrap();
                prop_assert!(tail.is_low() && tail.value() <= bars[m].low());
            }
            if is_high && high.is_none() {
                let tail = low.or(tail).unwrap();
                prop_assert!(tail.is_high() && tail.value() >= bars[m].high());
            }
        }
    }
}

// ── 2. Chain links ───────────────────────────────────────────────────

proptest! {
    /// Following `next` then `previous` comes back, and a same-side successor
    /// is strictly more extreme.
    #[test]
    fn chain_links_are_symmetric(bars in arb_bars(), period in 1usize..6, confirm in any::<bool>()) {
        let mut detector = FractalDetector::new(FractalOptions::new(period, confirm).unwrap());
        for i in 0..bars.len() {
            detector.process_index(&bars, i).unwrap();
        }

        let chain = detector.chain();
        for (id, fractal) in chain.iter() {
            if let Some(next) = chain.next(id, false) {
                prop_assert_eq!(chain.previous(next, false), Some(id));
                if chain[next].side() == fractal.side() {
                    prop_assert!(chain[next].is_more_extreme_than(fractal));
                }
            }
            let best = chain.best(id);
            prop_assert!(!chain[id].is_more_extreme_than(&chain[best]));
        }
    }
}

// ── 3. Order outcomes ────────────────────────────────────────────────

proptest! {
    /// A closed order realizes -1 or its peak RR, never anything else.
    #[test]
    fn order_realizes_peak_or_full_loss(
        risk in 0.5..10.0_f64,
        break_even in 0.0..3.0_f64,
        prices in arb_prices(),
    ) {
        let mut order = SimulatedOrder::new(OrderSide::Buy, 100.0, 100.0 - risk, break_even, 5.0).unwrap();
        for (i, price) in prices.iter().enumerate() {
            order.process_price(*price, i);
        }

        prop_assert!(order.max_rr() >= 0.0);
        if order.is_closed() {
            if order.max_rr() > break_even {
                prop_assert_eq!(order.realized_rr(), order.max_rr());
                prop_assert_eq!(order.realized_rr_int(), order.max_rr().floor() as i64);
            } else {
                prop_assert_eq!(order.realized_rr(), -1.0);
                prop_assert_eq!(order.realized_rr_int(), -1);
            }
        } else {
            prop_assert_eq!(order.realized_rr(), 0.0);
        }
    }
}

// ── 4. Breaks ────────────────────────────────────────────────────────

proptest! {
    /// No fractal produces two breaks, and a broken one never returns to the unbroken set.
    #[test]
    fn fractals_break_once(bars in arb_bars(), period in 2usize..6) {
        let config = ZoneConfig { pivot_period: period, ..Default::default() };
        let mut manager = ZoneManager::new(config, SimulatedOrderFactory::from(&config)).unwrap();
        manager.replay(bars).unwrap();

        let mut broken = manager.bos_events().iter().map(|b| b.fractal_id()).collect::<Vec<_>>();
        let count = broken.len();
        broken.sort();
        broken.dedup();
        prop_assert_eq!(broken.len(), count);

        for id in manager.unbroken() {
            prop_assert!(!broken.contains(&id));
        }
        prop_assert_eq!(manager.open_zones().len() + manager.closed_zones().len(), count);
    }
}
