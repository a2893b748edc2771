use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    RiskReward,
    engine::{Bar, Fractal, FractalId, FractalSide, HeightMode, ZoneConfig, ZoneOrder},
};

/// Identifier of a zone, unique within its manager.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ZoneId(pub(crate) usize);

impl ZoneId {
    pub fn get(&self) -> usize {
        self.0
    }
}

/// Price/time rectangle of a zone.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    top: f64,
    bottom: f64,
    start_time: DateTime<Utc>,
    start_index: usize,
    end_time: DateTime<Utc>,
    end_index: usize,
}

impl Rectangle {
    /// Builds the rectangle of a zone anchored at `anchor`.
    ///
    /// The anchor side gets `room` of extra space beyond the level, the other
    /// side extends `height` into the swing.
    pub fn around(anchor: &Fractal, height: f64, room: f64, end_time: DateTime<Utc>, end_index: usize) -> Self {
        let value = anchor.value();
        let (top, bottom) = match anchor.side() {
            FractalSide::High => (value + room, value - height),
            FractalSide::Low => (value + height, value - room),
        };
        Self {
            top,
            bottom,
            start_time: anchor.time(),
            start_index: anchor.index(),
            end_time,
            end_index,
        }
    }

    pub fn top(&self) -> f64 {
        self.top
    }

    pub fn bottom(&self) -> f64 {
        self.bottom
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn start_index(&self) -> usize {
        self.start_index
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn end_index(&self) -> usize {
        self.end_index
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    pub fn contains(&self, price: f64) -> bool {
        price >= self.bottom && price <= self.top
    }
}

/// A zone anchored at the swing point revealed by a break of structure.
#[derive(Debug)]
pub struct Zone {
    id: ZoneId,
    anchor_id: FractalId,
    anchor: Fractal,
    broken_id: FractalId,
    rectangle: Rectangle,
    structure_broken: bool,
    order: Box<dyn ZoneOrder>,
}

impl Zone {
    pub(crate) fn new(
        id: ZoneId,
        anchor_id: FractalId,
        anchor: Fractal,
        broken_id: FractalId,
        rectangle: Rectangle,
        order: Box<dyn ZoneOrder>,
    ) -> Self {
        Self {
            id,
            anchor_id,
            anchor,
            broken_id,
            rectangle,
            structure_broken: true,
            order,
        }
    }

    pub fn id(&self) -> ZoneId {
        self.id
    }

    /// The swing point the zone is anchored at.
    pub fn anchor(&self) -> &Fractal {
        &self.anchor
    }

    pub fn anchor_id(&self) -> FractalId {
        self.anchor_id
    }

    /// The swing point whose break created the zone.
    pub fn broken_id(&self) -> FractalId {
        self.broken_id
    }

    pub fn rectangle(&self) -> &Rectangle {
        &self.rectangle
    }

    pub fn structure_broken(&self) -> bool {
        self.structure_broken
    }

    pub fn order(&self) -> &dyn ZoneOrder {
        self.order.as_ref()
    }

    pub fn is_mitigated(&self) -> bool {
        self.order.is_mitigated()
    }

    pub fn is_closed(&self) -> bool {
        self.order.is_closed()
    }

    /// Stretches the rectangle to the current bar while price stays away.
    pub(crate) fn extend_to(&mut self, time: DateTime<Utc>, index: usize) {
        if !self.order.is_mitigated() {
            self.rectangle.end_time = time;
            self.rectangle.end_index = index;
        }
    }

    pub(crate) fn process_price(&mut self, price: f64, index: usize) {
        self.order.process_price(price, index);
    }
}

/// Mean bar range over a window of `max(period, 3)` bars centred on `anchor_index`.
///
/// The window is clamped to the bars available, leaving out the last (forming) bar.
pub fn average_range(bars: &[Bar], anchor_index: usize, period: usize) -> f64 {
    let n = period.max(3);
    let half = n / 2;
    let start = (anchor_index + half).saturating_sub(n);
    let end = (start + n).min(bars.len().saturating_sub(1));
    let window = bars.get(start..end).unwrap_or_default();
    if window.is_empty() {
        return 0.0;
    }
    window.iter().map(Bar::range).sum::<f64>() / window.len() as f64
}

/// Height of a zone anchored at `anchor`.
pub fn zone_height(bars: &[Bar], anchor: &Fractal, config: &ZoneConfig) -> f64 {
    let nominal = average_range(bars, anchor.index(), config.average_period) * config.average_multiplier;
    match config.height_mode {
        HeightMode::AverageOnly => nominal,
        HeightMode::Auto => {
            let Some(bar) = bars.get(anchor.index()) else {
                return nominal;
            };
            let wick = match anchor.side() {
                FractalSide::High => bar.upper_wick(),
                FractalSide::Low => bar.lower_wick(),
            };
            let height = wick.min(nominal);
            if height < 0.4 * nominal { nominal } else { height }
        }
    }
}

/// Whether no bar between the anchor and the forming bar traded through the anchor level.
pub fn is_untested(bars: &[Bar], anchor: &Fractal) -> bool {
    let last = bars.len().saturating_sub(1);
    let value = anchor.value();
    bars.get(anchor.index() + 1..last)
        .unwrap_or_default()
        .iter()
        .all(|bar| match anchor.side() {
            FractalSide::High => bar.high() <= value,
            FractalSide::Low => bar.low() >= value,
        })
}

/// Rectangle room beyond the anchor level for `config`.
pub(crate) fn extra_room(config: &ZoneConfig) -> f64 {
    (config.extra_room as f64).ticks(config.tick_size)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::engine::{BarBuilder, OrderSide, SimulatedOrder};

    fn bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
        BarBuilder::builder()
            .open(open)
            .high(high)
            .low(low)
            .close(close)
            .open_time(DateTime::default() + Duration::minutes(i as i64))
            .build()
            .unwrap()
    }

    // ranges: 2, 4, 6, 8, 10, 12
    fn sample_bars() -> Vec<Bar> {
        (0..6)
            .map(|i| {
                let range = 2.0 * (i + 1) as f64;
                bar(i, 100.0, 100.0 + range / 2.0, 100.0 - range / 2.0, 100.0)
            })
            .collect()
    }

    fn low_anchor(index: usize, value: f64) -> Fractal {
        Fractal::from((index, DateTime::default() + Duration::minutes(index as i64), value, FractalSide::Low))
    }

    #[test]
    fn average_range_centred_window() {
        let bars = sample_bars();
        // n = 3, half = 1, window [1, 4)
        assert_eq!(average_range(&bars, 3, 3), 6.0);
        // period below 3 is raised to 3
        assert_eq!(average_range(&bars, 3, 1), 6.0);
    }

    #[test]
    fn average_range_clamps() {
        let bars = sample_bars();
        // n = 4, half = 2, start = 0, end = min(4, 5)
        assert_eq!(average_range(&bars, 0, 4), 5.0);
        // n = 10, window [0, 5): the forming bar is left out
        assert_eq!(average_range(&bars, 3, 10), 6.0);
        assert_eq!(average_range(&[], 0, 3), 0.0);
    }

    #[test]
    fn auto_height_uses_small_wick() {
        let mut bars = sample_bars();
        // range 6, lower wick 3
        bars[3] = bar(3, 100.0, 102.0, 96.0, 99.0);
        let config = ZoneConfig {
            average_period: 3,
            average_multiplier: 1.0,
            ..Default::default()
        };
        // nominal = (4 + 6 + 6) / 3
        let nominal = 16.0 / 3.0;
        assert_eq!(zone_height(&bars, &low_anchor(3, 96.0), &config), 3.0);

        let config = ZoneConfig {
            height_mode: HeightMode::AverageOnly,
            ..config
        };
        assert!((zone_height(&bars, &low_anchor(3, 96.0), &config) - nominal).abs() < 1e-9);
    }

    #[test]
    fn auto_height_falls_back_on_tiny_wick() {
        let mut bars = sample_bars();
        // lower wick 0.5 is below 40% of the nominal height
        bars[3] = bar(3, 100.0, 105.0, 98.5, 99.0);
        let config = ZoneConfig {
            average_period: 3,
            average_multiplier: 0.5,
            ..Default::default()
        };
        let nominal = average_range(&bars, 3, 3) * 0.5;
        assert_eq!(zone_height(&bars, &low_anchor(3, 98.5), &config), nominal);
    }

    #[test]
    fn untested_ignores_forming_bar() {
        let bars = vec![
            bar(0, 100.0, 101.0, 95.0, 100.0),
            bar(1, 100.0, 102.0, 96.0, 101.0),
            bar(2, 101.0, 103.0, 97.0, 102.0),
            bar(3, 102.0, 103.0, 90.0, 95.0),
        ];
        assert!(is_untested(&bars, &low_anchor(0, 95.0)));

        let mut tested = bars.clone();
        tested[2] = bar(2, 101.0, 103.0, 94.0, 102.0);
        assert!(!is_untested(&tested, &low_anchor(0, 95.0)));
    }

    #[test]
    fn rectangle_and_zone_extension() {
        let anchor = low_anchor(2, 90.0);
        let rectangle = Rectangle::around(&anchor, 4.0, 0.5, DateTime::default(), 5);
        assert_eq!(rectangle.top(), 94.0);
        assert_eq!(rectangle.bottom(), 89.5);
        assert_eq!(rectangle.start_index(), 2);
        assert!(rectangle.contains(92.0));
        assert!(!rectangle.contains(95.0));

        let order = SimulatedOrder::new(OrderSide::Buy, 94.0, 89.5, 1.0, 5.0).unwrap();
        let mut zone = Zone::new(ZoneId(0), FractalId(0), anchor, FractalId(1), rectangle, Box::new(order));
        assert!(zone.structure_broken());

        zone.extend_to(DateTime::default() + Duration::minutes(6), 6);
        assert_eq!(zone.rectangle().end_index(), 6);

        zone.process_price(93.0, 6);
        assert!(zone.is_mitigated());
        zone.extend_to(DateTime::default() + Duration::minutes(7), 7);
        assert_eq!(zone.rectangle().end_index(), 6);
    }
}
