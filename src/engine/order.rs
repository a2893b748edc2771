use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    RiskReward,
    engine::{Fractal, ZoneConfig},
    errors::{Error, Result},
};

/// Represents the side of an order (buy or sell).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn is_buy(&self) -> bool {
        matches!(self, Self::Buy)
    }

    /// Resting-limit fill test: a buy fills at or below entry, a sell at or above.
    pub fn fills(&self, price: f64, entry: f64) -> bool {
        match self {
            Self::Buy => price <= entry,
            Self::Sell => price >= entry,
        }
    }

    /// Stop test: a buy stops out at or below the stop, a sell at or above.
    pub fn stops(&self, price: f64, stop: f64) -> bool {
        match self {
            Self::Buy => price <= stop,
            Self::Sell => price >= stop,
        }
    }

    /// Whether `price` is on the losing side of `entry`.
    pub fn is_losing(&self, price: f64, entry: f64) -> bool {
        match self {
            Self::Buy => price < entry,
            Self::Sell => price > entry,
        }
    }
}

/// The order attached to a zone, synthetic or backed by a venue.
pub trait ZoneOrder: fmt::Debug {
    fn side(&self) -> OrderSide;

    fn entry_price(&self) -> f64;

    /// Current protective stop.
    fn stop_price(&self) -> f64;

    fn is_open(&self) -> bool;

    fn is_closed(&self) -> bool;

    /// Running maximum favorable excursion, in RR units.
    fn max_rr(&self) -> f64;

    /// Bar index where [`ZoneOrder::max_rr`] was reached.
    fn max_rr_index(&self) -> Option<usize>;

    /// Realized RR once closed, zero before.
    fn realized_rr(&self) -> f64;

    /// [`ZoneOrder::realized_rr`] floored to an integer.
    fn realized_rr_int(&self) -> i64;

    /// RR the excursion must exceed for a stopped order to keep its peak.
    fn break_even_rr(&self) -> f64;

    fn rr_cap(&self) -> f64;

    /// Advances the order with a price observed on bar `index`.
    fn process_price(&mut self, price: f64, index: usize);

    /// Opened or closed: price reached the zone.
    fn is_mitigated(&self) -> bool {
        self.is_open() || self.is_closed()
    }
}

/// Builds the order of a freshly created zone.
pub trait OrderFactory {
    /// ### Arguments
    /// * `anchor` - The swing point the zone is anchored at.
    /// * `tick_size` - Instrument tick size.
    /// * `height` - Zone height in price units.
    fn create_order(&mut self, anchor: &Fractal, tick_size: f64, height: f64) -> Result<Box<dyn ZoneOrder>>;
}

impl<F> OrderFactory for F
where
    F: FnMut(&Fractal, f64, f64) -> Result<Box<dyn ZoneOrder>>,
{
    fn create_order(&mut self, anchor: &Fractal, tick_size: f64, height: f64) -> Result<Box<dyn ZoneOrder>> {
        self(anchor, tick_size, height)
    }
}

/// Side, entry and stop of the order trading back into a zone.
///
/// A high anchor sells at `value - height` with the stop above the level,
/// a low anchor buys at `value + height` with the stop below it.
pub fn zone_entry_and_stop(anchor: &Fractal, tick_size: f64, height: f64, extra_room: f64) -> (OrderSide, f64, f64) {
    let room = extra_room.ticks(tick_size);
    if anchor.is_high() {
        (OrderSide::Sell, anchor.value() - height, anchor.value() + room)
    } else {
        (OrderSide::Buy, anchor.value() + height, anchor.value() - room)
    }
}

/// RR bookkeeping shared by every order variant.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Excursion {
    pub(crate) side: OrderSide,
    pub(crate) entry: f64,
    pub(crate) stop: f64,
    max: f64,
    max_index: Option<usize>,
}

impl Excursion {
    pub(crate) fn new(side: OrderSide, entry: f64, stop: f64) -> Result<Self> {
        for price in [entry, stop] {
            if !price.is_finite() {
                return Err(Error::InvalidPrice(price));
            }
        }
        if entry.risk(stop) == 0.0 {
            return Err(Error::ZeroRisk(entry));
        }
        Ok(Self {
            side,
            entry,
            stop,
            max: 0.0,
            max_index: None,
        })
    }

    /// Signed RR of `price`, tracking the running maximum.
    pub(crate) fn update(&mut self, price: f64, index: usize) -> f64 {
        let mut rr = price.rr(self.entry, self.stop);
        if self.side.is_losing(price, self.entry) {
            rr = -rr;
        }
        if rr > self.max {
            self.max = rr;
            self.max_index = Some(index);
        }
        rr
    }

    /// Realized RR, continuous and floored, of an order stopped now.
    pub(crate) fn settle(&self, break_even_rr: f64) -> (f64, i64) {
        if self.max > break_even_rr {
            let realized = self.max.max(0.0);
            (realized, realized.floor() as i64)
        } else {
            (-1.0, -1)
        }
    }

    pub(crate) fn max(&self) -> f64 {
        self.max
    }

    pub(crate) fn max_index(&self) -> Option<usize> {
        self.max_index
    }
}

/// A synthetic resting limit order: pending, then open, then closed.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedOrder {
    excursion: Excursion,
    open: bool,
    closed: bool,
    realized_rr: f64,
    realized_rr_int: i64,
    break_even_rr: f64,
    rr_cap: f64,
}

impl SimulatedOrder {
    /// Creates a pending order.
    ///
    /// ### Returns
    /// An error when a price is not finite or `entry == stop`.
    pub fn new(side: OrderSide, entry: f64, stop: f64, break_even_rr: f64, rr_cap: f64) -> Result<Self> {
        Ok(Self {
            excursion: Excursion::new(side, entry, stop)?,
            open: false,
            closed: false,
            realized_rr: 0.0,
            realized_rr_int: 0,
            break_even_rr,
            rr_cap,
        })
    }
}

impl ZoneOrder for SimulatedOrder {
    fn side(&self) -> OrderSide {
        self.excursion.side
    }

    fn entry_price(&self) -> f64 {
        self.excursion.entry
    }

    fn stop_price(&self) -> f64 {
        self.excursion.stop
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn max_rr(&self) -> f64 {
        self.excursion.max()
    }

    fn max_rr_index(&self) -> Option<usize> {
        self.excursion.max_index()
    }

    fn realized_rr(&self) -> f64 {
        self.realized_rr
    }

    fn realized_rr_int(&self) -> i64 {
        self.realized_rr_int
    }

    fn break_even_rr(&self) -> f64 {
        self.break_even_rr
    }

    fn rr_cap(&self) -> f64 {
        self.rr_cap
    }

    fn process_price(&mut self, price: f64, index: usize) {
        if self.closed {
            return;
        }

        let side = self.excursion.side;
        self.open = self.open || side.fills(price, self.excursion.entry);
        if !self.open {
            return;
        }

        self.excursion.update(price, index);

        if side.stops(price, self.excursion.stop) {
            (self.realized_rr, self.realized_rr_int) = self.excursion.settle(self.break_even_rr);
            self.closed = true;
            self.open = false;
        }
    }
}

/// Creates a [`SimulatedOrder`] per zone.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedOrderFactory {
    break_even_rr: f64,
    rr_cap: f64,
    extra_room: f64,
}

impl From<&ZoneConfig> for SimulatedOrderFactory {
    fn from(config: &ZoneConfig) -> Self {
        Self::new(config.break_even_rr, config.rr_cap, config.extra_room as f64)
    }
}

impl SimulatedOrderFactory {
    /// ### Arguments
    /// * `break_even_rr` - Break-even threshold handed to every order.
    /// * `rr_cap` - RR cap handed to every order.
    /// * `extra_room` - Stop distance beyond the anchor level, in ticks.
    pub fn new(break_even_rr: f64, rr_cap: f64, extra_room: f64) -> Self {
        Self {
            break_even_rr,
            rr_cap,
            extra_room,
        }
    }
}

impl OrderFactory for SimulatedOrderFactory {
    fn create_order(&mut self, anchor: &Fractal, tick_size: f64, height: f64) -> Result<Box<dyn ZoneOrder>> {
        let (side, entry, stop) = zone_entry_and_stop(anchor, tick_size, height, self.extra_room);
        let order = SimulatedOrder::new(side, entry, stop, self.break_even_rr, self.rr_cap)?;
        Ok(Box::new(order))
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;
    use crate::engine::FractalSide;

    fn feed(order: &mut impl ZoneOrder, prices: &[f64]) {
        for (i, price) in prices.iter().enumerate() {
            order.process_price(*price, i);
        }
    }

    #[test]
    fn buy_keeps_peak_above_break_even() {
        let mut order = SimulatedOrder::new(OrderSide::Buy, 100.0, 95.0, 1.0, 5.0).unwrap();

        order.process_price(100.0, 0);
        assert!(order.is_open());
        assert_eq!(order.max_rr(), 0.0);

        order.process_price(110.0, 1);
        assert_eq!(order.max_rr(), 2.0);
        assert_eq!(order.max_rr_index(), Some(1));

        order.process_price(94.0, 2);
        assert!(order.is_closed());
        assert!(!order.is_open());
        assert_eq!(order.realized_rr(), 2.0);
        assert_eq!(order.realized_rr_int(), 2);
    }

    #[test]
    fn buy_below_break_even_is_full_loss() {
        let mut order = SimulatedOrder::new(OrderSide::Buy, 100.0, 95.0, 1.0, 5.0).unwrap();
        feed(&mut order, &[100.0, 100.5, 94.0]);

        assert!((order.max_rr() - 0.1).abs() < 1e-9);
        assert!(order.is_closed());
        assert_eq!(order.realized_rr(), -1.0);
        assert_eq!(order.realized_rr_int(), -1);
    }

    #[test]
    fn fractional_peak_is_floored() {
        let mut order = SimulatedOrder::new(OrderSide::Buy, 100.0, 95.0, 1.0, 5.0).unwrap();
        feed(&mut order, &[99.0, 114.0, 95.0]);

        assert!((order.realized_rr() - 2.8).abs() < 1e-9);
        assert_eq!(order.realized_rr_int(), 2);
    }

    #[test]
    fn sell_opens_at_or_above_entry() {
        let mut order = SimulatedOrder::new(OrderSide::Sell, 100.0, 104.0, 1.0, 5.0).unwrap();

        order.process_price(99.0, 0);
        assert!(!order.is_mitigated());

        order.process_price(100.0, 1);
        assert!(order.is_open());

        order.process_price(90.0, 2);
        assert_eq!(order.max_rr(), 2.5);

        order.process_price(104.0, 3);
        assert!(order.is_closed());
        assert_eq!(order.realized_rr(), 2.5);
        assert_eq!(order.realized_rr_int(), 2);
    }

    #[test]
    fn losing_side_is_negative() {
        let mut excursion = Excursion::new(OrderSide::Sell, 100.0, 104.0).unwrap();
        assert_eq!(excursion.update(102.0, 0), -0.5);
        assert_eq!(excursion.update(96.0, 1), 1.0);
        assert_eq!(excursion.max(), 1.0);
    }

    #[test]
    fn pending_order_ignores_stop() {
        let mut order = SimulatedOrder::new(OrderSide::Buy, 100.0, 95.0, 1.0, 5.0).unwrap();
        order.process_price(101.0, 0);
        assert!(!order.is_mitigated());
        assert_eq!(order.realized_rr(), 0.0);
    }

    #[test]
    fn gap_through_stop_closes_on_the_fill() {
        let mut order = SimulatedOrder::new(OrderSide::Buy, 100.0, 95.0, 1.0, 5.0).unwrap();
        order.process_price(90.0, 0);
        assert!(order.is_closed());
        assert_eq!(order.realized_rr_int(), -1);
    }

    #[test]
    fn closed_order_is_frozen() {
        let mut order = SimulatedOrder::new(OrderSide::Buy, 100.0, 95.0, 1.0, 5.0).unwrap();
        feed(&mut order, &[100.0, 110.0, 94.0]);
        let closed = order;

        order.process_price(100.0, 3);
        order.process_price(200.0, 4);

        assert_eq!(order, closed);
    }

    #[test]
    fn zero_risk_is_rejected() {
        let result = SimulatedOrder::new(OrderSide::Buy, 100.0, 100.0, 1.0, 5.0);
        assert!(matches!(result, Err(Error::ZeroRisk(100.0))));
        let result = SimulatedOrder::new(OrderSide::Buy, f64::NAN, 100.0, 1.0, 5.0);
        assert!(matches!(result, Err(Error::InvalidPrice(_))));
    }

    #[test]
    fn factory_places_orders_inside_zone() {
        let mut factory = SimulatedOrderFactory::new(1.0, 5.0, 2.0);

        let high = Fractal::from((3, DateTime::default(), 120.0, FractalSide::High));
        let order = factory.create_order(&high, 0.5, 4.0).unwrap();
        assert_eq!(order.side(), OrderSide::Sell);
        assert_eq!(order.entry_price(), 116.0);
        assert_eq!(order.stop_price(), 121.0);

        let low = Fractal::from((5, DateTime::default(), 80.0, FractalSide::Low));
        let order = factory.create_order(&low, 0.5, 4.0).unwrap();
        assert_eq!(order.side(), OrderSide::Buy);
        assert_eq!(order.entry_price(), 84.0);
        assert_eq!(order.stop_price(), 79.0);
        assert_eq!(order.break_even_rr(), 1.0);
        assert_eq!(order.rr_cap(), 5.0);
    }

    #[test]
    fn factory_rejects_flat_zone() {
        let mut factory = SimulatedOrderFactory::new(1.0, 5.0, 0.0);
        let high = Fractal::from((3, DateTime::default(), 120.0, FractalSide::High));
        assert!(matches!(factory.create_order(&high, 0.5, 0.0), Err(Error::ZeroRisk(_))));
    }

    #[test]
    fn closures_are_factories() {
        let mut calls = 0;
        let mut factory = |anchor: &Fractal, _tick: f64, height: f64| -> Result<Box<dyn ZoneOrder>> {
            calls += 1;
            let order = SimulatedOrder::new(OrderSide::Buy, anchor.value() + height, anchor.value(), 0.0, 3.0)?;
            Ok(Box::new(order))
        };
        let low = Fractal::from((5, DateTime::default(), 80.0, FractalSide::Low));
        let order = factory.create_order(&low, 0.5, 4.0).unwrap();
        assert_eq!(order.rr_cap(), 3.0);
        drop(factory);
        assert_eq!(calls, 1);
    }
}
