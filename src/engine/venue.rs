use std::{cell::RefCell, fmt, rc::Rc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{
    engine::{
        Fractal, OrderFactory, OrderSide, ZoneConfig, ZoneOrder,
        order::{Excursion, zone_entry_and_stop},
    },
    errors::Result,
};

/// Instrument, account and size the venue orders are placed with.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Market {
    pub instrument: String,
    pub account: String,
    pub quantity: f64,
}

impl From<(&str, &str, f64)> for Market {
    fn from((instrument, account, quantity): (&str, &str, f64)) -> Self {
        Self {
            instrument: instrument.to_owned(),
            account: account.to_owned(),
            quantity,
        }
    }
}

/// A resting limit order sent to the venue.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct LimitRequest {
    pub instrument: String,
    pub account: String,
    pub side: OrderSide,
    pub price: f64,
    pub quantity: f64,
}

/// A position as reported by the venue.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct VenuePosition {
    pub id: String,
    pub instrument: String,
    pub account: String,
    pub side: OrderSide,
    pub open_price: f64,
    pub quantity: f64,
    pub closed: bool,
}

/// What a trading venue must offer to back zone orders.
pub trait Venue {
    /// Places a limit order; the fill shows up later in [`Venue::positions`].
    fn place_limit(&mut self, request: &LimitRequest) -> Result<()>;

    /// Current positions on the venue.
    fn positions(&self) -> Vec<VenuePosition>;

    /// Moves the protective stop of a position.
    fn set_stop(&mut self, position_id: &str, price: f64) -> Result<()>;
}

/// A zone order backed by a real limit order on a [`Venue`].
///
/// The order opens when a matching position appears on the venue. RR is
/// measured against the initial stop distance, and the stop moves to the
/// entry once the excursion reaches the break-even threshold.
pub struct VenueOrder<V> {
    venue: Rc<RefCell<V>>,
    market: Market,
    tick_size: f64,
    excursion: Excursion,
    stop: f64,
    position_id: Option<String>,
    open: bool,
    closed: bool,
    stop_at_break_even: bool,
    realized_rr: f64,
    realized_rr_int: i64,
    break_even_rr: f64,
    rr_cap: f64,
}

impl<V> fmt::Debug for VenueOrder<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VenueOrder")
            .field("market", &self.market)
            .field("excursion", &self.excursion)
            .field("stop", &self.stop)
            .field("position_id", &self.position_id)
            .field("open", &self.open)
            .field("closed", &self.closed)
            .field("realized_rr", &self.realized_rr)
            .finish_non_exhaustive()
    }
}

impl<V: Venue> VenueOrder<V> {
    /// Creates the order and places its limit on the venue.
    ///
    /// ### Arguments
    /// * `venue` - The shared venue.
    /// * `market` - Instrument, account and quantity.
    /// * `side`, `entry`, `stop` - The order levels.
    /// * `tick_size` - Tolerance used to match the filled position.
    /// * `thresholds` - Break-even RR and RR cap.
    ///
    /// ### Returns
    /// An error when the levels are invalid. A rejected placement is not an
    /// error: the order is logged and closed with zero RR.
    pub fn new(
        venue: Rc<RefCell<V>>,
        market: Market,
        (side, entry, stop): (OrderSide, f64, f64),
        tick_size: f64,
        (break_even_rr, rr_cap): (f64, f64),
    ) -> Result<Self> {
        let mut order = Self {
            excursion: Excursion::new(side, entry, stop)?,
            venue,
            market,
            tick_size,
            stop,
            position_id: None,
            open: false,
            closed: false,
            stop_at_break_even: false,
            realized_rr: 0.0,
            realized_rr_int: 0,
            break_even_rr,
            rr_cap,
        };
        order.place();
        Ok(order)
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    /// Id of the venue position once the limit filled.
    pub fn position_id(&self) -> Option<&str> {
        self.position_id.as_deref()
    }

    fn place(&mut self) {
        let side = self.side();
        let request = LimitRequest {
            instrument: self.market.instrument.clone(),
            account: self.market.account.clone(),
            side,
            price: self.entry_price(),
            quantity: self.market.quantity,
        };
        match self.venue.borrow_mut().place_limit(&request) {
            Ok(()) => info!("Limit order placed: {:?} {} @ {}", side, request.instrument, request.price),
            Err(e) => {
                error!("Failed to place limit order @ {}: {}", request.price, e);
                self.closed = true;
            }
        }
    }

    /// Looks for the position the limit filled into.
    fn reconcile(&mut self) {
        let side = self.side();
        let entry = self.entry_price();
        let position = self.venue.borrow().positions().into_iter().find(|p| {
            !p.closed
                && p.instrument == self.market.instrument
                && p.account == self.market.account
                && p.side == side
                && (p.open_price - entry).abs() < self.tick_size
        });
        if let Some(position) = position {
            info!("Position opened: {}, setting stop to {}", position.id, self.stop);
            self.position_id = Some(position.id);
            self.open = true;
            self.push_stop(self.stop);
        }
    }

    fn position_alive(&self) -> bool {
        let Some(id) = self.position_id.as_deref() else {
            return false;
        };
        self.venue.borrow().positions().iter().any(|p| p.id == id && !p.closed)
    }

    fn push_stop(&mut self, price: f64) -> bool {
        let Some(id) = self.position_id.as_deref() else {
            return false;
        };
        let result = self.venue.borrow_mut().set_stop(id, price);
        match result {
            Ok(()) => {
                self.stop = price;
                true
            }
            Err(e) => {
                warn!("Failed to set stop of position {} to {}: {}", id, price, e);
                false
            }
        }
    }

    fn close(&mut self) {
        (self.realized_rr, self.realized_rr_int) = self.excursion.settle(self.break_even_rr);
        self.closed = true;
        self.open = false;
        info!(
            "Position {} closed with RR {:.2}",
            self.position_id.as_deref().unwrap_or("-"),
            self.realized_rr
        );
    }
}

impl<V: Venue> ZoneOrder for VenueOrder<V> {
    fn side(&self) -> OrderSide {
        self.excursion.side
    }

    fn entry_price(&self) -> f64 {
        self.excursion.entry
    }

    fn stop_price(&self) -> f64 {
        self.stop
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

        if !self.open {
            self.reconcile();
            if !self.open {
                return;
            }
        } else if !self.position_alive() {
            self.close();
            return;
        }

        self.excursion.update(price, index);

        if !self.stop_at_break_even && self.excursion.max() >= self.break_even_rr {
            self.stop_at_break_even = true;
            if self.push_stop(self.entry_price()) {
                info!("Stop moved to break even (RR: {:.2})", self.excursion.max());
            }
        }

        if self.side().stops(price, self.stop) {
            self.close();
        }
    }
}

/// Creates a [`VenueOrder`] per zone on a shared venue.
pub struct VenueOrderFactory<V> {
    venue: Rc<RefCell<V>>,
    market: Market,
    break_even_rr: f64,
    rr_cap: f64,
    extra_room: f64,
}

impl<V: Venue> VenueOrderFactory<V> {
    pub fn new(venue: Rc<RefCell<V>>, market: Market, config: &ZoneConfig) -> Self {
        Self {
            venue,
            market,
            break_even_rr: config.break_even_rr,
            rr_cap: config.rr_cap,
            extra_room: config.extra_room as f64,
        }
    }

    pub fn venue(&self) -> &Rc<RefCell<V>> {
        &self.venue
    }
}

impl<V: Venue + 'static> OrderFactory for VenueOrderFactory<V> {
    fn create_order(&mut self, anchor: &Fractal, tick_size: f64, height: f64) -> Result<Box<dyn ZoneOrder>> {
        let levels = zone_entry_and_stop(anchor, tick_size, height, self.extra_room);
        let order = VenueOrder::new(
            Rc::clone(&self.venue),
            self.market.clone(),
            levels,
            tick_size,
            (self.break_even_rr, self.rr_cap),
        )?;
        Ok(Box::new(order))
    }
}
