//! # Live Venue
//!
//! Streams bars and prices into a `ZoneManager` whose orders are resting limits on a
//! paper venue. The venue fills limits when price touches them and closes positions at
//! their stop, so the zones see fills, stop moves and closes the way a broker reports them.

mod utils;

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use bos_rs::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Fills resting limits on touch and stops positions out.
#[derive(Debug, Default)]
struct PaperVenue {
    pending: Vec<LimitRequest>,
    positions: Vec<VenuePosition>,
    stops: HashMap<String, f64>,
}

impl PaperVenue {
    fn tick(&mut self, price: f64) {
        let (filled, pending) = self
            .pending
            .drain(..)
            .partition::<Vec<_>, _>(|request| request.side.fills(price, request.price));
        self.pending = pending;

        for request in filled {
            let id = format!("paper-{}", self.positions.len());
            info!("Paper fill {id} {:?} at {:.2}", request.side, request.price);
            self.positions.push(VenuePosition {
                id,
                instrument: request.instrument,
                account: request.account,
                side: request.side,
                open_price: request.price,
                quantity: request.quantity,
                closed: false,
            });
        }

        for position in self.positions.iter_mut().filter(|p| !p.closed) {
            if let Some(&stop) = self.stops.get(&position.id)
                && position.side.stops(price, stop)
            {
                info!("Paper stop {} at {:.2}", position.id, stop);
                position.closed = true;
            }
        }
    }
}

impl Venue for PaperVenue {
    fn place_limit(&mut self, request: &LimitRequest) -> Result<()> {
        if request.quantity <= 0.0 {
            return Err(Error::Venue(format!("rejected quantity {}", request.quantity)));
        }
        self.pending.push(request.clone());
        Ok(())
    }

    fn positions(&self) -> Vec<VenuePosition> {
        self.positions.clone()
    }

    fn set_stop(&mut self, position_id: &str, price: f64) -> Result<()> {
        match self.positions.iter().find(|p| p.id == position_id && !p.closed) {
            Some(_) => {
                self.stops.insert(position_id.to_owned(), price);
                Ok(())
            }
            None => Err(Error::Venue(format!("no open position {position_id}"))),
        }
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = ZoneConfig {
        pivot_period: 8,
        average_period: 14,
        ..Default::default()
    };
    let venue = Rc::new(RefCell::new(PaperVenue::default()));
    let market = Market::from(("DEMO", "paper-account", 1.0));
    let factory = VenueOrderFactory::new(Rc::clone(&venue), market, &config);
    let mut manager = ZoneManager::new(config, factory)?;

    for bar in utils::generate_sample_bars(1500, 7, 100.0) {
        manager.on_bar(bar)?;

        let path = if bar.is_bullish() {
            [bar.open(), bar.low(), bar.high(), bar.close()]
        } else {
            [bar.open(), bar.high(), bar.low(), bar.close()]
        };
        for price in path {
            venue.borrow_mut().tick(price);
            manager.on_price(price)?;
        }

        for event in manager.take_events() {
            if let Event::ZoneClosed(id) = event
                && let Some(zone) = manager.zone(id)
            {
                println!(
                    "zone #{} {:?} entry {:.2} closed at {:+.2} RR",
                    id.get(),
                    zone.order().side(),
                    zone.order().entry_price(),
                    zone.order().realized_rr()
                );
            }
        }
    }

    let venue = venue.borrow();
    println!(
        "\nvenue: {} positions, {} still resting, {} open zones",
        venue.positions.len(),
        venue.pending.len(),
        manager.open_zones().len()
    );
    println!("{:?}", manager.statistics());

    Ok(())
}
