use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::{
    engine::{
        Bar, BreakDirection, BreakEvent, Event, FractalChain, FractalDetector, FractalId, OrderFactory,
        Rectangle, RrStatistics, Zone, ZoneConfig, ZoneId, is_untested, zone::extra_room, zone_height,
    },
    errors::{Error, Result},
    utils::intrabar_path,
};

/// Watches bars and prices for breaks of structure and manages the zones they create.
///
/// Bars go through [`ZoneManager::on_bar`], prices through [`ZoneManager::on_price`].
/// For historical data, [`ZoneManager::replay`] feeds each bar followed by two
/// synthetic prices.
#[derive(Debug)]
pub struct ZoneManager<F> {
    config: ZoneConfig,
    factory: F,
    bars: Vec<Bar>,
    detector: FractalDetector,
    // block anchor -> unbroken fractal of that run
    unbroken: BTreeMap<FractalId, FractalId>,
    consumed: HashSet<FractalId>,
    open_zones: Vec<Zone>,
    closed_zones: Vec<Zone>,
    bos_events: Vec<BreakEvent>,
    events: Vec<Event>,
    statistics: RrStatistics,
    last_price: Option<f64>,
    next_zone_id: usize,
}

impl<F: OrderFactory> ZoneManager<F> {
    /// Creates a manager.
    ///
    /// ### Arguments
    /// * `config` - Zone parameters, fixed for the lifetime of the manager.
    /// * `factory` - Builds the order of every new zone.
    ///
    /// ### Returns
    /// The manager, or an error when `config` is invalid.
    ///
    /// ### Example
    /// ```rust
    /// use bos_rs::prelude::*;
    ///
    /// let config = ZoneConfig::default();
    /// let manager = ZoneManager::new(config, SimulatedOrderFactory::from(&config)).unwrap();
    /// assert!(manager.bars().is_empty());
    /// ```
    pub fn new(config: ZoneConfig, factory: F) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            detector: FractalDetector::new(config.fractal_options()?),
            config,
            factory,
            bars: Vec::new(),
            unbroken: BTreeMap::new(),
            consumed: HashSet::new(),
            open_zones: Vec::new(),
            closed_zones: Vec::new(),
            bos_events: Vec::new(),
            events: Vec::new(),
            statistics: RrStatistics::default(),
            last_price: None,
            next_zone_id: 0,
        })
    }

    pub fn config(&self) -> &ZoneConfig {
        &self.config
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn detector(&self) -> &FractalDetector {
        &self.detector
    }

    pub fn chain(&self) -> &FractalChain {
        self.detector.chain()
    }

    /// Fractals not broken yet, oldest run first.
    pub fn unbroken(&self) -> impl Iterator<Item = FractalId> + '_ {
        self.unbroken.values().copied()
    }

    /// Zones whose order is pending or open.
    pub fn open_zones(&self) -> &[Zone] {
        &self.open_zones
    }

    pub fn closed_zones(&self) -> &[Zone] {
        &self.closed_zones
    }

    /// Looks a zone up in the open and closed sets.
    pub fn zone(&self, id: ZoneId) -> Option<&Zone> {
        self.open_zones
            .iter()
            .chain(self.closed_zones.iter())
            .find(|zone| zone.id() == id)
    }

    /// Every break of structure that created a zone, in order.
    pub fn bos_events(&self) -> &[BreakEvent] {
        &self.bos_events
    }

    pub fn statistics(&self) -> &RrStatistics {
        &self.statistics
    }

    pub fn last_price(&self) -> Option<f64> {
        self.last_price
    }

    /// Drains the events produced since the last call.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Adds a bar, or updates the forming one.
    ///
    /// A bar with the same open time as the last one replaces it. Otherwise it
    /// is appended and the bar it completes is scanned for fractals.
    ///
    /// ### Arguments
    /// * `bar` - The new or updated bar.
    pub fn on_bar(&mut self, bar: Bar) -> Result<()> {
        if let Some(last) = self.bars.last_mut()
            && last.open_time() == bar.open_time()
        {
            *last = bar;
            return Ok(());
        }

        self.bars.push(bar);
        if self.bars.len() < 3 {
            return Ok(());
        }

        let index = self.bars.len() - 2;
        for event in self.detector.process_index(&self.bars, index)? {
            self.track_fractal(&event);
            self.events.push(event);
        }
        Ok(())
    }

    /// Keeps the unbroken set in step with the detector.
    fn track_fractal(&mut self, event: &Event) {
        let chain = self.detector.chain();
        match event {
            Event::Fractal(fractal) => {
                if self.consumed.contains(&fractal.id()) {
                    return;
                }
                self.unbroken.insert(chain.first_of_block(fractal.id()), fractal.id());
            }
            Event::FractalInvalidated(fractal) => {
                let key = chain.first_of_block(fractal.id());
                if self.unbroken.get(&key) == Some(&fractal.id()) {
                    self.unbroken.remove(&key);
                }
            }
            _ => {}
        }
    }

    /// Processes a price observation.
    ///
    /// Scans the unbroken fractals for breaks, creates the resulting zones and
    /// feeds the price to every open zone. Until `2 × pivot_period + 1` bars are
    /// known, the price is only remembered.
    ///
    /// ### Arguments
    /// * `price` - The observed price.
    ///
    /// ### Returns
    /// An error for a non-finite price, or when an order cannot be built.
    pub fn on_price(&mut self, price: f64) -> Result<()> {
        if !price.is_finite() {
            return Err(Error::InvalidPrice(price));
        }

        if self.bars.len() >= self.config.warm_up() {
            self.scan_breaks(price)?;
            self.update_zones(price);
        }

        self.last_price = Some(price);
        Ok(())
    }

    fn scan_breaks(&mut self, price: f64) -> Result<()> {
        let Some(current) = self.bars.last().copied() else {
            return Ok(());
        };
        let index = self.bars.len() - 1;

        let snapshot = self.unbroken.iter().map(|(k, v)| (*k, *v)).collect::<Vec<_>>();
        for (key, id) in snapshot {
            let chain = self.detector.chain();
            let broken = chain[id];
            if !broken.is_crossed_by(price) {
                continue;
            }

            self.unbroken.remove(&key);
            self.consumed.insert(id);

            let Some(anchor_id) = chain
                .next(id, true)
                .filter(|next| chain[*next].side() != broken.side())
            else {
                debug!("No swing after broken fractal at bar {}, scan stopped", broken.index());
                break;
            };
            let anchor = chain[anchor_id];

            if !is_untested(&self.bars, &anchor) {
                debug!(
                    "Zone at bar {} rejected: level {} already tested",
                    anchor.index(),
                    anchor.value()
                );
                continue;
            }

            let height = zone_height(&self.bars, &anchor, &self.config);
            let order = self.factory.create_order(&anchor, self.config.tick_size, height)?;
            let rectangle = Rectangle::around(&anchor, height, extra_room(&self.config), current.open_time(), index);

            let zone_id = ZoneId(self.next_zone_id);
            self.next_zone_id += 1;

            // a first or unchanged price counts as falling
            let direction = match self.last_price {
                Some(last) if price > last => BreakDirection::Up,
                _ => BreakDirection::Down,
            };
            let bos = BreakEvent::from((id, broken, current.open_time(), index, direction));

            debug!(
                "BOS {:?} at bar {}: zone {} [{:.5}, {:.5}]",
                direction,
                index,
                zone_id.get(),
                rectangle.bottom(),
                rectangle.top()
            );

            self.open_zones
                .push(Zone::new(zone_id, anchor_id, anchor, id, rectangle, order));
            self.bos_events.push(bos);
            self.events.push(Event::StructureBreak(bos));
            self.events.push(Event::ZoneCreated(zone_id));
        }

        Ok(())
    }

    fn update_zones(&mut self, price: f64) {
        let Some(current) = self.bars.last() else {
            return;
        };
        let (time, index) = (current.open_time(), self.bars.len() - 1);

        let mut closed_any = false;
        for mut zone in std::mem::take(&mut self.open_zones) {
            zone.extend_to(time, index);
            zone.process_price(price, index);
            if zone.is_closed() {
                debug!("Zone {} closed with RR {}", zone.id().get(), zone.order().realized_rr_int());
                self.events.push(Event::ZoneClosed(zone.id()));
                self.closed_zones.push(zone);
                closed_any = true;
            } else {
                self.open_zones.push(zone);
            }
        }

        if closed_any {
            let realized = self
                .closed_zones
                .iter()
                .map(|zone| zone.order().realized_rr())
                .collect::<Vec<_>>();
            self.statistics = RrStatistics::compute(&realized, self.config.rr_cap);
        }
    }

    /// Feeds a completed historical bar: the bar, then its low and high in
    /// assumed trading order.
    pub fn replay_bar(&mut self, bar: Bar) -> Result<()> {
        self.on_bar(bar)?;
        for price in intrabar_path(&bar) {
            self.on_price(price)?;
        }
        Ok(())
    }

    /// Replays historical bars in order.
    ///
    /// ### Arguments
    /// * `bars` - Bars sorted by open time.
    pub fn replay<I>(&mut self, bars: I) -> Result<()>
    where
        I: IntoIterator<Item = Bar>,
    {
        for bar in bars {
            self.replay_bar(bar)?;
        }
        Ok(())
    }

    /// Clears every bar, fractal, zone, event and statistic.
    pub fn reset(&mut self) {
        self.bars.clear();
        self.detector.reset();
        self.unbroken.clear();
        self.consumed.clear();
        self.open_zones.clear();
        self.closed_zones.clear();
        self.bos_events.clear();
        self.events.clear();
        self.statistics = RrStatistics::default();
        self.last_price = None;
        self.next_zone_id = 0;
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration};

    use super::*;
    use crate::engine::{BarBuilder, SimulatedOrderFactory, ZoneOrder};

    fn bar(i: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
        BarBuilder::builder()
            .open(open)
            .high(high)
            .low(low)
            .close(close)
            .open_time(DateTime::default() + Duration::minutes(i))
            .build()
            .unwrap()
    }

    // High swing at bar 1 (105), low swing at bar 3 (97). Bar 6 breaks the
    // high, bar 7 trades back into the zone, bar 8 runs to 2.1 RR and bar 9
    // stops the order out.
    fn scenario() -> Vec<Bar> {
        vec![
            bar(0, 100.0, 101.0, 99.0, 100.5),
            bar(1, 100.5, 105.0, 100.0, 104.0),
            bar(2, 104.0, 104.5, 101.0, 102.0),
            bar(3, 102.0, 103.0, 97.0, 98.0),
            bar(4, 98.0, 101.0, 98.0, 100.5),
            bar(5, 100.5, 102.0, 99.5, 101.5),
            bar(6, 101.5, 106.0, 101.0, 105.5),
            bar(7, 105.5, 106.0, 101.0, 101.5),
            bar(8, 101.5, 112.0, 101.5, 111.0),
            bar(9, 111.0, 111.5, 96.0, 97.0),
        ]
    }

    fn config() -> ZoneConfig {
        ZoneConfig {
            pivot_period: 2,
            average_period: 3,
            average_multiplier: 1.0,
            ..Default::default()
        }
    }

    fn manager() -> ZoneManager<SimulatedOrderFactory> {
        let config = config();
        ZoneManager::new(config, SimulatedOrderFactory::from(&config)).unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let config = ZoneConfig {
            pivot_period: 0,
            ..Default::default()
        };
        assert!(ZoneManager::new(config, SimulatedOrderFactory::from(&config)).is_err());
    }

    #[test]
    fn break_creates_zone() {
        let mut manager = manager();
        manager.replay(scenario()[..7].to_vec()).unwrap();

        assert_eq!(manager.bos_events().len(), 1);
        let bos = manager.bos_events()[0];
        assert_eq!(bos.fractal().value(), 105.0);
        assert_eq!(bos.index(), 6);
        assert_eq!(bos.direction(), BreakDirection::Up);

        assert_eq!(manager.open_zones().len(), 1);
        let zone = &manager.open_zones()[0];
        assert_eq!(zone.anchor().value(), 97.0);
        assert_eq!(zone.anchor().index(), 3);
        assert!(zone.structure_broken());
        assert_eq!(zone.rectangle().bottom(), 97.0);
        // average range of bars 1..=3 is (5 + 3.5 + 6) / 3, the 1.0 wick is too small
        assert!((zone.rectangle().height() - 14.5 / 3.0).abs() < 1e-9);
        assert_eq!(zone.rectangle().end_index(), 6);

        let order = zone.order();
        assert_eq!(order.side(), crate::engine::OrderSide::Buy);
        assert_eq!(order.stop_price(), 97.0);
        assert!(!order.is_mitigated());

        // the low swing at 97 is still unbroken
        let unbroken = manager.unbroken().collect::<Vec<_>>();
        assert_eq!(unbroken.len(), 1);
        assert_eq!(manager.chain()[unbroken[0]].value(), 97.0);
    }

    #[test]
    fn zone_closes_and_updates_statistics() {
        let mut manager = manager();
        manager.replay(scenario()).unwrap();

        assert!(manager.open_zones().is_empty());
        assert_eq!(manager.closed_zones().len(), 1);

        let order = manager.closed_zones()[0].order();
        assert!(order.is_closed());
        assert_eq!(order.max_rr_index(), Some(8));
        assert_eq!(order.realized_rr_int(), 2);

        // the break of the 97 low anchors at the 106 high, traded through by bar 8
        assert_eq!(manager.bos_events().len(), 1);

        let stats = manager.statistics();
        assert_eq!(stats.closed(), 1);
        assert_eq!(stats.positive(), 1);
        assert_eq!(stats.best_cap(), 2);
        assert_eq!(stats.best_sum(), 2);
        assert_eq!(stats.current_sum(), 0);

        let events = manager.take_events();
        let zone_events = events
            .iter()
            .filter(|e| matches!(e, Event::StructureBreak(_) | Event::ZoneCreated(_) | Event::ZoneClosed(_)))
            .count();
        assert_eq!(zone_events, 3);
        assert!(manager.take_events().is_empty());
    }

    #[test]
    fn rectangle_stops_when_mitigated() {
        let mut manager = manager();
        manager.replay(scenario()[..9].to_vec()).unwrap();

        let zone = &manager.open_zones()[0];
        assert!(zone.order().is_open());
        assert_eq!(zone.rectangle().end_index(), 7);
    }

    #[test]
    fn forming_bar_is_replaced() {
        let mut manager = manager();
        manager.on_bar(bar(0, 100.0, 101.0, 99.0, 100.5)).unwrap();
        manager.on_bar(bar(0, 100.0, 102.0, 99.0, 101.5)).unwrap();

        assert_eq!(manager.bars().len(), 1);
        assert_eq!(manager.bars()[0].high(), 102.0);
    }

    #[test]
    fn prices_wait_for_warm_up() {
        let mut manager = manager();
        manager.replay(scenario()[..4].to_vec()).unwrap();
        // the 105 high is known but not scanned yet
        assert_eq!(manager.unbroken().count(), 1);
        manager.on_price(200.0).unwrap();

        assert_eq!(manager.unbroken().count(), 1);
        assert!(manager.bos_events().is_empty());
        assert_eq!(manager.last_price(), Some(200.0));
    }

    #[test]
    fn invalid_price_is_an_error() {
        let mut manager = manager();
        assert!(matches!(manager.on_price(f64::NAN), Err(Error::InvalidPrice(_))));
        assert_eq!(manager.last_price(), None);
    }

    #[test]
    fn broken_fractal_never_returns() {
        let mut manager = manager();
        manager.replay(scenario()[..7].to_vec()).unwrap();
        let broken = manager.bos_events()[0].fractal_id();

        manager.on_price(50.0).unwrap();
        manager.on_price(200.0).unwrap();
        assert!(manager.unbroken().all(|id| id != broken));
        assert_eq!(manager.bos_events().len(), 1);
    }

    #[test]
    fn factory_errors_propagate() {
        let config = config();
        let factory = |_: &crate::engine::Fractal, _: f64, _: f64| -> Result<Box<dyn ZoneOrder>> {
            Err(Error::Msg("no orders today".to_owned()))
        };
        let mut manager = ZoneManager::new(config, factory).unwrap();
        assert!(matches!(manager.replay(scenario()), Err(Error::Msg(_))));
    }

    #[test]
    fn reset_clears_everything() {
        let mut manager = manager();
        manager.replay(scenario()).unwrap();
        manager.reset();

        assert!(manager.bars().is_empty());
        assert!(manager.chain().is_empty());
        assert_eq!(manager.unbroken().count(), 0);
        assert!(manager.closed_zones().is_empty());
        assert!(manager.bos_events().is_empty());
        assert!(manager.take_events().is_empty());
        assert_eq!(*manager.statistics(), RrStatistics::default());

        manager.replay(scenario()).unwrap();
        assert_eq!(manager.closed_zones().len(), 1);
        assert_eq!(manager.closed_zones()[0].id().get(), 0);
    }
}
