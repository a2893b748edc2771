use tracing::trace;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    engine::{Bar, Event, Fractal, FractalChain, FractalEvent, FractalId, FractalSide},
    errors::{Error, Result},
};

/// Pivot window settings for the [`FractalDetector`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FractalOptions {
    period: usize,
    require_confirmation: bool,
}

impl Default for FractalOptions {
    fn default() -> Self {
        Self {
            period: 5,
            require_confirmation: false,
        }
    }
}

impl FractalOptions {
    /// Creates options for a window `period` bars wide.
    ///
    /// ### Arguments
    /// * `period` - Window width; the centre bar is compared to `period / 2` bars on each side.
    /// * `require_confirmation` - Hold back fractal events until the opposite side prints.
    pub fn new(period: usize, require_confirmation: bool) -> Result<Self> {
        if period == 0 {
            return Err(Error::InvalidPeriod(period));
        }
        Ok(Self {
            period,
            require_confirmation,
        })
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn half_period(&self) -> usize {
        self.period / 2
    }

    pub fn require_confirmation(&self) -> bool {
        self.require_confirmation
    }
}

/// Scans bar windows for local extremes and keeps them in a [`FractalChain`].
#[derive(Debug, Clone, Default)]
pub struct FractalDetector {
    options: FractalOptions,
    chain: FractalChain,
    pending: Option<FractalId>,
    last_confirmed: Option<FractalId>,
}

impl FractalDetector {
    pub fn new(options: FractalOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn options(&self) -> &FractalOptions {
        &self.options
    }

    pub fn chain(&self) -> &FractalChain {
        &self.chain
    }

    /// Latest fractal waiting for the opposite side to confirm it.
    pub fn pending(&self) -> Option<FractalId> {
        self.pending
    }

    pub fn last_confirmed(&self) -> Option<FractalId> {
        self.last_confirmed
    }

    /// Drops every fractal and the confirmation state.
    pub fn reset(&mut self) {
        self.chain = FractalChain::new();
        self.pending = None;
        self.last_confirmed = None;
    }

    /// Evaluates bar `index - period / 2` as a fractal candidate.
    ///
    /// Nothing happens until `index >= period`. Low fractals are tested before
    /// high fractals, so a bar that is both yields the low first.
    ///
    /// ### Returns
    /// The [`Event::Fractal`] and [`Event::FractalInvalidated`] events produced,
    /// or an error when `index` is past the end of `bars`.
    pub fn process_index(&mut self, bars: &[Bar], index: usize) -> Result<Vec<Event>> {
        if index >= bars.len() {
            return Err(Error::IndexOutOfRange(index, bars.len()));
        }

        let mut events = Vec::new();
        if index < self.options.period {
            return Ok(events);
        }

        let middle = index - self.options.half_period();
        let bar = &bars[middle];
        if self.is_low_fractal(bars, middle) {
            let fractal = Fractal::from((middle, bar.open_time(), bar.low(), FractalSide::Low));
            self.process_fractal(index, fractal, &mut events);
        }
        if self.is_high_fractal(bars, middle) {
            let fractal = Fractal::from((middle, bar.open_time(), bar.high(), FractalSide::High));
            self.process_fractal(index, fractal, &mut events);
        }

        Ok(events)
    }

    fn window<'a>(&self, bars: &'a [Bar], middle: usize) -> &'a [Bar] {
        let half = self.options.half_period();
        &bars[middle - half..=middle + half]
    }

    fn is_high_fractal(&self, bars: &[Bar], middle: usize) -> bool {
        let value = bars[middle].high();
        self.window(bars, middle).iter().all(|bar| bar.high() <= value)
    }

    fn is_low_fractal(&self, bars: &[Bar], middle: usize) -> bool {
        let value = bars[middle].low();
        self.window(bars, middle).iter().all(|bar| bar.low() >= value)
    }

    fn process_fractal(&mut self, index: usize, fractal: Fractal, events: &mut Vec<Event>) {
        if let Some(tail) = self.chain.tail()
            && self.chain[tail].side() == fractal.side()
            && !fractal.is_more_extreme_than(&self.chain[tail])
        {
            trace!(index = fractal.index(), value = fractal.value(), "fractal discarded");
            return;
        }

        let id = self.chain.push(fractal);

        if let Some(previous) = self.chain.previous(id, false)
            && self.chain[previous].side() == fractal.side()
        {
            events.push(Event::FractalInvalidated(self.event(index, previous, false)));
        }

        if !self.options.require_confirmation {
            events.push(Event::Fractal(self.event(index, id, false)));
            return;
        }

        let (Some(_), Some(pending)) = (self.last_confirmed, self.pending) else {
            self.last_confirmed = Some(id);
            self.pending = Some(id);
            events.push(Event::Fractal(self.event(index, id, true)));
            return;
        };

        if fractal.side() == self.chain[pending].side() {
            self.pending = Some(id);
            return;
        }

        // The new side differs from pending. Whether it matches the last
        // confirmed side or not, pending becomes confirmed.
        self.last_confirmed = Some(pending);
        self.pending = Some(id);
        events.push(Event::Fractal(self.event(index, pending, true)));
    }

    fn event(&self, index: usize, id: FractalId, confirmed: bool) -> FractalEvent {
        FractalEvent::from((index, id, self.chain[id], confirmed))
    }
}
