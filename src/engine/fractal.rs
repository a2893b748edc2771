use std::ops::Index;

use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable handle of a fractal inside a [`FractalChain`].
///
/// Handles are handed out in detection order, so comparing two ids compares
/// their chronology.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FractalId(pub(crate) usize);

impl FractalId {
    /// Position of the fractal in the chain arena.
    pub fn get(&self) -> usize {
        self.0
    }
}

/// Which extreme a fractal marks.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FractalSide {
    High,
    Low,
}

impl FractalSide {
    pub fn opposite(&self) -> Self {
        match self {
            Self::High => Self::Low,
            Self::Low => Self::High,
        }
    }
}

/// Swing structure of a fractal relative to the previous swing on its side.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Structure {
    HigherHigh,
    LowerHigh,
    HigherLow,
    LowerLow,
}

/// A local price extreme detected at a bar index.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fractal {
    index: usize,
    time: DateTime<Utc>,
    value: f64,
    side: FractalSide,
    previous: Option<FractalId>,
    next: Option<FractalId>,
}

impl From<(usize, DateTime<Utc>, f64, FractalSide)> for Fractal {
    fn from((index, time, value, side): (usize, DateTime<Utc>, f64, FractalSide)) -> Self {
        Self {
            index,
            time,
            value,
            side,
            previous: None,
            next: None,
        }
    }
}

impl Fractal {
    /// Index of the bar the fractal sits on.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Price of the extreme (the bar high or low).
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn side(&self) -> FractalSide {
        self.side
    }

    pub fn is_high(&self) -> bool {
        self.side == FractalSide::High
    }

    pub fn is_low(&self) -> bool {
        self.side == FractalSide::Low
    }

    /// Whether `self` is strictly beyond `other` on its own side.
    pub fn is_more_extreme_than(&self, other: &Fractal) -> bool {
        match self.side {
            FractalSide::High => self.value > other.value,
            FractalSide::Low => self.value < other.value,
        }
    }

    /// Whether `price` lies beyond the fractal level on its side.
    pub fn is_crossed_by(&self, price: f64) -> bool {
        match self.side {
            FractalSide::High => price > self.value,
            FractalSide::Low => price < self.value,
        }
    }
}

/// Arena of fractals linked in detection order.
///
/// Links are handles, never references, so walking a same-side run in either
/// direction is a plain loop over ids.
#[derive(Debug, Clone, Default)]
pub struct FractalChain {
    fractals: Vec<Fractal>,
    tail: Option<FractalId>,
}

impl Index<FractalId> for FractalChain {
    type Output = Fractal;

    fn index(&self, id: FractalId) -> &Self::Output {
        &self.fractals[id.0]
    }
}

impl FractalChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fractals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fractals.is_empty()
    }

    pub fn get(&self, id: FractalId) -> Option<&Fractal> {
        self.fractals.get(id.0)
    }

    /// Most recently chained fractal.
    pub fn tail(&self) -> Option<FractalId> {
        self.tail
    }

    /// Iterates every fractal with its id, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (FractalId, &Fractal)> {
        self.fractals.iter().enumerate().map(|(i, f)| (FractalId(i), f))
    }

    /// Appends a fractal after the current tail and returns its handle.
    pub fn push(&mut self, mut fractal: Fractal) -> FractalId {
        let id = FractalId(self.fractals.len());
        fractal.previous = self.tail;
        fractal.next = None;
        if let Some(tail) = self.tail {
            self.fractals[tail.0].next = Some(id);
        }
        self.fractals.push(fractal);
        self.tail = Some(id);
        id
    }

    /// First fractal of the same-side run `id` belongs to.
    pub fn first_of_block(&self, id: FractalId) -> FractalId {
        let side = self[id].side;
        let mut first = id;
        while let Some(previous) = self[first].previous
            && self[previous].side == side
        {
            first = previous;
        }
        first
    }

    /// Most extreme fractal of the same-side run `id` belongs to.
    ///
    /// Ties keep the candidate found first: `id` itself, then the earlier ones.
    pub fn best(&self, id: FractalId) -> FractalId {
        let side = self[id].side;
        let mut best = id;

        let mut cursor = self[id].previous;
        while let Some(current) = cursor
            && self[current].side == side
        {
            if self[current].is_more_extreme_than(&self[best]) {
                best = current;
            }
            cursor = self[current].previous;
        }

        let mut cursor = self[id].next;
        while let Some(current) = cursor
            && self[current].side == side
        {
            if self[current].is_more_extreme_than(&self[best]) {
                best = current;
            }
            cursor = self[current].next;
        }

        best
    }

    /// Every fractal of the run `id` belongs to, oldest first.
    pub fn block(&self, id: FractalId) -> Vec<FractalId> {
        let side = self[id].side;
        let first = self.first_of_block(id);
        let mut block = vec![first];
        let mut cursor = self[first].next;
        while let Some(current) = cursor
            && self[current].side == side
        {
            block.push(current);
            cursor = self[current].next;
        }
        block
    }

    /// Members of the run that lost to its best fractal.
    pub fn superseded(&self, id: FractalId) -> Vec<FractalId> {
        let best = self.best(id);
        self.block(id).into_iter().filter(|f| *f != best).collect()
    }

    /// Fractal chained before `id`.
    ///
    /// With `best`, skips the rest of the current run and returns the best of
    /// the run before it.
    pub fn previous(&self, id: FractalId, best: bool) -> Option<FractalId> {
        if !best {
            return self[id].previous;
        }
        let previous = self[self.first_of_block(id)].previous?;
        Some(self.best(previous))
    }

    /// Fractal chained after `id`.
    ///
    /// With `best`, skips the rest of the current run and returns the best of
    /// the run after it.
    pub fn next(&self, id: FractalId, best: bool) -> Option<FractalId> {
        if !best {
            return self[id].next;
        }
        let next = self[self.best(id)].next?;
        Some(self.best(next))
    }

    /// Best fractal of the previous run on the same side.
    pub fn previous_of_same_side(&self, id: FractalId) -> Option<FractalId> {
        let previous = self.previous(id, true)?;
        self.previous(previous, true)
    }

    /// Classifies `id` against the previous swing on its side.
    pub fn structure(&self, id: FractalId) -> Structure {
        let fractal = &self[id];
        let higher = self
            .previous_of_same_side(id)
            .is_none_or(|previous| self[previous].value < fractal.value);

        match (fractal.side, higher) {
            (FractalSide::High, true) => Structure::HigherHigh,
            (FractalSide::High, false) => Structure::LowerHigh,
            (FractalSide::Low, true) => Structure::HigherLow,
            (FractalSide::Low, false) => Structure::LowerLow,
        }
    }

    /// Latest fractal, or the best of the latest run.
    pub fn last(&self, best: bool) -> Option<FractalId> {
        let tail = self.tail?;
        Some(if best { self.best(tail) } else { tail })
    }

    pub fn last_high(&self, best: bool) -> Option<FractalId> {
        self.last_of_side(FractalSide::High, best)
    }

    pub fn last_low(&self, best: bool) -> Option<FractalId> {
        self.last_of_side(FractalSide::Low, best)
    }

    fn last_of_side(&self, side: FractalSide, best: bool) -> Option<FractalId> {
        let tail = self.tail?;
        if self[tail].side == side {
            return self.last(best);
        }
        self.previous(tail, best)
    }
}
