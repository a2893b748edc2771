use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::{Fractal, FractalId, ZoneId};

/// A fractal reported by the detector.
///
/// `fractal` is a snapshot taken when the event fired; its links may have
/// grown since. Look the id up in the chain for the current state.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FractalEvent {
    index: usize,
    id: FractalId,
    fractal: Fractal,
    confirmed: bool,
}

impl From<(usize, FractalId, Fractal, bool)> for FractalEvent {
    fn from((index, id, fractal, confirmed): (usize, FractalId, Fractal, bool)) -> Self {
        Self {
            index,
            id,
            fractal,
            confirmed,
        }
    }
}

impl FractalEvent {
    /// Bar index that was being processed when the event fired.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn id(&self) -> FractalId {
        self.id
    }

    pub fn fractal(&self) -> &Fractal {
        &self.fractal
    }

    pub fn confirmed(&self) -> bool {
        self.confirmed
    }
}

/// Direction price was moving when it broke a swing point.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakDirection {
    Up,
    Down,
}

/// A break of structure: price crossed a previously unbroken fractal.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakEvent {
    fractal_id: FractalId,
    fractal: Fractal,
    time: DateTime<Utc>,
    index: usize,
    direction: BreakDirection,
}

type B = (FractalId, Fractal, DateTime<Utc>, usize, BreakDirection);
impl From<B> for BreakEvent {
    fn from((fractal_id, fractal, time, index, direction): B) -> Self {
        Self {
            fractal_id,
            fractal,
            time,
            index,
            direction,
        }
    }
}

impl BreakEvent {
    /// The swing point that was broken.
    pub fn fractal(&self) -> &Fractal {
        &self.fractal
    }

    pub fn fractal_id(&self) -> FractalId {
        self.fractal_id
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn direction(&self) -> BreakDirection {
        self.direction
    }
}

/// Notifications produced while bars and prices are processed.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    /// A fractal was detected (and confirmed, when confirmation is on).
    Fractal(FractalEvent),

    /// A fractal was superseded by a more extreme one on the same side.
    FractalInvalidated(FractalEvent),

    /// Price broke an unbroken swing point and a zone was built from it.
    StructureBreak(BreakEvent),

    /// A zone entered the open set.
    ZoneCreated(ZoneId),

    /// A zone's order closed and the zone moved to the closed set.
    ZoneClosed(ZoneId),
}
