use crate::engine::Bar;

/// The two prices a completed bar is replayed as, in assumed trading order.
///
/// One OHLC sample cannot tell which extreme printed first. A bullish bar is
/// taken to have dipped to its low before rallying to its high, any other bar
/// to have printed its high first.
pub(crate) fn intrabar_path(bar: &Bar) -> [f64; 2] {
    if bar.is_bullish() {
        [bar.low(), bar.high()]
    } else {
        [bar.high(), bar.low()]
    }
}
