pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A builder was finalized without one of its required fields.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// A price is NaN or infinite.
    #[error("Price must be finite (got: {0})")]
    InvalidPrice(f64),

    /// The bar prices are inconsistent.
    /// Expected `low <= min(open, close)` and `high >= max(open, close)`.
    #[error("Invalid bar: open {open}, high {high}, low {low}, close {close}")]
    InvalidBar {
        /// Open price.
        open: f64,
        /// High price.
        high: f64,
        /// Low price.
        low: f64,
        /// Close price.
        close: f64,
    },

    /// The pivot window width cannot detect anything.
    #[error("Pivot period must be at least 1 (got: {0})")]
    InvalidPeriod(usize),

    /// The detector was asked for a bar it does not have.
    #[error("Bar index {0} out of range (bars available: {1})")]
    IndexOutOfRange(usize, usize),

    /// Entry and stop are at the same price, so RR is undefined.
    #[error("Zero risk distance: entry and stop are both {0}")]
    ZeroRisk(f64),

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The venue rejected an operation.
    #[error("Venue error: {0}")]
    Venue(String),

    /// Custom error message.
    #[error("{0}")]
    Msg(String),

    /// JSON serialization/deserialization error occurred.
    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
