//! Domain error types, one enum per failure family (spec.md §7).
//!
//! Grounded on the teacher's `src/domain/errors.rs` (one `thiserror` enum
//! per concern, `Display` messages that embed the offending values).

use thiserror::Error;

/// Why the Firewall rejected a tick (spec.md §4.3). Carried into the
/// rate-limited `poison_pill` log as a root-cause category.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("non-finite value for field: {0}")]
    NonFinite(&'static str),
    #[error("non-positive price for field: {0}")]
    NonPositivePrice(&'static str),
    #[error("negative volume")]
    NegativeVolume,
    #[error("ohlc ordering violated: low={low} open={open} high={high} close={close}")]
    OhlcOrdering {
        low: f64,
        open: f64,
        high: f64,
        close: f64,
    },
    #[error("timestamp {ts_ms} outside accepted window [{min_ms}, {max_ms}]")]
    TimestampOutOfRange {
        ts_ms: i64,
        min_ms: i64,
        max_ms: i64,
    },
}

#[derive(Debug, Error)]
pub enum ShmError {
    #[error("failed to allocate shared-memory region {name}: {source}")]
    AllocationFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("shared-memory region {name} is missing (attach without a creator)")]
    MissingOnAttach { name: String },
    #[error("struct-size mismatch for region {name}: expected {expected} bytes, found {found}")]
    SizeMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Error)]
pub enum TradingError {
    #[error("insufficient balance: need {need}, available {available}")]
    InsufficientBalance { need: f64, available: f64 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration invalid:\n{}", .0.join("\n"))]
    Invalid(Vec<String>),
}
