//! Core data model (spec.md §3). Every downstream component shares these
//! types rather than defining its own ad-hoc representation — this is how
//! the "dynamic runtime reflection" the source used (duck-typed signal and
//! position dicts) becomes tagged variants and named structs (spec.md §9).

pub mod account;
pub mod candle;
pub mod errors;
pub mod feature;
pub mod pattern;
pub mod signal;

pub use account::{AccountState, Position, Trade};
pub use candle::{Candle, RawTick, TickValue};
pub use feature::FeatureVector;
pub use pattern::{PatternRecord, PatternSide, SwingPoint};
pub use signal::{CloseReason, Order, OrderSide, OrderStatus, OrderType, Signal, SymbolSpec};
