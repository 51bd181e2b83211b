//! The Candle, the unit of currency for every downstream component.
//!
//! A `Candle` is produced exactly once, by the [`crate::firewall::Firewall`],
//! from a raw [`RawTick`]. It is immutable thereafter and lives for one slot
//! in the ring buffer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One OHLCV bar, exchange time in milliseconds.
///
/// Field order matches the ring buffer's on-disk byte layout
/// `(ts, o, h, l, c, v)` — see [`crate::ringbuffer::RawCandle`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub ts_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(ts_ms: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            ts_ms,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Round-trip helper used by the firewall's idempotence tests
    /// (spec.md §8 "Canonicalization is idempotent").
    pub fn to_tick(self) -> RawTick {
        let mut fields = HashMap::new();
        fields.insert("t".to_string(), TickValue::Number(self.ts_ms as f64));
        fields.insert("o".to_string(), TickValue::Number(self.open));
        fields.insert("h".to_string(), TickValue::Number(self.high));
        fields.insert("l".to_string(), TickValue::Number(self.low));
        fields.insert("c".to_string(), TickValue::Number(self.close));
        fields.insert("v".to_string(), TickValue::Number(self.volume));
        RawTick { fields }
    }
}

/// A loosely-typed value as it might arrive from the exchange: a bare
/// number, a numeric string, or a null. Anything else is rejected outright.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TickValue {
    Number(f64),
    Text(String),
    Null,
}

/// A raw, pre-validation exchange update. Never stored; converted to a
/// [`Candle`] or discarded by the firewall (spec.md §3).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawTick {
    #[serde(flatten)]
    pub fields: HashMap<String, TickValue>,
}

impl RawTick {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl Into<TickValue>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }
}

impl From<f64> for TickValue {
    fn from(v: f64) -> Self {
        TickValue::Number(v)
    }
}

impl From<&str> for TickValue {
    fn from(v: &str) -> Self {
        TickValue::Text(v.to_string())
    }
}
