//! C3 — Input Firewall (spec.md §4.3).
//!
//! Grounded on the teacher's ordered-validator-pipeline idiom
//! (`src/domain/risk/filters/*`: a trait + `Vec<Box<dyn _>>` run in
//! sequence), repurposed here for tick sanitization instead of risk checks.
//! Applied both at feed ingestion and immediately before any downstream
//! processing — defence in depth (spec.md §4.3) — by being a pure function
//! any caller can invoke idempotently.

use crate::domain::candle::{RawTick, TickValue};
use crate::domain::errors::RejectReason;
use crate::domain::Candle;
use chrono::{Duration, Utc};
use std::time::{Duration as StdDuration, Instant};
use tracing::warn;

/// Accepted key aliases per field, in priority order (spec.md §4.3 rule 1).
const TIMESTAMP_KEYS: &[&str] = &["t", "T", "timestamp"];
const OPEN_KEYS: &[&str] = &["o", "O", "open"];
const HIGH_KEYS: &[&str] = &["h", "H", "high"];
const LOW_KEYS: &[&str] = &["l", "L", "low"];
const CLOSE_KEYS: &[&str] = &["c", "C", "close"];
const VOLUME_KEYS: &[&str] = &["v", "V", "volume"];

const MAX_PAST: i64 = 30 * 24 * 60 * 60 * 1000; // 30 days, in ms
const MAX_FUTURE: i64 = 5 * 60 * 1000; // 5 minutes, in ms

pub struct Firewall {
    last_poison_log: std::sync::Mutex<Option<Instant>>,
    rate_limit: StdDuration,
}

impl Firewall {
    pub fn new() -> Self {
        Self {
            last_poison_log: std::sync::Mutex::new(None),
            rate_limit: StdDuration::from_secs(1),
        }
    }

    /// Validates `tick` against every rule of spec.md §4.3. On success,
    /// returns the canonical 6-tuple Candle (spec.md §8 property 1). On
    /// failure, emits a rate-limited `poison_pill` log naming the root
    /// cause category and returns the rejection reason without ever
    /// constructing a `Candle` (spec.md §8 property 2).
    pub fn validate(&self, tick: &RawTick) -> Result<Candle, RejectReason> {
        match self.validate_inner(tick) {
            Ok(candle) => Ok(candle),
            Err(reason) => {
                self.log_poison_pill(&reason);
                Err(reason)
            }
        }
    }

    fn validate_inner(&self, tick: &RawTick) -> Result<Candle, RejectReason> {
        let ts_ms = field(tick, TIMESTAMP_KEYS, "timestamp")? as i64;
        let open = field(tick, OPEN_KEYS, "open")?;
        let high = field(tick, HIGH_KEYS, "high")?;
        let low = field(tick, LOW_KEYS, "low")?;
        let close = field(tick, CLOSE_KEYS, "close")?;
        let volume = field(tick, VOLUME_KEYS, "volume")?;

        let fields: [(&'static str, f64); 5] = [
            ("open", open),
            ("high", high),
            ("low", low),
            ("close", close),
            ("volume", volume),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(RejectReason::NonFinite(name));
            }
        }

        if open <= 0.0 {
            return Err(RejectReason::NonPositivePrice("open"));
        }
        if high <= 0.0 {
            return Err(RejectReason::NonPositivePrice("high"));
        }
        if low <= 0.0 {
            return Err(RejectReason::NonPositivePrice("low"));
        }
        if close <= 0.0 {
            return Err(RejectReason::NonPositivePrice("close"));
        }
        if volume < 0.0 {
            return Err(RejectReason::NegativeVolume);
        }

        if !(low <= open && open <= high && low <= close && close <= high && low <= high) {
            return Err(RejectReason::OhlcOrdering {
                low,
                open,
                high,
                close,
            });
        }

        let now_ms = Utc::now().timestamp_millis();
        let min_ms = now_ms - MAX_PAST;
        let max_ms = now_ms + MAX_FUTURE;
        if ts_ms < min_ms || ts_ms > max_ms {
            return Err(RejectReason::TimestampOutOfRange {
                ts_ms,
                min_ms,
                max_ms,
            });
        }

        Ok(Candle::new(ts_ms, open, high, low, close, volume))
    }

    fn log_poison_pill(&self, reason: &RejectReason) {
        let mut guard = self.last_poison_log.lock().unwrap();
        let now = Instant::now();
        let should_log = guard.map(|last| now.duration_since(last) >= self.rate_limit).unwrap_or(true);
        if should_log {
            warn!(category = %reason, "poison_pill");
            *guard = Some(now);
        }
    }
}

impl Default for Firewall {
    fn default() -> Self {
        Self::new()
    }
}

fn field(tick: &RawTick, keys: &[&str], canonical: &'static str) -> Result<f64, RejectReason> {
    for key in keys {
        if let Some(value) = tick.fields.get(*key) {
            return coerce(value, canonical);
        }
    }
    Err(RejectReason::MissingField(canonical))
}

fn coerce(value: &TickValue, field_name: &'static str) -> Result<f64, RejectReason> {
    match value {
        TickValue::Number(n) => Ok(*n),
        TickValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| RejectReason::NonFinite(field_name)),
        TickValue::Null => Err(RejectReason::MissingField(field_name)),
    }
}

/// Canonicalization is idempotent: `Firewall(Candle->Tick(c)) == c`
/// (spec.md §8).
pub fn now_plus(ms: i64) -> i64 {
    (Utc::now() + Duration::milliseconds(ms)).timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::candle::RawTick;

    fn good_tick(ts_ms: i64) -> RawTick {
        RawTick::new()
            .set("t", ts_ms as f64)
            .set("o", 100.0)
            .set("h", 105.0)
            .set("l", 95.0)
            .set("c", 102.0)
            .set("v", 1000.0)
    }

    #[test]
    fn accepts_well_formed_tick_with_canonical_keys() {
        let fw = Firewall::new();
        let ts = Utc::now().timestamp_millis();
        let candle = fw.validate(&good_tick(ts)).unwrap();
        assert_eq!(candle.open, 100.0);
        assert_eq!(candle.volume, 1000.0);
    }

    #[test]
    fn accepts_aliased_keys_and_string_numbers() {
        let fw = Firewall::new();
        let ts = Utc::now().timestamp_millis();
        let tick = RawTick::new()
            .set("T", ts as f64)
            .set("O", "100.5")
            .set("H", "105.5")
            .set("L", "95.5")
            .set("C", "102.5")
            .set("V", "1000");
        let candle = fw.validate(&tick).unwrap();
        assert_eq!(candle.open, 100.5);
    }

    #[test]
    fn rejects_high_less_than_low() {
        let fw = Firewall::new();
        let ts = Utc::now().timestamp_millis();
        let tick = RawTick::new()
            .set("t", ts as f64)
            .set("o", 100.0)
            .set("h", 50.0)
            .set("l", 90.0)
            .set("c", 80.0)
            .set("v", 100.0);
        let result = fw.validate(&tick);
        assert!(matches!(result, Err(RejectReason::OhlcOrdering { .. })));
    }

    #[test]
    fn rejects_nan_and_infinite() {
        let fw = Firewall::new();
        let ts = Utc::now().timestamp_millis();
        let tick = RawTick::new()
            .set("t", ts as f64)
            .set("o", f64::NAN)
            .set("h", 105.0)
            .set("l", 95.0)
            .set("c", 102.0)
            .set("v", 1000.0);
        assert!(matches!(
            fw.validate(&tick),
            Err(RejectReason::NonFinite(_))
        ));
    }

    #[test]
    fn rejects_non_positive_price() {
        let fw = Firewall::new();
        let ts = Utc::now().timestamp_millis();
        let tick = RawTick::new()
            .set("t", ts as f64)
            .set("o", 0.0)
            .set("h", 105.0)
            .set("l", 95.0)
            .set("c", 102.0)
            .set("v", 1000.0);
        assert!(matches!(
            fw.validate(&tick),
            Err(RejectReason::NonPositivePrice(_))
        ));
    }

    #[test]
    fn rejects_negative_volume() {
        let fw = Firewall::new();
        let ts = Utc::now().timestamp_millis();
        let tick = good_tick(ts).set("v", -1.0);
        assert!(matches!(
            fw.validate(&tick),
            Err(RejectReason::NegativeVolume)
        ));
    }

    #[test]
    fn rejects_missing_field() {
        let fw = Firewall::new();
        let mut tick = good_tick(Utc::now().timestamp_millis());
        tick.fields.remove("v");
        assert!(matches!(
            fw.validate(&tick),
            Err(RejectReason::MissingField("volume"))
        ));
    }

    #[test]
    fn rejects_timestamp_just_past_future_boundary() {
        let fw = Firewall::new();
        let ts = now_plus(MAX_FUTURE + 1);
        let tick = good_tick(ts);
        assert!(matches!(
            fw.validate(&tick),
            Err(RejectReason::TimestampOutOfRange { .. })
        ));
    }

    #[test]
    fn accepts_timestamp_exactly_at_future_boundary() {
        let fw = Firewall::new();
        let ts = now_plus(MAX_FUTURE);
        let tick = good_tick(ts);
        assert!(fw.validate(&tick).is_ok());
    }

    #[test]
    fn candle_to_tick_round_trips_through_firewall() {
        let fw = Firewall::new();
        let original = Candle::new(Utc::now().timestamp_millis(), 100.0, 105.0, 95.0, 102.0, 1000.0);
        let tick = original.to_tick();
        let recovered = fw.validate(&tick).unwrap();
        assert_eq!(recovered, original);
    }
}
