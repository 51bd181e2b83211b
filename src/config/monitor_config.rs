//! Position Monitor configuration (spec.md §4.11), grounded on the
//! teacher's `strategy_config.rs` RR-ratio/threshold fields and
//! `trailing_stops.rs`'s ATR-multiplier constant.

use super::feed_config::parse_f64;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Scenario (a): drop in a re-scored metric vs. the 5-minute-prior
    /// snapshot that forces a profit take, when already in profit.
    pub forced_profit_take_drop_fraction: f64,
    /// Scenario (b): smart-hold rebound-probability floor.
    pub smart_hold_rebound_probability: f64,
    /// Scenario (b): smart-hold current-confidence floor.
    pub smart_hold_confidence_floor: f64,
    /// Scenario (c): entry-reason-expired price-move threshold.
    pub entry_expired_price_move_fraction: f64,
    /// Scenario (c): entry-reason-expired max hold duration, in hours.
    pub entry_expired_max_hold_hours: f64,
    /// Scenario (c)/(d): confidence floors below which an expired/counter-
    /// trend entry reason actually triggers a close.
    pub entry_expired_confidence_ceiling: f64,
    pub counter_trend_confidence_ceiling: f64,
    /// Scenario (e): trailing take-profit activation profit floor.
    pub trailing_tp_profit_floor: f64,
    pub trailing_tp_trend_continuation_floor: f64,
    pub trailing_tp_win_probability_floor: f64,
    /// Scenario (e): retracement fraction that triggers the trailing stop
    /// once active (spec.md: "5% retracement-triggered").
    pub trailing_tp_retracement_fraction: f64,
    /// Market-context EMA periods used to reconstruct trend (spec.md §4.11
    /// step 4 "EMA20/EMA50 crossover").
    pub context_ema_fast_period: usize,
    pub context_ema_slow_period: usize,
    /// Scheduler tick cadence, milliseconds.
    pub tick_interval_ms: u64,
}

impl MonitorConfig {
    pub fn from_env() -> Self {
        Self {
            forced_profit_take_drop_fraction: parse_f64("AEGIS_FORCED_PROFIT_TAKE_DROP", 0.20),
            smart_hold_rebound_probability: parse_f64("AEGIS_SMART_HOLD_REBOUND_PROB", 0.70),
            smart_hold_confidence_floor: parse_f64("AEGIS_SMART_HOLD_CONFIDENCE", 0.80),
            entry_expired_price_move_fraction: parse_f64("AEGIS_ENTRY_EXPIRED_PRICE_MOVE", 0.02),
            entry_expired_max_hold_hours: parse_f64("AEGIS_ENTRY_EXPIRED_MAX_HOLD_HOURS", 48.0),
            entry_expired_confidence_ceiling: parse_f64("AEGIS_ENTRY_EXPIRED_CONFIDENCE_CEILING", 0.70),
            counter_trend_confidence_ceiling: parse_f64("AEGIS_COUNTER_TREND_CONFIDENCE_CEILING", 0.80),
            trailing_tp_profit_floor: parse_f64("AEGIS_TRAILING_TP_PROFIT_FLOOR", 0.20),
            trailing_tp_trend_continuation_floor: parse_f64("AEGIS_TRAILING_TP_TREND_FLOOR", 0.70),
            trailing_tp_win_probability_floor: parse_f64("AEGIS_TRAILING_TP_WIN_PROB_FLOOR", 0.80),
            trailing_tp_retracement_fraction: parse_f64("AEGIS_TRAILING_TP_RETRACEMENT", 0.05),
            context_ema_fast_period: super::feed_config::parse_u64("AEGIS_CONTEXT_EMA_FAST", 20) as usize,
            context_ema_slow_period: super::feed_config::parse_u64("AEGIS_CONTEXT_EMA_SLOW", 50) as usize,
            tick_interval_ms: super::feed_config::parse_u64("AEGIS_MONITOR_TICK_INTERVAL_MS", 1000),
        }
    }

    pub fn validate(&self, errors: &mut Vec<String>) {
        if self.context_ema_fast_period >= self.context_ema_slow_period {
            errors.push(format!(
                "AEGIS_CONTEXT_EMA_FAST ({}) must be < AEGIS_CONTEXT_EMA_SLOW ({})",
                self.context_ema_fast_period, self.context_ema_slow_period
            ));
        }
        if self.tick_interval_ms == 0 {
            errors.push("AEGIS_MONITOR_TICK_INTERVAL_MS must be positive".to_string());
        }
        for (name, value) in [
            ("AEGIS_SMART_HOLD_REBOUND_PROB", self.smart_hold_rebound_probability),
            ("AEGIS_SMART_HOLD_CONFIDENCE", self.smart_hold_confidence_floor),
            ("AEGIS_ENTRY_EXPIRED_CONFIDENCE_CEILING", self.entry_expired_confidence_ceiling),
            ("AEGIS_COUNTER_TREND_CONFIDENCE_CEILING", self.counter_trend_confidence_ceiling),
            ("AEGIS_TRAILING_TP_WIN_PROB_FLOOR", self.trailing_tp_win_probability_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(format!("{name} ({value}) must be in [0, 1]"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_context_ema_fast_not_less_than_slow() {
        let mut cfg = MonitorConfig::from_env();
        cfg.context_ema_fast_period = 50;
        cfg.context_ema_slow_period = 20;
        let mut errors = Vec::new();
        cfg.validate(&mut errors);
        assert!(errors.iter().any(|e| e.contains("CONTEXT_EMA_FAST")));
    }
}
