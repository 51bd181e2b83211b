//! Risk Gate and Brain confidence-threshold configuration (spec.md §4.9,
//! §4.10), grounded on the teacher's `domain/config/risk_config.rs`
//! (validated value object, `thiserror` errors) and `risk_env_config.rs`
//! (env parsing). Resolves REDESIGN FLAGS §1 and §2 (see DESIGN.md): the
//! three confidence thresholds the spec names (0.30 permissive / 0.55 / 0.60
//! strict) collapse into one configured value plus one named permissive
//! override, instead of three independently-tuned constants.

use super::feed_config::{parse_f64, parse_u64};

#[derive(Debug, Clone)]
pub struct RiskConfig {
    /// Fraction of balance a single position's notional may consume
    /// (spec.md §4.10 `MAX_TRADE_RISK_FRACTION`, default 2%).
    pub max_trade_risk_fraction: f64,
    /// Minimum confidence the Brain must emit for the Risk Gate to admit a
    /// signal (spec.md §4.10 `min_confidence_for_trade`) — in steady state
    /// this is the single collapsed threshold (Open Question 2).
    pub min_confidence_for_trade: f64,
    /// The same threshold, relaxed during cold-start warm-up (spec.md §4.9
    /// "default 0.30 in permissive mode, 0.60 in strict mode").
    pub permissive_confidence_threshold: f64,
    /// Unconditional hard-kill PnL-fraction floor (spec.md §4.11 Priority 0,
    /// default 0.99).
    pub risk_kill_threshold: f64,
}

impl RiskConfig {
    pub fn from_env() -> Self {
        Self {
            max_trade_risk_fraction: parse_f64("AEGIS_MAX_TRADE_RISK_FRACTION", 0.02),
            min_confidence_for_trade: parse_f64("AEGIS_MIN_CONFIDENCE_FOR_TRADE", 0.60),
            permissive_confidence_threshold: parse_f64(
                "AEGIS_PERMISSIVE_CONFIDENCE_THRESHOLD",
                0.30,
            ),
            risk_kill_threshold: parse_f64("AEGIS_RISK_KILL_THRESHOLD", 0.99),
        }
    }

    /// The Brain's minimum window length before scoring is attempted:
    /// 20 candles in steady state, 5 during warm-up (spec.md §4.9 step 5).
    pub fn min_window_steady(&self) -> usize {
        parse_u64("AEGIS_MIN_WINDOW_STEADY", 20) as usize
    }

    pub fn min_window_warmup(&self) -> usize {
        parse_u64("AEGIS_MIN_WINDOW_WARMUP", 5) as usize
    }

    pub fn validate(&self, errors: &mut Vec<String>) {
        for (name, value) in [
            ("AEGIS_MAX_TRADE_RISK_FRACTION", self.max_trade_risk_fraction),
            ("AEGIS_MIN_CONFIDENCE_FOR_TRADE", self.min_confidence_for_trade),
            (
                "AEGIS_PERMISSIVE_CONFIDENCE_THRESHOLD",
                self.permissive_confidence_threshold,
            ),
            ("AEGIS_RISK_KILL_THRESHOLD", self.risk_kill_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(format!("{name} ({value}) must be in [0, 1]"));
            }
        }
        if self.permissive_confidence_threshold > self.min_confidence_for_trade {
            errors.push(format!(
                "AEGIS_PERMISSIVE_CONFIDENCE_THRESHOLD ({}) must be <= AEGIS_MIN_CONFIDENCE_FOR_TRADE ({})",
                self.permissive_confidence_threshold, self.min_confidence_for_trade
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_fraction_outside_unit_interval() {
        let mut cfg = RiskConfig::from_env();
        cfg.max_trade_risk_fraction = 1.5;
        let mut errors = Vec::new();
        cfg.validate(&mut errors);
        assert!(errors.iter().any(|e| e.contains("MAX_TRADE_RISK_FRACTION")));
    }

    #[test]
    fn rejects_permissive_threshold_above_strict_threshold() {
        let mut cfg = RiskConfig::from_env();
        cfg.permissive_confidence_threshold = 0.9;
        cfg.min_confidence_for_trade = 0.6;
        let mut errors = Vec::new();
        cfg.validate(&mut errors);
        assert!(errors.iter().any(|e| e.contains("PERMISSIVE_CONFIDENCE_THRESHOLD")));
    }
}
