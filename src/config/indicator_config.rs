//! Indicator Engine configuration (spec.md §4.5), grounded on the teacher's
//! `strategy_config.rs` (EMA fast/slow, RSI oversold/overbought periods
//! parsed from env with `fast < slow` / `oversold < overbought` validation).

use super::feed_config::{parse_bool, parse_u64};

#[derive(Debug, Clone)]
pub struct IndicatorConfig {
    pub ema_fast_period: usize,
    pub ema_slow_period: usize,
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub atr_period: usize,
    pub adx_period: usize,
    pub bollinger_period: usize,
    pub bollinger_std_dev: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub cache_enabled: bool,
}

impl IndicatorConfig {
    pub fn from_env() -> Self {
        Self {
            ema_fast_period: parse_u64("AEGIS_EMA_FAST_PERIOD", 20) as usize,
            ema_slow_period: parse_u64("AEGIS_EMA_SLOW_PERIOD", 50) as usize,
            rsi_period: parse_u64("AEGIS_RSI_PERIOD", 14) as usize,
            rsi_oversold: super::feed_config::parse_f64("AEGIS_RSI_OVERSOLD", 30.0),
            rsi_overbought: super::feed_config::parse_f64("AEGIS_RSI_OVERBOUGHT", 70.0),
            atr_period: parse_u64("AEGIS_ATR_PERIOD", 14) as usize,
            adx_period: parse_u64("AEGIS_ADX_PERIOD", 14) as usize,
            bollinger_period: parse_u64("AEGIS_BOLLINGER_PERIOD", 20) as usize,
            bollinger_std_dev: super::feed_config::parse_f64("AEGIS_BOLLINGER_STD_DEV", 2.0),
            macd_fast: parse_u64("AEGIS_MACD_FAST", 12) as usize,
            macd_slow: parse_u64("AEGIS_MACD_SLOW", 26) as usize,
            macd_signal: parse_u64("AEGIS_MACD_SIGNAL", 9) as usize,
            cache_enabled: parse_bool("AEGIS_INDICATOR_CACHE_ENABLED", true),
        }
    }

    pub fn validate(&self, errors: &mut Vec<String>) {
        if self.ema_fast_period >= self.ema_slow_period {
            errors.push(format!(
                "AEGIS_EMA_FAST_PERIOD ({}) must be < AEGIS_EMA_SLOW_PERIOD ({})",
                self.ema_fast_period, self.ema_slow_period
            ));
        }
        if self.rsi_oversold >= self.rsi_overbought {
            errors.push(format!(
                "AEGIS_RSI_OVERSOLD ({}) must be < AEGIS_RSI_OVERBOUGHT ({})",
                self.rsi_oversold, self.rsi_overbought
            ));
        }
        if self.macd_fast >= self.macd_slow {
            errors.push(format!(
                "AEGIS_MACD_FAST ({}) must be < AEGIS_MACD_SLOW ({})",
                self.macd_fast, self.macd_slow
            ));
        }
        for (name, value) in [
            ("AEGIS_RSI_PERIOD", self.rsi_period),
            ("AEGIS_ATR_PERIOD", self.atr_period),
            ("AEGIS_ADX_PERIOD", self.adx_period),
            ("AEGIS_BOLLINGER_PERIOD", self.bollinger_period),
        ] {
            if value == 0 {
                errors.push(format!("{name} must be positive"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_fast_ema_not_less_than_slow() {
        let mut cfg = IndicatorConfig::from_env();
        cfg.ema_fast_period = 50;
        cfg.ema_slow_period = 50;
        let mut errors = Vec::new();
        cfg.validate(&mut errors);
        assert!(errors.iter().any(|e| e.contains("EMA_FAST_PERIOD")));
    }

    #[test]
    fn rejects_oversold_not_less_than_overbought() {
        let mut cfg = IndicatorConfig::from_env();
        cfg.rsi_oversold = 75.0;
        cfg.rsi_overbought = 70.0;
        let mut errors = Vec::new();
        cfg.validate(&mut errors);
        assert!(errors.iter().any(|e| e.contains("RSI_OVERSOLD")));
    }
}
