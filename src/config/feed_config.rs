//! Feed process configuration (spec.md §6 "Environment / configuration
//! surface"), grounded on the teacher's `broker_config.rs` (API key/secret
//! from env, `from_env()` + per-field validation).

use std::env;

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub api_key: String,
    pub api_secret: String,
    pub websocket_url: String,
    pub rest_url: String,
    pub symbols: Vec<String>,
    pub flush_interval_ms: u64,
    pub ping_interval_secs: u64,
    pub heartbeat_timeout_secs: u64,
    pub reconnect_backoff_ceiling_secs: u64,
    pub max_ws_shard_size: usize,
}

impl FeedConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("AEGIS_API_KEY").unwrap_or_default(),
            api_secret: env::var("AEGIS_API_SECRET").unwrap_or_default(),
            websocket_url: env::var("AEGIS_WS_URL")
                .unwrap_or_else(|_| "wss://stream.binance.com:9443".to_string()),
            rest_url: env::var("AEGIS_REST_URL")
                .unwrap_or_else(|_| "https://api.binance.com".to_string()),
            symbols: env::var("AEGIS_SYMBOLS")
                .unwrap_or_else(|_| "BTCUSDT".to_string())
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
            flush_interval_ms: parse_u64("AEGIS_FLUSH_INTERVAL_MS", 1000),
            ping_interval_secs: parse_u64("AEGIS_PING_INTERVAL_SECS", 20),
            heartbeat_timeout_secs: parse_u64("AEGIS_HEARTBEAT_TIMEOUT_SECS", 30),
            reconnect_backoff_ceiling_secs: parse_u64("AEGIS_RECONNECT_CEILING_SECS", 30),
            max_ws_shard_size: parse_u64("AEGIS_MAX_WS_SHARD_SIZE", 200) as usize,
        }
    }

    /// Accumulates problems into `errors` rather than failing fast, per
    /// spec §6/§7 ("fatal with a full error list").
    pub fn validate(&self, errors: &mut Vec<String>) {
        if self.api_key.is_empty() {
            errors.push("AEGIS_API_KEY must not be empty".to_string());
        }
        if self.api_secret.is_empty() {
            errors.push("AEGIS_API_SECRET must not be empty".to_string());
        }
        if self.symbols.is_empty() {
            errors.push("AEGIS_SYMBOLS must list at least one symbol".to_string());
        }
        if self.max_ws_shard_size == 0 || self.max_ws_shard_size < self.symbols.len() {
            errors.push(format!(
                "AEGIS_MAX_WS_SHARD_SIZE ({}) must be >= symbol count ({})",
                self.max_ws_shard_size,
                self.symbols.len()
            ));
        }
        if self.flush_interval_ms == 0 {
            errors.push("AEGIS_FLUSH_INTERVAL_MS must be positive".to_string());
        }
        if self.ping_interval_secs == 0 {
            errors.push("AEGIS_PING_INTERVAL_SECS must be positive".to_string());
        }
    }
}

pub(crate) fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub(crate) fn parse_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub(crate) fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_flags_empty_api_key() {
        let mut cfg = FeedConfig {
            api_key: String::new(),
            api_secret: "x".to_string(),
            websocket_url: "wss://x".to_string(),
            rest_url: "https://x".to_string(),
            symbols: vec!["BTCUSDT".to_string()],
            flush_interval_ms: 1000,
            ping_interval_secs: 20,
            heartbeat_timeout_secs: 30,
            reconnect_backoff_ceiling_secs: 30,
            max_ws_shard_size: 200,
        };
        let mut errors = Vec::new();
        cfg.validate(&mut errors);
        assert!(errors.iter().any(|e| e.contains("AEGIS_API_KEY")));

        cfg.api_key = "k".to_string();
        errors.clear();
        cfg.validate(&mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn validate_flags_shard_size_smaller_than_symbol_count() {
        let cfg = FeedConfig {
            api_key: "k".to_string(),
            api_secret: "s".to_string(),
            websocket_url: "wss://x".to_string(),
            rest_url: "https://x".to_string(),
            symbols: vec!["A".to_string(), "B".to_string(), "C".to_string()],
            flush_interval_ms: 1000,
            ping_interval_secs: 20,
            heartbeat_timeout_secs: 30,
            reconnect_backoff_ceiling_secs: 30,
            max_ws_shard_size: 2,
        };
        let mut errors = Vec::new();
        cfg.validate(&mut errors);
        assert!(errors.iter().any(|e| e.contains("AEGIS_MAX_WS_SHARD_SIZE")));
    }
}
