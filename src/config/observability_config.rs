//! Logging and persistence configuration, grounded on the teacher's
//! `observability_config.rs` (log level/format from env) generalized with
//! the persistence-rotation settings spec.md §6 names.

use super::feed_config::{parse_bool, parse_u64};
use std::env;

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_json: bool,
    pub trade_log_path: String,
    pub experience_log_path: String,
    pub rotation_threshold_bytes: u64,
    pub gzip_rotated_files: bool,
}

impl ObservabilityConfig {
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("AEGIS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: parse_bool("AEGIS_LOG_JSON", false),
            trade_log_path: env::var("AEGIS_TRADE_LOG_PATH")
                .unwrap_or_else(|_| "./data/trades.ndjson".to_string()),
            experience_log_path: env::var("AEGIS_EXPERIENCE_LOG_PATH")
                .unwrap_or_else(|_| "./data/experience.ndjson".to_string()),
            rotation_threshold_bytes: parse_u64("AEGIS_ROTATION_THRESHOLD_BYTES", 50 * 1024 * 1024),
            gzip_rotated_files: parse_bool("AEGIS_GZIP_ROTATED_FILES", true),
        }
    }

    pub fn validate(&self, errors: &mut Vec<String>) {
        for (name, path) in [
            ("AEGIS_TRADE_LOG_PATH", &self.trade_log_path),
            ("AEGIS_EXPERIENCE_LOG_PATH", &self.experience_log_path),
        ] {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        errors.push(format!("{name} parent directory {parent:?} is not writable: {e}"));
                    }
                }
            }
        }
        if self.rotation_threshold_bytes == 0 {
            errors.push("AEGIS_ROTATION_THRESHOLD_BYTES must be positive".to_string());
        }
    }
}
