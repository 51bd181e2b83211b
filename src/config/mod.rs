//! Configuration, split by concern and aggregated (spec.md §6 "Environment /
//! configuration surface"), mirroring the teacher's `config/mod.rs`
//! aggregator-of-sub-configs shape, narrowed to this core's five concerns.

pub mod feed_config;
pub mod indicator_config;
pub mod monitor_config;
pub mod observability_config;
pub mod risk_config;

pub use feed_config::FeedConfig;
pub use indicator_config::IndicatorConfig;
pub use monitor_config::MonitorConfig;
pub use observability_config::ObservabilityConfig;
pub use risk_config::RiskConfig;

use crate::domain::errors::ConfigError;

/// The frozen settings surface, loaded once at process startup. Both
/// binaries (`feed`, `brain`) build one of these and refuse to start on
/// any accumulated validation error (spec.md §7 "Configuration-invalid at
/// startup ... fatal with a full error list").
#[derive(Debug, Clone)]
pub struct Config {
    pub feed: FeedConfig,
    pub indicators: IndicatorConfig,
    pub risk: RiskConfig,
    pub monitor: MonitorConfig,
    pub observability: ObservabilityConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            feed: FeedConfig::from_env(),
            indicators: IndicatorConfig::from_env(),
            risk: RiskConfig::from_env(),
            monitor: MonitorConfig::from_env(),
            observability: ObservabilityConfig::from_env(),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        self.feed.validate(&mut errors);
        self.indicators.validate(&mut errors);
        self.risk.validate(&mut errors);
        self.monitor.validate(&mut errors);
        self.observability.validate(&mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_credentials_is_a_single_accumulated_error_list() {
        std::env::remove_var("AEGIS_API_KEY");
        std::env::remove_var("AEGIS_API_SECRET");
        let config = Config {
            feed: FeedConfig::from_env(),
            indicators: IndicatorConfig::from_env(),
            risk: RiskConfig::from_env(),
            monitor: MonitorConfig::from_env(),
            observability: ObservabilityConfig::from_env(),
        };
        let result = config.validate();
        assert!(result.is_err());
        if let Err(ConfigError::Invalid(errors)) = result {
            assert!(errors.iter().any(|e| e.contains("AEGIS_API_KEY")));
            assert!(errors.iter().any(|e| e.contains("AEGIS_API_SECRET")));
        }
    }
}
