//! Top-level configuration: a YAML document (spec §6) layered under
//! environment-variable overrides for secrets, composed the way the
//! teacher's `Config::from_env()` flattens per-domain `*EnvConfig`
//! structs together.

mod alert_config;
mod breakout_scoring_config;
mod logging_config;
mod market_regime_config;
mod position_monitoring_config;
mod position_sizing_config;
mod provider_env_config;
mod thread_config;

pub use alert_config::{AlertConfig, DiscordConfig};
pub use breakout_scoring_config::BreakoutScoringConfig;
pub use logging_config::LoggingConfig;
pub use market_regime_config::MarketRegimeConfig;
pub use position_monitoring_config::{
    AltEntryConfig, ClimaxTopConfig, EarningsConfig, EightWeekHoldConfig, ExtendedConfig,
    HealthConfig, PositionMonitoringConfig, PyramidConfig, ReentryConfig, StopLossConfig,
    TechnicalConfig, TrailingStopConfig,
};
pub use position_sizing_config::PositionSizingConfig;
pub use provider_env_config::{IbkrConfig, MarketDataConfig, ReconnectConfig};
pub use thread_config::ThreadConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub ibkr: IbkrConfig,
    pub market_data: MarketDataConfig,
    pub threads: ThreadConfig,
    pub alerts: AlertConfig,
    pub position_monitoring: PositionMonitoringConfig,
    pub position_sizing: PositionSizingConfig,
    pub breakout_scoring: BreakoutScoringConfig,
    pub market_regime: MarketRegimeConfig,
    pub logging: LoggingConfig,
    pub database_url: String,
    pub ipc_socket_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ibkr: IbkrConfig::default(),
            market_data: MarketDataConfig::default(),
            threads: ThreadConfig::default(),
            alerts: AlertConfig::default(),
            position_monitoring: PositionMonitoringConfig::default(),
            position_sizing: PositionSizingConfig::default(),
            breakout_scoring: BreakoutScoringConfig::default(),
            market_regime: MarketRegimeConfig::default(),
            logging: LoggingConfig::default(),
            database_url: "sqlite://./data/canslim_sentry.db".to_string(),
            ipc_socket_path: "/tmp/canslim-sentry.sock".to_string(),
        }
    }
}

impl Config {
    /// Loads the YAML document at `path` if present, then layers
    /// environment-variable overrides for secrets (API keys, hosts) on
    /// top — mirroring the teacher's `from_env()` composition but with a
    /// file base, since spec §6 specifies a hierarchical YAML document.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let mut config = if path_ref.exists() {
            let contents = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
                path: path_ref.display().to_string(),
                source,
            })?;
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path_ref.display().to_string(),
                source,
            })?
        } else {
            Config::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        self.ibkr = IbkrConfig::from_env();
        self.market_data = MarketDataConfig::from_env();
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database_url = url;
        }
        if let Ok(path) = std::env::var("IPC_SOCKET_PATH") {
            self.ipc_socket_path = path;
        }
        if let Ok(webhook) = std::env::var("DISCORD_DEFAULT_WEBHOOK") {
            self.alerts.discord.default_webhook = Some(webhook);
            self.alerts.discord.enabled = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_routing() {
        let config = Config::default();
        assert_eq!(
            config.alerts.alert_routing.get("stop").map(String::as_str),
            Some("position")
        );
        assert_eq!(config.threads.position_interval_secs, 30);
    }

    #[test]
    fn load_falls_back_to_default_when_missing() {
        let config = Config::load("/nonexistent/path/config.yaml").unwrap();
        assert_eq!(config.threads.breakout_interval_secs, 60);
    }
}
