//! Provider connection config: `ibkr` and `market_data`/`polygon` sections
//! (spec §6), each with an `from_env()` override layer matching the
//! teacher's per-domain `*EnvConfig::from_env()` convention.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub enabled: bool,
    pub initial_delay_secs: u64,
    pub max_delay_secs: u64,
    pub backoff_factor: f64,
    pub max_attempts: Option<u32>,
    pub health_check_interval_secs: u64,
    pub gateway_restart_delay_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        ReconnectConfig {
            enabled: true,
            initial_delay_secs: 2,
            max_delay_secs: 120,
            backoff_factor: 2.0,
            max_attempts: None,
            health_check_interval_secs: 30,
            gateway_restart_delay_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IbkrConfig {
    pub host: String,
    pub port: u16,
    pub client_id_base: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub reconnect: ReconnectConfig,
}

impl Default for IbkrConfig {
    fn default() -> Self {
        IbkrConfig {
            host: "127.0.0.1".to_string(),
            port: 7497,
            client_id_base: 100,
            timeout_secs: 10,
            max_retries: 3,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl IbkrConfig {
    pub fn from_env() -> Self {
        let mut config = IbkrConfig::default();
        if let Ok(host) = std::env::var("IBKR_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("IBKR_PORT") {
            if let Ok(parsed) = port.parse() {
                config.port = parsed;
            }
        }
        config
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MarketDataConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub rate_limit_delay_ms: u64,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        MarketDataConfig {
            api_key: String::new(),
            base_url: "https://api.polygon.io".to_string(),
            timeout_secs: 10,
            rate_limit_delay_ms: 200,
        }
    }
}

impl MarketDataConfig {
    pub fn from_env() -> Self {
        let mut config = MarketDataConfig::default();
        if let Ok(key) = std::env::var("POLYGON_API_KEY") {
            config.api_key = key;
        }
        if let Ok(url) = std::env::var("POLYGON_BASE_URL") {
            config.base_url = url;
        }
        config
    }
}
