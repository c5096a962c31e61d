//! Provider configuration entity: one row per registered provider
//! implementation, keyed by `(domain, priority)` for factory selection.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Historical,
    Realtime,
    Futures,
}

impl Domain {
    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Historical => "historical",
            Domain::Realtime => "realtime",
            Domain::Futures => "futures",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThrottleProfile {
    pub calls_per_minute: u32,
    pub burst_size: u32,
    pub min_delay_seconds: f64,
}

impl Default for ThrottleProfile {
    fn default() -> Self {
        ThrottleProfile {
            calls_per_minute: 60,
            burst_size: 5,
            min_delay_seconds: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: i64,
    pub name: String,
    pub domain: Domain,
    pub implementation: String,
    pub priority: u32,
    pub throttle: ThrottleProfile,
    /// Opaque implementation-specific settings, carried as JSON (spec §3's
    /// "settings blob").
    pub settings: serde_json::Value,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCredential {
    pub provider_id: i64,
    pub key: String,
    pub value: String,
}
