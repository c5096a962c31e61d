//! Alert routing/cooldown/suppression config (spec §6 `alerts`, `discord`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub webhooks: HashMap<String, String>,
    pub default_webhook: Option<String>,
    pub enabled: bool,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        DiscordConfig {
            webhooks: HashMap::new(),
            default_webhook: None,
            enabled: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertConfig {
    pub enable_cooldown: bool,
    pub cooldown_minutes: u64,
    pub enable_suppression: bool,
    /// alert_type -> channel name.
    pub alert_routing: HashMap<String, String>,
    /// subtype names suppressed regardless of cooldown state.
    pub suppressed_subtypes: Vec<String>,
    pub discord: DiscordConfig,
    pub sink_rate_limit_per_minute: u32,
    pub sink_rate_limit_window_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        let mut routing = HashMap::new();
        for (t, c) in [
            ("stop", "position"),
            ("profit", "position"),
            ("pyramid", "position"),
            ("technical", "position"),
            ("health", "position"),
            ("add", "position"),
            ("alt_entry", "position"),
            ("market", "market"),
            ("system", "system"),
        ] {
            routing.insert(t.to_string(), c.to_string());
        }
        AlertConfig {
            enable_cooldown: true,
            cooldown_minutes: 60,
            enable_suppression: true,
            alert_routing: routing,
            suppressed_subtypes: Vec::new(),
            discord: DiscordConfig::default(),
            sink_rate_limit_per_minute: 30,
            sink_rate_limit_window_secs: 60,
        }
    }
}
