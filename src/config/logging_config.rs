//! Logging config (spec §6 `logging`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub base_dir: String,
    pub console_level: String,
    pub retention_days: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            base_dir: "./logs".to_string(),
            console_level: "info".to_string(),
            retention_days: 14,
        }
    }
}
