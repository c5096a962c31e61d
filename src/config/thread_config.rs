//! Worker thread cadence config (spec §6 `threads`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct ThreadConfig {
    pub breakout_interval_secs: u64,
    pub position_interval_secs: u64,
    pub regime_interval_secs: u64,
    pub maintenance_interval_secs: u64,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        ThreadConfig {
            breakout_interval_secs: 60,
            position_interval_secs: 30,
            regime_interval_secs: 300,
            maintenance_interval_secs: 300,
        }
    }
}
