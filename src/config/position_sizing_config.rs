//! Position sizing config (spec §6 `position_sizing`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct PositionSizingConfig {
    pub portfolio_value: f64,
    pub account_risk_pct: f64,
    pub max_position_pct: f64,
    pub initial_pct: f64,
    pub pyramid1_pct: f64,
    pub pyramid2_pct: f64,
}

impl Default for PositionSizingConfig {
    fn default() -> Self {
        PositionSizingConfig {
            portfolio_value: 100_000.0,
            account_risk_pct: 1.0,
            max_position_pct: 20.0,
            initial_pct: 10.0,
            pyramid1_pct: 5.0,
            pyramid2_pct: 5.0,
        }
    }
}
