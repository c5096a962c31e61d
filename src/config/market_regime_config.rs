//! Regime calculator scoring weights/thresholds (spec §6 `market_regime`,
//! §4.4).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct MarketRegimeConfig {
    pub distribution_day_window: u32,
    pub distribution_day_decline_pct: f64,
    pub follow_through_min_day: u32,
    pub follow_through_min_pct: f64,
    pub weight_distribution_days: f64,
    pub weight_follow_through: f64,
    pub weight_index_trend: f64,
    pub weight_futures: f64,
}

impl Default for MarketRegimeConfig {
    fn default() -> Self {
        MarketRegimeConfig {
            distribution_day_window: 25,
            distribution_day_decline_pct: 0.2,
            follow_through_min_day: 4,
            follow_through_min_pct: 1.2,
            weight_distribution_days: 0.4,
            weight_follow_through: 0.3,
            weight_index_trend: 0.2,
            weight_futures: 0.1,
        }
    }
}
