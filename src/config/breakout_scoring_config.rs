//! Breakout-scoring thresholds for the watchlist (state-0) evaluation
//! the Breakout worker runs each cycle (spec §4.5). Not named as its own
//! top-level section in spec §6, but kept config-driven like every other
//! checker's thresholds rather than hard-coded.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakoutScoringConfig {
    pub min_volume_ratio: f64,
    pub max_pivot_extension_pct: f64,
    pub min_composite_rating: u8,
    pub min_rs_rating: u8,
    pub min_score: f64,
    pub high_conviction_score: f64,
}

impl Default for BreakoutScoringConfig {
    fn default() -> Self {
        BreakoutScoringConfig {
            min_volume_ratio: 1.4,
            max_pivot_extension_pct: 5.0,
            min_composite_rating: 80,
            min_rs_rating: 80,
            min_score: 60.0,
            high_conviction_score: 80.0,
        }
    }
}
