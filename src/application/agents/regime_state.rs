//! The latest computed regime, shared from the Regime worker to the
//! Breakout and Position workers (spec §4.4 gates position sizing off
//! the regime's exposure band; spec §4.3's context carries the regime
//! label into every checker).

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::domain::regime::ExposureBand;

#[derive(Debug, Clone)]
pub struct RegimeSnapshot {
    pub label: String,
    pub exposure_band: ExposureBand,
}

impl Default for RegimeSnapshot {
    fn default() -> Self {
        RegimeSnapshot { label: "neutral".to_string(), exposure_band: ExposureBand { min_pct: 0, max_pct: 100 } }
    }
}

pub type SharedRegimeState = Arc<RwLock<RegimeSnapshot>>;

pub fn new_shared_regime_state() -> SharedRegimeState {
    Arc::new(RwLock::new(RegimeSnapshot::default()))
}
