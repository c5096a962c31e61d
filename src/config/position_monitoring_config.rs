//! Thresholds for the Position Monitor's checker chain (spec §6
//! `position_monitoring`). One sub-struct per checker, composed the way
//! the teacher composes `BrokerEnvConfig`/`RiskEnvConfig` into `Config`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct StopLossConfig {
    pub warning_buffer_pct: f64,
}

impl Default for StopLossConfig {
    fn default() -> Self {
        StopLossConfig { warning_buffer_pct: 2.0 }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct TrailingStopConfig {
    pub activation_pct: f64,
    pub trail_pct: f64,
}

impl Default for TrailingStopConfig {
    fn default() -> Self {
        TrailingStopConfig {
            activation_pct: 15.0,
            trail_pct: 8.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct EightWeekHoldConfig {
    pub gain_threshold_pct: f64,
    pub trigger_window_days: i64,
    pub hold_weeks: i64,
}

impl Default for EightWeekHoldConfig {
    fn default() -> Self {
        EightWeekHoldConfig {
            gain_threshold_pct: 20.0,
            trigger_window_days: 21,
            hold_weeks: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct PyramidConfig {
    pub min_bars_since_entry: i64,
    pub pullback_ema_tolerance_pct: f64,
    pub p1_ready_min_pct: f64,
    pub p1_ready_max_pct: f64,
    pub p2_ready_min_pct: f64,
    pub p2_ready_max_pct: f64,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        PyramidConfig {
            min_bars_since_entry: 2,
            pullback_ema_tolerance_pct: 1.0,
            p1_ready_min_pct: 0.0,
            p1_ready_max_pct: 5.0,
            p2_ready_min_pct: 5.0,
            p2_ready_max_pct: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct TechnicalConfig {
    pub ma_50_warning_pct: f64,
    pub ma_50_volume_confirm: f64,
    pub ema_21_consecutive_days: u32,
}

impl Default for TechnicalConfig {
    fn default() -> Self {
        TechnicalConfig {
            ma_50_warning_pct: 2.0,
            ma_50_volume_confirm: 1.5,
            ema_21_consecutive_days: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct ClimaxTopConfig {
    pub volume_threshold: f64,
    pub spread_pct: f64,
    pub gap_pct: f64,
    pub min_gain_pct: f64,
    pub min_score: f64,
    pub high_conviction_score: f64,
}

impl Default for ClimaxTopConfig {
    fn default() -> Self {
        ClimaxTopConfig {
            volume_threshold: 2.5,
            spread_pct: 4.0,
            gap_pct: 2.0,
            min_gain_pct: 15.0,
            min_score: 50.0,
            high_conviction_score: 75.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    pub time_threshold_days: i64,
    pub deep_base_threshold_pct: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        HealthConfig {
            time_threshold_days: 180,
            deep_base_threshold_pct: 33.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct EarningsConfig {
    pub warning_days: i64,
    pub critical_days: i64,
    pub negative_threshold_pct: f64,
    pub reduce_threshold_pct: f64,
}

impl Default for EarningsConfig {
    fn default() -> Self {
        EarningsConfig {
            warning_days: 10,
            critical_days: 5,
            negative_threshold_pct: 2.0,
            reduce_threshold_pct: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtendedConfig {
    pub warning_pct: f64,
    pub danger_pct: f64,
}

impl Default for ExtendedConfig {
    fn default() -> Self {
        ExtendedConfig {
            warning_pct: 5.0,
            danger_pct: 10.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReentryConfig {
    pub bounce_lookback_bars: usize,
    pub bounce_tolerance_pct: f64,
}

impl Default for ReentryConfig {
    fn default() -> Self {
        ReentryConfig {
            bounce_lookback_bars: 10,
            bounce_tolerance_pct: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AltEntryConfig {
    pub extended_marker_pct: f64,
    pub marker_expiry_days: i64,
    pub min_volume_ratio: f64,
}

impl Default for AltEntryConfig {
    fn default() -> Self {
        AltEntryConfig {
            extended_marker_pct: 5.0,
            marker_expiry_days: 30,
            min_volume_ratio: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PositionMonitoringConfig {
    pub stop_loss: StopLossConfig,
    pub trailing_stop: TrailingStopConfig,
    pub eight_week_hold: EightWeekHoldConfig,
    pub tp1_target_pct: f64,
    pub tp2_target_pct: f64,
    pub pyramid: PyramidConfig,
    pub technical: TechnicalConfig,
    pub climax_top: ClimaxTopConfig,
    pub health: HealthConfig,
    pub earnings: EarningsConfig,
    pub extended: ExtendedConfig,
    pub reentry: ReentryConfig,
    pub alt_entry: AltEntryConfig,
    /// subtype name -> cooldown minutes, overriding the global default.
    pub cooldowns: HashMap<String, u64>,
}

impl Default for PositionMonitoringConfig {
    fn default() -> Self {
        PositionMonitoringConfig {
            stop_loss: StopLossConfig::default(),
            trailing_stop: TrailingStopConfig::default(),
            eight_week_hold: EightWeekHoldConfig::default(),
            tp1_target_pct: 20.0,
            tp2_target_pct: 25.0,
            pyramid: PyramidConfig::default(),
            technical: TechnicalConfig::default(),
            climax_top: ClimaxTopConfig::default(),
            health: HealthConfig::default(),
            earnings: EarningsConfig::default(),
            extended: ExtendedConfig::default(),
            reentry: ReentryConfig::default(),
            alt_entry: AltEntryConfig::default(),
            cooldowns: HashMap::new(),
        }
    }
}
