//! Market regime snapshot types: the daily output of the Regime Calculator.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendLabel {
    Improving,
    Worsening,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketPhase {
    ConfirmedUptrend,
    RallyAttempt,
    UptrendUnderPressure,
    MarketInCorrection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimeLabel {
    Bullish,
    Neutral,
    Bearish,
}

impl RegimeLabel {
    /// bullish (> +0.5), neutral ([-0.5, +0.5]), bearish (< -0.5) per spec §4.4.
    pub fn from_score(score: f64) -> Self {
        if score > 0.5 {
            RegimeLabel::Bullish
        } else if score < -0.5 {
            RegimeLabel::Bearish
        } else {
            RegimeLabel::Neutral
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RegimeLabel::Bullish => "bullish",
            RegimeLabel::Neutral => "neutral",
            RegimeLabel::Bearish => "bearish",
        }
    }
}

/// Recommended long-equity exposure band, derived from total D-day count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureBand {
    pub min_pct: u8,
    pub max_pct: u8,
}

impl ExposureBand {
    /// Table from spec §4.4.
    pub fn from_total_distribution_days(total: u32) -> Self {
        match total {
            0..=4 => ExposureBand { min_pct: 80, max_pct: 100 },
            5..=6 => ExposureBand { min_pct: 70, max_pct: 90 },
            7..=8 => ExposureBand { min_pct: 60, max_pct: 80 },
            9..=10 => ExposureBand { min_pct: 40, max_pct: 60 },
            11..=12 => ExposureBand { min_pct: 20, max_pct: 40 },
            _ => ExposureBand { min_pct: 0, max_pct: 20 },
        }
    }
}

/// Per-index distribution-day tracking, over the rolling 25-day window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexDistributionDays {
    pub count: u32,
    pub five_day_delta: i32,
    pub trend: Option<TrendLabel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuturesSnapshot {
    pub es_pct: f64,
    pub nq_pct: f64,
    pub ym_pct: f64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRegimeAlert {
    pub date: NaiveDate,
    pub spy_distribution_days: IndexDistributionDays,
    pub qqq_distribution_days: IndexDistributionDays,
    pub trend_label: TrendLabel,
    pub market_phase: MarketPhase,
    pub composite_score: f64,
    pub regime_label: RegimeLabel,
    pub futures: Option<FuturesSnapshot>,
    pub exposure_band: ExposureBand,
    pub alert_sent: bool,
}

impl MarketRegimeAlert {
    pub fn total_distribution_days(&self) -> u32 {
        self.spy_distribution_days.count + self.qqq_distribution_days.count
    }
}

/// Rally-attempt / follow-through-day state carried across regime cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FollowThroughState {
    pub rally_day: Option<u32>,
    pub rally_low: Option<f64>,
    pub most_recent_ftd: Option<NaiveDate>,
    pub failed_rally_count: u32,
    pub successful_ftd_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposure_band_matches_table() {
        assert_eq!(
            ExposureBand::from_total_distribution_days(3),
            ExposureBand { min_pct: 80, max_pct: 100 }
        );
        assert_eq!(
            ExposureBand::from_total_distribution_days(21),
            ExposureBand { min_pct: 0, max_pct: 20 }
        );
        assert_eq!(
            ExposureBand::from_total_distribution_days(9),
            ExposureBand { min_pct: 40, max_pct: 60 }
        );
    }

    #[test]
    fn regime_label_thresholds() {
        assert_eq!(RegimeLabel::from_score(0.8), RegimeLabel::Bullish);
        assert_eq!(RegimeLabel::from_score(-0.8), RegimeLabel::Bearish);
        assert_eq!(RegimeLabel::from_score(0.0), RegimeLabel::Neutral);
        assert_eq!(RegimeLabel::from_score(0.5), RegimeLabel::Neutral);
    }

    #[test]
    fn scenario_s5_regime_flip() {
        let alert = MarketRegimeAlert {
            date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            spy_distribution_days: IndexDistributionDays {
                count: 11,
                five_day_delta: 2,
                trend: Some(TrendLabel::Worsening),
            },
            qqq_distribution_days: IndexDistributionDays {
                count: 10,
                five_day_delta: 1,
                trend: Some(TrendLabel::Worsening),
            },
            trend_label: TrendLabel::Worsening,
            market_phase: MarketPhase::MarketInCorrection,
            composite_score: -0.8,
            regime_label: RegimeLabel::from_score(-0.8),
            futures: None,
            exposure_band: ExposureBand::from_total_distribution_days(21),
            alert_sent: false,
        };
        assert_eq!(alert.regime_label, RegimeLabel::Bearish);
        assert_eq!(alert.exposure_band, ExposureBand { min_pct: 0, max_pct: 20 });
        assert_eq!(alert.total_distribution_days(), 21);
    }
}
