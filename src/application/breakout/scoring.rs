//! Breakout scoring: a weighted composite over volume confirmation,
//! proximity to pivot, and published CANSLIM ratings, in the same
//! point-bucket style as `MaChecker`'s climax-top score (spec §4.3
//! checker 4) — reused here for the watchlist side of the system
//! instead of the in-position side.

use rust_decimal::Decimal;

use crate::config::BreakoutScoringConfig;
use crate::domain::position::Position;
use crate::domain::providers::ports::Quote;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BreakoutScoreBreakdown {
    pub volume_component: f64,
    pub pivot_extension_component: f64,
    pub composite_rating_component: f64,
    pub rs_rating_component: f64,
    pub total: f64,
}

pub struct BreakoutScorer {
    config: BreakoutScoringConfig,
}

impl BreakoutScorer {
    pub fn new(config: BreakoutScoringConfig) -> Self {
        BreakoutScorer { config }
    }

    /// Scores one watchlist symbol against the current quote. Returns
    /// `None` when price hasn't cleared the pivot at all — there is no
    /// breakout to score yet.
    pub fn score(&self, position: &Position, quote: &Quote) -> Option<BreakoutScoreBreakdown> {
        if quote.last < position.pivot {
            return None;
        }

        let mut breakdown = BreakoutScoreBreakdown::default();

        let volume_ratio = match (quote.volume, quote.avg_volume) {
            (Some(v), Some(avg)) if avg > 0 => v as f64 / avg as f64,
            _ => 0.0,
        };
        if volume_ratio >= self.config.min_volume_ratio {
            breakdown.volume_component = 30.0;
        }

        let extension_pct: f64 = if position.pivot > Decimal::ZERO {
            ((quote.last - position.pivot) / position.pivot * Decimal::from(100))
                .to_string()
                .parse()
                .unwrap_or(f64::MAX)
        } else {
            f64::MAX
        };
        if extension_pct <= self.config.max_pivot_extension_pct {
            breakdown.pivot_extension_component = 25.0;
        }

        if let Some(rating) = position.ratings.composite_rating {
            if rating >= self.config.min_composite_rating {
                breakdown.composite_rating_component = 25.0;
            }
        }
        if let Some(rating) = position.ratings.rs_rating {
            if rating >= self.config.min_rs_rating {
                breakdown.rs_rating_component = 20.0;
            }
        }

        breakdown.total = breakdown.volume_component
            + breakdown.pivot_extension_component
            + breakdown.composite_rating_component
            + breakdown.rs_rating_component;

        Some(breakdown)
    }

    pub fn is_actionable(&self, breakdown: &BreakoutScoreBreakdown) -> bool {
        breakdown.total >= self.config.min_score
    }

    pub fn is_high_conviction(&self, breakdown: &BreakoutScoreBreakdown) -> bool {
        breakdown.total >= self.config.high_conviction_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::{Position, RatingsSnapshot, StateCode};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn watchlist_position(pivot: Decimal, composite: u8, rs: u8) -> Position {
        Position {
            id: 1,
            symbol: "NVDA".to_string(),
            portfolio: "Swing".to_string(),
            state: StateCode::Watching,
            pivot,
            pattern_label: "cup_with_handle".to_string(),
            base_stage: 1,
            base_depth_pct: 15.0,
            base_length_weeks: 6,
            ratings: RatingsSnapshot {
                composite_rating: Some(composite),
                rs_rating: Some(rs),
                ..Default::default()
            },
            entries: vec![],
            exits: vec![],
            final_close: None,
            hard_stop_pct: 0.07,
            stop_price: dec!(0),
            last_price: pivot,
            max_price: pivot,
            max_gain_pct: 0.0,
            health_score: 100,
            health_rating: "HEALTHY".to_string(),
            eight_week_hold_active: false,
            eight_week_hold_start: None,
            eight_week_hold_end: None,
            power_move_pct: None,
            power_move_weeks: None,
            watch_date: None,
            breakout_date: None,
            entry_date: None,
            earnings_date: None,
            last_transition_at: Utc::now(),
            py1_done: false,
            py2_done: false,
            tp1_sold: 0,
            tp2_sold: 0,
            prior_extended_marker: None,
            alt_entry_test_count: 0,
        }
    }

    fn quote(last: Decimal, volume: u64, avg_volume: u64) -> Quote {
        Quote {
            last,
            bid: None,
            ask: None,
            volume: Some(volume),
            avg_volume: Some(avg_volume),
            high: None,
            low: None,
            open: None,
            close: None,
            timestamp: Utc::now(),
            volume_available: true,
        }
    }

    #[test]
    fn below_pivot_yields_no_score() {
        let scorer = BreakoutScorer::new(BreakoutScoringConfig::default());
        let position = watchlist_position(dec!(100.0), 90, 90);
        let q = quote(dec!(99.0), 2_000_000, 1_000_000);
        assert!(scorer.score(&position, &q).is_none());
    }

    #[test]
    fn strong_breakout_scores_high_conviction() {
        let scorer = BreakoutScorer::new(BreakoutScoringConfig::default());
        let position = watchlist_position(dec!(100.0), 95, 92);
        let q = quote(dec!(101.5), 2_000_000, 1_000_000);
        let breakdown = scorer.score(&position, &q).unwrap();
        assert!(scorer.is_actionable(&breakdown));
        assert!(scorer.is_high_conviction(&breakdown));
        assert_eq!(breakdown.total, 100.0);
    }

    #[test]
    fn weak_volume_and_extended_entry_fails_threshold() {
        let scorer = BreakoutScorer::new(BreakoutScoringConfig::default());
        let position = watchlist_position(dec!(100.0), 60, 60);
        let q = quote(dec!(108.0), 1_050_000, 1_000_000);
        let breakdown = scorer.score(&position, &q).unwrap();
        assert!(!scorer.is_actionable(&breakdown));
    }
}
