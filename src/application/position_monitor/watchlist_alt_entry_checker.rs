//! Watchlist alt-entry checker: for state-0 (Watching) symbols only,
//! tracks a prior-extended marker and fires an alt-entry alert once price
//! returns near a key MA or the pivot (spec §4.3 checker 7).

use rust_decimal::Decimal;

use crate::config::AltEntryConfig;
use crate::domain::alert::{AlertPayload, AlertSubtype, AlertType, CandidateAlert, Priority};
use crate::domain::checkers::{Checker, PositionContext};
use crate::domain::position::{Position, StateCode};

pub struct WatchlistAltEntryChecker {
    pub config: AltEntryConfig,
}

impl WatchlistAltEntryChecker {
    pub fn new(config: AltEntryConfig) -> Self {
        WatchlistAltEntryChecker { config }
    }

    fn payload(&self, ctx: &PositionContext) -> AlertPayload {
        AlertPayload {
            price: Some(ctx.current_price),
            pivot: Some(ctx.pivot_price),
            ma_21: ctx.ema_21,
            ma_50: ctx.sma_50,
            volume_ratio: Some(ctx.volume_ratio),
            state_at_alert: Some(ctx.state),
            ..Default::default()
        }
    }

    fn near(&self, price: Decimal, level: Decimal, tolerance_pct: f64) -> bool {
        if level.is_zero() {
            return false;
        }
        let tolerance = Decimal::try_from(tolerance_pct / 100.0).unwrap_or_default();
        let lower = level * (Decimal::ONE - tolerance);
        let upper = level * (Decimal::ONE + tolerance);
        price >= lower && price <= upper
    }
}

impl Checker for WatchlistAltEntryChecker {
    fn name(&self) -> &str {
        "watchlist_alt_entry"
    }

    fn check(&self, _position: &Position, ctx: &PositionContext) -> Vec<CandidateAlert> {
        let mut alerts = Vec::new();

        if ctx.state != StateCode::Watching {
            return alerts;
        }

        let extended_pct: f64 = if ctx.pivot_price.is_zero() {
            0.0
        } else {
            ((ctx.current_price - ctx.pivot_price) / ctx.pivot_price * Decimal::from(100))
                .to_string()
                .parse()
                .unwrap_or(0.0)
        };

        // Marker set when price extends beyond the configured threshold;
        // expires after marker_expiry_days. The cycle writer is
        // responsible for persisting the marker date back to the position
        // row (mirrors the 8-week-hold side channel in spec §4.3).
        let marker_active = ctx
            .prior_extended_marker
            .map(|set_at| {
                let age_days = (chrono::Utc::now().date_naive() - set_at).num_days();
                age_days <= self.config.marker_expiry_days
            })
            .unwrap_or(false);

        if !marker_active {
            // No live marker: nothing to confirm yet. A fresh extension
            // this cycle is the Breakout worker's job to record, not ours.
            let _ = extended_pct;
            return alerts;
        }

        if ctx.volume_ratio < self.config.min_volume_ratio {
            return alerts;
        }

        let near_ema21 = ctx.ema_21.map(|l| self.near(ctx.current_price, l, 1.0)).unwrap_or(false);
        let near_sma50 = ctx.sma_50.map(|l| self.near(ctx.current_price, l, 1.0)).unwrap_or(false);
        let near_pivot = self.near(ctx.current_price, ctx.pivot_price, 1.0);

        let subtype = if near_ema21 || near_sma50 {
            Some(AlertSubtype::MaBounce)
        } else if near_pivot {
            Some(AlertSubtype::PivotRetest)
        } else {
            None
        };

        if let Some(subtype) = subtype {
            alerts.push(CandidateAlert {
                symbol: ctx.symbol.clone(),
                alert_type: AlertType::AltEntry,
                subtype,
                position_id: Some(ctx.position_id),
                payload: self.payload(ctx),
                message: format!(
                    "{} returned near {} after prior extension (test #{})",
                    ctx.symbol,
                    subtype.as_str(),
                    ctx.alt_entry_test_count + 1
                ),
                action: Some("consider_entry".to_string()),
                thread_source: "breakout".to_string(),
                priority: Priority::P1,
                eight_week_hold: None,
            });
        }

        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn checker() -> WatchlistAltEntryChecker {
        WatchlistAltEntryChecker::new(AltEntryConfig::default())
    }

    fn dummy_position() -> Position {
        use crate::domain::position::{RatingsSnapshot};
        Position {
            id: 1,
            symbol: "PLTR".to_string(),
            portfolio: "Watchlist".to_string(),
            state: StateCode::Watching,
            pivot: dec!(50.0),
            pattern_label: String::new(),
            base_stage: 1,
            base_depth_pct: 15.0,
            base_length_weeks: 6,
            ratings: RatingsSnapshot::default(),
            entries: vec![],
            exits: vec![],
            final_close: None,
            hard_stop_pct: 0.07,
            stop_price: dec!(0.0),
            last_price: dec!(51.0),
            max_price: dec!(58.0),
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
            last_transition_at: chrono::Utc::now(),
            py1_done: false,
            py2_done: false,
            tp1_sold: 0,
            tp2_sold: 0,
            prior_extended_marker: Some(chrono::Utc::now().date_naive() - chrono::Duration::days(10)),
            alt_entry_test_count: 0,
        }
    }

    #[test]
    fn fires_when_marker_active_and_near_pivot() {
        let position = dummy_position();
        let mut ctx = PositionContext::from_test_data("PLTR", dec!(50.2), dec!(50.0));
        ctx.state = StateCode::Watching;
        ctx.pivot_price = dec!(50.0);
        ctx.prior_extended_marker = Some(chrono::Utc::now().date_naive() - chrono::Duration::days(10));
        ctx.volume_ratio = 1.2;
        let checker = checker();
        let alerts = checker.check(&position, &ctx);
        assert!(alerts.iter().any(|a| a.subtype == AlertSubtype::PivotRetest));
    }

    #[test]
    fn skipped_when_marker_expired() {
        let position = dummy_position();
        let mut ctx = PositionContext::from_test_data("PLTR", dec!(50.2), dec!(50.0));
        ctx.state = StateCode::Watching;
        ctx.pivot_price = dec!(50.0);
        ctx.prior_extended_marker = Some(chrono::Utc::now().date_naive() - chrono::Duration::days(45));
        ctx.volume_ratio = 1.2;
        let checker = checker();
        assert!(checker.check(&position, &ctx).is_empty());
    }

    #[test]
    fn skipped_for_non_watching_state() {
        let position = dummy_position();
        let mut ctx = PositionContext::from_test_data("PLTR", dec!(50.2), dec!(50.0));
        ctx.state = StateCode::Entry1;
        let checker = checker();
        assert!(checker.check(&position, &ctx).is_empty());
    }
}
