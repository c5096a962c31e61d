//! Reentry checker: 21-EMA bounce, 50-SMA bounce with volume, pivot
//! retest, pullback-to-buy-zone for profitable under-full-size positions
//! (spec §4.3 checker 6).

use rust_decimal::Decimal;

use crate::config::ReentryConfig;
use crate::domain::alert::{AlertPayload, AlertSubtype, AlertType, CandidateAlert, Priority};
use crate::domain::checkers::{Checker, PositionContext};
use crate::domain::position::{Position, StateCode};

pub struct ReentryChecker {
    pub config: ReentryConfig,
}

impl ReentryChecker {
    pub fn new(config: ReentryConfig) -> Self {
        ReentryChecker { config }
    }

    fn payload(&self, ctx: &PositionContext) -> AlertPayload {
        AlertPayload {
            price: Some(ctx.current_price),
            pivot: Some(ctx.pivot_price),
            avg_cost: Some(ctx.entry_price),
            pnl_pct: Some(ctx.pnl_pct),
            ma_21: ctx.ema_21,
            ma_50: ctx.sma_50,
            volume_ratio: Some(ctx.volume_ratio),
            state_at_alert: Some(ctx.state),
            days_in_position: Some(ctx.days_in_position),
            ..Default::default()
        }
    }

    /// A bounce pattern: price dipped toward a level in the recent ring
    /// buffer, then recovered back near it. Requires at least 3 points of
    /// history to distinguish a bounce from a single-tick touch.
    fn detected_bounce_near(&self, ctx: &PositionContext, level: Decimal) -> bool {
        if ctx.recent_price_history.len() < 3 {
            return false;
        }
        let tolerance = Decimal::try_from(self.config.bounce_tolerance_pct / 100.0).unwrap_or_default();
        let lower = level * (Decimal::ONE - tolerance);
        let upper = level * (Decimal::ONE + tolerance);
        let dipped_below = ctx
            .recent_price_history
            .iter()
            .rev()
            .take(self.config.bounce_lookback_bars)
            .any(|p| *p < lower);
        let currently_near = ctx.current_price >= lower && ctx.current_price <= upper;
        dipped_below && currently_near
    }
}

impl Checker for ReentryChecker {
    fn name(&self) -> &str {
        "reentry"
    }

    fn check(&self, _position: &Position, ctx: &PositionContext) -> Vec<CandidateAlert> {
        let mut alerts = Vec::new();

        let under_full_size = matches!(ctx.state, StateCode::Entry1 | StateCode::Entry2);
        if !under_full_size || ctx.pnl_pct <= 0.0 {
            return alerts;
        }

        if let Some(ema_21) = ctx.ema_21 {
            if self.detected_bounce_near(ctx, ema_21) {
                alerts.push(CandidateAlert {
                    symbol: ctx.symbol.clone(),
                    alert_type: AlertType::Add,
                    subtype: AlertSubtype::Ema21,
                    position_id: Some(ctx.position_id),
                    payload: self.payload(ctx),
                    message: format!("{} bounced off 21-EMA {}", ctx.symbol, ema_21),
                    action: Some("consider_add".to_string()),
                    thread_source: "position".to_string(),
                    priority: Priority::P1,
                    eight_week_hold: None,
                });
            }
        }

        if let Some(sma_50) = ctx.sma_50 {
            if self.detected_bounce_near(ctx, sma_50) && ctx.volume_ratio >= 1.2 {
                alerts.push(CandidateAlert {
                    symbol: ctx.symbol.clone(),
                    alert_type: AlertType::Add,
                    subtype: AlertSubtype::Pullback,
                    position_id: Some(ctx.position_id),
                    payload: self.payload(ctx),
                    message: format!(
                        "{} bounced off 50-SMA {} on volume {:.2}x",
                        ctx.symbol, sma_50, ctx.volume_ratio
                    ),
                    action: Some("consider_add".to_string()),
                    thread_source: "position".to_string(),
                    priority: Priority::P1,
                    eight_week_hold: None,
                });
            }
        }

        if self.detected_bounce_near(ctx, ctx.pivot_price) {
            alerts.push(CandidateAlert {
                symbol: ctx.symbol.clone(),
                alert_type: AlertType::AltEntry,
                subtype: AlertSubtype::PivotRetest,
                position_id: Some(ctx.position_id),
                payload: self.payload(ctx),
                message: format!("{} retested pivot {}", ctx.symbol, ctx.pivot_price),
                action: Some("consider_add".to_string()),
                thread_source: "position".to_string(),
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

    fn checker() -> ReentryChecker {
        ReentryChecker::new(ReentryConfig::default())
    }

    fn dummy_position() -> Position {
        use crate::domain::position::{EntryTranche, RatingsSnapshot};
        Position {
            id: 1,
            symbol: "CRWD".to_string(),
            portfolio: "Swing".to_string(),
            state: StateCode::Entry1,
            pivot: dec!(300.0),
            pattern_label: String::new(),
            base_stage: 1,
            base_depth_pct: 15.0,
            base_length_weeks: 6,
            ratings: RatingsSnapshot::default(),
            entries: vec![EntryTranche { shares: dec!(50), price: dec!(300.0) }],
            exits: vec![],
            final_close: None,
            hard_stop_pct: 0.07,
            stop_price: dec!(279.0),
            last_price: dec!(305.0),
            max_price: dec!(320.0),
            max_gain_pct: 6.0,
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
            prior_extended_marker: None,
            alt_entry_test_count: 0,
        }
    }

    #[test]
    fn detects_ema_21_bounce() {
        let position = dummy_position();
        let mut ctx = PositionContext::from_test_data("CRWD", dec!(305.0), dec!(300.0));
        ctx.state = StateCode::Entry1;
        ctx.pnl_pct = 1.5;
        ctx.ema_21 = Some(dec!(305.0));
        ctx.recent_price_history = vec![dec!(310.0), dec!(295.0), dec!(298.0), dec!(305.0)];
        let checker = checker();
        let alerts = checker.check(&position, &ctx);
        assert!(alerts.iter().any(|a| a.subtype == AlertSubtype::Ema21));
    }

    #[test]
    fn no_bounce_without_prior_dip() {
        let position = dummy_position();
        let mut ctx = PositionContext::from_test_data("CRWD", dec!(305.0), dec!(300.0));
        ctx.state = StateCode::Entry1;
        ctx.pnl_pct = 1.5;
        ctx.ema_21 = Some(dec!(305.0));
        ctx.recent_price_history = vec![dec!(304.0), dec!(306.0), dec!(305.0)];
        let checker = checker();
        assert!(checker.check(&position, &ctx).is_empty());
    }

    #[test]
    fn skipped_when_already_full_size() {
        let position = dummy_position();
        let mut ctx = PositionContext::from_test_data("CRWD", dec!(305.0), dec!(300.0));
        ctx.state = StateCode::Entry3;
        ctx.pnl_pct = 1.5;
        let checker = checker();
        assert!(checker.check(&position, &ctx).is_empty());
    }
}
