//! Stop checker: hard stop, trailing stop, approaching-stop warning
//! (spec §4.3 checker 1).

use rust_decimal::Decimal;

use crate::config::{StopLossConfig, TrailingStopConfig};
use crate::domain::alert::{AlertPayload, AlertSubtype, AlertType, CandidateAlert, Priority};
use crate::domain::checkers::{Checker, PositionContext};
use crate::domain::position::Position;

pub struct StopChecker {
    pub stop_loss: StopLossConfig,
    pub trailing_stop: TrailingStopConfig,
}

impl StopChecker {
    pub fn new(stop_loss: StopLossConfig, trailing_stop: TrailingStopConfig) -> Self {
        StopChecker { stop_loss, trailing_stop }
    }

    fn payload(&self, ctx: &PositionContext) -> AlertPayload {
        AlertPayload {
            price: Some(ctx.current_price),
            pivot: Some(ctx.pivot_price),
            avg_cost: Some(ctx.entry_price),
            pnl_pct: Some(ctx.pnl_pct),
            volume_ratio: Some(ctx.volume_ratio),
            health_score: Some(ctx.health_score),
            market_regime: Some(ctx.market_regime.clone()),
            state_at_alert: Some(ctx.state),
            days_in_position: Some(ctx.days_in_position),
            ..Default::default()
        }
    }

    /// Trailing stop activates once max-gain >= activation_pct, trails at
    /// trail_pct off max price, floored at entry price (spec §4.3).
    fn trailing_stop_price(&self, ctx: &PositionContext) -> Option<Decimal> {
        if ctx.max_gain_pct < self.trailing_stop.activation_pct {
            return None;
        }
        let trail_fraction = Decimal::try_from(self.trailing_stop.trail_pct / 100.0).ok()?;
        let trailed = ctx.max_price * (Decimal::ONE - trail_fraction);
        Some(trailed.max(ctx.entry_price))
    }
}

impl Checker for StopChecker {
    fn name(&self) -> &str {
        "stop"
    }

    fn check(&self, position: &Position, ctx: &PositionContext) -> Vec<CandidateAlert> {
        let mut alerts = Vec::new();

        if ctx.current_price <= ctx.hard_stop {
            alerts.push(CandidateAlert {
                symbol: ctx.symbol.clone(),
                alert_type: AlertType::Stop,
                subtype: AlertSubtype::HardStop,
                position_id: Some(ctx.position_id),
                payload: self.payload(ctx),
                message: format!(
                    "{} hit hard stop: price {} <= stop {} ({:.2}% P/L)",
                    ctx.symbol, ctx.current_price, ctx.hard_stop, ctx.pnl_pct
                ),
                action: Some("exit".to_string()),
                thread_source: "position".to_string(),
                priority: Priority::P0,
                eight_week_hold: None,
            });
            // Hard stop short-circuits later Stop/MA checkers for this symbol
            // (spec §4.3 "earlier P0 alerts short-circuit later same-category
            // checkers"); the caller (PositionMonitor) enforces this based on
            // the alert_type/priority of what we return here.
            return alerts;
        }

        if let Some(trail_price) = self.trailing_stop_price(ctx) {
            if ctx.current_price <= trail_price {
                alerts.push(CandidateAlert {
                    symbol: ctx.symbol.clone(),
                    alert_type: AlertType::Stop,
                    subtype: AlertSubtype::TrailingStop,
                    position_id: Some(ctx.position_id),
                    payload: self.payload(ctx),
                    message: format!(
                        "{} hit trailing stop: price {} <= trail {} (max gain {:.2}%)",
                        ctx.symbol, ctx.current_price, trail_price, ctx.max_gain_pct
                    ),
                    action: Some("exit".to_string()),
                    thread_source: "position".to_string(),
                    priority: Priority::P0,
                    eight_week_hold: None,
                });
                return alerts;
            }
        }

        let warning_buffer = Decimal::try_from(self.stop_loss.warning_buffer_pct / 100.0).unwrap_or_default();
        let warning_level = ctx.hard_stop * (Decimal::ONE + warning_buffer);
        if ctx.current_price <= warning_level {
            alerts.push(CandidateAlert {
                symbol: ctx.symbol.clone(),
                alert_type: AlertType::Stop,
                subtype: AlertSubtype::Warning,
                position_id: Some(ctx.position_id),
                payload: self.payload(ctx),
                message: format!(
                    "{} approaching hard stop: price {} within {:.1}% of stop {}",
                    ctx.symbol, ctx.current_price, self.stop_loss.warning_buffer_pct, ctx.hard_stop
                ),
                action: Some("monitor".to_string()),
                thread_source: "position".to_string(),
                priority: Priority::P0,
                eight_week_hold: None,
            });
        }

        let _ = position;
        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn checker() -> StopChecker {
        StopChecker::new(StopLossConfig::default(), TrailingStopConfig::default())
    }

    fn dummy_position() -> Position {
        use crate::domain::position::{EntryTranche, RatingsSnapshot, StateCode};
        Position {
            id: 1,
            symbol: "NVDA".to_string(),
            portfolio: "Swing".to_string(),
            state: StateCode::Entry2,
            pivot: dec!(95.0),
            pattern_label: String::new(),
            base_stage: 1,
            base_depth_pct: 15.0,
            base_length_weeks: 6,
            ratings: RatingsSnapshot::default(),
            entries: vec![EntryTranche { shares: dec!(200), price: dec!(100.0) }],
            exits: vec![],
            final_close: None,
            hard_stop_pct: 0.07,
            stop_price: dec!(93.0),
            last_price: dec!(92.5),
            max_price: dec!(105.0),
            max_gain_pct: 5.0,
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

    /// Scenario S1: NVDA, avg_cost=100, stop_price=93, shares=200, last=92.50.
    #[test]
    fn scenario_s1_hard_stop_fires_exactly_once() {
        let position = dummy_position();
        let ctx = PositionContext::from_test_data("NVDA", dec!(92.50), dec!(100.0));
        let checker = checker();
        let alerts = checker.check(&position, &ctx);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].subtype, AlertSubtype::HardStop);
        assert_eq!(alerts[0].priority, Priority::P0);
    }

    #[test]
    fn no_stop_alert_when_well_above_stop() {
        let position = dummy_position();
        let mut ctx = PositionContext::from_test_data("NVDA", dec!(110.0), dec!(100.0));
        ctx.hard_stop = dec!(93.0);
        ctx.max_price = dec!(110.0);
        let checker = checker();
        assert!(checker.check(&position, &ctx).is_empty());
    }

    #[test]
    fn trailing_stop_activates_after_threshold_gain() {
        let position = dummy_position();
        let mut ctx = PositionContext::from_test_data("NVDA", dec!(108.0), dec!(100.0));
        ctx.hard_stop = dec!(93.0);
        ctx.max_price = dec!(120.0);
        ctx.max_gain_pct = 20.0;
        // trail = 120 * 0.92 = 110.4, current 108 <= 110.4 -> fires
        let checker = checker();
        let alerts = checker.check(&position, &ctx);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].subtype, AlertSubtype::TrailingStop);
    }
}
