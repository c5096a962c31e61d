//! Pyramid checker: PY1/PY2 readiness and extension, 21-EMA pullback add
//! (spec §4.3 checker 3).

use rust_decimal::Decimal;

use crate::config::PyramidConfig;
use crate::domain::alert::{AlertPayload, AlertSubtype, AlertType, CandidateAlert, Priority};
use crate::domain::checkers::{Checker, PositionContext};
use crate::domain::position::{Position, StateCode};

pub struct PyramidChecker {
    pub config: PyramidConfig,
}

impl PyramidChecker {
    pub fn new(config: PyramidConfig) -> Self {
        PyramidChecker { config }
    }

    fn payload(&self, ctx: &PositionContext) -> AlertPayload {
        AlertPayload {
            price: Some(ctx.current_price),
            pivot: Some(ctx.pivot_price),
            avg_cost: Some(ctx.entry_price),
            pnl_pct: Some(ctx.pnl_pct),
            ma_21: ctx.ema_21,
            state_at_alert: Some(ctx.state),
            days_in_position: Some(ctx.days_in_position),
            ..Default::default()
        }
    }
}

impl Checker for PyramidChecker {
    fn name(&self) -> &str {
        "pyramid"
    }

    fn check(&self, _position: &Position, ctx: &PositionContext) -> Vec<CandidateAlert> {
        let mut alerts = Vec::new();

        // Gate: state in {1,2,3}, pnl > 0, >= min_bars_since_entry days
        // since entry.
        if !matches!(ctx.state, StateCode::Entry1 | StateCode::Entry2 | StateCode::Entry3)
            || ctx.pnl_pct <= 0.0
            || ctx.days_in_position < self.config.min_bars_since_entry
        {
            return alerts;
        }

        match ctx.state {
            StateCode::Entry1 if !ctx.py1_done => {
                if ctx.pnl_pct >= self.config.p1_ready_min_pct && ctx.pnl_pct <= self.config.p1_ready_max_pct {
                    alerts.push(self.ready_alert(ctx, AlertSubtype::P1Ready, Priority::P1));
                } else if ctx.pnl_pct > self.config.p1_ready_max_pct {
                    alerts.push(self.ready_alert(ctx, AlertSubtype::P1Extended, Priority::P2));
                }
            }
            StateCode::Entry2 if !ctx.py2_done => {
                if ctx.pnl_pct >= self.config.p2_ready_min_pct && ctx.pnl_pct <= self.config.p2_ready_max_pct {
                    alerts.push(self.ready_alert(ctx, AlertSubtype::P2Ready, Priority::P1));
                } else if ctx.pnl_pct > self.config.p2_ready_max_pct {
                    alerts.push(self.ready_alert(ctx, AlertSubtype::P2Extended, Priority::P2));
                }
            }
            _ => {}
        }

        if let Some(ema_21) = ctx.ema_21 {
            let tolerance = Decimal::try_from(self.config.pullback_ema_tolerance_pct / 100.0).unwrap_or_default();
            let lower = ema_21 * (Decimal::ONE - tolerance);
            let upper = ema_21 * (Decimal::ONE + tolerance);
            if ctx.current_price >= lower && ctx.current_price <= upper {
                alerts.push(CandidateAlert {
                    symbol: ctx.symbol.clone(),
                    alert_type: AlertType::Pyramid,
                    subtype: AlertSubtype::Ema21,
                    position_id: Some(ctx.position_id),
                    payload: self.payload(ctx),
                    message: format!(
                        "{} pulled back to 21-EMA {} (price {})",
                        ctx.symbol, ema_21, ctx.current_price
                    ),
                    action: Some("consider_add".to_string()),
                    thread_source: "position".to_string(),
                    priority: Priority::P1,
                    eight_week_hold: None,
                });
            }
        }

        alerts
    }
}

impl PyramidChecker {
    fn ready_alert(&self, ctx: &PositionContext, subtype: AlertSubtype, priority: Priority) -> CandidateAlert {
        CandidateAlert {
            symbol: ctx.symbol.clone(),
            alert_type: AlertType::Pyramid,
            subtype,
            position_id: Some(ctx.position_id),
            payload: self.payload(ctx),
            message: format!(
                "{} pyramid {}: gain {:.2}% above entry",
                ctx.symbol,
                subtype.as_str(),
                ctx.pnl_pct
            ),
            action: Some("consider_add".to_string()),
            thread_source: "position".to_string(),
            priority,
            eight_week_hold: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn checker() -> PyramidChecker {
        PyramidChecker::new(PyramidConfig::default())
    }

    fn dummy_position() -> Position {
        use crate::domain::position::{EntryTranche, RatingsSnapshot};
        Position {
            id: 1,
            symbol: "MSFT".to_string(),
            portfolio: "Swing".to_string(),
            state: StateCode::Entry1,
            pivot: dec!(400.0),
            pattern_label: String::new(),
            base_stage: 1,
            base_depth_pct: 15.0,
            base_length_weeks: 6,
            ratings: RatingsSnapshot::default(),
            entries: vec![EntryTranche { shares: dec!(50), price: dec!(400.0) }],
            exits: vec![],
            final_close: None,
            hard_stop_pct: 0.07,
            stop_price: dec!(372.0),
            last_price: dec!(410.0),
            max_price: dec!(410.0),
            max_gain_pct: 2.5,
            health_score: 100,
            health_rating: "HEALTHY".to_string(),
            eight_week_hold_active: false,
            eight_week_hold_start: None,
            eight_week_hold_end: None,
            power_move_pct: None,
            power_move_weeks: None,
            watch_date: None,
            breakout_date: None,
            entry_date: Some(chrono::Utc::now().date_naive() - chrono::Duration::days(5)),
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
    fn py1_ready_fires_within_band() {
        let position = dummy_position();
        let mut ctx = PositionContext::from_test_data("MSFT", Decimal::new(410, 0), Decimal::new(400, 0));
        ctx.state = StateCode::Entry1;
        ctx.pnl_pct = 2.5;
        ctx.days_in_position = 5;
        let checker = checker();
        let alerts = checker.check(&position, &ctx);
        assert!(alerts.iter().any(|a| a.subtype == AlertSubtype::P1Ready));
    }

    #[test]
    fn py1_extended_above_band() {
        let position = dummy_position();
        let mut ctx = PositionContext::from_test_data("MSFT", Decimal::new(430, 0), Decimal::new(400, 0));
        ctx.state = StateCode::Entry1;
        ctx.pnl_pct = 7.5;
        ctx.days_in_position = 5;
        let checker = checker();
        let alerts = checker.check(&position, &ctx);
        assert!(alerts.iter().any(|a| a.subtype == AlertSubtype::P1Extended));
    }

    #[test]
    fn gated_out_when_too_soon_since_entry() {
        let position = dummy_position();
        let mut ctx = PositionContext::from_test_data("MSFT", Decimal::new(410, 0), Decimal::new(400, 0));
        ctx.state = StateCode::Entry1;
        ctx.pnl_pct = 2.5;
        ctx.days_in_position = 0;
        let checker = checker();
        assert!(checker.check(&position, &ctx).is_empty());
    }
}
