//! Profit checker: 8-week-hold activation, TP1/TP2 targets (spec §4.3
//! checker 2).

use chrono::Duration;

use crate::config::EightWeekHoldConfig;
use crate::domain::alert::{
    AlertPayload, AlertSubtype, AlertType, CandidateAlert, EightWeekHoldUpdate, Priority,
};
use crate::domain::checkers::{Checker, PositionContext};
use crate::domain::position::Position;

pub struct ProfitChecker {
    pub eight_week_hold: EightWeekHoldConfig,
    pub tp1_target_pct: f64,
    pub tp2_target_pct: f64,
}

impl ProfitChecker {
    pub fn new(eight_week_hold: EightWeekHoldConfig, tp1_target_pct: f64, tp2_target_pct: f64) -> Self {
        ProfitChecker {
            eight_week_hold,
            tp1_target_pct,
            tp2_target_pct,
        }
    }

    fn payload(&self, ctx: &PositionContext) -> AlertPayload {
        AlertPayload {
            price: Some(ctx.current_price),
            pivot: Some(ctx.pivot_price),
            avg_cost: Some(ctx.entry_price),
            pnl_pct: Some(ctx.pnl_pct),
            health_score: Some(ctx.health_score),
            market_regime: Some(ctx.market_regime.clone()),
            state_at_alert: Some(ctx.state),
            days_in_position: Some(ctx.days_in_position),
            ..Default::default()
        }
    }
}

impl Checker for ProfitChecker {
    fn name(&self) -> &str {
        "profit"
    }

    fn check(&self, _position: &Position, ctx: &PositionContext) -> Vec<CandidateAlert> {
        let mut alerts = Vec::new();

        // 8-week hold: >= gain_threshold_pct within trigger_window_days of
        // breakout. Suppresses TP1 until hold expires.
        let within_window = ctx
            .days_since_breakout
            .map(|d| d <= self.eight_week_hold.trigger_window_days)
            .unwrap_or(false);

        if !ctx.eight_week_hold_active
            && within_window
            && ctx.pnl_pct >= self.eight_week_hold.gain_threshold_pct
        {
            let breakout_date = chrono::Utc::now().date_naive()
                - Duration::days(ctx.days_since_breakout.unwrap_or(0));
            let hold_end = breakout_date + Duration::weeks(self.eight_week_hold.hold_weeks);
            alerts.push(CandidateAlert {
                symbol: ctx.symbol.clone(),
                alert_type: AlertType::Profit,
                subtype: AlertSubtype::EightWeekHold,
                position_id: Some(ctx.position_id),
                payload: self.payload(ctx),
                message: format!(
                    "{} activated 8-week hold: gain {:.2}% within {} days of breakout",
                    ctx.symbol,
                    ctx.pnl_pct,
                    ctx.days_since_breakout.unwrap_or(0)
                ),
                action: Some("hold".to_string()),
                thread_source: "position".to_string(),
                priority: Priority::P2,
                eight_week_hold: Some(EightWeekHoldUpdate {
                    hold_active: true,
                    hold_start: breakout_date,
                    hold_end,
                    power_move_pct: ctx.pnl_pct,
                    power_move_weeks: (ctx.days_since_breakout.unwrap_or(0) / 7).max(0) as u32,
                }),
            });
            // 8-week hold just activated this cycle: TP1 is suppressed.
            return alerts;
        }

        let hold_blocking_tp1 = ctx.eight_week_hold_active
            && ctx
                .eight_week_hold_end
                .map(|end| chrono::Utc::now().date_naive() < end)
                .unwrap_or(false);

        if !hold_blocking_tp1 && ctx.tp1_sold == 0 && ctx.pnl_pct >= self.tp1_target_pct {
            alerts.push(CandidateAlert {
                symbol: ctx.symbol.clone(),
                alert_type: AlertType::Profit,
                subtype: AlertSubtype::Tp1,
                position_id: Some(ctx.position_id),
                payload: self.payload(ctx),
                message: format!("{} hit TP1 target: gain {:.2}%", ctx.symbol, ctx.pnl_pct),
                action: Some("sell_partial".to_string()),
                thread_source: "position".to_string(),
                priority: Priority::P1,
                eight_week_hold: None,
            });
        }

        if ctx.tp2_sold == 0 && ctx.pnl_pct >= self.tp2_target_pct {
            alerts.push(CandidateAlert {
                symbol: ctx.symbol.clone(),
                alert_type: AlertType::Profit,
                subtype: AlertSubtype::Tp2,
                position_id: Some(ctx.position_id),
                payload: self.payload(ctx),
                message: format!("{} hit TP2 target: gain {:.2}%", ctx.symbol, ctx.pnl_pct),
                action: Some("sell_partial".to_string()),
                thread_source: "position".to_string(),
                priority: Priority::P1,
                eight_week_hold: None,
            });
        }

        alerts
    }
}
