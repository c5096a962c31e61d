//! Health checker: recomputes health score, fires CRITICAL, EARNINGS,
//! LATE_STAGE, EXTENDED alerts (spec §4.3 checker 5).

use rust_decimal::Decimal;

use crate::config::{EarningsConfig, ExtendedConfig, HealthConfig};
use crate::domain::alert::{AlertPayload, AlertSubtype, AlertType, CandidateAlert, Priority};
use crate::domain::checkers::{Checker, PositionContext};
use crate::domain::position::Position;

pub struct HealthChecker {
    pub health: HealthConfig,
    pub earnings: EarningsConfig,
    pub extended: ExtendedConfig,
}

impl HealthChecker {
    pub fn new(health: HealthConfig, earnings: EarningsConfig, extended: ExtendedConfig) -> Self {
        HealthChecker { health, earnings, extended }
    }

    fn payload(&self, ctx: &PositionContext, score: i32) -> AlertPayload {
        AlertPayload {
            price: Some(ctx.current_price),
            pivot: Some(ctx.pivot_price),
            avg_cost: Some(ctx.entry_price),
            pnl_pct: Some(ctx.pnl_pct),
            ma_21: ctx.ema_21,
            ma_50: ctx.sma_50,
            volume_ratio: Some(ctx.volume_ratio),
            health_score: Some(score),
            state_at_alert: Some(ctx.state),
            days_in_position: Some(ctx.days_in_position),
            ..Default::default()
        }
    }

    /// Recomputes the health score from MA positions, A/D rating, base
    /// stage/depth, and time-in-position, in the spirit of spec §4.3's
    /// "(time in position, MA positions, A/D, base stage, base depth,
    /// days-to-earnings)" inputs. Score is bounded [0, 100].
    pub fn compute_score(&self, ctx: &PositionContext) -> i32 {
        let mut score: i32 = 100;

        if let Some(sma_50) = ctx.sma_50 {
            if ctx.current_price < sma_50 {
                score -= 25;
            }
        }
        if let Some(ema_21) = ctx.ema_21 {
            if ctx.current_price < ema_21 {
                score -= 10;
            }
        }
        match ctx.ad_rating {
            Some('A') | Some('B') => {}
            Some('C') => score -= 5,
            Some('D') => score -= 15,
            Some('E') => score -= 25,
            _ => {}
        }
        if ctx.base_stage >= 4 {
            score -= 15;
        }
        if ctx.days_in_position >= self.health.time_threshold_days {
            score -= 10;
        }
        score.clamp(0, 100)
    }
}

impl Checker for HealthChecker {
    fn name(&self) -> &str {
        "health"
    }

    fn check(&self, _position: &Position, ctx: &PositionContext) -> Vec<CandidateAlert> {
        let mut alerts = Vec::new();
        let score = self.compute_score(ctx);
        let prev_score = ctx.health_score;

        // New cross below 50: previous score was >= 50, new score < 50.
        if prev_score >= 50 && score < 50 {
            alerts.push(CandidateAlert {
                symbol: ctx.symbol.clone(),
                alert_type: AlertType::Health,
                subtype: AlertSubtype::Critical,
                position_id: Some(ctx.position_id),
                payload: self.payload(ctx, score),
                message: format!("{} health score crossed below 50 (now {})", ctx.symbol, score),
                action: Some("review".to_string()),
                thread_source: "position".to_string(),
                priority: Priority::P0,
                eight_week_hold: None,
            });
        }

        if let Some(days) = ctx.days_to_earnings {
            if days >= 0 && days <= self.earnings.warning_days {
                let priority = if days <= self.earnings.critical_days {
                    Priority::P0
                } else {
                    Priority::P1
                };
                let recommendation = if ctx.pnl_pct >= self.earnings.reduce_threshold_pct {
                    "hold through earnings"
                } else if ctx.pnl_pct.abs() <= self.earnings.negative_threshold_pct {
                    "sell into strength before earnings"
                } else {
                    "reduce exposure before earnings"
                };
                alerts.push(CandidateAlert {
                    symbol: ctx.symbol.clone(),
                    alert_type: AlertType::Health,
                    subtype: AlertSubtype::Earnings,
                    position_id: Some(ctx.position_id),
                    payload: self.payload(ctx, score),
                    message: format!(
                        "{} reports earnings in {} days, {}",
                        ctx.symbol, days, recommendation
                    ),
                    action: Some(recommendation.to_string()),
                    thread_source: "position".to_string(),
                    priority,
                    eight_week_hold: None,
                });
            }
        }

        if ctx.base_stage >= 4 {
            alerts.push(CandidateAlert {
                symbol: ctx.symbol.clone(),
                alert_type: AlertType::Health,
                subtype: AlertSubtype::LateStage,
                position_id: Some(ctx.position_id),
                payload: self.payload(ctx, score),
                message: format!("{} is in a late-stage base (stage {})", ctx.symbol, ctx.base_stage),
                action: Some("monitor".to_string()),
                thread_source: "position".to_string(),
                priority: Priority::P2,
                eight_week_hold: None,
            });
        }

        let extension_pct: f64 = if ctx.pivot_price.is_zero() {
            0.0
        } else {
            ((ctx.current_price - ctx.pivot_price) / ctx.pivot_price * Decimal::from(100))
                .to_string()
                .parse()
                .unwrap_or(0.0)
        };
        if extension_pct > self.extended.warning_pct {
            let priority = if extension_pct > self.extended.danger_pct {
                Priority::P1
            } else {
                Priority::P2
            };
            alerts.push(CandidateAlert {
                symbol: ctx.symbol.clone(),
                alert_type: AlertType::Health,
                subtype: AlertSubtype::Extended,
                position_id: Some(ctx.position_id),
                payload: self.payload(ctx, score),
                message: format!(
                    "{} is {:.2}% above pivot {}",
                    ctx.symbol, extension_pct, ctx.pivot_price
                ),
                action: Some("avoid_chasing".to_string()),
                thread_source: "position".to_string(),
                priority,
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

    fn checker() -> HealthChecker {
        HealthChecker::new(HealthConfig::default(), EarningsConfig::default(), ExtendedConfig::default())
    }

    fn dummy_position() -> Position {
        use crate::domain::position::{EntryTranche, RatingsSnapshot, StateCode};
        Position {
            id: 1,
            symbol: "AMD".to_string(),
            portfolio: "Swing".to_string(),
            state: StateCode::Entry2,
            pivot: dec!(100.0),
            pattern_label: String::new(),
            base_stage: 1,
            base_depth_pct: 15.0,
            base_length_weeks: 6,
            ratings: RatingsSnapshot::default(),
            entries: vec![EntryTranche { shares: dec!(100), price: dec!(100.0) }],
            exits: vec![],
            final_close: None,
            hard_stop_pct: 0.07,
            stop_price: dec!(93.0),
            last_price: dec!(102.0),
            max_price: dec!(102.0),
            max_gain_pct: 2.0,
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
    fn critical_fires_on_new_cross_below_50() {
        let position = dummy_position();
        let mut ctx = PositionContext::from_test_data("AMD", dec!(90.0), dec!(100.0));
        ctx.sma_50 = Some(dec!(95.0));
        ctx.ema_21 = Some(dec!(92.0));
        ctx.ad_rating = Some('E');
        ctx.base_stage = 4;
        ctx.health_score = 100;
        let checker = checker();
        let alerts = checker.check(&position, &ctx);
        assert!(alerts.iter().any(|a| a.subtype == AlertSubtype::Critical));
    }

    #[test]
    fn earnings_warning_within_window() {
        let position = dummy_position();
        let mut ctx = PositionContext::from_test_data("AMD", dec!(102.0), dec!(100.0));
        ctx.days_to_earnings = Some(3);
        ctx.pnl_pct = 2.0;
        let checker = checker();
        let alerts = checker.check(&position, &ctx);
        let earnings = alerts.iter().find(|a| a.subtype == AlertSubtype::Earnings);
        assert!(earnings.is_some());
        assert_eq!(earnings.unwrap().priority, Priority::P0);
    }

    #[test]
    fn extended_fires_above_warning_threshold() {
        let position = dummy_position();
        let mut ctx = PositionContext::from_test_data("AMD", dec!(108.0), dec!(100.0));
        ctx.pivot_price = dec!(100.0);
        let checker = checker();
        let alerts = checker.check(&position, &ctx);
        assert!(alerts.iter().any(|a| a.subtype == AlertSubtype::Extended));
    }
}
