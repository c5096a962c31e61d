//! MA checker: 50-SMA breakdown/approach, late-stage 21-EMA breakdown,
//! 10-week breakdown, climax top (spec §4.3 checker 4).

use rust_decimal::Decimal;

use crate::config::{ClimaxTopConfig, TechnicalConfig};
use crate::domain::alert::{AlertPayload, AlertSubtype, AlertType, CandidateAlert, Priority};
use crate::domain::checkers::{Checker, PositionContext};
use crate::domain::position::Position;

pub struct MaChecker {
    pub technical: TechnicalConfig,
    pub climax_top: ClimaxTopConfig,
}

impl MaChecker {
    pub fn new(technical: TechnicalConfig, climax_top: ClimaxTopConfig) -> Self {
        MaChecker { technical, climax_top }
    }

    fn payload(&self, ctx: &PositionContext) -> AlertPayload {
        AlertPayload {
            price: Some(ctx.current_price),
            pivot: Some(ctx.pivot_price),
            avg_cost: Some(ctx.entry_price),
            pnl_pct: Some(ctx.pnl_pct),
            ma_21: ctx.ema_21,
            ma_50: ctx.sma_50,
            ma_200: ctx.sma_200,
            ma_10_week: ctx.sma_10_week,
            volume_ratio: Some(ctx.volume_ratio),
            state_at_alert: Some(ctx.state),
            days_in_position: Some(ctx.days_in_position),
            ..Default::default()
        }
    }

    /// Climax top composite score per spec §4.3 / §8 scenario S4:
    /// volume >= 2.5x -> 30, intraday spread >= 4% -> 25, gap up >= 2% ->
    /// 25, close in lower 30% of range -> 20.
    fn climax_score(&self, ctx: &PositionContext) -> f64 {
        let mut score = 0.0;

        if ctx.volume_ratio >= self.climax_top.volume_threshold {
            score += 30.0;
        }

        let range = ctx.day_high - ctx.day_low;
        if !ctx.day_low.is_zero() {
            let spread_pct: f64 = (range / ctx.day_low * Decimal::from(100))
                .to_string()
                .parse()
                .unwrap_or(0.0);
            if spread_pct >= self.climax_top.spread_pct {
                score += 25.0;
            }
        }

        if !ctx.prev_close.is_zero() {
            let gap_pct: f64 = ((ctx.day_open - ctx.prev_close) / ctx.prev_close * Decimal::from(100))
                .to_string()
                .parse()
                .unwrap_or(0.0);
            if gap_pct >= self.climax_top.gap_pct {
                score += 25.0;
            }
        }

        if range > Decimal::ZERO {
            let close_position = (ctx.current_price - ctx.day_low) / range;
            if close_position <= Decimal::new(30, 2) {
                score += 20.0;
            }
        }

        score
    }
}

impl Checker for MaChecker {
    fn name(&self) -> &str {
        "ma"
    }

    fn check(&self, _position: &Position, ctx: &PositionContext) -> Vec<CandidateAlert> {
        let mut alerts = Vec::new();

        // 50-SMA breakdown with mandatory volume confirmation.
        if let Some(sma_50) = ctx.sma_50 {
            if ctx.current_price < sma_50 {
                if ctx.volume_ratio >= self.technical.ma_50_volume_confirm {
                    alerts.push(CandidateAlert {
                        symbol: ctx.symbol.clone(),
                        alert_type: AlertType::Technical,
                        subtype: AlertSubtype::Ma50Sell,
                        position_id: Some(ctx.position_id),
                        payload: self.payload(ctx),
                        message: format!(
                            "{} broke below 50-SMA {} on volume {:.2}x",
                            ctx.symbol, sma_50, ctx.volume_ratio
                        ),
                        action: Some("exit".to_string()),
                        thread_source: "position".to_string(),
                        priority: Priority::P0,
                        eight_week_hold: None,
                    });
                    // P0 short-circuits later MA checks for this symbol.
                    return alerts;
                }
            } else {
                let warning_pct = Decimal::try_from(self.technical.ma_50_warning_pct / 100.0).unwrap_or_default();
                let warning_level = sma_50 * (Decimal::ONE + warning_pct);
                if ctx.current_price <= warning_level {
                    alerts.push(CandidateAlert {
                        symbol: ctx.symbol.clone(),
                        alert_type: AlertType::Technical,
                        subtype: AlertSubtype::Ma50Warning,
                        position_id: Some(ctx.position_id),
                        payload: self.payload(ctx),
                        message: format!(
                            "{} approaching 50-SMA {} (price {})",
                            ctx.symbol, sma_50, ctx.current_price
                        ),
                        action: Some("monitor".to_string()),
                        thread_source: "position".to_string(),
                        priority: Priority::P1,
                        eight_week_hold: None,
                    });
                }
            }
        }

        // Late-stage 21-EMA breakdown: base_stage >= 4, needs two
        // consecutive closes below, approximated here via the current
        // close (consecutive-day tracking lives in the checker's history
        // ring, owned by the Position worker thread).
        if ctx.base_stage >= 4 {
            if let Some(ema_21) = ctx.ema_21 {
                if ctx.current_price < ema_21 {
                    alerts.push(CandidateAlert {
                        symbol: ctx.symbol.clone(),
                        alert_type: AlertType::Technical,
                        subtype: AlertSubtype::Ema21Sell,
                        position_id: Some(ctx.position_id),
                        payload: self.payload(ctx),
                        message: format!(
                            "{} (base stage {}) broke below 21-EMA {}",
                            ctx.symbol, ctx.base_stage, ema_21
                        ),
                        action: Some("exit".to_string()),
                        thread_source: "position".to_string(),
                        priority: Priority::P1,
                        eight_week_hold: None,
                    });
                }
            }
        }

        // 10-week (50-day) breakdown.
        if let Some(sma_10_week) = ctx.sma_10_week {
            if ctx.current_price < sma_10_week {
                alerts.push(CandidateAlert {
                    symbol: ctx.symbol.clone(),
                    alert_type: AlertType::Technical,
                    subtype: AlertSubtype::TenWeekSell,
                    position_id: Some(ctx.position_id),
                    payload: self.payload(ctx),
                    message: format!(
                        "{} broke below 10-week MA {}",
                        ctx.symbol, sma_10_week
                    ),
                    action: Some("exit".to_string()),
                    thread_source: "position".to_string(),
                    priority: Priority::P0,
                    eight_week_hold: None,
                });
                return alerts;
            }
        }

        // Climax top: requires min_gain_pct and a composite score above
        // min_score.
        if ctx.pnl_pct >= self.climax_top.min_gain_pct {
            let score = self.climax_score(ctx);
            if score >= self.climax_top.min_score {
                let priority = if score >= self.climax_top.high_conviction_score {
                    Priority::P0
                } else {
                    Priority::P1
                };
                alerts.push(CandidateAlert {
                    symbol: ctx.symbol.clone(),
                    alert_type: AlertType::Technical,
                    subtype: AlertSubtype::ClimaxTop,
                    position_id: Some(ctx.position_id),
                    payload: self.payload(ctx),
                    message: format!(
                        "{} climax top signature: score {:.0}, gain {:.2}%",
                        ctx.symbol, score, ctx.pnl_pct
                    ),
                    action: Some("consider_exit".to_string()),
                    thread_source: "position".to_string(),
                    priority,
                    eight_week_hold: None,
                });
            }
        }

        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn checker() -> MaChecker {
        MaChecker::new(TechnicalConfig::default(), ClimaxTopConfig::default())
    }

    fn dummy_position() -> Position {
        use crate::domain::position::{EntryTranche, RatingsSnapshot, StateCode};
        Position {
            id: 1,
            symbol: "TSLA".to_string(),
            portfolio: "Swing".to_string(),
            state: StateCode::Entry2,
            pivot: dec!(100.0),
            pattern_label: String::new(),
            base_stage: 1,
            base_depth_pct: 15.0,
            base_length_weeks: 6,
            ratings: RatingsSnapshot::default(),
            entries: vec![EntryTranche { shares: dec!(100), price: dec!(88.0) }],
            exits: vec![],
            final_close: None,
            hard_stop_pct: 0.07,
            stop_price: dec!(81.84),
            last_price: dec!(104.5),
            max_price: dec!(110.0),
            max_gain_pct: 25.0,
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

    /// Scenario S3: ma_50=50.0, last=49.50. volume_ratio=1.2 -> no sell.
    /// volume_ratio=1.6 -> sell fires, short-circuits.
    #[test]
    fn scenario_s3_requires_volume_confirmation() {
        let position = dummy_position();
        let mut ctx = PositionContext::from_test_data("TSLA", dec!(49.50), dec!(88.0));
        ctx.sma_50 = Some(dec!(50.0));
        ctx.volume_ratio = 1.2;
        let checker = checker();
        let alerts = checker.check(&position, &ctx);
        assert!(alerts.iter().all(|a| a.subtype != AlertSubtype::Ma50Sell));
    }

    #[test]
    fn scenario_s3_fires_with_volume_confirmation() {
        let position = dummy_position();
        let mut ctx = PositionContext::from_test_data("TSLA", dec!(49.50), dec!(88.0));
        ctx.sma_50 = Some(dec!(50.0));
        ctx.volume_ratio = 1.6;
        let checker = checker();
        let alerts = checker.check(&position, &ctx);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].subtype, AlertSubtype::Ma50Sell);
        assert_eq!(alerts[0].priority, Priority::P0);
    }

    /// Scenario S4: pnl=18%, volume_ratio=2.7, day_high=110, day_low=104
    /// (spread 5.77%), day_open=108, prev_close=105 (gap +2.86%),
    /// last=104.5 (close in lower 10% of range). Score = 100 -> P0.
    #[test]
    fn scenario_s4_climax_top_scores_100() {
        let position = dummy_position();
        let mut ctx = PositionContext::from_test_data("TSLA", dec!(104.5), dec!(88.0));
        ctx.pnl_pct = 18.0;
        ctx.volume_ratio = 2.7;
        ctx.day_high = dec!(110.0);
        ctx.day_low = dec!(104.0);
        ctx.day_open = dec!(108.0);
        ctx.prev_close = dec!(105.0);
        let checker = checker();
        let alerts = checker.check(&position, &ctx);
        let climax = alerts.iter().find(|a| a.subtype == AlertSubtype::ClimaxTop);
        assert!(climax.is_some());
        assert_eq!(climax.unwrap().priority, Priority::P0);
    }
}
