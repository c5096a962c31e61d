//! Position Monitor: the rule engine orchestrating the checker chain
//! against every active/watching position per cycle (spec §4.3).
//!
//! Grounded in the original `PositionMonitor.run_cycle()`/`_check_position()`
//! shape (`original_source/core/position_monitor/monitor.py`), re-expressed
//! as a fixed, ordered `Vec<Box<dyn Checker>>` per spec §9's "closed and
//! ordered" design note.

mod health_checker;
mod ma_checker;
mod profit_checker;
mod pyramid_checker;
mod reentry_checker;
mod stop_checker;
mod watchlist_alt_entry_checker;

pub use health_checker::HealthChecker;
pub use ma_checker::MaChecker;
pub use profit_checker::ProfitChecker;
pub use pyramid_checker::PyramidChecker;
pub use reentry_checker::ReentryChecker;
pub use stop_checker::StopChecker;
pub use watchlist_alt_entry_checker::WatchlistAltEntryChecker;

use chrono::{DateTime, Utc};

use crate::domain::alert::{AlertType, CandidateAlert};
use crate::domain::checkers::{Checker, PositionContext};
use crate::domain::position::Position;

#[derive(Debug, Clone)]
pub struct MonitorCycleResult {
    pub positions_checked: usize,
    pub alerts_generated: usize,
    pub alerts: Vec<CandidateAlert>,
    pub errors: Vec<String>,
    pub cycle_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Categories that a P0 alert short-circuits for the rest of the cycle,
/// per spec §4.3 ("earlier P0 alerts short-circuit later same-category
/// checkers") and §8 invariant 2 (hard_stop blocks later Stop/MA alerts).
fn is_short_circuit_category(alert_type: AlertType) -> bool {
    matches!(alert_type, AlertType::Stop | AlertType::Technical)
}

/// Stop and Technical (MA) are one combined short-circuit group: §8
/// invariant 2 requires that a `hard_stop` (category Stop) block *both*
/// later Stop *and* later MA checkers in the same cycle, not just later
/// alerts of its own category.
const SHORT_CIRCUIT_GROUP: [AlertType; 2] = [AlertType::Stop, AlertType::Technical];

pub struct PositionMonitor {
    checkers: Vec<Box<dyn Checker>>,
}

impl PositionMonitor {
    /// Builds the fixed checker chain in the declared order: Stop,
    /// Profit, Pyramid, MA, Health, Reentry, WatchlistAltEntry.
    pub fn new(checkers: Vec<Box<dyn Checker>>) -> Self {
        PositionMonitor { checkers }
    }

    /// Evaluates every checker against one position, honoring the
    /// short-circuit rule: once a Stop or MA (Technical) category P0
    /// alert fires, subsequent checkers in those categories are skipped
    /// for this position this cycle. A single checker panicking is
    /// caught, logged via the returned error string, and that checker is
    /// skipped for this position (spec §7: "Per-checker exception inside
    /// a position: caught by the monitor wrapper, logged, checker skipped
    /// for that position").
    fn check_position(
        &self,
        position: &Position,
        context: &PositionContext,
    ) -> (Vec<CandidateAlert>, Vec<String>) {
        let mut alerts = Vec::new();
        let mut checker_errors = Vec::new();
        let mut short_circuited: Vec<AlertType> = Vec::new();

        for checker in &self.checkers {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                checker.check(position, context)
            }));
            let produced = match outcome {
                Ok(produced) => produced,
                Err(_) => {
                    checker_errors.push(format!("{}: checker '{}' panicked", position.symbol, checker.name()));
                    continue;
                }
            };
            for alert in produced {
                if short_circuited.contains(&alert.alert_type) {
                    continue;
                }
                let is_p0 = alert.priority == crate::domain::alert::Priority::P0;
                if is_p0 && is_short_circuit_category(alert.alert_type) {
                    for category in SHORT_CIRCUIT_GROUP {
                        if !short_circuited.contains(&category) {
                            short_circuited.push(category);
                        }
                    }
                }
                alerts.push(alert);
            }
        }

        (alerts, checker_errors)
    }

    /// Runs one full cycle over `positions`, catching per-position
    /// failures so the cycle always completes (spec §7: "Per-position
    /// exception inside a cycle: caught by the monitor, symbol appended
    /// to errors[], cycle continues").
    pub fn run_cycle(&self, positions: &[(Position, PositionContext)]) -> MonitorCycleResult {
        let start = std::time::Instant::now();
        let timestamp = Utc::now();
        let mut all_alerts = Vec::new();
        let mut errors = Vec::new();

        for (position, context) in positions {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                self.check_position(position, context)
            }));
            match outcome {
                Ok((alerts, checker_errors)) => {
                    all_alerts.extend(alerts);
                    errors.extend(checker_errors);
                }
                Err(_) => errors.push(format!("{}: position check panicked", position.symbol)),
            }
        }

        MonitorCycleResult {
            positions_checked: positions.len(),
            alerts_generated: all_alerts.len(),
            alerts: all_alerts,
            errors,
            cycle_time_ms: start.elapsed().as_millis() as u64,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PositionMonitoringConfig;
    use crate::domain::alert::AlertSubtype;
    use crate::domain::position::{EntryTranche, RatingsSnapshot, StateCode};
    use rust_decimal_macros::dec;

    fn default_monitor() -> PositionMonitor {
        let cfg = PositionMonitoringConfig::default();
        PositionMonitor::new(vec![
            Box::new(StopChecker::new(cfg.stop_loss, cfg.trailing_stop)),
            Box::new(ProfitChecker::new(cfg.eight_week_hold, 20.0, 25.0)),
            Box::new(PyramidChecker::new(cfg.pyramid)),
            Box::new(MaChecker::new(cfg.technical, cfg.climax_top)),
            Box::new(HealthChecker::new(cfg.health, cfg.earnings, cfg.extended)),
            Box::new(ReentryChecker::new(cfg.reentry)),
            Box::new(WatchlistAltEntryChecker::new(cfg.alt_entry)),
        ])
    }

    fn dummy_position(symbol: &str) -> Position {
        Position {
            id: 1,
            symbol: symbol.to_string(),
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

    /// Scenario S1: hard stop fires, no later MA alert in the same cycle.
    #[test]
    fn scenario_s1_short_circuits_ma_checks() {
        let monitor = default_monitor();
        let position = dummy_position("NVDA");
        let mut ctx = PositionContext::from_test_data("NVDA", dec!(92.50), dec!(100.0));
        ctx.hard_stop = dec!(93.0);
        ctx.sma_50 = Some(dec!(95.0));
        ctx.volume_ratio = 2.0; // would otherwise trigger ma_50_sell
        let result = monitor.run_cycle(&[(position, ctx)]);
        assert_eq!(result.positions_checked, 1);
        assert!(result.alerts.iter().any(|a| a.subtype == AlertSubtype::HardStop));
        assert!(result.alerts.iter().all(|a| a.subtype != AlertSubtype::Ma50Sell));
        assert!(result.errors.is_empty());
    }

    #[test]
    fn cycle_over_multiple_positions_counts_correctly() {
        let monitor = default_monitor();
        let p1 = dummy_position("NVDA");
        let p2 = dummy_position("AMD");
        let ctx1 = PositionContext::from_test_data("NVDA", dec!(110.0), dec!(100.0));
        let ctx2 = PositionContext::from_test_data("AMD", dec!(105.0), dec!(100.0));
        let result = monitor.run_cycle(&[(p1, ctx1), (p2, ctx2)]);
        assert_eq!(result.positions_checked, 2);
    }
}
