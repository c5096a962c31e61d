//! End-to-end coverage for the six scenarios named in spec §8, driven
//! entirely through the crate's public API (no `#[cfg(test)]`-only
//! helpers). Each test stands in for one scenario; see the module doc
//! comment on each test for the numbers it exercises.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use canslim_sentry::application::agents::new_shared_stats;
use canslim_sentry::application::position_monitor::{
    HealthChecker, MaChecker, PositionMonitor, ProfitChecker, PyramidChecker, ReentryChecker,
    StopChecker, WatchlistAltEntryChecker,
};
use canslim_sentry::application::system::{ServiceController, WorkerHandle};
use canslim_sentry::config::PositionMonitoringConfig;
use canslim_sentry::domain::alert::AlertSubtype;
use canslim_sentry::domain::checkers::{Checker, PositionContext};
use canslim_sentry::domain::errors::RegimeError;
use canslim_sentry::domain::position::{EntryTranche, Position, RatingsSnapshot, StateCode};
use canslim_sentry::domain::regime::{
    ExposureBand, IndexDistributionDays, MarketPhase, MarketRegimeAlert, RegimeLabel, TrendLabel,
};
use canslim_sentry::domain::repositories::RegimeAlertRepository;
use canslim_sentry::infrastructure::ipc::protocol::{Command, IpcHandler, ReplyStatus};

fn monitor() -> PositionMonitor {
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

fn position(symbol: &str, entry_price: Decimal, shares: Decimal, stop_price: Decimal) -> Position {
    Position {
        id: 1,
        symbol: symbol.to_string(),
        portfolio: "Swing".to_string(),
        state: StateCode::Entry2,
        pivot: entry_price,
        pattern_label: String::new(),
        base_stage: 1,
        base_depth_pct: 15.0,
        base_length_weeks: 6,
        ratings: RatingsSnapshot::default(),
        entries: vec![EntryTranche { shares, price: entry_price }],
        exits: vec![],
        final_close: None,
        hard_stop_pct: 0.07,
        stop_price,
        last_price: entry_price,
        max_price: entry_price,
        max_gain_pct: 0.0,
        health_score: 100,
        health_rating: "HEALTHY".to_string(),
        eight_week_hold_active: false,
        eight_week_hold_start: None,
        eight_week_hold_end: None,
        power_move_pct: None,
        power_move_weeks: None,
        watch_date: None,
        breakout_date: Some(chrono::Utc::now().date_naive() - Duration::days(15)),
        entry_date: Some(chrono::Utc::now().date_naive() - Duration::days(15)),
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

/// Bare-bones context, built from public fields only (the `from_test_data`
/// convenience constructor is `#[cfg(test)]`-gated inside the crate and
/// unavailable to an external integration test).
fn context(symbol: &str, current_price: Decimal, entry_price: Decimal) -> PositionContext {
    PositionContext {
        symbol: symbol.to_string(),
        position_id: 1,
        current_price,
        entry_price,
        pivot_price: entry_price,
        shares: Decimal::from(100),
        state: StateCode::Entry2,
        pnl_pct: 0.0,
        pnl_dollars: Decimal::ZERO,
        max_price: current_price,
        max_gain_pct: 0.0,
        ema_21: None,
        sma_50: None,
        sma_200: None,
        sma_10_week: None,
        volume_ratio: 1.0,
        rs_rating: Some(90),
        ad_rating: Some('A'),
        base_stage: 1,
        days_in_position: 10,
        days_since_breakout: Some(10),
        eight_week_hold_active: false,
        eight_week_hold_end: None,
        py1_done: false,
        py2_done: false,
        tp1_sold: 0,
        tp2_sold: 0,
        days_to_earnings: None,
        health_score: 100,
        canslim_grade: None,
        canslim_score: None,
        market_regime: "bullish".to_string(),
        spy_price: Decimal::from(500),
        hard_stop: entry_price * Decimal::new(93, 2),
        trailing_stop: None,
        day_open: current_price,
        day_high: current_price,
        day_low: current_price,
        prev_close: current_price,
        prior_extended_marker: None,
        alt_entry_test_count: 0,
        recent_price_history: Vec::new(),
    }
}

/// S1: a hard stop (category Stop, P0) fires and blocks the MA checker's
/// same-cycle `Ma50Sell` (category Technical) per §8 invariant 2.
#[test]
fn s1_hard_stop_short_circuits_ma_alert() {
    let position = position("NVDA", dec!(100.0), dec!(200), dec!(93.0));
    let mut ctx = context("NVDA", dec!(92.50), dec!(100.0));
    ctx.hard_stop = dec!(93.0);
    ctx.sma_50 = Some(dec!(95.0));
    ctx.volume_ratio = 2.0; // would otherwise confirm ma_50_sell

    let result = monitor().run_cycle(&[(position, ctx)]);

    assert!(result.errors.is_empty());
    assert!(result.alerts.iter().any(|a| a.subtype == AlertSubtype::HardStop));
    assert!(result.alerts.iter().all(|a| a.subtype != AlertSubtype::Ma50Sell));
}

/// S2: an 8-week hold activates on a power move within the breakout
/// window, and blocks TP1 for as long as the hold remains open.
#[test]
fn s2_eight_week_hold_activates_then_suppresses_tp1() {
    let cfg = PositionMonitoringConfig::default();
    let checker = ProfitChecker::new(cfg.eight_week_hold, 20.0, 25.0);
    let position = position("AAPL", dec!(150.0), dec!(100), dec!(139.5));

    let mut activation_ctx = context("AAPL", dec!(185.0), dec!(150.0));
    activation_ctx.days_since_breakout = Some(15);
    activation_ctx.pnl_pct = 23.0;
    let activation_alerts = checker.check(&position, &activation_ctx);
    assert_eq!(activation_alerts.len(), 1);
    assert_eq!(activation_alerts[0].subtype, AlertSubtype::EightWeekHold);

    let mut held_ctx = context("AAPL", dec!(185.0), dec!(150.0));
    held_ctx.days_since_breakout = Some(15);
    held_ctx.pnl_pct = 23.0;
    held_ctx.eight_week_hold_active = true;
    held_ctx.eight_week_hold_end = Some(chrono::Utc::now().date_naive() + Duration::days(40));
    let held_alerts = checker.check(&position, &held_ctx);
    assert!(held_alerts.iter().all(|a| a.subtype != AlertSubtype::Tp1));
}

/// S3: a 50-SMA breakdown only fires with volume confirmation above the
/// configured threshold (1.5x by default).
#[test]
fn s3_fifty_sma_breakdown_needs_volume_confirmation() {
    let cfg = PositionMonitoringConfig::default();
    let checker = MaChecker::new(cfg.technical, cfg.climax_top);
    let position = position("TSLA", dec!(88.0), dec!(50), dec!(81.8));

    let mut thin_volume = context("TSLA", dec!(49.50), dec!(88.0));
    thin_volume.sma_50 = Some(dec!(50.0));
    thin_volume.volume_ratio = 1.2;
    let alerts = checker.check(&position, &thin_volume);
    assert!(alerts.iter().all(|a| a.subtype != AlertSubtype::Ma50Sell));

    let mut confirmed = context("TSLA", dec!(49.50), dec!(88.0));
    confirmed.sma_50 = Some(dec!(50.0));
    confirmed.volume_ratio = 1.6;
    let alerts = checker.check(&position, &confirmed);
    assert!(alerts.iter().any(|a| a.subtype == AlertSubtype::Ma50Sell));
}

/// S4: a climax-top composite score (volume + spread + gap + weak close)
/// reaches the high-conviction threshold and is reported P0.
#[test]
fn s4_climax_top_reaches_high_conviction_score() {
    let cfg = PositionMonitoringConfig::default();
    let checker = MaChecker::new(cfg.technical, cfg.climax_top);
    let position = position("TSLA", dec!(88.0), dec!(50), dec!(81.8));

    let mut ctx = context("TSLA", dec!(104.5), dec!(88.0));
    ctx.pnl_pct = 18.0;
    ctx.volume_ratio = 2.7;
    ctx.day_high = dec!(110.0);
    ctx.day_low = dec!(104.0);
    ctx.day_open = dec!(108.0);
    ctx.prev_close = dec!(105.0);

    let alerts = checker.check(&position, &ctx);
    let climax = alerts
        .iter()
        .find(|a| a.subtype == AlertSubtype::ClimaxTop)
        .expect("climax top alert");
    assert_eq!(climax.priority, canslim_sentry::domain::alert::Priority::P0);
}

/// S5: a worsening five-day trend with 21 combined distribution days
/// flips the regime to bearish and drops exposure to the bottom band.
#[test]
fn s5_regime_flips_bearish_on_distribution_day_buildup() {
    let alert = MarketRegimeAlert {
        date: chrono::NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
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
    assert_eq!(alert.total_distribution_days(), 21);
    assert_eq!(alert.exposure_band, ExposureBand { min_pct: 0, max_pct: 20 });
}

struct NoopRegimeAlertRepository;

#[async_trait]
impl RegimeAlertRepository for NoopRegimeAlertRepository {
    async fn get_latest(&self) -> Result<Option<MarketRegimeAlert>, RegimeError> {
        Ok(None)
    }
    async fn upsert_for_date(
        &self,
        _date: chrono::NaiveDate,
        snapshot: MarketRegimeAlert,
        _overwrite: bool,
    ) -> Result<MarketRegimeAlert, RegimeError> {
        Ok(snapshot)
    }
}

/// S6: a SHUTDOWN command replies success immediately and fires the
/// shared cancellation token, which is what wakes every worker's
/// `select!` within one poll period.
#[tokio::test]
async fn s6_shutdown_replies_success_and_cancels() {
    let shutdown = CancellationToken::new();
    let mut workers: HashMap<&'static str, WorkerHandle> = HashMap::new();
    for name in ["breakout", "position", "regime", "maintenance"] {
        let (cmd_tx, _cmd_rx) = mpsc::channel(1);
        workers.insert(name, WorkerHandle { stats: new_shared_stats(), cmd_tx });
    }
    let controller = ServiceController::new(workers, Arc::new(NoopRegimeAlertRepository), shutdown.clone());

    let reply = controller.handle(Command::Shutdown, "req-1".to_string()).await;

    assert_eq!(reply.status, ReplyStatus::Success);
    assert_eq!(reply.data["message"], "Shutdown initiated");
    assert!(shutdown.is_cancelled());
}
