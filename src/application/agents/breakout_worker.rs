//! Breakout worker: 60 s, market-hours-gated cycle over the state-0
//! watchlist (spec §4.5). Grounded in the teacher's `Sentinel::run`
//! shape (`application::agents::sentinel`) — a `tokio::select!` over a
//! tick interval, a command channel, and cancellation — applied here to
//! a poll-and-score cycle instead of a streaming subscription.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::application::alerts::AlertService;
use crate::application::breakout::{BreakoutScorer, PositionSizer};
use crate::domain::alert::{AlertPayload, AlertSubtype, AlertType, CandidateAlert, Priority};
use crate::domain::market_calendar::MarketCalendar;
use crate::domain::providers::RealtimeProvider;
use crate::domain::repositories::PositionRepository;

use super::command::WorkerCommand;
use super::regime_state::SharedRegimeState;
use super::worker_stats::SharedWorkerStats;

pub struct BreakoutWorker {
    positions: Arc<dyn PositionRepository>,
    realtime: Arc<dyn RealtimeProvider>,
    calendar: Arc<dyn MarketCalendar>,
    alert_service: Arc<AlertService>,
    scorer: BreakoutScorer,
    sizer: PositionSizer,
    regime: SharedRegimeState,
    interval: Duration,
    stats: SharedWorkerStats,
    cmd_rx: tokio::sync::mpsc::Receiver<WorkerCommand>,
    cancellation: CancellationToken,
}

impl BreakoutWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        positions: Arc<dyn PositionRepository>,
        realtime: Arc<dyn RealtimeProvider>,
        calendar: Arc<dyn MarketCalendar>,
        alert_service: Arc<AlertService>,
        scorer: BreakoutScorer,
        sizer: PositionSizer,
        regime: SharedRegimeState,
        interval: Duration,
        stats: SharedWorkerStats,
        cmd_rx: tokio::sync::mpsc::Receiver<WorkerCommand>,
        cancellation: CancellationToken,
    ) -> Self {
        BreakoutWorker {
            positions,
            realtime,
            calendar,
            alert_service,
            scorer,
            sizer,
            regime,
            interval,
            stats,
            cmd_rx,
            cancellation,
        }
    }

    pub async fn run(&mut self) {
        let mut tick = tokio::time::interval(self.interval);
        info!("breakout worker: starting");

        loop {
            tokio::select! {
                _ = self.cancellation.cancelled() => {
                    info!("breakout worker: shutdown received");
                    return;
                }
                _ = tick.tick() => {
                    let now = chrono::Utc::now();
                    if self.calendar.is_market_open(now) {
                        self.run_cycle(None).await;
                    } else {
                        self.stats.write().await.record_gated(false);
                    }
                }
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(WorkerCommand::ForceCheck { symbol }) => self.run_cycle(symbol).await,
                        None => {
                            warn!("breakout worker: command channel closed");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn run_cycle(&self, only_symbol: Option<String>) {
        let start = std::time::Instant::now();
        let mut error: Option<String> = None;
        let mut messages = 0u64;

        match self.evaluate_watchlist(only_symbol).await {
            Ok(count) => messages = count,
            Err(e) => {
                error!("breakout worker: cycle failed: {e}");
                error = Some(e);
            }
        }

        self.stats.write().await.record_cycle(start.elapsed().as_millis() as u64, messages, true, error);
    }

    async fn evaluate_watchlist(&self, only_symbol: Option<String>) -> Result<u64, String> {
        let mut watchlist = self.positions.get_watching().await.map_err(|e| e.to_string())?;
        if let Some(symbol) = &only_symbol {
            watchlist.retain(|p| &p.symbol == symbol);
        }
        if watchlist.is_empty() {
            return Ok(0);
        }

        let symbols: Vec<String> = watchlist.iter().map(|p| p.symbol.clone()).collect();
        let quotes = self.realtime.get_quotes(&symbols).await.map_err(|e| e.to_string())?;
        let exposure_band = self.regime.read().await.exposure_band;

        let mut emitted = 0u64;
        for position in &watchlist {
            let Some(quote) = quotes.get(&position.symbol) else { continue };
            let Some(breakdown) = self.scorer.score(position, quote) else { continue };
            if !self.scorer.is_actionable(&breakdown) {
                continue;
            }

            let sizing = self.sizer.initial_entry(quote.last, &exposure_band);
            if sizing.shares.is_zero() {
                continue;
            }

            let priority = if self.scorer.is_high_conviction(&breakdown) { Priority::P0 } else { Priority::P1 };
            let candidate = CandidateAlert {
                symbol: position.symbol.clone(),
                alert_type: AlertType::Add,
                subtype: AlertSubtype::InBuyZone,
                position_id: Some(position.id),
                payload: AlertPayload {
                    price: Some(quote.last),
                    pivot: Some(position.pivot),
                    ..Default::default()
                },
                message: format!(
                    "{} cleared pivot {} (score {:.0}), size {} shares (${})",
                    position.symbol, position.pivot, breakdown.total, sizing.shares, sizing.target_dollars
                ),
                action: Some("enter".to_string()),
                thread_source: "breakout".to_string(),
                priority,
                eight_week_hold: None,
            };

            let results = self.alert_service.submit(vec![candidate]).await;
            emitted += results.iter().filter(|r| r.is_ok()).count() as u64;
        }

        Ok(emitted)
    }
}
