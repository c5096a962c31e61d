//! Maintenance worker: off-hours housekeeping cycle (spec §4.5) — bar
//! cache warm, earnings-date refresh, and the 60-day `ExitedWatching` ->
//! `Stopped` auto-archive transition (spec §9 Open Question 4, resolved
//! as "archive silently, no alert"). Grounded in the teacher's
//! `Sentinel::run` tick/command/shutdown shape, applied to a full-roster
//! sweep instead of a watchlist/position subset.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::domain::market_calendar::MarketCalendar;
use crate::domain::position::StateCode;
use crate::domain::providers::HistoricalProvider;
use crate::domain::repositories::PositionRepository;

use super::command::WorkerCommand;
use super::worker_stats::SharedWorkerStats;

const ARCHIVE_AFTER_DAYS: i64 = 60;

pub struct MaintenanceWorker {
    positions: Arc<dyn PositionRepository>,
    historical: Arc<dyn HistoricalProvider>,
    calendar: Arc<dyn MarketCalendar>,
    interval: Duration,
    stats: SharedWorkerStats,
    cmd_rx: tokio::sync::mpsc::Receiver<WorkerCommand>,
    cancellation: CancellationToken,
}

impl MaintenanceWorker {
    pub fn new(
        positions: Arc<dyn PositionRepository>,
        historical: Arc<dyn HistoricalProvider>,
        calendar: Arc<dyn MarketCalendar>,
        interval: Duration,
        stats: SharedWorkerStats,
        cmd_rx: tokio::sync::mpsc::Receiver<WorkerCommand>,
        cancellation: CancellationToken,
    ) -> Self {
        MaintenanceWorker { positions, historical, calendar, interval, stats, cmd_rx, cancellation }
    }

    pub async fn run(&mut self) {
        let mut tick = tokio::time::interval(self.interval);
        info!("maintenance worker: starting");

        loop {
            tokio::select! {
                _ = self.cancellation.cancelled() => {
                    info!("maintenance worker: shutdown received");
                    return;
                }
                _ = tick.tick() => {
                    let now = Utc::now();
                    if self.calendar.is_market_open(now) {
                        self.stats.write().await.record_gated(true);
                    } else {
                        self.run_cycle().await;
                    }
                }
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(WorkerCommand::ForceCheck { .. }) => self.run_cycle().await,
                        None => {
                            warn!("maintenance worker: command channel closed");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn run_cycle(&self) {
        let start = std::time::Instant::now();
        let mut error: Option<String> = None;
        let mut messages = 0u64;

        match self.sweep().await {
            Ok(count) => messages = count,
            Err(e) => {
                error!("maintenance worker: cycle failed: {e}");
                error = Some(e);
            }
        }

        self.stats.write().await.record_cycle(start.elapsed().as_millis() as u64, messages, false, error);
    }

    async fn sweep(&self) -> Result<u64, String> {
        let mut touched = 0u64;
        touched += self.refresh_needing_sync().await?;
        touched += self.archive_stale_watchlist_exits().await?;
        Ok(touched)
    }

    /// Refreshes the technical cache's backing data and next-earnings
    /// date for every position the repository flags as stale (spec
    /// §4.5's "bar-cache refresh"/"earnings-date refresh" duties); the
    /// Position worker's in-memory technical cache naturally picks up
    /// the refreshed bars on its own TTL, so this thread only needs to
    /// touch the provider and the earnings_date column.
    async fn refresh_needing_sync(&self) -> Result<u64, String> {
        let stale = self.positions.get_needing_sync().await.map_err(|e| e.to_string())?;
        let mut refreshed = 0u64;

        for mut position in stale {
            if let Err(e) = self.historical.get_technicals(&position.symbol).await {
                warn!(symbol = %position.symbol, "maintenance worker: technicals refresh failed: {e}");
                continue;
            }

            match self.historical.get_earnings_date(&position.symbol).await {
                Ok(next_earnings) => {
                    if position.earnings_date != next_earnings {
                        position.earnings_date = next_earnings;
                        if let Err(e) = self.positions.update(&position).await {
                            error!(symbol = %position.symbol, "maintenance worker: earnings_date persist failed: {e}");
                            continue;
                        }
                    }
                }
                Err(e) => {
                    warn!(symbol = %position.symbol, "maintenance worker: earnings lookup failed: {e}");
                }
            }

            refreshed += 1;
        }

        Ok(refreshed)
    }

    /// Watchlist entries that fell out of a buy zone move to
    /// `ExitedWatching`; after 60 untouched days they're archived to
    /// `Stopped` so the watchlist doesn't accumulate dead symbols.
    /// Archiving here is silent — no alert, since nothing actionable
    /// happened; the transition itself is the record.
    async fn archive_stale_watchlist_exits(&self) -> Result<u64, String> {
        let all = self.positions.get_all(true).await.map_err(|e| e.to_string())?;
        let now = Utc::now();
        let mut archived = 0u64;

        for mut position in all {
            if position.state != StateCode::ExitedWatching {
                continue;
            }
            let age_days = (now - position.last_transition_at).num_days();
            if age_days < ARCHIVE_AFTER_DAYS {
                continue;
            }

            if let Err(e) = position.transition_to(StateCode::Stopped) {
                warn!(symbol = %position.symbol, "maintenance worker: archive transition rejected: {e}");
                continue;
            }
            if let Err(e) = self.positions.update(&position).await {
                error!(symbol = %position.symbol, "maintenance worker: archive persist failed: {e}");
                continue;
            }
            info!(symbol = %position.symbol, age_days, "maintenance worker: archived stale watchlist exit");
            archived += 1;
        }

        Ok(archived)
    }
}
