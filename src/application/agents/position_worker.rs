//! Position worker: 30 s, market-hours-gated cycle running the Position
//! Monitor over every state >= 1 position (spec §4.3/§4.5). Grounded in
//! the teacher's `Sentinel::run` tick/command/shutdown `select!` shape,
//! with the technical-data cache and price-history ring buffer pulled
//! out of `original_source/`'s position monitor (bar refresh cached
//! "~4h", last-10-closes bounce detection for the reentry/alt-entry
//! checkers).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::application::alerts::AlertService;
use crate::application::position_monitor::PositionMonitor;
use crate::domain::alert::CandidateAlert;
use crate::domain::checkers::PositionContext;
use crate::domain::market_calendar::MarketCalendar;
use crate::domain::position::Position;
use crate::domain::providers::{HistoricalProvider, Quote, RealtimeProvider, TechnicalSnapshot};
use crate::domain::repositories::PositionRepository;

use super::command::WorkerCommand;
use super::regime_state::SharedRegimeState;
use super::worker_stats::SharedWorkerStats;

const TECHNICAL_CACHE_TTL: Duration = Duration::from_secs(4 * 60 * 60);
const PRICE_HISTORY_LEN: usize = 10;
const SPY_SYMBOL: &str = "SPY";

struct TechnicalCache {
    entries: Mutex<HashMap<String, (TechnicalSnapshot, Instant)>>,
}

impl TechnicalCache {
    fn new() -> Self {
        TechnicalCache { entries: Mutex::new(HashMap::new()) }
    }

    async fn get_or_refresh(
        &self,
        symbol: &str,
        historical: &dyn HistoricalProvider,
    ) -> Option<TechnicalSnapshot> {
        {
            let cache = self.entries.lock().await;
            if let Some((snapshot, fetched_at)) = cache.get(symbol) {
                if fetched_at.elapsed() < TECHNICAL_CACHE_TTL {
                    return Some(snapshot.clone());
                }
            }
        }
        match historical.get_technicals(symbol).await {
            Ok(snapshot) => {
                self.entries.lock().await.insert(symbol.to_string(), (snapshot.clone(), Instant::now()));
                Some(snapshot)
            }
            Err(e) => {
                warn!(symbol, "position worker: technical refresh failed: {e}");
                None
            }
        }
    }
}

struct PriceHistoryCache {
    history: Mutex<HashMap<String, VecDeque<Decimal>>>,
}

impl PriceHistoryCache {
    fn new() -> Self {
        PriceHistoryCache { history: Mutex::new(HashMap::new()) }
    }

    async fn push_and_snapshot(&self, symbol: &str, price: Decimal) -> Vec<Decimal> {
        let mut history = self.history.lock().await;
        let entry = history.entry(symbol.to_string()).or_default();
        entry.push_back(price);
        while entry.len() > PRICE_HISTORY_LEN {
            entry.pop_front();
        }
        entry.iter().copied().collect()
    }
}

pub struct PositionWorker {
    positions: Arc<dyn PositionRepository>,
    realtime: Arc<dyn RealtimeProvider>,
    historical: Arc<dyn HistoricalProvider>,
    calendar: Arc<dyn MarketCalendar>,
    alert_service: Arc<AlertService>,
    monitor: PositionMonitor,
    regime: SharedRegimeState,
    technical_cache: TechnicalCache,
    price_history: PriceHistoryCache,
    interval: Duration,
    stats: SharedWorkerStats,
    cmd_rx: tokio::sync::mpsc::Receiver<WorkerCommand>,
    cancellation: CancellationToken,
}

impl PositionWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        positions: Arc<dyn PositionRepository>,
        realtime: Arc<dyn RealtimeProvider>,
        historical: Arc<dyn HistoricalProvider>,
        calendar: Arc<dyn MarketCalendar>,
        alert_service: Arc<AlertService>,
        monitor: PositionMonitor,
        regime: SharedRegimeState,
        interval: Duration,
        stats: SharedWorkerStats,
        cmd_rx: tokio::sync::mpsc::Receiver<WorkerCommand>,
        cancellation: CancellationToken,
    ) -> Self {
        PositionWorker {
            positions,
            realtime,
            historical,
            calendar,
            alert_service,
            monitor,
            regime,
            technical_cache: TechnicalCache::new(),
            price_history: PriceHistoryCache::new(),
            interval,
            stats,
            cmd_rx,
            cancellation,
        }
    }

    pub async fn run(&mut self) {
        let mut tick = tokio::time::interval(self.interval);
        info!("position worker: starting");

        loop {
            tokio::select! {
                _ = self.cancellation.cancelled() => {
                    info!("position worker: shutdown received");
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
                            warn!("position worker: command channel closed");
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

        match self.tick(only_symbol).await {
            Ok(result) => {
                messages = result.alerts_generated as u64;
                if !result.errors.is_empty() {
                    error = Some(result.errors.join("; "));
                }
            }
            Err(e) => {
                error!("position worker: cycle failed: {e}");
                error = Some(e);
            }
        }

        self.stats.write().await.record_cycle(start.elapsed().as_millis() as u64, messages, true, error);
    }

    async fn tick(&self, only_symbol: Option<String>) -> Result<crate::application::position_monitor::MonitorCycleResult, String> {
        let mut active = self.positions.get_in_position().await.map_err(|e| e.to_string())?;
        if let Some(symbol) = &only_symbol {
            active.retain(|p| &p.symbol == symbol);
        }
        if active.is_empty() {
            return Ok(crate::application::position_monitor::MonitorCycleResult {
                positions_checked: 0,
                alerts_generated: 0,
                alerts: Vec::new(),
                errors: Vec::new(),
                cycle_time_ms: 0,
                timestamp: chrono::Utc::now(),
            });
        }

        let mut symbols: Vec<String> = active.iter().map(|p| p.symbol.clone()).collect();
        symbols.push(SPY_SYMBOL.to_string());
        let quotes = self.realtime.get_quotes(&symbols).await.map_err(|e| e.to_string())?;
        let spy_price = quotes.get(SPY_SYMBOL).map(|q| q.last).unwrap_or_default();
        let regime_label = self.regime.read().await.label.clone();

        let mut pairs: Vec<(Position, PositionContext)> = Vec::with_capacity(active.len());
        for position in active {
            let Some(quote): Option<&Quote> = quotes.get(&position.symbol) else { continue };
            let history = self.price_history.push_and_snapshot(&position.symbol, quote.last).await;
            let mut context = PositionContext::from_position(&position, quote, &regime_label, spy_price, history);
            if let Some(technicals) = self.technical_cache.get_or_refresh(&position.symbol, self.historical.as_ref()).await {
                context.ema_21 = technicals.ema_21;
                context.sma_50 = technicals.sma_50;
                context.sma_200 = technicals.sma_200;
                context.sma_10_week = technicals.sma_10_week;
            }
            pairs.push((position, context));
        }

        let result = self.monitor.run_cycle(&pairs);
        self.persist_tracking(&pairs, &quotes, &result.alerts).await;
        Ok(result)
    }

    /// Updates last/max price for every synced position, and writes back
    /// any 8-week-hold activations in their own short transaction (spec
    /// §4.3: "the position object received by the checker is detached").
    async fn persist_tracking(
        &self,
        pairs: &[(Position, PositionContext)],
        quotes: &HashMap<String, Quote>,
        alerts: &[CandidateAlert],
    ) {
        let now = chrono::Utc::now();
        for (position, _) in pairs {
            if let Some(quote) = quotes.get(&position.symbol) {
                if let Err(e) = self.positions.update_price(position.id, quote.last, now).await {
                    warn!(symbol = %position.symbol, "position worker: update_price failed: {e}");
                }
            }
        }

        for candidate in alerts {
            let Some(update) = &candidate.eight_week_hold else { continue };
            let Some((position, _)) = pairs.iter().find(|(p, _)| Some(p.id) == candidate.position_id) else { continue };
            let mut updated = position.clone();
            updated.eight_week_hold_active = update.hold_active;
            updated.eight_week_hold_start = Some(update.hold_start);
            updated.eight_week_hold_end = Some(update.hold_end);
            updated.power_move_pct = Some(update.power_move_pct);
            updated.power_move_weeks = Some(update.power_move_weeks);
            if let Err(e) = self.positions.update(&updated).await {
                error!(symbol = %updated.symbol, "position worker: 8-week-hold persist failed: {e}");
            }
        }
    }
}
