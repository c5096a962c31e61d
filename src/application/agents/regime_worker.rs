//! Regime worker: 300 s cycle that refreshes the daily market regime
//! snapshot (spec §4.4/§4.5). Gated to a wider window than the trading
//! session itself — 08:00-18:00 ET weekdays — since the first read after
//! the open and the closing recompute both matter, but the tracker's
//! intraday math only needs yesterday's confirmed bar. Grounded in the
//! teacher's `Sentinel::run` tick/command/shutdown shape, reused here for
//! a single-symbol-pair-at-a-time compute instead of a watchlist loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Timelike, Utc, Weekday};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::application::alerts::AlertService;
use crate::application::regime::RegimeCalculator;
use crate::domain::alert::{AlertPayload, AlertSubtype, AlertType, CandidateAlert, Priority};
use crate::domain::market_calendar::MarketCalendar;
use crate::domain::providers::{FuturesProvider, HistoricalProvider};
use crate::domain::regime::RegimeLabel;
use crate::domain::repositories::RegimeAlertRepository;

use super::command::WorkerCommand;
use super::regime_state::{RegimeSnapshot, SharedRegimeState};
use super::worker_stats::SharedWorkerStats;

const SPY_SYMBOL: &str = "SPY";
const QQQ_SYMBOL: &str = "QQQ";
const BAR_LOOKBACK_DAYS: u32 = 280;
const GATE_OPEN_UTC_HOUR: u32 = 13;
const GATE_CLOSE_UTC_HOUR: u32 = 23;

pub struct RegimeWorker {
    historical: Arc<dyn HistoricalProvider>,
    futures: Option<Arc<dyn FuturesProvider>>,
    regime_alerts: Arc<dyn RegimeAlertRepository>,
    calendar: Arc<dyn MarketCalendar>,
    alert_service: Arc<AlertService>,
    calculator: RegimeCalculator,
    shared: SharedRegimeState,
    interval: Duration,
    stats: SharedWorkerStats,
    cmd_rx: tokio::sync::mpsc::Receiver<WorkerCommand>,
    cancellation: CancellationToken,
    last_alerted_date: Option<chrono::NaiveDate>,
}

impl RegimeWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        historical: Arc<dyn HistoricalProvider>,
        futures: Option<Arc<dyn FuturesProvider>>,
        regime_alerts: Arc<dyn RegimeAlertRepository>,
        calendar: Arc<dyn MarketCalendar>,
        alert_service: Arc<AlertService>,
        calculator: RegimeCalculator,
        shared: SharedRegimeState,
        interval: Duration,
        stats: SharedWorkerStats,
        cmd_rx: tokio::sync::mpsc::Receiver<WorkerCommand>,
        cancellation: CancellationToken,
    ) -> Self {
        RegimeWorker {
            historical,
            futures,
            regime_alerts,
            calendar,
            alert_service,
            calculator,
            shared,
            interval,
            stats,
            cmd_rx,
            cancellation,
            last_alerted_date: None,
        }
    }

    /// Wider than the trading session: the morning recompute (overnight
    /// futures + gap) and the post-close recompute (confirmed D-day) both
    /// need this worker awake outside 09:30-16:00 ET.
    fn gate_open(&self, at: chrono::DateTime<Utc>) -> bool {
        if matches!(at.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        if !self.calendar.is_trading_day(at) {
            return false;
        }
        let hour = at.hour();
        hour >= GATE_OPEN_UTC_HOUR && hour < GATE_CLOSE_UTC_HOUR
    }

    pub async fn run(&mut self) {
        let mut tick = tokio::time::interval(self.interval);
        info!("regime worker: starting");

        loop {
            tokio::select! {
                _ = self.cancellation.cancelled() => {
                    info!("regime worker: shutdown received");
                    return;
                }
                _ = tick.tick() => {
                    let now = Utc::now();
                    if self.gate_open(now) {
                        self.run_cycle().await;
                    } else {
                        self.stats.write().await.record_gated(false);
                    }
                }
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(WorkerCommand::ForceCheck { .. }) => self.run_cycle().await,
                        None => {
                            warn!("regime worker: command channel closed");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn run_cycle(&mut self) {
        let start = std::time::Instant::now();
        let mut error: Option<String> = None;
        let mut messages = 0u64;

        match self.compute_and_publish().await {
            Ok(published) => messages = published as u64,
            Err(e) => {
                error!("regime worker: cycle failed: {e}");
                error = Some(e);
            }
        }

        self.stats.write().await.record_cycle(start.elapsed().as_millis() as u64, messages, true, error);
    }

    async fn compute_and_publish(&mut self) -> Result<u32, String> {
        let spy_bars = self.historical.get_daily_bars(SPY_SYMBOL, BAR_LOOKBACK_DAYS).await.map_err(|e| e.to_string())?;
        let qqq_bars = self.historical.get_daily_bars(QQQ_SYMBOL, BAR_LOOKBACK_DAYS).await.map_err(|e| e.to_string())?;

        let futures = match &self.futures {
            Some(provider) => match provider.get_futures_snapshot().await {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    warn!("regime worker: futures snapshot unavailable: {e}");
                    None
                }
            },
            None => None,
        };

        let date = chrono::Utc::now().date_naive();
        let mut snapshot = self
            .calculator
            .compute(date, &spy_bars, &qqq_bars, futures)
            .map_err(|e| e.to_string())?;

        // Unattended scheduler runs always overwrite the day's row (spec
        // §4.4): each cycle sees the latest confirmed bars.
        let already_alerted_today = self.last_alerted_date == Some(date);
        snapshot.alert_sent = already_alerted_today;

        let persisted = self
            .regime_alerts
            .upsert_for_date(date, snapshot, true)
            .await
            .map_err(|e| e.to_string())?;

        {
            let mut shared = self.shared.write().await;
            *shared = RegimeSnapshot {
                label: persisted.regime_label.as_str().to_string(),
                exposure_band: persisted.exposure_band,
            };
        }

        let mut published = 0u32;
        if !already_alerted_today {
            if let Some(candidate) = self.regime_change_alert(&persisted) {
                let results = self.alert_service.submit(vec![candidate]).await;
                if results.iter().any(|r| r.is_ok()) {
                    self.last_alerted_date = Some(date);
                    published += 1;
                }
            } else {
                // Nothing worth publishing today, but the snapshot is
                // still recorded; don't re-evaluate until tomorrow.
                self.last_alerted_date = Some(date);
            }
        }

        Ok(published)
    }

    /// Publishes once a day, only when the regime label differs from
    /// what a flat neutral start-of-day would imply or the D-day/FTD
    /// state materially changed; a quiet bullish/neutral day with no new
    /// pressure produces no market-channel noise.
    fn regime_change_alert(&self, snapshot: &crate::domain::regime::MarketRegimeAlert) -> Option<CandidateAlert> {
        let priority = match snapshot.regime_label {
            RegimeLabel::Bearish => Priority::P0,
            RegimeLabel::Neutral => Priority::P1,
            RegimeLabel::Bullish => Priority::P2,
        };

        let message = format!(
            "Market regime: {:?} (score {:.2}), {} distribution days, exposure band {}-{}%",
            snapshot.regime_label,
            snapshot.composite_score,
            snapshot.total_distribution_days(),
            snapshot.exposure_band.min_pct,
            snapshot.exposure_band.max_pct
        );

        Some(CandidateAlert {
            symbol: "MARKET".to_string(),
            alert_type: AlertType::Market,
            subtype: AlertSubtype::RegimeChange,
            position_id: None,
            payload: AlertPayload::default(),
            message,
            action: None,
            thread_source: "regime".to_string(),
            priority,
            eight_week_hold: None,
        })
    }
}
