//! Service controller bootstrap: wires persistence, providers, the
//! alert pipeline, and the four worker threads into one running
//! service, then exposes the IPC transport and a graceful shutdown path
//! (spec §4.6/§4.7). Grounded in the teacher's `application::system::
//! Application::build()`/`start()` split — persistence and services are
//! constructed up front, agents are spawned in `start()`, and a
//! cancellation-driven shutdown sequence tears everything back down in
//! the reverse order.

mod controller;
mod provider_seed;

pub use controller::{ServiceController, WorkerHandle};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::agents::{
    new_shared_regime_state, new_shared_stats, BreakoutWorker, MaintenanceWorker, PositionWorker,
    RegimeWorker, WorkerCommand,
};
use crate::application::alerts::{AlertService, RoutingTable};
use crate::application::breakout::{BreakoutScorer, PositionSizer};
use crate::application::position_monitor::{
    HealthChecker, MaChecker, PositionMonitor, ProfitChecker, PyramidChecker, ReentryChecker,
    StopChecker, WatchlistAltEntryChecker,
};
use crate::application::regime::RegimeCalculator;
use crate::config::Config;
use crate::domain::checkers::Checker;
use crate::domain::market_calendar::{MarketCalendar, WeekdayFallbackCalendar};
use crate::domain::repositories::{AlertRepository, PositionRepository, ProviderConfigRepository, RegimeAlertRepository};
use crate::infrastructure::ipc;
use crate::infrastructure::ipc::protocol::IpcHandler;
use crate::infrastructure::persistence::{
    Database, SqliteAlertRepository, SqlitePositionRepository, SqliteProviderConfigRepository,
    SqliteRegimeAlertRepository,
};
use crate::infrastructure::providers::factory::ProviderFactory;
use crate::infrastructure::sinks::{ChatSink, DiscordWebhookSink};

const WORKER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything built from config/persistence before any worker is
/// spawned: the pieces `start()` needs but that don't themselves run a
/// background loop.
pub struct Application {
    config: Config,
    positions: Arc<dyn PositionRepository>,
    alerts_repo: Arc<dyn AlertRepository>,
    regime_alerts: Arc<dyn RegimeAlertRepository>,
    provider_factory: Arc<ProviderFactory>,
    calendar: Arc<dyn MarketCalendar>,
    alert_service: Arc<AlertService>,
}

/// Live handle to a running service: join handles for every spawned
/// task plus the cancellation token that tears them all down.
pub struct ApplicationHandle {
    cancellation: CancellationToken,
    provider_factory: Arc<ProviderFactory>,
    worker_tasks: Vec<(&'static str, JoinHandle<()>)>,
    ipc_task: JoinHandle<()>,
}

impl Application {
    pub async fn build(config: Config) -> Result<Self> {
        info!("building canslim-sentry application");

        let database = Database::new(&config.database_url).await.context("database init failed")?;
        let pool = database.pool.clone();

        let positions: Arc<dyn PositionRepository> = Arc::new(SqlitePositionRepository::new(pool.clone()));
        let alerts_repo: Arc<dyn AlertRepository> = Arc::new(SqliteAlertRepository::new(pool.clone()));
        let regime_alerts: Arc<dyn RegimeAlertRepository> = Arc::new(SqliteRegimeAlertRepository::new(pool.clone()));
        let provider_configs: Arc<dyn ProviderConfigRepository> =
            Arc::new(SqliteProviderConfigRepository::new(pool.clone()));

        provider_seed::seed_default_providers(&provider_configs, &config)
            .await
            .context("provider seeding failed")?;

        let provider_factory = Arc::new(ProviderFactory::new(provider_configs));
        let calendar: Arc<dyn MarketCalendar> = Arc::new(WeekdayFallbackCalendar::new_eastern());

        let sinks = build_sinks(&config);
        let alert_service = Arc::new(AlertService::new(
            alerts_repo.clone(),
            sinks,
            RoutingTable::new(config.alerts.alert_routing.clone()),
            Duration::from_secs(config.alerts.cooldown_minutes * 60),
            config.alerts.enable_cooldown,
            config.alerts.enable_suppression,
            config.alerts.suppressed_subtypes.clone(),
            config.alerts.sink_rate_limit_per_minute,
        ));

        Ok(Application {
            config,
            positions,
            alerts_repo,
            regime_alerts,
            provider_factory,
            calendar,
            alert_service,
        })
    }

    pub async fn start(self) -> Result<ApplicationHandle> {
        let historical = self.provider_factory.historical_provider().await.context("historical provider")?;
        let realtime = self.provider_factory.realtime_provider().await.context("realtime provider")?;
        let futures = match self.provider_factory.futures_provider().await {
            Ok(provider) => Some(provider),
            Err(e) => {
                warn!("futures provider unavailable, regime worker will run without overnight futures: {e}");
                None
            }
        };

        let regime_state = new_shared_regime_state();
        let breakout_stats = new_shared_stats();
        let position_stats = new_shared_stats();
        let regime_stats = new_shared_stats();
        let maintenance_stats = new_shared_stats();

        let monitor = PositionMonitor::new(build_checker_chain(&self.config));
        let scorer = BreakoutScorer::new(self.config.breakout_scoring.clone());
        let sizer = PositionSizer::new(self.config.position_sizing.clone());

        let cancellation = CancellationToken::new();

        let (breakout_tx, breakout_rx) = mpsc::channel(8);
        let (position_tx, position_rx) = mpsc::channel(8);
        let (regime_tx, regime_rx) = mpsc::channel(8);
        let (maintenance_tx, maintenance_rx) = mpsc::channel(8);

        let mut breakout_worker = BreakoutWorker::new(
            self.positions.clone(),
            realtime.clone(),
            self.calendar.clone(),
            self.alert_service.clone(),
            scorer,
            sizer,
            regime_state.clone(),
            Duration::from_secs(self.config.threads.breakout_interval_secs),
            breakout_stats.clone(),
            breakout_rx,
            cancellation.clone(),
        );

        let mut position_worker = PositionWorker::new(
            self.positions.clone(),
            realtime.clone(),
            historical.clone(),
            self.calendar.clone(),
            self.alert_service.clone(),
            monitor,
            regime_state.clone(),
            Duration::from_secs(self.config.threads.position_interval_secs),
            position_stats.clone(),
            position_rx,
            cancellation.clone(),
        );

        let mut regime_worker = RegimeWorker::new(
            historical.clone(),
            futures,
            self.regime_alerts.clone(),
            self.calendar.clone(),
            self.alert_service.clone(),
            RegimeCalculator::new(self.config.market_regime),
            regime_state.clone(),
            Duration::from_secs(self.config.threads.regime_interval_secs),
            regime_stats.clone(),
            regime_rx,
            cancellation.clone(),
        );

        let mut maintenance_worker = MaintenanceWorker::new(
            self.positions.clone(),
            historical.clone(),
            self.calendar.clone(),
            Duration::from_secs(self.config.threads.maintenance_interval_secs),
            maintenance_stats.clone(),
            maintenance_rx,
            cancellation.clone(),
        );

        let worker_tasks: Vec<(&'static str, JoinHandle<()>)> = vec![
            ("breakout", tokio::spawn(async move { breakout_worker.run().await })),
            ("position", tokio::spawn(async move { position_worker.run().await })),
            ("regime", tokio::spawn(async move { regime_worker.run().await })),
            ("maintenance", tokio::spawn(async move { maintenance_worker.run().await })),
        ];

        let mut workers = HashMap::new();
        workers.insert("breakout", WorkerHandle { stats: breakout_stats, cmd_tx: breakout_tx });
        workers.insert("position", WorkerHandle { stats: position_stats, cmd_tx: position_tx });
        workers.insert("regime", WorkerHandle { stats: regime_stats, cmd_tx: regime_tx });
        workers.insert("maintenance", WorkerHandle { stats: maintenance_stats, cmd_tx: maintenance_tx });

        let controller: Arc<dyn IpcHandler> =
            Arc::new(ServiceController::new(workers, self.regime_alerts.clone(), cancellation.clone()));

        let ipc_socket_path = self.config.ipc_socket_path.clone();
        let ipc_cancellation = cancellation.clone();
        let ipc_task = tokio::spawn(async move {
            ipc::server::run(ipc_socket_path, controller, ipc_cancellation).await;
        });

        Ok(ApplicationHandle {
            cancellation,
            provider_factory: self.provider_factory,
            worker_tasks,
            ipc_task,
        })
    }
}

impl ApplicationHandle {
    /// Signals every worker and the IPC acceptor to stop, waits up to
    /// `WORKER_SHUTDOWN_TIMEOUT` per task, then tears down the shared
    /// provider connections (spec §4.6: "graceful shutdown cancels every
    /// worker, joins with a bounded timeout, then disconnects
    /// providers").
    pub async fn shutdown(self) {
        info!("shutdown: signalling workers and ipc acceptor");
        self.cancellation.cancel();

        for (name, task) in self.worker_tasks {
            match tokio::time::timeout(WORKER_SHUTDOWN_TIMEOUT, task).await {
                Ok(Ok(())) => info!(worker = name, "shut down cleanly"),
                Ok(Err(e)) => warn!(worker = name, "task join error: {e}"),
                Err(_) => warn!(worker = name, "did not stop within shutdown timeout"),
            }
        }

        if tokio::time::timeout(WORKER_SHUTDOWN_TIMEOUT, self.ipc_task).await.is_err() {
            warn!("ipc acceptor did not stop within shutdown timeout");
        }

        self.provider_factory.disconnect_all().await;
        info!("shutdown complete");
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }
}

fn build_checker_chain(config: &Config) -> Vec<Box<dyn Checker>> {
    let pm = &config.position_monitoring;
    vec![
        Box::new(StopChecker::new(pm.stop_loss, pm.trailing_stop)),
        Box::new(ProfitChecker::new(pm.eight_week_hold, pm.tp1_target_pct, pm.tp2_target_pct)),
        Box::new(PyramidChecker::new(pm.pyramid)),
        Box::new(MaChecker::new(pm.technical, pm.climax_top)),
        Box::new(HealthChecker::new(pm.health, pm.earnings, pm.extended)),
        Box::new(ReentryChecker::new(pm.reentry.clone())),
        Box::new(WatchlistAltEntryChecker::new(pm.alt_entry.clone())),
    ]
}

/// Builds one `DiscordWebhookSink` per channel named in `discord.webhooks`,
/// plus a fallback sink under `default_webhook` for any channel the
/// routing table can name but that has no explicit webhook of its own.
fn build_sinks(config: &Config) -> HashMap<String, Arc<dyn ChatSink>> {
    let mut sinks: HashMap<String, Arc<dyn ChatSink>> = HashMap::new();
    if !config.alerts.discord.enabled {
        return sinks;
    }

    for (channel, webhook_url) in &config.alerts.discord.webhooks {
        sinks.insert(channel.clone(), Arc::new(DiscordWebhookSink::new(channel.clone(), webhook_url.clone())));
    }

    if let Some(default_webhook) = &config.alerts.discord.default_webhook {
        let referenced_channels: std::collections::HashSet<&String> = config.alerts.alert_routing.values().collect();
        for channel in referenced_channels {
            sinks
                .entry(channel.clone())
                .or_insert_with(|| Arc::new(DiscordWebhookSink::new(channel.clone(), default_webhook.clone())));
        }
    }

    sinks
}
