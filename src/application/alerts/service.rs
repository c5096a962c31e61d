//! Alert Service: the dedup/cooldown/suppression/persistence/routing
//! pipeline described in spec §4.2.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::domain::alert::{Alert, AlertSubtype, CandidateAlert, Priority};
use crate::domain::errors::AlertError;
use crate::domain::repositories::AlertRepository;
use crate::infrastructure::providers::rate_limiter::SlidingWindowLimiter;
use crate::infrastructure::sinks::ChatSink;

use super::cooldown::CooldownTracker;
use super::routing::RoutingTable;

pub struct AlertService {
    repository: Arc<dyn AlertRepository>,
    sinks: HashMap<String, Arc<dyn ChatSink>>,
    routing: Mutex<RoutingTable>,
    cooldown: Mutex<CooldownTracker>,
    cooldown_window: Duration,
    cooldown_enabled: bool,
    suppression_enabled: bool,
    suppressed_subtypes: Vec<String>,
    sink_limiter: Mutex<SlidingWindowLimiter>,
}

impl AlertService {
    pub fn new(
        repository: Arc<dyn AlertRepository>,
        sinks: HashMap<String, Arc<dyn ChatSink>>,
        routing: RoutingTable,
        cooldown_window: Duration,
        cooldown_enabled: bool,
        suppression_enabled: bool,
        suppressed_subtypes: Vec<String>,
        sink_rate_limit_per_minute: u32,
    ) -> Self {
        AlertService {
            repository,
            sinks,
            routing: Mutex::new(routing),
            cooldown: Mutex::new(CooldownTracker::new()),
            cooldown_window,
            cooldown_enabled,
            suppression_enabled,
            suppressed_subtypes,
            sink_limiter: Mutex::new(SlidingWindowLimiter::new(
                sink_rate_limit_per_minute,
                Duration::from_secs(60),
                Duration::ZERO,
            )),
        }
    }

    pub async fn reload_routing(&self, routes: HashMap<String, String>) {
        self.routing.lock().await.reload(routes);
    }

    /// Runs a batch of candidate alerts for one symbol through the
    /// pipeline: dedup within the batch, then suppression/cooldown per
    /// surviving candidate, then persist + route.
    pub async fn submit(&self, candidates: Vec<CandidateAlert>) -> Vec<Result<Alert, AlertError>> {
        let deduped = Self::dedup_by_highest_priority(candidates);
        let mut results = Vec::with_capacity(deduped.len());
        for candidate in deduped {
            results.push(self.process_one(candidate).await);
        }
        results
    }

    /// Within one cycle, a checker may propose several alerts for the
    /// same `(symbol, subtype)`; only the highest-priority candidate is
    /// kept (spec §4.2 step 4, §9 Open Question 1 resolved as "take max").
    fn dedup_by_highest_priority(candidates: Vec<CandidateAlert>) -> Vec<CandidateAlert> {
        let mut best: HashMap<(String, AlertSubtype), CandidateAlert> = HashMap::new();
        for candidate in candidates {
            let key = (candidate.symbol.clone(), candidate.subtype);
            match best.get(&key) {
                Some(existing) if existing.priority >= candidate.priority => {}
                _ => {
                    best.insert(key, candidate);
                }
            }
        }
        best.into_values().collect()
    }

    async fn process_one(&self, candidate: CandidateAlert) -> Result<Alert, AlertError> {
        if self.suppression_enabled && self.suppressed_subtypes.contains(&candidate.subtype.as_str().to_string()) {
            return Err(AlertError::SuppressedByConfig {
                subtype: candidate.subtype.as_str().to_string(),
            });
        }

        let bypasses_cooldown = candidate.subtype.bypasses_cooldown();
        if self.cooldown_enabled && !bypasses_cooldown {
            let cooldown = self.cooldown.lock().await;
            let now = Instant::now();
            if cooldown.is_in_cooldown(&candidate.symbol, candidate.subtype, self.cooldown_window, now) {
                return Err(AlertError::SuppressedByConfig {
                    subtype: format!("{} (cooldown)", candidate.subtype.as_str()),
                });
            }
        }

        let alert = Alert {
            id: 0,
            symbol: candidate.symbol.clone(),
            alert_type: candidate.alert_type,
            subtype: candidate.subtype,
            position_id: candidate.position_id,
            payload: candidate.payload.clone(),
            message: candidate.message.clone(),
            action: candidate.action.clone(),
            thread_source: candidate.thread_source.clone(),
            priority: candidate.priority,
            created_at: Utc::now(),
            acknowledged: false,
            acknowledged_at: None,
        };

        let persisted = self
            .repository
            .create(alert)
            .await
            .map_err(|e| AlertError::PersistenceFailed { reason: e.to_string() })?;

        self.route(&persisted).await;

        if self.cooldown_enabled && !bypasses_cooldown {
            let mut cooldown = self.cooldown.lock().await;
            cooldown.record_dispatch(&persisted.symbol, persisted.subtype, Instant::now());
        }

        Ok(persisted)
    }

    async fn route(&self, alert: &Alert) {
        let channel = {
            let routing = self.routing.lock().await;
            routing.channel_for(alert.alert_type).to_string()
        };
        let Some(sink) = self.sinks.get(&channel) else {
            warn!(channel = %channel, symbol = %alert.symbol, "no sink registered for channel");
            return;
        };

        {
            let mut limiter = self.sink_limiter.lock().await;
            let now = Instant::now();
            if !limiter.can_proceed(now) {
                warn!(symbol = %alert.symbol, "sink rate limit reached, dropping delivery this cycle");
                return;
            }
            limiter.record(now);
        }

        // Delivery failures are logged and retried by the sink's own
        // middleware (spec §4.2 step 6); they never block the pipeline.
        if let Err(err) = sink.send(alert).await {
            error!(symbol = %alert.symbol, subtype = alert.subtype.as_str(), error = %err, "alert delivery failed");
        }
    }

    pub async fn acknowledge(&self, id: i64) -> Result<(), AlertError> {
        self.repository.acknowledge(id).await
    }

    pub async fn acknowledge_all(&self) -> Result<u64, AlertError> {
        self.repository.acknowledge_all().await
    }
}
