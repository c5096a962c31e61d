//! Provider abstraction ports: historical/realtime/futures market-data
//! roles, plus the canonical wire types and health/throttle state shared
//! by every implementation. Grounded in the teacher's `domain::ports`
//! (`MarketDataService`/`ExecutionService`) trait shape.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::errors::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub last: Decimal,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub volume: Option<u64>,
    pub avg_volume: Option<u64>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub open: Option<Decimal>,
    pub close: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
    pub volume_available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuturesSnapshot {
    pub es_pct: f64,
    pub nq_pct: f64,
    pub ym_pct: f64,
    pub timestamp: DateTime<Utc>,
}

/// Moving averages and 50-day average daily volume derived from a bar
/// series, as required by the Position/Breakout checkers' context object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSnapshot {
    pub ema_21: Option<Decimal>,
    pub sma_50: Option<Decimal>,
    pub sma_200: Option<Decimal>,
    pub sma_10_week: Option<Decimal>,
    pub avg_volume_50d: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Down,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub status: HealthStatus,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        ProviderHealth {
            status: HealthStatus::Healthy,
            last_success: None,
            last_failure: None,
            consecutive_failures: 0,
            last_error: None,
        }
    }
}

impl ProviderHealth {
    /// `degraded_after`/`down_after` are consecutive-failure thresholds;
    /// a success always restores `healthy` (spec §4.1).
    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.status = HealthStatus::Healthy;
        self.last_success = Some(at);
        self.consecutive_failures = 0;
        self.last_error = None;
    }

    pub fn record_failure(&mut self, at: DateTime<Utc>, error: String, degraded_after: u32, down_after: u32) {
        self.last_failure = Some(at);
        self.consecutive_failures += 1;
        self.last_error = Some(error);
        self.status = if self.consecutive_failures >= down_after {
            HealthStatus::Down
        } else if self.consecutive_failures >= degraded_after {
            HealthStatus::Degraded
        } else {
            self.status
        };
    }

    pub fn is_connected(&self) -> bool {
        self.status != HealthStatus::Down
    }
}

#[async_trait]
pub trait HistoricalProvider: Send + Sync {
    async fn get_daily_bars(&self, symbol: &str, lookback_days: u32) -> Result<Vec<Bar>, ProviderError>;
    async fn get_technicals(&self, symbol: &str) -> Result<TechnicalSnapshot, ProviderError>;
    async fn get_avg_volume_50d(&self, symbol: &str) -> Result<u64, ProviderError>;
    /// Next known earnings date, if the upstream reference endpoint
    /// publishes one (spec §4.5's Maintenance thread "earnings-date
    /// refresh" duty; consumed by the Health checker's days-to-earnings
    /// field).
    async fn get_earnings_date(&self, symbol: &str) -> Result<Option<NaiveDate>, ProviderError>;
}

#[async_trait]
pub trait RealtimeProvider: Send + Sync {
    /// Batch quote fetch: missing or zero-priced symbols are omitted
    /// rather than returning nulls, per spec §4.1's contract.
    async fn get_quotes(&self, symbols: &[String]) -> Result<HashMap<String, Quote>, ProviderError>;
    fn is_connected(&self) -> bool;
}

#[async_trait]
pub trait FuturesProvider: Send + Sync {
    async fn get_futures_snapshot(&self) -> Result<FuturesSnapshot, ProviderError>;
}
