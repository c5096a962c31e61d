//! Thin `FuturesProvider` adapter over the shared IBKR-like connection
//! (spec §4.1). Reads the same `IbkrConnectionManager` the realtime
//! quote adapter streams into — no separate socket, no separate
//! reconnect loop.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::errors::ProviderError;
use crate::domain::providers::ports::{FuturesProvider, FuturesSnapshot};
use crate::infrastructure::providers::realtime_ibkr::IbkrConnectionManager;

pub struct IbkrFuturesProvider {
    manager: Arc<IbkrConnectionManager>,
}

impl IbkrFuturesProvider {
    pub fn new(manager: Arc<IbkrConnectionManager>) -> Self {
        IbkrFuturesProvider { manager }
    }
}

#[async_trait]
impl FuturesProvider for IbkrFuturesProvider {
    async fn get_futures_snapshot(&self) -> Result<FuturesSnapshot, ProviderError> {
        if !self.manager.is_connected().await {
            return Err(ProviderError::ConnectionLost {
                reason: "ibkr futures connection is down".to_string(),
            });
        }
        let cache = self.manager.futures_cache.read().await;
        cache.ok_or_else(|| ProviderError::InvalidData {
            symbol: "ES/NQ/YM".to_string(),
            reason: "no futures snapshot received yet".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn returns_snapshot_once_seeded() {
        let manager = IbkrConnectionManager::new("tcp://localhost:7497".to_string());
        manager.health.write().await.record_success(Utc::now());
        manager
            .seed_futures(FuturesSnapshot {
                es_pct: 0.4,
                nq_pct: 0.6,
                ym_pct: 0.1,
                timestamp: Utc::now(),
            })
            .await;

        let provider = IbkrFuturesProvider::new(manager);
        let snapshot = provider.get_futures_snapshot().await.unwrap();
        assert!((snapshot.es_pct - 0.4).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn errors_when_connection_is_down() {
        let manager = IbkrConnectionManager::new("tcp://localhost:7497".to_string());
        manager.disconnect().await;
        let provider = IbkrFuturesProvider::new(manager);
        assert!(provider.get_futures_snapshot().await.is_err());
    }
}
