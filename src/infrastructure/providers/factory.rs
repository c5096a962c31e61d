//! Wires a `ProviderConfig` row to a running provider instance and
//! caches it, picking the highest-priority enabled row per domain (spec
//! §4.1). Grounded in the teacher's `ServiceFactory::create_services`
//! (`infrastructure::factory`): a `match` over a configured
//! implementation name builds the concrete adapter, credentials/settings
//! feed its constructor.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::info;

use crate::domain::errors::ProviderError;
use crate::domain::provider_config::{Domain, ProviderConfig};
use crate::domain::providers::ports::{FuturesProvider, HistoricalProvider, RealtimeProvider};
use crate::domain::repositories::ProviderConfigRepository;
use crate::infrastructure::providers::futures_provider::IbkrFuturesProvider;
use crate::infrastructure::providers::historical_http::HttpHistoricalProvider;
use crate::infrastructure::providers::realtime_ibkr::{IbkrConnectionManager, IbkrRealtimeProvider};

/// Constructs and caches provider instances behind the `domain::providers`
/// traits. One factory per running service; the Realtime and Futures
/// adapters for an `ibkr`-implementation row share the same
/// `IbkrConnectionManager`, so disconnecting one does not orphan the
/// other's socket.
pub struct ProviderFactory {
    repo: Arc<dyn ProviderConfigRepository>,
    historical: RwLock<HashMap<i64, Arc<dyn HistoricalProvider>>>,
    realtime: RwLock<HashMap<i64, Arc<dyn RealtimeProvider>>>,
    futures: RwLock<HashMap<i64, Arc<dyn FuturesProvider>>>,
    ibkr_connections: RwLock<HashMap<i64, Arc<IbkrConnectionManager>>>,
}

impl ProviderFactory {
    pub fn new(repo: Arc<dyn ProviderConfigRepository>) -> Self {
        ProviderFactory {
            repo,
            historical: RwLock::new(HashMap::new()),
            realtime: RwLock::new(HashMap::new()),
            futures: RwLock::new(HashMap::new()),
            ibkr_connections: RwLock::new(HashMap::new()),
        }
    }

    async fn primary_config(&self, domain: Domain) -> Result<ProviderConfig, ProviderError> {
        self.repo
            .get_primary_for_domain(domain)
            .await?
            .ok_or(ProviderError::NotConfigured {
                domain: domain.as_str().to_string(),
            })
    }

    async fn credential(&self, provider_id: i64, key: &str) -> Option<String> {
        self.repo
            .get_all_credentials(provider_id)
            .await
            .ok()?
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub async fn historical_provider(&self) -> Result<Arc<dyn HistoricalProvider>, ProviderError> {
        let config = self.primary_config(Domain::Historical).await?;
        if let Some(existing) = self.historical.read().await.get(&config.id) {
            return Ok(existing.clone());
        }

        let instance: Arc<dyn HistoricalProvider> = match config.implementation.as_str() {
            "polygon_http" | "http" => {
                let base_url = config
                    .settings
                    .get("base_url")
                    .and_then(|v| v.as_str())
                    .unwrap_or("https://api.polygon.io")
                    .to_string();
                let api_key = self.credential(config.id, "api_key").await.unwrap_or_default();
                Arc::new(HttpHistoricalProvider::new(
                    base_url,
                    api_key,
                    config.throttle.calls_per_minute,
                    Duration::from_secs_f64(config.throttle.min_delay_seconds),
                ))
            }
            other => {
                return Err(ProviderError::InvalidData {
                    symbol: "factory".to_string(),
                    reason: format!("unknown historical provider implementation: {other}"),
                })
            }
        };

        self.historical.write().await.insert(config.id, instance.clone());
        info!(provider = %config.name, "historical provider constructed");
        Ok(instance)
    }

    async fn ibkr_connection(&self, config: &ProviderConfig) -> Arc<IbkrConnectionManager> {
        if let Some(existing) = self.ibkr_connections.read().await.get(&config.id) {
            return existing.clone();
        }
        let endpoint = config
            .settings
            .get("endpoint")
            .and_then(|v| v.as_str())
            .unwrap_or("tcp://127.0.0.1:7497")
            .to_string();
        let manager = IbkrConnectionManager::new(endpoint);
        self.ibkr_connections.write().await.insert(config.id, manager.clone());
        manager
    }

    pub async fn realtime_provider(&self) -> Result<Arc<dyn RealtimeProvider>, ProviderError> {
        let config = self.primary_config(Domain::Realtime).await?;
        if let Some(existing) = self.realtime.read().await.get(&config.id) {
            return Ok(existing.clone());
        }

        let instance: Arc<dyn RealtimeProvider> = match config.implementation.as_str() {
            "ibkr" => {
                let manager = self.ibkr_connection(&config).await;
                Arc::new(IbkrRealtimeProvider::new(manager))
            }
            other => {
                return Err(ProviderError::InvalidData {
                    symbol: "factory".to_string(),
                    reason: format!("unknown realtime provider implementation: {other}"),
                })
            }
        };

        self.realtime.write().await.insert(config.id, instance.clone());
        info!(provider = %config.name, "realtime provider constructed");
        Ok(instance)
    }

    pub async fn futures_provider(&self) -> Result<Arc<dyn FuturesProvider>, ProviderError> {
        let config = self.primary_config(Domain::Futures).await?;
        if let Some(existing) = self.futures.read().await.get(&config.id) {
            return Ok(existing.clone());
        }

        let instance: Arc<dyn FuturesProvider> = match config.implementation.as_str() {
            "ibkr" => {
                let manager = self.ibkr_connection(&config).await;
                Arc::new(IbkrFuturesProvider::new(manager))
            }
            other => {
                return Err(ProviderError::InvalidData {
                    symbol: "factory".to_string(),
                    reason: format!("unknown futures provider implementation: {other}"),
                })
            }
        };

        self.futures.write().await.insert(config.id, instance.clone());
        info!(provider = %config.name, "futures provider constructed");
        Ok(instance)
    }

    /// Disconnects every shared connection this factory owns. Disconnect
    /// on `IbkrConnectionManager` is idempotent, so a manager referenced
    /// by both the realtime and futures caches is only ever torn down
    /// once.
    pub async fn disconnect_all(&self) {
        for manager in self.ibkr_connections.read().await.values() {
            manager.disconnect().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    struct FakeRepo {
        configs: Mutex<Vec<ProviderConfig>>,
    }

    #[async_trait]
    impl ProviderConfigRepository for FakeRepo {
        async fn get_primary_for_domain(&self, domain: Domain) -> Result<Option<ProviderConfig>, ProviderError> {
            let configs = self.configs.lock().await;
            Ok(configs
                .iter()
                .filter(|c| c.domain == domain && c.enabled)
                .max_by_key(|c| c.priority)
                .cloned())
        }

        async fn get_all_for_domain(&self, domain: Domain) -> Result<Vec<ProviderConfig>, ProviderError> {
            let configs = self.configs.lock().await;
            Ok(configs.iter().filter(|c| c.domain == domain).cloned().collect())
        }

        async fn get_all_credentials(&self, _provider_id: i64) -> Result<Vec<(String, String)>, ProviderError> {
            Ok(vec![("api_key".to_string(), "test-key".to_string())])
        }

        async fn create_provider(&self, config: ProviderConfig) -> Result<ProviderConfig, ProviderError> {
            self.configs.lock().await.push(config.clone());
            Ok(config)
        }

        async fn set_credential(&self, _provider_id: i64, _key: &str, _value: &str) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    fn historical_config() -> ProviderConfig {
        ProviderConfig {
            id: 1,
            name: "polygon".to_string(),
            domain: Domain::Historical,
            implementation: "polygon_http".to_string(),
            priority: 10,
            throttle: Default::default(),
            settings: serde_json::json!({ "base_url": "https://api.polygon.io" }),
            enabled: true,
        }
    }

    #[tokio::test]
    async fn returns_not_configured_when_no_row_exists() {
        let repo = Arc::new(FakeRepo { configs: Mutex::new(vec![]) });
        let factory = ProviderFactory::new(repo);
        let result = factory.historical_provider().await;
        assert!(matches!(result, Err(ProviderError::NotConfigured { .. })));
    }

    #[tokio::test]
    async fn caches_constructed_instance_across_calls() {
        let repo = Arc::new(FakeRepo { configs: Mutex::new(vec![historical_config()]) });
        let factory = ProviderFactory::new(repo);
        let first = factory.historical_provider().await.unwrap();
        let second = factory.historical_provider().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn realtime_and_futures_share_one_ibkr_connection() {
        let realtime_row = ProviderConfig {
            id: 2,
            name: "ibkr-realtime".to_string(),
            domain: Domain::Realtime,
            implementation: "ibkr".to_string(),
            priority: 10,
            throttle: Default::default(),
            settings: serde_json::json!({ "endpoint": "tcp://127.0.0.1:7497" }),
            enabled: true,
        };
        let futures_row = ProviderConfig {
            id: 2,
            domain: Domain::Futures,
            ..realtime_row.clone()
        };
        let repo = Arc::new(FakeRepo {
            configs: Mutex::new(vec![realtime_row, futures_row]),
        });
        let factory = ProviderFactory::new(repo);
        let _realtime = factory.realtime_provider().await.unwrap();
        let _futures = factory.futures_provider().await.unwrap();
        assert_eq!(factory.ibkr_connections.read().await.len(), 1);

        factory.disconnect_all().await;
        factory.disconnect_all().await;
    }
}
