//! First-run provider registration: if the `provider_configs` table has
//! no row for a domain, insert one built from `Config`'s `ibkr`/
//! `market_data` sections (spec §4.6: "on an empty provider_configs
//! table, the service seeds one row per domain from the YAML/env
//! config so a fresh install doesn't start with every domain
//! unconfigured"). Grounded in the teacher's `ServiceFactory` building
//! its adapters straight from `Config` — here the one-time difference
//! is that the result is persisted as a row instead of held only as a
//! live instance.

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::domain::provider_config::{Domain, ProviderConfig, ThrottleProfile};
use crate::domain::repositories::ProviderConfigRepository;

pub async fn seed_default_providers(repo: &Arc<dyn ProviderConfigRepository>, config: &Config) -> anyhow::Result<()> {
    seed_historical(repo, config).await?;
    seed_realtime(repo, config).await?;
    seed_futures(repo, config).await?;
    Ok(())
}

async fn seed_historical(repo: &Arc<dyn ProviderConfigRepository>, config: &Config) -> anyhow::Result<()> {
    if !repo.get_all_for_domain(Domain::Historical).await?.is_empty() {
        return Ok(());
    }

    let created = repo
        .create_provider(ProviderConfig {
            id: 0,
            name: "polygon".to_string(),
            domain: Domain::Historical,
            implementation: "polygon_http".to_string(),
            priority: 100,
            throttle: ThrottleProfile {
                calls_per_minute: 60,
                burst_size: 5,
                min_delay_seconds: config.market_data.rate_limit_delay_ms as f64 / 1000.0,
            },
            settings: serde_json::json!({ "base_url": config.market_data.base_url }),
            enabled: true,
        })
        .await?;

    if !config.market_data.api_key.is_empty() {
        repo.set_credential(created.id, "api_key", &config.market_data.api_key).await?;
    }
    info!("seeded default historical provider (polygon_http)");
    Ok(())
}

async fn seed_realtime(repo: &Arc<dyn ProviderConfigRepository>, config: &Config) -> anyhow::Result<()> {
    if !repo.get_all_for_domain(Domain::Realtime).await?.is_empty() {
        return Ok(());
    }
    repo.create_provider(ProviderConfig {
        id: 0,
        name: "ibkr-realtime".to_string(),
        domain: Domain::Realtime,
        implementation: "ibkr".to_string(),
        priority: 100,
        throttle: ThrottleProfile::default(),
        settings: serde_json::json!({ "endpoint": format!("tcp://{}:{}", config.ibkr.host, config.ibkr.port) }),
        enabled: true,
    })
    .await?;
    info!("seeded default realtime provider (ibkr)");
    Ok(())
}

async fn seed_futures(repo: &Arc<dyn ProviderConfigRepository>, config: &Config) -> anyhow::Result<()> {
    if !repo.get_all_for_domain(Domain::Futures).await?.is_empty() {
        return Ok(());
    }
    repo.create_provider(ProviderConfig {
        id: 0,
        name: "ibkr-futures".to_string(),
        domain: Domain::Futures,
        implementation: "ibkr".to_string(),
        priority: 100,
        throttle: ThrottleProfile::default(),
        settings: serde_json::json!({ "endpoint": format!("tcp://{}:{}", config.ibkr.host, config.ibkr.port) }),
        enabled: true,
    })
    .await?;
    info!("seeded default futures provider (ibkr)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct FakeRepo {
        configs: Mutex<Vec<ProviderConfig>>,
        credentials: Mutex<Vec<(i64, String, String)>>,
    }

    #[async_trait]
    impl ProviderConfigRepository for FakeRepo {
        async fn get_primary_for_domain(&self, domain: Domain) -> Result<Option<ProviderConfig>, crate::domain::errors::ProviderError> {
            Ok(self.configs.lock().await.iter().find(|c| c.domain == domain).cloned())
        }
        async fn get_all_for_domain(&self, domain: Domain) -> Result<Vec<ProviderConfig>, crate::domain::errors::ProviderError> {
            Ok(self.configs.lock().await.iter().filter(|c| c.domain == domain).cloned().collect())
        }
        async fn get_all_credentials(&self, provider_id: i64) -> Result<Vec<(String, String)>, crate::domain::errors::ProviderError> {
            Ok(self
                .credentials
                .lock()
                .await
                .iter()
                .filter(|(id, _, _)| *id == provider_id)
                .map(|(_, k, v)| (k.clone(), v.clone()))
                .collect())
        }
        async fn create_provider(&self, config: ProviderConfig) -> Result<ProviderConfig, crate::domain::errors::ProviderError> {
            let mut configs = self.configs.lock().await;
            let id = configs.len() as i64 + 1;
            let created = ProviderConfig { id, ..config };
            configs.push(created.clone());
            Ok(created)
        }
        async fn set_credential(&self, provider_id: i64, key: &str, value: &str) -> Result<(), crate::domain::errors::ProviderError> {
            self.credentials.lock().await.push((provider_id, key.to_string(), value.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn seeds_one_row_per_domain_when_empty() {
        let repo: Arc<dyn ProviderConfigRepository> = Arc::new(FakeRepo::default());
        let config = Config::default();
        seed_default_providers(&repo, &config).await.unwrap();
        assert_eq!(repo.get_all_for_domain(Domain::Historical).await.unwrap().len(), 1);
        assert_eq!(repo.get_all_for_domain(Domain::Realtime).await.unwrap().len(), 1);
        assert_eq!(repo.get_all_for_domain(Domain::Futures).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn does_not_duplicate_existing_rows() {
        let repo: Arc<dyn ProviderConfigRepository> = Arc::new(FakeRepo::default());
        let config = Config::default();
        seed_default_providers(&repo, &config).await.unwrap();
        seed_default_providers(&repo, &config).await.unwrap();
        assert_eq!(repo.get_all_for_domain(Domain::Historical).await.unwrap().len(), 1);
    }
}
