//! SQLite `ProviderConfigRepository`: provider registration rows plus
//! their credentials, keyed by `(domain, priority)` for the factory's
//! selection (spec §4.1).

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::domain::errors::ProviderError;
use crate::domain::provider_config::{Domain, ProviderConfig, ThrottleProfile};
use crate::domain::repositories::ProviderConfigRepository;

pub struct SqliteProviderConfigRepository {
    pool: SqlitePool,
}

impl SqliteProviderConfigRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteProviderConfigRepository { pool }
    }

    fn map_row(row: &sqlx::sqlite::SqliteRow) -> ProviderConfig {
        let domain_str: String = row.try_get("domain").unwrap_or_default();
        let settings_json: String = row.try_get("settings_json").unwrap_or_default();
        ProviderConfig {
            id: row.try_get("id").unwrap_or_default(),
            name: row.try_get("name").unwrap_or_default(),
            domain: parse_domain(&domain_str),
            implementation: row.try_get("implementation").unwrap_or_default(),
            priority: row.try_get::<i64, _>("priority").unwrap_or_default() as u32,
            throttle: ThrottleProfile {
                calls_per_minute: row.try_get::<i64, _>("calls_per_minute").unwrap_or_default() as u32,
                burst_size: row.try_get::<i64, _>("burst_size").unwrap_or_default() as u32,
                min_delay_seconds: row.try_get("min_delay_seconds").unwrap_or_default(),
            },
            settings: serde_json::from_str(&settings_json).unwrap_or(serde_json::Value::Null),
            enabled: row.try_get::<i64, _>("enabled").unwrap_or_default() != 0,
        }
    }
}

fn parse_domain(s: &str) -> Domain {
    match s {
        "realtime" => Domain::Realtime,
        "futures" => Domain::Futures,
        _ => Domain::Historical,
    }
}

#[async_trait]
impl ProviderConfigRepository for SqliteProviderConfigRepository {
    async fn get_primary_for_domain(&self, domain: Domain) -> Result<Option<ProviderConfig>, ProviderError> {
        let row = sqlx::query(
            "SELECT * FROM provider_configs WHERE domain = ? AND enabled = 1 ORDER BY priority DESC LIMIT 1",
        )
        .bind(domain.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ProviderError::InvalidData { symbol: "provider_configs".to_string(), reason: e.to_string() })?;
        Ok(row.as_ref().map(Self::map_row))
    }

    async fn get_all_for_domain(&self, domain: Domain) -> Result<Vec<ProviderConfig>, ProviderError> {
        let rows = sqlx::query("SELECT * FROM provider_configs WHERE domain = ? ORDER BY priority DESC")
            .bind(domain.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ProviderError::InvalidData { symbol: "provider_configs".to_string(), reason: e.to_string() })?;
        Ok(rows.iter().map(Self::map_row).collect())
    }

    async fn get_all_credentials(&self, provider_id: i64) -> Result<Vec<(String, String)>, ProviderError> {
        let rows = sqlx::query("SELECT key, value FROM provider_credentials WHERE provider_id = ?")
            .bind(provider_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ProviderError::InvalidData { symbol: "provider_credentials".to_string(), reason: e.to_string() })?;
        Ok(rows
            .iter()
            .map(|row| (row.try_get::<String, _>("key").unwrap_or_default(), row.try_get::<String, _>("value").unwrap_or_default()))
            .collect())
    }

    async fn create_provider(&self, config: ProviderConfig) -> Result<ProviderConfig, ProviderError> {
        let settings_json = serde_json::to_string(&config.settings).unwrap_or_default();
        let result = sqlx::query(
            r#"
            INSERT INTO provider_configs (
                name, domain, implementation, priority, calls_per_minute, burst_size,
                min_delay_seconds, settings_json, enabled
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&config.name)
        .bind(config.domain.as_str())
        .bind(&config.implementation)
        .bind(config.priority as i64)
        .bind(config.throttle.calls_per_minute as i64)
        .bind(config.throttle.burst_size as i64)
        .bind(config.throttle.min_delay_seconds)
        .bind(&settings_json)
        .bind(config.enabled as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| ProviderError::InvalidData { symbol: config.name.clone(), reason: e.to_string() })?;

        Ok(ProviderConfig { id: result.last_insert_rowid(), ..config })
    }

    async fn set_credential(&self, provider_id: i64, key: &str, value: &str) -> Result<(), ProviderError> {
        sqlx::query(
            r#"
            INSERT INTO provider_credentials (provider_id, key, value) VALUES (?, ?, ?)
            ON CONFLICT(provider_id, key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(provider_id)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| ProviderError::InvalidData { symbol: format!("provider {provider_id}"), reason: e.to_string() })?;
        Ok(())
    }
}
