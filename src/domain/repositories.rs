//! Repository traits: the persistence surface the core consumes (spec §6).
//! Generalized from the teacher's `domain::repositories`
//! (`TradeRepository`/`PortfolioRepository`) shape.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::alert::Alert;
use crate::domain::errors::{AlertError, PositionError, ProviderError, RegimeError};
use crate::domain::position::Position;
use crate::domain::provider_config::{Domain, ProviderConfig};
use crate::domain::regime::MarketRegimeAlert;

#[async_trait]
pub trait PositionRepository: Send + Sync {
    async fn get_all(&self, include_closed: bool) -> Result<Vec<Position>, PositionError>;
    async fn get_in_position(&self) -> Result<Vec<Position>, PositionError>;
    async fn get_watching(&self) -> Result<Vec<Position>, PositionError>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Position>, PositionError>;
    async fn get_by_symbol(&self, symbol: &str, portfolio: &str) -> Result<Option<Position>, PositionError>;
    async fn create(&self, position: Position) -> Result<Position, PositionError>;
    async fn update(&self, position: &Position) -> Result<(), PositionError>;
    async fn update_price(&self, id: i64, price: Decimal, at: chrono::DateTime<chrono::Utc>) -> Result<(), PositionError>;
    async fn get_needing_sync(&self) -> Result<Vec<Position>, PositionError>;
}

#[async_trait]
pub trait AlertRepository: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn create(&self, alert: Alert) -> Result<Alert, AlertError>;
    async fn get_recent(&self, symbol: Option<&str>, hours: i64, limit: u32) -> Result<Vec<Alert>, AlertError>;
    async fn get_last_for_subtype(
        &self,
        symbol: &str,
        subtype: crate::domain::alert::AlertSubtype,
    ) -> Result<Option<Alert>, AlertError>;
    async fn acknowledge(&self, id: i64) -> Result<(), AlertError>;
    async fn acknowledge_all(&self) -> Result<u64, AlertError>;
}

#[async_trait]
pub trait RegimeAlertRepository: Send + Sync {
    async fn get_latest(&self) -> Result<Option<MarketRegimeAlert>, RegimeError>;
    async fn upsert_for_date(&self, date: NaiveDate, snapshot: MarketRegimeAlert, overwrite: bool) -> Result<MarketRegimeAlert, RegimeError>;
}

#[async_trait]
pub trait ProviderConfigRepository: Send + Sync {
    async fn get_primary_for_domain(&self, domain: Domain) -> Result<Option<ProviderConfig>, ProviderError>;
    async fn get_all_for_domain(&self, domain: Domain) -> Result<Vec<ProviderConfig>, ProviderError>;
    async fn get_all_credentials(&self, provider_id: i64) -> Result<Vec<(String, String)>, ProviderError>;
    async fn create_provider(&self, config: ProviderConfig) -> Result<ProviderConfig, ProviderError>;
    async fn set_credential(&self, provider_id: i64, key: &str, value: &str) -> Result<(), ProviderError>;
}
