//! SQLite `AlertRepository`. Grounded in the teacher's
//! `SqliteOrderRepository` shape (insert-then-read, a private row mapper).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::alert::{Alert, AlertPayload, AlertSubtype, AlertType, Priority};
use crate::domain::errors::AlertError;
use crate::domain::repositories::AlertRepository;

pub struct SqliteAlertRepository {
    pool: SqlitePool,
}

impl SqliteAlertRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteAlertRepository { pool }
    }

    fn map_row(row: &sqlx::sqlite::SqliteRow) -> Result<Alert, AlertError> {
        let alert_type_str: String = row.try_get("alert_type").map_err(to_persist_err)?;
        let subtype_str: String = row.try_get("subtype").map_err(to_persist_err)?;
        let priority_str: String = row.try_get("priority").map_err(to_persist_err)?;
        let payload_json: String = row.try_get("payload_json").map_err(to_persist_err)?;
        let created_at_str: String = row.try_get("created_at").map_err(to_persist_err)?;
        let acknowledged_at_str: Option<String> = row.try_get("acknowledged_at").ok().flatten();

        Ok(Alert {
            id: row.try_get("id").unwrap_or_default(),
            symbol: row.try_get("symbol").unwrap_or_default(),
            alert_type: parse_alert_type(&alert_type_str),
            subtype: parse_subtype(&subtype_str),
            position_id: row.try_get("position_id").ok().flatten(),
            payload: serde_json::from_str::<AlertPayload>(&payload_json).unwrap_or_default(),
            message: row.try_get("message").unwrap_or_default(),
            action: row.try_get("action").ok().flatten(),
            thread_source: row.try_get("thread_source").unwrap_or_default(),
            priority: parse_priority(&priority_str),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            acknowledged: row.try_get::<i64, _>("acknowledged").unwrap_or_default() != 0,
            acknowledged_at: acknowledged_at_str
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        })
    }
}

fn to_persist_err(e: sqlx::Error) -> AlertError {
    AlertError::PersistenceFailed { reason: e.to_string() }
}

fn parse_alert_type(s: &str) -> AlertType {
    use AlertType::*;
    match s {
        "stop" => Stop,
        "profit" => Profit,
        "pyramid" => Pyramid,
        "technical" => Technical,
        "health" => Health,
        "add" => Add,
        "alt_entry" => AltEntry,
        "market" => Market,
        _ => System,
    }
}

fn parse_subtype(s: &str) -> AlertSubtype {
    use AlertSubtype::*;
    match s {
        "hard_stop" => HardStop,
        "trailing_stop" => TrailingStop,
        "warning" => Warning,
        "tp1" => Tp1,
        "tp2" => Tp2,
        "eight_week_hold" => EightWeekHold,
        "p1_ready" => P1Ready,
        "p1_extended" => P1Extended,
        "p2_ready" => P2Ready,
        "p2_extended" => P2Extended,
        "pullback" => Pullback,
        "ema_21" => Ema21,
        "in_buy_zone" => InBuyZone,
        "ma_bounce" => MaBounce,
        "pivot_retest" => PivotRetest,
        "ma_50_warning" => Ma50Warning,
        "ma_50_sell" => Ma50Sell,
        "ema_21_sell" => Ema21Sell,
        "ten_week_sell" => TenWeekSell,
        "climax_top" => ClimaxTop,
        "critical" => Critical,
        "earnings" => Earnings,
        "late_stage" => LateStage,
        "extended" => Extended,
        "regime_change" => RegimeChange,
        "distribution_day" => DistributionDay,
        "follow_through_day" => FollowThroughDay,
        "info" => Info,
        "error" => SystemError,
        "success" => Success,
        _ => SystemWarning,
    }
}

fn parse_priority(s: &str) -> Priority {
    match s {
        "P0" => Priority::P0,
        "P1" => Priority::P1,
        _ => Priority::P2,
    }
}

#[async_trait]
impl AlertRepository for SqliteAlertRepository {
    async fn create(&self, alert: Alert) -> Result<Alert, AlertError> {
        let payload_json = serde_json::to_string(&alert.payload).unwrap_or_default();
        let result = sqlx::query(
            r#"
            INSERT INTO alerts (
                symbol, alert_type, subtype, position_id, payload_json, message, action,
                thread_source, priority, created_at, acknowledged, acknowledged_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&alert.symbol)
        .bind(alert.alert_type.as_str())
        .bind(alert.subtype.as_str())
        .bind(alert.position_id)
        .bind(&payload_json)
        .bind(&alert.message)
        .bind(&alert.action)
        .bind(&alert.thread_source)
        .bind(alert.priority.as_str())
        .bind(alert.created_at.to_rfc3339())
        .bind(alert.acknowledged as i64)
        .bind(alert.acknowledged_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(to_persist_err)?;

        Ok(Alert { id: result.last_insert_rowid(), ..alert })
    }

    async fn get_recent(&self, symbol: Option<&str>, hours: i64, limit: u32) -> Result<Vec<Alert>, AlertError> {
        let cutoff = (Utc::now() - chrono::Duration::hours(hours)).to_rfc3339();
        let rows = if let Some(symbol) = symbol {
            sqlx::query(
                "SELECT * FROM alerts WHERE symbol = ? AND created_at >= ? ORDER BY created_at DESC LIMIT ?",
            )
            .bind(symbol)
            .bind(&cutoff)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query("SELECT * FROM alerts WHERE created_at >= ? ORDER BY created_at DESC LIMIT ?")
                .bind(&cutoff)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
        }
        .map_err(to_persist_err)?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn get_last_for_subtype(&self, symbol: &str, subtype: AlertSubtype) -> Result<Option<Alert>, AlertError> {
        let row = sqlx::query(
            "SELECT * FROM alerts WHERE symbol = ? AND subtype = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(symbol)
        .bind(subtype.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(to_persist_err)?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn acknowledge(&self, id: i64) -> Result<(), AlertError> {
        sqlx::query(
            "UPDATE alerts SET acknowledged = 1, acknowledged_at = ? WHERE id = ? AND acknowledged = 0",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(to_persist_err)?;
        Ok(())
    }

    async fn acknowledge_all(&self) -> Result<u64, AlertError> {
        let result = sqlx::query("UPDATE alerts SET acknowledged = 1, acknowledged_at = ? WHERE acknowledged = 0")
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(to_persist_err)?;
        Ok(result.rows_affected())
    }
}
