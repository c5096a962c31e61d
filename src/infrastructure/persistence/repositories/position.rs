//! SQLite `PositionRepository`. Grounded in the teacher's
//! `SqliteOrderRepository`/`SqliteCandleRepository`
//! (`infrastructure::persistence::repositories`): a thin struct over
//! `SqlitePool`, `INSERT ... ON CONFLICT` for upserts, a private
//! `map_row` helper shared by every read path.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};

use crate::domain::errors::PositionError;
use crate::domain::position::{EntryTranche, ExitTranche, FinalClose, Position, RatingsSnapshot, StateCode};
use crate::domain::repositories::PositionRepository;

pub struct SqlitePositionRepository {
    pool: SqlitePool,
}

impl SqlitePositionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SqlitePositionRepository { pool }
    }

    fn map_row(row: &sqlx::sqlite::SqliteRow) -> Result<Position, PositionError> {
        let decode = |field: &'static str, detail: &str| -> Result<String, PositionError> {
            row.try_get::<String, _>(field).map_err(|e| PositionError::InvariantViolated {
                symbol: row.try_get::<String, _>("symbol").unwrap_or_default(),
                detail: format!("{detail}: {e}"),
            })
        };

        let state_discriminant: f64 = row.try_get("state").map_err(|e| PositionError::InvariantViolated {
            symbol: row.try_get::<String, _>("symbol").unwrap_or_default(),
            detail: format!("state column: {e}"),
        })?;
        let state = StateCode::from_discriminant(state_discriminant).ok_or_else(|| {
            PositionError::InvariantViolated {
                symbol: row.try_get::<String, _>("symbol").unwrap_or_default(),
                detail: format!("unrecognized state discriminant {state_discriminant}"),
            }
        })?;

        let entries_json = decode("entries_json", "entries_json")?;
        let exits_json = decode("exits_json", "exits_json")?;
        let ratings_json = decode("ratings_json", "ratings_json")?;
        let final_close_json: Option<String> = row.try_get("final_close_json").ok().flatten();

        let entries: Vec<EntryTranche> = serde_json::from_str(&entries_json).unwrap_or_default();
        let exits: Vec<ExitTranche> = serde_json::from_str(&exits_json).unwrap_or_default();
        let ratings: RatingsSnapshot = serde_json::from_str(&ratings_json).unwrap_or_default();
        let final_close: Option<FinalClose> = final_close_json.and_then(|s| serde_json::from_str(&s).ok());

        let decimal = |field: &'static str| -> Decimal {
            row.try_get::<String, _>(field)
                .ok()
                .and_then(|s| Decimal::from_str(&s).ok())
                .unwrap_or_default()
        };

        let naive_date = |field: &'static str| -> Option<NaiveDate> {
            row.try_get::<Option<String>, _>(field)
                .ok()
                .flatten()
                .and_then(|s| NaiveDate::from_str(&s).ok())
        };

        let datetime = |field: &'static str| -> DateTime<Utc> {
            row.try_get::<String, _>(field)
                .ok()
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(Utc::now)
        };

        Ok(Position {
            id: row.try_get("id").unwrap_or_default(),
            symbol: row.try_get("symbol").unwrap_or_default(),
            portfolio: row.try_get("portfolio").unwrap_or_default(),
            state,
            pivot: decimal("pivot"),
            pattern_label: row.try_get("pattern_label").unwrap_or_default(),
            base_stage: row.try_get::<i64, _>("base_stage").unwrap_or_default() as u8,
            base_depth_pct: row.try_get("base_depth_pct").unwrap_or_default(),
            base_length_weeks: row.try_get::<i64, _>("base_length_weeks").unwrap_or_default() as u32,
            ratings,
            entries,
            exits,
            final_close,
            hard_stop_pct: row.try_get("hard_stop_pct").unwrap_or_default(),
            stop_price: decimal("stop_price"),
            last_price: decimal("last_price"),
            max_price: decimal("max_price"),
            max_gain_pct: row.try_get("max_gain_pct").unwrap_or_default(),
            health_score: row.try_get::<i64, _>("health_score").unwrap_or_default() as i32,
            health_rating: row.try_get("health_rating").unwrap_or_default(),
            eight_week_hold_active: row.try_get::<i64, _>("eight_week_hold_active").unwrap_or_default() != 0,
            eight_week_hold_start: naive_date("eight_week_hold_start"),
            eight_week_hold_end: naive_date("eight_week_hold_end"),
            power_move_pct: row.try_get("power_move_pct").ok().flatten(),
            power_move_weeks: row.try_get::<Option<i64>, _>("power_move_weeks").ok().flatten().map(|v| v as u32),
            watch_date: naive_date("watch_date"),
            breakout_date: naive_date("breakout_date"),
            entry_date: naive_date("entry_date"),
            earnings_date: naive_date("earnings_date"),
            last_transition_at: datetime("last_transition_at"),
            py1_done: row.try_get::<i64, _>("py1_done").unwrap_or_default() != 0,
            py2_done: row.try_get::<i64, _>("py2_done").unwrap_or_default() != 0,
            tp1_sold: row.try_get::<i64, _>("tp1_sold").unwrap_or_default() as u32,
            tp2_sold: row.try_get::<i64, _>("tp2_sold").unwrap_or_default() as u32,
            prior_extended_marker: naive_date("prior_extended_marker"),
            alt_entry_test_count: row.try_get::<i64, _>("alt_entry_test_count").unwrap_or_default() as u32,
        })
    }

    async fn fetch_where(&self, clause: &str) -> Result<Vec<Position>, PositionError> {
        let query = format!("SELECT * FROM positions {clause}");
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PositionError::InvariantViolated { symbol: "*".to_string(), detail: e.to_string() })?;
        rows.iter().map(Self::map_row).collect()
    }
}

#[async_trait]
impl PositionRepository for SqlitePositionRepository {
    async fn get_all(&self, include_closed: bool) -> Result<Vec<Position>, PositionError> {
        if include_closed {
            self.fetch_where("ORDER BY symbol").await
        } else {
            self.fetch_where("WHERE state > -2 ORDER BY symbol").await
        }
    }

    async fn get_in_position(&self) -> Result<Vec<Position>, PositionError> {
        self.fetch_where("WHERE state IN (1, 2, 3) ORDER BY symbol").await
    }

    async fn get_watching(&self) -> Result<Vec<Position>, PositionError> {
        self.fetch_where("WHERE state IN (0, -1.5) ORDER BY symbol").await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Position>, PositionError> {
        let row = sqlx::query("SELECT * FROM positions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PositionError::InvariantViolated { symbol: "*".to_string(), detail: e.to_string() })?;
        row.as_ref().map(Self::map_row).transpose()
    }

    async fn get_by_symbol(&self, symbol: &str, portfolio: &str) -> Result<Option<Position>, PositionError> {
        let row = sqlx::query("SELECT * FROM positions WHERE symbol = ? AND portfolio = ?")
            .bind(symbol)
            .bind(portfolio)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PositionError::InvariantViolated { symbol: symbol.to_string(), detail: e.to_string() })?;
        row.as_ref().map(Self::map_row).transpose()
    }

    async fn create(&self, position: Position) -> Result<Position, PositionError> {
        position.check_invariants()?;
        let entries_json = serde_json::to_string(&position.entries).unwrap_or_default();
        let exits_json = serde_json::to_string(&position.exits).unwrap_or_default();
        let ratings_json = serde_json::to_string(&position.ratings).unwrap_or_default();
        let final_close_json = position.final_close.as_ref().map(|f| serde_json::to_string(f).unwrap_or_default());

        let result = sqlx::query(
            r#"
            INSERT INTO positions (
                symbol, portfolio, state, pivot, pattern_label, base_stage, base_depth_pct,
                base_length_weeks, ratings_json, entries_json, exits_json, final_close_json,
                hard_stop_pct, stop_price, last_price, max_price, max_gain_pct, health_score,
                health_rating, eight_week_hold_active, eight_week_hold_start, eight_week_hold_end,
                power_move_pct, power_move_weeks, watch_date, breakout_date, entry_date,
                earnings_date, last_transition_at, py1_done, py2_done, tp1_sold, tp2_sold,
                prior_extended_marker, alt_entry_test_count
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&position.symbol)
        .bind(&position.portfolio)
        .bind(position.state.discriminant())
        .bind(position.pivot.to_string())
        .bind(&position.pattern_label)
        .bind(position.base_stage as i64)
        .bind(position.base_depth_pct)
        .bind(position.base_length_weeks as i64)
        .bind(&ratings_json)
        .bind(&entries_json)
        .bind(&exits_json)
        .bind(&final_close_json)
        .bind(position.hard_stop_pct)
        .bind(position.stop_price.to_string())
        .bind(position.last_price.to_string())
        .bind(position.max_price.to_string())
        .bind(position.max_gain_pct)
        .bind(position.health_score as i64)
        .bind(&position.health_rating)
        .bind(position.eight_week_hold_active as i64)
        .bind(position.eight_week_hold_start.map(|d| d.to_string()))
        .bind(position.eight_week_hold_end.map(|d| d.to_string()))
        .bind(position.power_move_pct)
        .bind(position.power_move_weeks.map(|v| v as i64))
        .bind(position.watch_date.map(|d| d.to_string()))
        .bind(position.breakout_date.map(|d| d.to_string()))
        .bind(position.entry_date.map(|d| d.to_string()))
        .bind(position.earnings_date.map(|d| d.to_string()))
        .bind(position.last_transition_at.to_rfc3339())
        .bind(position.py1_done as i64)
        .bind(position.py2_done as i64)
        .bind(position.tp1_sold as i64)
        .bind(position.tp2_sold as i64)
        .bind(position.prior_extended_marker.map(|d| d.to_string()))
        .bind(position.alt_entry_test_count as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| PositionError::InvariantViolated { symbol: position.symbol.clone(), detail: e.to_string() })?;

        Ok(Position { id: result.last_insert_rowid(), ..position })
    }

    async fn update(&self, position: &Position) -> Result<(), PositionError> {
        position.check_invariants()?;
        let entries_json = serde_json::to_string(&position.entries).unwrap_or_default();
        let exits_json = serde_json::to_string(&position.exits).unwrap_or_default();
        let ratings_json = serde_json::to_string(&position.ratings).unwrap_or_default();
        let final_close_json = position.final_close.as_ref().map(|f| serde_json::to_string(f).unwrap_or_default());

        sqlx::query(
            r#"
            UPDATE positions SET
                state = ?, pivot = ?, pattern_label = ?, base_stage = ?, base_depth_pct = ?,
                base_length_weeks = ?, ratings_json = ?, entries_json = ?, exits_json = ?,
                final_close_json = ?, hard_stop_pct = ?, stop_price = ?, last_price = ?,
                max_price = ?, max_gain_pct = ?, health_score = ?, health_rating = ?,
                eight_week_hold_active = ?, eight_week_hold_start = ?, eight_week_hold_end = ?,
                power_move_pct = ?, power_move_weeks = ?, watch_date = ?, breakout_date = ?,
                entry_date = ?, earnings_date = ?, last_transition_at = ?, py1_done = ?,
                py2_done = ?, tp1_sold = ?, tp2_sold = ?, prior_extended_marker = ?,
                alt_entry_test_count = ?
            WHERE id = ?
            "#,
        )
        .bind(position.state.discriminant())
        .bind(position.pivot.to_string())
        .bind(&position.pattern_label)
        .bind(position.base_stage as i64)
        .bind(position.base_depth_pct)
        .bind(position.base_length_weeks as i64)
        .bind(&ratings_json)
        .bind(&entries_json)
        .bind(&exits_json)
        .bind(&final_close_json)
        .bind(position.hard_stop_pct)
        .bind(position.stop_price.to_string())
        .bind(position.last_price.to_string())
        .bind(position.max_price.to_string())
        .bind(position.max_gain_pct)
        .bind(position.health_score as i64)
        .bind(&position.health_rating)
        .bind(position.eight_week_hold_active as i64)
        .bind(position.eight_week_hold_start.map(|d| d.to_string()))
        .bind(position.eight_week_hold_end.map(|d| d.to_string()))
        .bind(position.power_move_pct)
        .bind(position.power_move_weeks.map(|v| v as i64))
        .bind(position.watch_date.map(|d| d.to_string()))
        .bind(position.breakout_date.map(|d| d.to_string()))
        .bind(position.entry_date.map(|d| d.to_string()))
        .bind(position.earnings_date.map(|d| d.to_string()))
        .bind(position.last_transition_at.to_rfc3339())
        .bind(position.py1_done as i64)
        .bind(position.py2_done as i64)
        .bind(position.tp1_sold as i64)
        .bind(position.tp2_sold as i64)
        .bind(position.prior_extended_marker.map(|d| d.to_string()))
        .bind(position.alt_entry_test_count as i64)
        .bind(position.id)
        .execute(&self.pool)
        .await
        .map_err(|e| PositionError::InvariantViolated { symbol: position.symbol.clone(), detail: e.to_string() })?;

        Ok(())
    }

    async fn update_price(&self, id: i64, price: Decimal, at: DateTime<Utc>) -> Result<(), PositionError> {
        sqlx::query(
            r#"
            UPDATE positions SET
                last_price = ?,
                max_price = MAX(CAST(max_price AS REAL), CAST(? AS REAL)),
                last_synced_at = ?
            WHERE id = ?
            "#,
        )
        .bind(price.to_string())
        .bind(price.to_string())
        .bind(at.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| PositionError::InvariantViolated { symbol: format!("id={id}"), detail: e.to_string() })?;
        Ok(())
    }

    async fn get_needing_sync(&self) -> Result<Vec<Position>, PositionError> {
        self.fetch_where(
            "WHERE state IN (1, 2, 3) AND (last_synced_at IS NULL OR last_synced_at < datetime('now', '-5 minutes')) ORDER BY symbol",
        )
        .await
    }
}
