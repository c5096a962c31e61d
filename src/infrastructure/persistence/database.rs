//! SQLite connection pool and schema bootstrap. Grounded in the
//! teacher's `infrastructure::persistence::database::Database`: WAL
//! journal mode for concurrent readers/writers, `create_if_missing`, and
//! an idempotent `init()` that runs `CREATE TABLE IF NOT EXISTS` plus
//! supporting indexes.

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tokio::fs;
use tracing::info;

#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent)
                        .await
                        .context("failed to create database directory")?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("failed to connect to sqlite database")?;

        info!(db_url, "connected to database");

        let db = Database { pool };
        db.init().await?;
        Ok(db)
    }

    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS positions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                portfolio TEXT NOT NULL,
                state REAL NOT NULL,
                pivot TEXT NOT NULL,
                pattern_label TEXT NOT NULL,
                base_stage INTEGER NOT NULL,
                base_depth_pct REAL NOT NULL,
                base_length_weeks INTEGER NOT NULL,
                ratings_json TEXT NOT NULL,
                entries_json TEXT NOT NULL,
                exits_json TEXT NOT NULL,
                final_close_json TEXT,
                hard_stop_pct REAL NOT NULL,
                stop_price TEXT NOT NULL,
                last_price TEXT NOT NULL,
                max_price TEXT NOT NULL,
                max_gain_pct REAL NOT NULL,
                health_score INTEGER NOT NULL,
                health_rating TEXT NOT NULL,
                eight_week_hold_active INTEGER NOT NULL DEFAULT 0,
                eight_week_hold_start TEXT,
                eight_week_hold_end TEXT,
                power_move_pct REAL,
                power_move_weeks INTEGER,
                watch_date TEXT,
                breakout_date TEXT,
                entry_date TEXT,
                earnings_date TEXT,
                last_transition_at TEXT NOT NULL,
                py1_done INTEGER NOT NULL DEFAULT 0,
                py2_done INTEGER NOT NULL DEFAULT 0,
                tp1_sold INTEGER NOT NULL DEFAULT 0,
                tp2_sold INTEGER NOT NULL DEFAULT 0,
                prior_extended_marker TEXT,
                alt_entry_test_count INTEGER NOT NULL DEFAULT 0,
                last_synced_at TEXT,
                UNIQUE(symbol, portfolio)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create positions table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_positions_state ON positions (state);")
            .execute(&mut *conn)
            .await
            .context("failed to create positions state index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                alert_type TEXT NOT NULL,
                subtype TEXT NOT NULL,
                position_id INTEGER,
                payload_json TEXT NOT NULL,
                message TEXT NOT NULL,
                action TEXT,
                thread_source TEXT NOT NULL,
                priority TEXT NOT NULL,
                created_at TEXT NOT NULL,
                acknowledged INTEGER NOT NULL DEFAULT 0,
                acknowledged_at TEXT
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create alerts table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_alerts_symbol_created ON alerts (symbol, created_at);",
        )
        .execute(&mut *conn)
        .await
        .context("failed to create alerts index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS regime_alerts (
                date TEXT PRIMARY KEY,
                spy_dday_json TEXT NOT NULL,
                qqq_dday_json TEXT NOT NULL,
                trend_label TEXT NOT NULL,
                market_phase TEXT NOT NULL,
                composite_score REAL NOT NULL,
                regime_label TEXT NOT NULL,
                futures_json TEXT,
                exposure_min_pct INTEGER NOT NULL,
                exposure_max_pct INTEGER NOT NULL,
                alert_sent INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create regime_alerts table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS provider_configs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                domain TEXT NOT NULL,
                implementation TEXT NOT NULL,
                priority INTEGER NOT NULL,
                calls_per_minute INTEGER NOT NULL,
                burst_size INTEGER NOT NULL,
                min_delay_seconds REAL NOT NULL,
                settings_json TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create provider_configs table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS provider_credentials (
                provider_id INTEGER NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (provider_id, key)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create provider_credentials table")?;

        info!("database schema initialized");
        Ok(())
    }
}
