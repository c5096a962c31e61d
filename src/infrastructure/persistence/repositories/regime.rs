//! SQLite `RegimeAlertRepository`: one row per calendar date, upserted
//! by the Regime worker each cycle (spec §4.4). Grounded in the
//! teacher's candle upsert (`INSERT OR IGNORE` /
//! `ON CONFLICT(symbol, timestamp)`), extended here to a
//! conditional-overwrite upsert since a regime snapshot may be
//! recomputed intraday.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};

use crate::domain::errors::RegimeError;
use crate::domain::regime::{
    ExposureBand, FuturesSnapshot, IndexDistributionDays, MarketPhase, MarketRegimeAlert, RegimeLabel, TrendLabel,
};
use crate::domain::repositories::RegimeAlertRepository;

pub struct SqliteRegimeAlertRepository {
    pool: SqlitePool,
}

impl SqliteRegimeAlertRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteRegimeAlertRepository { pool }
    }

    fn map_row(row: &sqlx::sqlite::SqliteRow) -> Result<MarketRegimeAlert, RegimeError> {
        let date_str: String = row.try_get("date").unwrap_or_default();
        let date = date_str.parse::<NaiveDate>().unwrap_or_default();
        let spy_json: String = row.try_get("spy_dday_json").unwrap_or_default();
        let qqq_json: String = row.try_get("qqq_dday_json").unwrap_or_default();
        let futures_json: Option<String> = row.try_get("futures_json").ok().flatten();
        let trend_label_str: String = row.try_get("trend_label").unwrap_or_default();
        let market_phase_str: String = row.try_get("market_phase").unwrap_or_default();
        let regime_label_str: String = row.try_get("regime_label").unwrap_or_default();

        Ok(MarketRegimeAlert {
            date,
            spy_distribution_days: serde_json::from_str::<IndexDistributionDays>(&spy_json).unwrap_or_default(),
            qqq_distribution_days: serde_json::from_str::<IndexDistributionDays>(&qqq_json).unwrap_or_default(),
            trend_label: parse_trend_label(&trend_label_str),
            market_phase: parse_market_phase(&market_phase_str),
            composite_score: row.try_get("composite_score").unwrap_or_default(),
            regime_label: parse_regime_label(&regime_label_str),
            futures: futures_json.and_then(|s| serde_json::from_str::<FuturesSnapshot>(&s).ok()),
            exposure_band: ExposureBand {
                min_pct: row.try_get::<i64, _>("exposure_min_pct").unwrap_or_default() as u8,
                max_pct: row.try_get::<i64, _>("exposure_max_pct").unwrap_or_default() as u8,
            },
            alert_sent: row.try_get::<i64, _>("alert_sent").unwrap_or_default() != 0,
        })
    }
}

fn parse_trend_label(s: &str) -> TrendLabel {
    match s {
        "improving" => TrendLabel::Improving,
        "worsening" => TrendLabel::Worsening,
        _ => TrendLabel::Flat,
    }
}

fn parse_market_phase(s: &str) -> MarketPhase {
    match s {
        "confirmed_uptrend" => MarketPhase::ConfirmedUptrend,
        "rally_attempt" => MarketPhase::RallyAttempt,
        "market_in_correction" => MarketPhase::MarketInCorrection,
        _ => MarketPhase::UptrendUnderPressure,
    }
}

fn parse_regime_label(s: &str) -> RegimeLabel {
    match s {
        "bullish" => RegimeLabel::Bullish,
        "bearish" => RegimeLabel::Bearish,
        _ => RegimeLabel::Neutral,
    }
}

#[async_trait]
impl RegimeAlertRepository for SqliteRegimeAlertRepository {
    async fn get_latest(&self) -> Result<Option<MarketRegimeAlert>, RegimeError> {
        let row = sqlx::query("SELECT * FROM regime_alerts ORDER BY date DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|_| RegimeError::InsufficientBars { symbol: "regime".to_string(), need: 0, have: 0 })?;
        row.as_ref().map(Self::map_row).transpose()
    }

    async fn upsert_for_date(
        &self,
        date: NaiveDate,
        snapshot: MarketRegimeAlert,
        overwrite: bool,
    ) -> Result<MarketRegimeAlert, RegimeError> {
        if !overwrite {
            let existing = sqlx::query("SELECT date FROM regime_alerts WHERE date = ?")
                .bind(date.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|_| RegimeError::DuplicateSnapshot { date })?;
            if existing.is_some() {
                return Err(RegimeError::DuplicateSnapshot { date });
            }
        }

        let spy_json = serde_json::to_string(&snapshot.spy_distribution_days).unwrap_or_default();
        let qqq_json = serde_json::to_string(&snapshot.qqq_distribution_days).unwrap_or_default();
        let futures_json = snapshot.futures.as_ref().map(|f| serde_json::to_string(f).unwrap_or_default());
        let trend_label_str = match snapshot.trend_label {
            TrendLabel::Improving => "improving",
            TrendLabel::Worsening => "worsening",
            TrendLabel::Flat => "flat",
        };
        let market_phase_str = match snapshot.market_phase {
            MarketPhase::ConfirmedUptrend => "confirmed_uptrend",
            MarketPhase::RallyAttempt => "rally_attempt",
            MarketPhase::UptrendUnderPressure => "uptrend_under_pressure",
            MarketPhase::MarketInCorrection => "market_in_correction",
        };
        let regime_label_str = match snapshot.regime_label {
            RegimeLabel::Bullish => "bullish",
            RegimeLabel::Neutral => "neutral",
            RegimeLabel::Bearish => "bearish",
        };

        sqlx::query(
            r#"
            INSERT INTO regime_alerts (
                date, spy_dday_json, qqq_dday_json, trend_label, market_phase, composite_score,
                regime_label, futures_json, exposure_min_pct, exposure_max_pct, alert_sent
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(date) DO UPDATE SET
                spy_dday_json = excluded.spy_dday_json,
                qqq_dday_json = excluded.qqq_dday_json,
                trend_label = excluded.trend_label,
                market_phase = excluded.market_phase,
                composite_score = excluded.composite_score,
                regime_label = excluded.regime_label,
                futures_json = excluded.futures_json,
                exposure_min_pct = excluded.exposure_min_pct,
                exposure_max_pct = excluded.exposure_max_pct,
                alert_sent = excluded.alert_sent
            "#,
        )
        .bind(date.to_string())
        .bind(&spy_json)
        .bind(&qqq_json)
        .bind(trend_label_str)
        .bind(market_phase_str)
        .bind(snapshot.composite_score)
        .bind(regime_label_str)
        .bind(&futures_json)
        .bind(snapshot.exposure_band.min_pct as i64)
        .bind(snapshot.exposure_band.max_pct as i64)
        .bind(snapshot.alert_sent as i64)
        .execute(&self.pool)
        .await
        .map_err(|_| RegimeError::DuplicateSnapshot { date })?;

        Ok(snapshot)
    }
}
