//! HTTP-backed `HistoricalProvider`: daily OHLCV bars and derived
//! technicals from a REST market-data API (spec §4.1, `market_data`/
//! `polygon` config section). Grounded in the teacher's
//! `AlpacaMarketDataService` HTTP-fetch shape
//! (`infrastructure::alpaca::market_data`) and its retry-middleware HTTP
//! client construction (`infrastructure::core::http_client_factory`).

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest_middleware::ClientBuilder;
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use rust_decimal::Decimal;
use serde::Deserialize;
use ta::indicators::{ExponentialMovingAverage, SimpleMovingAverage};
use ta::Next;

use crate::domain::errors::ProviderError;
use crate::domain::providers::ports::{Bar, HistoricalProvider, TechnicalSnapshot};
use crate::infrastructure::providers::rate_limiter::SlidingWindowLimiter;

/// One bar as returned by the upstream REST API (field names match the
/// Polygon-style aggregates endpoint named in spec §6).
#[derive(Debug, Deserialize)]
struct RawBar {
    #[serde(rename = "t")]
    timestamp_ms: i64,
    #[serde(rename = "o")]
    open: f64,
    #[serde(rename = "h")]
    high: f64,
    #[serde(rename = "l")]
    low: f64,
    #[serde(rename = "c")]
    close: f64,
    #[serde(rename = "v")]
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct AggregatesResponse {
    #[serde(default)]
    results: Vec<RawBar>,
}

#[derive(Debug, Deserialize)]
struct EarningsResponse {
    #[serde(default)]
    next_earnings_date: Option<String>,
}

pub struct HttpHistoricalProvider {
    client: reqwest_middleware::ClientWithMiddleware,
    base_url: String,
    api_key: String,
    limiter: tokio::sync::Mutex<SlidingWindowLimiter>,
}

impl HttpHistoricalProvider {
    pub fn new(base_url: String, api_key: String, calls_per_minute: u32, min_delay: Duration) -> Self {
        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_millis(250), Duration::from_secs(10))
            .build_with_max_retries(3);
        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client builds with static config");
        let client = ClientBuilder::new(inner)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        HttpHistoricalProvider {
            client,
            base_url,
            api_key,
            limiter: tokio::sync::Mutex::new(SlidingWindowLimiter::new(
                calls_per_minute,
                Duration::from_secs(60),
                min_delay,
            )),
        }
    }

    /// Blocks until the throttle profile allows another call (spec §4.1:
    /// "operations that would exceed the budget block until a slot is
    /// available").
    async fn throttle(&self) {
        loop {
            let wait = {
                let mut limiter = self.limiter.lock().await;
                let now = std::time::Instant::now();
                if limiter.can_proceed(now) {
                    limiter.record(now);
                    return;
                }
                limiter.delay_until_available(now)
            };
            tokio::time::sleep(wait).await;
        }
    }

    async fn fetch_bars(&self, symbol: &str, lookback_days: u32) -> Result<Vec<Bar>, ProviderError> {
        self.throttle().await;

        let end = chrono::Utc::now().date_naive();
        let start = end - chrono::Duration::days(lookback_days as i64 * 2);
        let url = format!(
            "{}/v2/aggs/ticker/{}/range/1/day/{}/{}?apiKey={}&limit=5000&sort=asc",
            self.base_url, symbol, start, end, self.api_key
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionLost { reason: format!("{symbol}: {e}") })?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimitExceeded { retry_after_secs: 60 });
        }
        if !response.status().is_success() {
            return Err(ProviderError::InvalidData {
                symbol: symbol.to_string(),
                reason: format!("upstream returned {}", response.status()),
            });
        }

        let parsed: AggregatesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidData { symbol: symbol.to_string(), reason: e.to_string() })?;

        let mut bars: Vec<Bar> = parsed
            .results
            .into_iter()
            .filter_map(|raw| {
                let date = chrono::DateTime::from_timestamp_millis(raw.timestamp_ms)?.date_naive();
                Some(Bar {
                    date,
                    open: Decimal::from_str(&format!("{:.4}", raw.open)).ok()?,
                    high: Decimal::from_str(&format!("{:.4}", raw.high)).ok()?,
                    low: Decimal::from_str(&format!("{:.4}", raw.low)).ok()?,
                    close: Decimal::from_str(&format!("{:.4}", raw.close)).ok()?,
                    volume: raw.volume.max(0.0) as u64,
                })
            })
            .collect();

        bars.sort_by_key(|b| b.date);
        if bars.len() as u32 > lookback_days {
            let start_idx = bars.len() - lookback_days as usize;
            bars = bars.split_off(start_idx);
        }
        Ok(bars)
    }
}

#[async_trait]
impl HistoricalProvider for HttpHistoricalProvider {
    async fn get_daily_bars(&self, symbol: &str, lookback_days: u32) -> Result<Vec<Bar>, ProviderError> {
        self.fetch_bars(symbol, lookback_days).await
    }

    async fn get_technicals(&self, symbol: &str) -> Result<TechnicalSnapshot, ProviderError> {
        let bars = self.fetch_bars(symbol, 260).await?;
        Ok(compute_technicals(&bars))
    }

    async fn get_avg_volume_50d(&self, symbol: &str) -> Result<u64, ProviderError> {
        let bars = self.fetch_bars(symbol, 50).await?;
        if bars.is_empty() {
            return Ok(0);
        }
        let total: u64 = bars.iter().map(|b| b.volume).sum();
        Ok(total / bars.len() as u64)
    }

    async fn get_earnings_date(&self, symbol: &str) -> Result<Option<NaiveDate>, ProviderError> {
        self.throttle().await;

        let url = format!("{}/v3/reference/earnings/{}?apiKey={}", self.base_url, symbol, self.api_key);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionLost { reason: format!("{symbol}: {e}") })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimitExceeded { retry_after_secs: 60 });
        }
        if !response.status().is_success() {
            return Err(ProviderError::InvalidData {
                symbol: symbol.to_string(),
                reason: format!("upstream returned {}", response.status()),
            });
        }

        let parsed: EarningsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidData { symbol: symbol.to_string(), reason: e.to_string() })?;

        Ok(parsed.next_earnings_date.and_then(|s| NaiveDate::from_str(&s).ok()))
    }
}

/// Feeds daily closes through `ta`'s moving-average indicators to derive
/// the snapshot the Position Monitor's context needs; the "10-week" line
/// is computed from weekly closes (last close of every 5-bar chunk) over
/// the trailing 10 weeks, matching the CANSLIM convention that the
/// weekly line tracks roughly the 50-day average but is drawn from
/// weekly bars, not daily ones.
fn compute_technicals(bars: &[Bar]) -> TechnicalSnapshot {
    let closes: Vec<f64> = bars.iter().map(|b| b.close.to_string().parse().unwrap_or(0.0)).collect();

    let ema_21 = moving_average(&closes, 21, true);
    let sma_50 = moving_average(&closes, 50, false);
    let sma_200 = moving_average(&closes, 200, false);

    let weekly_closes: Vec<f64> = closes.chunks(5).filter_map(|chunk| chunk.last().copied()).collect();
    let sma_10_week = moving_average(&weekly_closes, 10, false);

    let avg_volume_50d = if bars.len() >= 50 {
        let recent = &bars[bars.len() - 50..];
        Some(recent.iter().map(|b| b.volume).sum::<u64>() / 50)
    } else if !bars.is_empty() {
        Some(bars.iter().map(|b| b.volume).sum::<u64>() / bars.len() as u64)
    } else {
        None
    };

    TechnicalSnapshot {
        ema_21: ema_21.and_then(|v| Decimal::from_str(&format!("{:.4}", v)).ok()),
        sma_50: sma_50.and_then(|v| Decimal::from_str(&format!("{:.4}", v)).ok()),
        sma_200: sma_200.and_then(|v| Decimal::from_str(&format!("{:.4}", v)).ok()),
        sma_10_week: sma_10_week.and_then(|v| Decimal::from_str(&format!("{:.4}", v)).ok()),
        avg_volume_50d,
    }
}

fn moving_average(values: &[f64], period: usize, exponential: bool) -> Option<f64> {
    if values.len() < period || period == 0 {
        return None;
    }
    if exponential {
        let mut ema = ExponentialMovingAverage::new(period).ok()?;
        let mut last = 0.0;
        for v in values {
            last = ema.next(*v);
        }
        Some(last)
    } else {
        let mut sma = SimpleMovingAverage::new(period).ok()?;
        let mut last = 0.0;
        for v in values {
            last = sma.next(*v);
        }
        Some(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_bars(n: usize, price: f64) -> Vec<Bar> {
        (0..n)
            .map(|i| Bar {
                date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + chrono::Duration::days(i as i64),
                open: Decimal::from_str(&price.to_string()).unwrap(),
                high: Decimal::from_str(&price.to_string()).unwrap(),
                low: Decimal::from_str(&price.to_string()).unwrap(),
                close: Decimal::from_str(&price.to_string()).unwrap(),
                volume: 1_000_000,
            })
            .collect()
    }

    #[test]
    fn flat_series_averages_converge_to_price() {
        let bars = flat_bars(260, 100.0);
        let snapshot = compute_technicals(&bars);
        assert!((snapshot.sma_50.unwrap().to_string().parse::<f64>().unwrap() - 100.0).abs() < 0.01);
        assert!(snapshot.avg_volume_50d.unwrap() == 1_000_000);
    }

    #[test]
    fn short_series_yields_none_for_long_windows() {
        let bars = flat_bars(10, 50.0);
        let snapshot = compute_technicals(&bars);
        assert!(snapshot.sma_200.is_none());
    }
}
