//! Regime Calculator: composite score, regime label, and exposure band
//! from distribution-day counts, the follow-through tracker, and futures
//! (spec §4.4).

use chrono::NaiveDate;

use crate::config::MarketRegimeConfig;
use crate::domain::errors::RegimeError;
use crate::domain::providers::{Bar, FuturesSnapshot as ProviderFuturesSnapshot};
use crate::domain::regime::{
    ExposureBand, FollowThroughState, IndexDistributionDays, MarketPhase, MarketRegimeAlert,
    RegimeLabel, TrendLabel,
};

use super::distribution_day::DistributionDayTracker;
use super::follow_through::FollowThroughTracker;

pub struct RegimeCalculator {
    config: MarketRegimeConfig,
    spy_dday: DistributionDayTracker,
    qqq_dday: DistributionDayTracker,
    spy_ftd: FollowThroughTracker,
}

impl RegimeCalculator {
    pub fn new(config: MarketRegimeConfig) -> Self {
        let window = config.distribution_day_window as usize;
        let decline = config.distribution_day_decline_pct;
        RegimeCalculator {
            spy_dday: DistributionDayTracker::new(window, decline),
            qqq_dday: DistributionDayTracker::new(window, decline),
            spy_ftd: FollowThroughTracker::new(config.follow_through_min_day, config.follow_through_min_pct),
            config,
        }
    }

    /// Computes one day's regime snapshot from >= 250 bars each for SPY
    /// and QQQ (DIA/IWM feed into exposure sizing downstream but aren't
    /// part of the core D-day/FTD/composite math per spec §4.4's named
    /// inputs). `date` is the trading day the snapshot represents.
    pub fn compute(
        &mut self,
        date: NaiveDate,
        spy_bars: &[Bar],
        qqq_bars: &[Bar],
        futures: Option<ProviderFuturesSnapshot>,
    ) -> Result<MarketRegimeAlert, RegimeError> {
        const MIN_BARS: usize = 250;
        if spy_bars.len() < MIN_BARS {
            return Err(RegimeError::InsufficientBars {
                symbol: "SPY".to_string(),
                need: MIN_BARS,
                have: spy_bars.len(),
            });
        }
        if qqq_bars.len() < MIN_BARS {
            return Err(RegimeError::InsufficientBars {
                symbol: "QQQ".to_string(),
                need: MIN_BARS,
                have: qqq_bars.len(),
            });
        }

        let spy_dday = self.spy_dday.update_from_bars(spy_bars);
        let qqq_dday = self.qqq_dday.update_from_bars(qqq_bars);
        let ftd_outcome = self.spy_ftd.advance(spy_bars);

        let trend_label = Self::combine_trend(spy_dday.trend, qqq_dday.trend);
        let score = self.composite_score(&spy_dday, &qqq_dday, &ftd_outcome.state, futures.as_ref(), spy_bars);
        let regime_label = RegimeLabel::from_score(score);
        let total_dday = spy_dday.count + qqq_dday.count;
        let exposure_band = ExposureBand::from_total_distribution_days(total_dday);

        let futures_domain = futures.map(|f| crate::domain::regime::FuturesSnapshot {
            es_pct: f.es_pct,
            nq_pct: f.nq_pct,
            ym_pct: f.ym_pct,
            timestamp: f.timestamp,
        });

        Ok(MarketRegimeAlert {
            date,
            spy_distribution_days: spy_dday,
            qqq_distribution_days: qqq_dday,
            trend_label,
            market_phase: ftd_outcome.phase,
            composite_score: score,
            regime_label,
            futures: futures_domain,
            exposure_band,
            alert_sent: false,
        })
    }

    fn combine_trend(spy: Option<TrendLabel>, qqq: Option<TrendLabel>) -> TrendLabel {
        match (spy, qqq) {
            (Some(TrendLabel::Worsening), _) | (_, Some(TrendLabel::Worsening)) => TrendLabel::Worsening,
            (Some(TrendLabel::Improving), Some(TrendLabel::Improving)) => TrendLabel::Improving,
            _ => TrendLabel::Flat,
        }
    }

    /// Weighted composite in [-1.5, 1.5]: D-day pressure, FTD state,
    /// index trend vs MAs, overnight futures (spec §4.4).
    fn composite_score(
        &self,
        spy_dday: &IndexDistributionDays,
        qqq_dday: &IndexDistributionDays,
        ftd_state: &FollowThroughState,
        futures: Option<&ProviderFuturesSnapshot>,
        spy_bars: &[Bar],
    ) -> f64 {
        let total_dday = (spy_dday.count + qqq_dday.count) as f64;
        // D-day pressure: 0 D-days -> +1.5, >= 13 D-days (spec's worst
        // exposure-band bucket) -> -1.5, linear in between.
        let dday_component = (1.5 - (total_dday / 13.0) * 3.0).clamp(-1.5, 1.5);

        let ftd_component = if ftd_state.most_recent_ftd.is_some() {
            1.5
        } else if ftd_state.rally_day.is_some() {
            0.0
        } else {
            -1.0
        };

        let trend_component = Self::index_trend_score(spy_bars);

        let futures_component = futures
            .map(|f| ((f.es_pct + f.nq_pct + f.ym_pct) / 3.0 / 2.0).clamp(-1.5, 1.5))
            .unwrap_or(0.0);

        let weighted = dday_component * self.config.weight_distribution_days
            + ftd_component * self.config.weight_follow_through
            + trend_component * self.config.weight_index_trend
            + futures_component * self.config.weight_futures;

        weighted.clamp(-1.5, 1.5)
    }

    fn index_trend_score(bars: &[Bar]) -> f64 {
        if bars.len() < 50 {
            return 0.0;
        }
        let last = bars[bars.len() - 1].close;
        let sma_50: rust_decimal::Decimal =
            bars[bars.len() - 50..].iter().map(|b| b.close).sum::<rust_decimal::Decimal>() / rust_decimal::Decimal::from(50);
        if sma_50.is_zero() {
            return 0.0;
        }
        let pct_above: f64 = ((last - sma_50) / sma_50 * rust_decimal::Decimal::from(100))
            .to_string()
            .parse()
            .unwrap_or(0.0);
        (pct_above / 5.0).clamp(-1.5, 1.5)
    }
}
