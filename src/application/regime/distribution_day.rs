//! Distribution-day tracker: rolling 25-trading-day window per index
//! (spec §4.4).

use crate::domain::providers::Bar;
use crate::domain::regime::{IndexDistributionDays, TrendLabel};

#[derive(Debug, Clone, Copy)]
struct DayRecord {
    is_distribution_day: bool,
}

pub struct DistributionDayTracker {
    window: usize,
    decline_threshold_pct: f64,
    history: std::collections::VecDeque<DayRecord>,
}

impl DistributionDayTracker {
    pub fn new(window: usize, decline_threshold_pct: f64) -> Self {
        DistributionDayTracker {
            window,
            decline_threshold_pct,
            history: std::collections::VecDeque::with_capacity(window),
        }
    }

    /// Rebuilds the tracker's rolling window from a bar series (most
    /// recent last). A day is a distribution day if close-to-close
    /// decline >= threshold on higher volume than the prior day.
    pub fn update_from_bars(&mut self, bars: &[Bar]) -> IndexDistributionDays {
        self.history.clear();
        let start = bars.len().saturating_sub(self.window + 1);
        let windowed = &bars[start..];

        let mut flags = Vec::new();
        for pair in windowed.windows(2) {
            let (prev, curr) = (&pair[0], &pair[1]);
            let decline_pct: f64 = if prev.close.is_zero() {
                0.0
            } else {
                ((prev.close - curr.close) / prev.close * rust_decimal::Decimal::from(100))
                    .to_string()
                    .parse()
                    .unwrap_or(0.0)
            };
            let is_dday = decline_pct >= self.decline_threshold_pct && curr.volume > prev.volume;
            flags.push(is_dday);
        }

        for flag in &flags {
            self.history.push_back(DayRecord { is_distribution_day: *flag });
        }
        while self.history.len() > self.window {
            self.history.pop_front();
        }

        let count = self.history.iter().filter(|d| d.is_distribution_day).count() as u32;

        let five_day_delta = if self.history.len() >= 5 {
            let recent_5: u32 = self
                .history
                .iter()
                .rev()
                .take(5)
                .filter(|d| d.is_distribution_day)
                .count() as u32;
            let prior_5: u32 = self
                .history
                .iter()
                .rev()
                .skip(5)
                .take(5)
                .filter(|d| d.is_distribution_day)
                .count() as u32;
            recent_5 as i32 - prior_5 as i32
        } else {
            0
        };

        let trend = Some(if five_day_delta > 0 {
            TrendLabel::Worsening
        } else if five_day_delta < 0 {
            TrendLabel::Improving
        } else {
            TrendLabel::Flat
        });

        IndexDistributionDays {
            count,
            five_day_delta,
            trend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn bar(day: u32, close: rust_decimal::Decimal, volume: u64) -> Bar {
        Bar {
            date: NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }

    #[test]
    fn counts_distribution_days_by_decline_and_volume() {
        let mut tracker = DistributionDayTracker::new(25, 0.2);
        let bars = vec![
            bar(1, dec!(100.0), 1_000_000),
            bar(2, dec!(99.5), 1_500_000), // 0.5% decline, higher volume -> D-day
            bar(3, dec!(99.6), 900_000),   // up day -> not D-day
        ];
        let result = tracker.update_from_bars(&bars);
        assert_eq!(result.count, 1);
    }

    #[test]
    fn requires_higher_volume_than_prior_day() {
        let mut tracker = DistributionDayTracker::new(25, 0.2);
        let bars = vec![
            bar(1, dec!(100.0), 2_000_000),
            bar(2, dec!(99.0), 1_000_000), // decline but lower volume -> not D-day
        ];
        let result = tracker.update_from_bars(&bars);
        assert_eq!(result.count, 0);
    }
}
