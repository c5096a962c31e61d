//! Market calendar: shared gating for worker threads, per spec §4.5.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};

/// `is_market_open`/`is_trading_day`, holiday-aware via a provider where
/// available, with a weekday-only fallback (spec §4.5).
pub trait MarketCalendar: Send + Sync {
    fn is_trading_day(&self, at: DateTime<Utc>) -> bool;
    fn is_market_open(&self, at: DateTime<Utc>) -> bool;
}

/// Weekday-only fallback: no holiday calendar, 09:30-16:00 ET modeled as a
/// fixed UTC offset window. Good enough when no provider-backed calendar
/// is configured; `holidays` lets callers layer in known closures.
pub struct WeekdayFallbackCalendar {
    pub holidays: Vec<chrono::NaiveDate>,
    /// Market open/close expressed in UTC hour-of-day, accounting for the
    /// caller's current DST offset (recomputed by the config loader).
    pub open_utc_hour: u32,
    pub close_utc_hour: u32,
}

impl WeekdayFallbackCalendar {
    pub fn new_eastern() -> Self {
        // 09:30-16:00 ET == 14:30-21:00 UTC during EST; callers in EDT should
        // override open_utc_hour/close_utc_hour via config.
        WeekdayFallbackCalendar {
            holidays: Vec::new(),
            open_utc_hour: 14,
            close_utc_hour: 21,
        }
    }
}

impl MarketCalendar for WeekdayFallbackCalendar {
    fn is_trading_day(&self, at: DateTime<Utc>) -> bool {
        let weekday = at.weekday();
        if matches!(weekday, Weekday::Sat | Weekday::Sun) {
            return false;
        }
        !self.holidays.contains(&at.date_naive())
    }

    fn is_market_open(&self, at: DateTime<Utc>) -> bool {
        if !self.is_trading_day(at) {
            return false;
        }
        let hour = at.hour();
        hour >= self.open_utc_hour && hour < self.close_utc_hour
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn weekend_is_not_trading_day() {
        let cal = WeekdayFallbackCalendar::new_eastern();
        // 2026-01-03 is a Saturday.
        let at = Utc.with_ymd_and_hms(2026, 1, 3, 15, 0, 0).unwrap();
        assert!(!cal.is_trading_day(at));
        assert!(!cal.is_market_open(at));
    }

    #[test]
    fn weekday_inside_window_is_open() {
        let cal = WeekdayFallbackCalendar::new_eastern();
        // 2026-01-05 is a Monday.
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 15, 0, 0).unwrap();
        assert!(cal.is_trading_day(at));
        assert!(cal.is_market_open(at));
    }

    #[test]
    fn weekday_outside_window_is_closed() {
        let cal = WeekdayFallbackCalendar::new_eastern();
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 5, 0, 0).unwrap();
        assert!(cal.is_trading_day(at));
        assert!(!cal.is_market_open(at));
    }

    #[test]
    fn holiday_is_not_trading_day() {
        let mut cal = WeekdayFallbackCalendar::new_eastern();
        cal.holidays.push(chrono::NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 15, 0, 0).unwrap();
        assert!(!cal.is_trading_day(at));
    }
}
