//! Follow-through-day tracker: rally-attempt state machine (spec §4.4).

use crate::domain::providers::Bar;
use crate::domain::regime::{FollowThroughState, MarketPhase};

pub struct FollowThroughTracker {
    min_day: u32,
    min_pct: f64,
    state: FollowThroughState,
}

pub struct FollowThroughOutcome {
    pub state: FollowThroughState,
    pub phase: MarketPhase,
    pub is_ftd_today: bool,
    pub rally_invalidated_today: bool,
}

impl FollowThroughTracker {
    pub fn new(min_day: u32, min_pct: f64) -> Self {
        FollowThroughTracker {
            min_day,
            min_pct,
            state: FollowThroughState::default(),
        }
    }

    pub fn state(&self) -> FollowThroughState {
        self.state
    }

    /// Advances the tracker by one bar. A rally attempt begins on a
    /// down-day low that is subsequently exceeded; day 4+ of the attempt
    /// with an up move >= `min_pct` on higher volume than the prior day
    /// confirms a follow-through day.
    pub fn advance(&mut self, bars: &[Bar]) -> FollowThroughOutcome {
        if bars.len() < 2 {
            return FollowThroughOutcome {
                state: self.state,
                phase: MarketPhase::RallyAttempt,
                is_ftd_today: false,
                rally_invalidated_today: false,
            };
        }

        let today = bars[bars.len() - 1];
        let yesterday = bars[bars.len() - 2];

        let is_down_day = today.close < yesterday.close;
        let mut is_ftd_today = false;
        let mut rally_invalidated_today = false;

        match (self.state.rally_day, self.state.rally_low) {
            (None, _) => {
                if is_down_day {
                    self.state.rally_day = Some(1);
                    self.state.rally_low = Some(today.low.to_string().parse().unwrap_or(0.0));
                }
            }
            (Some(day), Some(low)) => {
                let today_low: f64 = today.low.to_string().parse().unwrap_or(0.0);
                if today_low < low {
                    // New lower low restarts the rally attempt clock.
                    self.state.rally_day = Some(1);
                    self.state.rally_low = Some(today_low);
                } else {
                    let new_day = day + 1;
                    self.state.rally_day = Some(new_day);

                    let up_pct: f64 = if yesterday.close.is_zero() {
                        0.0
                    } else {
                        ((today.close - yesterday.close) / yesterday.close * rust_decimal::Decimal::from(100))
                            .to_string()
                            .parse()
                            .unwrap_or(0.0)
                    };

                    if new_day >= self.min_day && up_pct >= self.min_pct && today.volume > yesterday.volume {
                        is_ftd_today = true;
                        self.state.most_recent_ftd = Some(today.date);
                        self.state.successful_ftd_count += 1;
                        self.state.rally_day = None;
                        self.state.rally_low = None;
                    } else if up_pct < 0.0 && new_day >= self.min_day {
                        // A hard down move after day 4 without confirming
                        // invalidates this attempt.
                        rally_invalidated_today = true;
                        self.state.failed_rally_count += 1;
                        self.state.rally_day = None;
                        self.state.rally_low = None;
                    }
                }
            }
            _ => {}
        }

        let phase = if is_ftd_today || self.state.most_recent_ftd.is_some() {
            MarketPhase::ConfirmedUptrend
        } else if self.state.rally_day.is_some() {
            MarketPhase::RallyAttempt
        } else if rally_invalidated_today {
            MarketPhase::MarketInCorrection
        } else {
            MarketPhase::UptrendUnderPressure
        };

        FollowThroughOutcome {
            state: self.state,
            phase,
            is_ftd_today,
            rally_invalidated_today,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn bar(day: u32, low: rust_decimal::Decimal, close: rust_decimal::Decimal, volume: u64) -> Bar {
        Bar {
            date: NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
            open: close,
            high: close,
            low,
            close,
            volume,
        }
    }

    #[test]
    fn rally_attempt_begins_on_down_day() {
        let mut tracker = FollowThroughTracker::new(4, 1.2);
        let bars = vec![
            bar(1, dec!(99.0), dec!(100.0), 1_000_000),
            bar(2, dec!(97.0), dec!(98.0), 1_000_000),
        ];
        let outcome = tracker.advance(&bars);
        assert_eq!(outcome.state.rally_day, Some(1));
    }

    #[test]
    fn confirms_ftd_on_day_4_with_volume_and_pct() {
        let mut tracker = FollowThroughTracker::new(4, 1.2);
        let day1 = vec![
            bar(1, dec!(99.0), dec!(100.0), 1_000_000),
            bar(2, dec!(97.0), dec!(98.0), 1_000_000),
        ];
        tracker.advance(&day1);
        let day2 = vec![
            day1[0], day1[1],
            bar(3, dec!(97.5), dec!(99.0), 900_000),
        ];
        tracker.advance(&day2);
        let day3 = vec![
            day2[0], day2[1], day2[2],
            bar(4, dec!(98.0), dec!(100.0), 950_000),
        ];
        tracker.advance(&day3);
        let day4 = vec![
            day3[0], day3[1], day3[2], day3[3],
            bar(5, dec!(99.0), dec!(102.5), 1_500_000), // day 4 of attempt, +2.5%, higher volume
        ];
        let outcome = tracker.advance(&day4);
        assert!(outcome.is_ftd_today);
    }
}
