//! Sliding-window rate limiter, generalized from the teacher's
//! `OrderThrottler` (`application::risk_management::order_throttler`).
//! Reused both by provider throttling (spec §4.1) and the alert
//! dispatcher's sink rate limit (spec §4.2, §8 invariant 8).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub struct SlidingWindowLimiter {
    window: Duration,
    max_calls: u32,
    min_delay: Duration,
    timestamps: VecDeque<Instant>,
    last_call: Option<Instant>,
}

impl SlidingWindowLimiter {
    pub fn new(max_calls: u32, window: Duration, min_delay: Duration) -> Self {
        SlidingWindowLimiter {
            window,
            max_calls,
            min_delay,
            timestamps: VecDeque::new(),
            last_call: None,
        }
    }

    fn cleanup(&mut self, now: Instant) {
        while let Some(front) = self.timestamps.front() {
            if now.duration_since(*front) > self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Whether a call is allowed right now without violating either the
    /// sliding-window budget or the minimum inter-call delay.
    pub fn can_proceed(&mut self, now: Instant) -> bool {
        self.cleanup(now);
        if self.timestamps.len() as u32 >= self.max_calls {
            return false;
        }
        if let Some(last) = self.last_call {
            if now.duration_since(last) < self.min_delay {
                return false;
            }
        }
        true
    }

    /// Records a call as having proceeded at `now`. Callers must check
    /// `can_proceed` first; this method does not re-check.
    pub fn record(&mut self, now: Instant) {
        self.timestamps.push_back(now);
        self.last_call = Some(now);
    }

    /// Seconds a caller must wait before the next call could proceed.
    pub fn delay_until_available(&mut self, now: Instant) -> Duration {
        self.cleanup(now);
        let mut wait = Duration::ZERO;
        if self.timestamps.len() as u32 >= self.max_calls {
            if let Some(front) = self.timestamps.front() {
                wait = wait.max(self.window.saturating_sub(now.duration_since(*front)));
            }
        }
        if let Some(last) = self.last_call {
            let elapsed = now.duration_since(last);
            if elapsed < self.min_delay {
                wait = wait.max(self.min_delay - elapsed);
            }
        }
        wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_calls_under_limit() {
        let mut limiter = SlidingWindowLimiter::new(5, Duration::from_secs(60), Duration::ZERO);
        let now = Instant::now();
        assert!(limiter.can_proceed(now));
        limiter.record(now);
    }

    #[test]
    fn blocks_calls_over_limit_within_window() {
        let mut limiter = SlidingWindowLimiter::new(2, Duration::from_secs(60), Duration::ZERO);
        let now = Instant::now();
        limiter.record(now);
        limiter.record(now);
        assert!(!limiter.can_proceed(now));
    }

    #[test]
    fn enforces_min_inter_call_delay() {
        let mut limiter = SlidingWindowLimiter::new(100, Duration::from_secs(60), Duration::from_millis(500));
        let now = Instant::now();
        limiter.record(now);
        assert!(!limiter.can_proceed(now));
    }

    #[test]
    fn sliding_window_prunes_old_entries() {
        let mut limiter = SlidingWindowLimiter::new(1, Duration::from_millis(50), Duration::ZERO);
        let now = Instant::now();
        limiter.record(now);
        assert!(!limiter.can_proceed(now));
        let later = now + Duration::from_millis(100);
        assert!(limiter.can_proceed(later));
    }
}
