//! Per-`(symbol, subtype)` cooldown map, owned by the Alert Service.
//! Generalized from the teacher's sliding-window bookkeeping in
//! `OrderThrottler`, but keyed rather than FIFO-queued: a cooldown gate is
//! a point-in-time check, not a rate limiter.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::domain::alert::AlertSubtype;

#[derive(Default)]
pub struct CooldownTracker {
    last_dispatch: HashMap<(String, AlertSubtype), Instant>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        CooldownTracker::default()
    }

    /// Returns true if `(symbol, subtype)` is still within its cooldown
    /// window as of `now`. A `window` of zero disables cooldown (spec
    /// §4.2: "0 disables").
    pub fn is_in_cooldown(&self, symbol: &str, subtype: AlertSubtype, window: Duration, now: Instant) -> bool {
        if window.is_zero() {
            return false;
        }
        match self.last_dispatch.get(&(symbol.to_string(), subtype)) {
            Some(last) => now.duration_since(*last) < window,
            None => false,
        }
    }

    pub fn record_dispatch(&mut self, symbol: &str, subtype: AlertSubtype, at: Instant) {
        self.last_dispatch.insert((symbol.to_string(), subtype), at);
    }

    /// Prunes entries for symbols no longer active, bounding memory by the
    /// active-symbol set (spec §9 Design Note on per-symbol caches).
    pub fn retain_symbols(&mut self, active_symbols: &std::collections::HashSet<String>) {
        self.last_dispatch.retain(|(symbol, _), _| active_symbols.contains(symbol));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_window_disables_cooldown() {
        let mut tracker = CooldownTracker::new();
        let now = Instant::now();
        tracker.record_dispatch("NVDA", AlertSubtype::Tp1, now);
        assert!(!tracker.is_in_cooldown("NVDA", AlertSubtype::Tp1, Duration::ZERO, now));
    }

    #[test]
    fn within_window_is_in_cooldown() {
        let mut tracker = CooldownTracker::new();
        let now = Instant::now();
        tracker.record_dispatch("NVDA", AlertSubtype::Tp1, now);
        assert!(tracker.is_in_cooldown("NVDA", AlertSubtype::Tp1, Duration::from_secs(3600), now));
    }

    #[test]
    fn distinct_subtypes_do_not_share_cooldown() {
        let mut tracker = CooldownTracker::new();
        let now = Instant::now();
        tracker.record_dispatch("NVDA", AlertSubtype::Tp1, now);
        assert!(!tracker.is_in_cooldown("NVDA", AlertSubtype::Tp2, Duration::from_secs(3600), now));
    }
}
