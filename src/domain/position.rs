//! Position data model.
//!
//! A `Position` tracks one equity through its CANSLIM lifecycle: watching,
//! sized entry tranches, exit tranches, and risk levels. Ownership of a
//! `Position` belongs to the persistence layer; workers load read-copies
//! per cycle and write back through `PositionRepository`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle state code, mirroring the signed state codes in spec §6.
///
/// `-1.5` ("exited, watching for re-entry") does not fit an integer
/// discriminant, so it is its own variant rather than a half-step encoded
/// elsewhere; `StateCode::discriminant()` returns the spec's numeric code
/// for persistence and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateCode {
    Watching,
    Entry1,
    Entry2,
    Entry3,
    Failed,
    ExitedWatching,
    Stopped,
}

impl StateCode {
    pub fn discriminant(self) -> f64 {
        match self {
            StateCode::Watching => 0.0,
            StateCode::Entry1 => 1.0,
            StateCode::Entry2 => 2.0,
            StateCode::Entry3 => 3.0,
            StateCode::Failed => -1.0,
            StateCode::ExitedWatching => -1.5,
            StateCode::Stopped => -2.0,
        }
    }

    pub fn from_discriminant(value: f64) -> Option<Self> {
        // Compare against a small fixed table rather than float-equality on
        // an arbitrary input; these are the only seven codes spec §6 defines.
        const TABLE: [(f64, StateCode); 7] = [
            (0.0, StateCode::Watching),
            (1.0, StateCode::Entry1),
            (2.0, StateCode::Entry2),
            (3.0, StateCode::Entry3),
            (-1.0, StateCode::Failed),
            (-1.5, StateCode::ExitedWatching),
            (-2.0, StateCode::Stopped),
        ];
        TABLE
            .iter()
            .find(|(d, _)| (*d - value).abs() < 1e-9)
            .map(|(_, s)| *s)
    }

    /// Returns true if `to` is a valid transition target from `self`,
    /// per the graph in spec §6.
    pub fn can_transition_to(self, to: StateCode) -> bool {
        use StateCode::*;
        matches!(
            (self, to),
            (Watching, Entry1)
                | (Watching, Failed)
                | (Entry1, Entry2)
                | (Entry1, Stopped)
                | (Entry1, ExitedWatching)
                | (Entry2, Entry3)
                | (Entry2, Stopped)
                | (Entry2, ExitedWatching)
                | (Entry3, Stopped)
                | (Entry3, ExitedWatching)
                | (ExitedWatching, Watching)
                | (ExitedWatching, Stopped)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, StateCode::Failed | StateCode::Stopped)
    }

    pub fn is_active_position(self) -> bool {
        matches!(self, StateCode::Entry1 | StateCode::Entry2 | StateCode::Entry3)
    }
}

/// One entry tranche: `(shares, price)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryTranche {
    pub shares: Decimal,
    pub price: Decimal,
}

/// One take-profit exit tranche: `(shares, price, date)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitTranche {
    pub shares: Decimal,
    pub price: Decimal,
    pub date: NaiveDate,
}

/// Final close of the position, if fully exited.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinalClose {
    pub price: Decimal,
    pub date: NaiveDate,
    pub reason: CloseReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    HardStop,
    TrailingStop,
    ManualExit,
    SetupFailed,
}

/// Ratings snapshot, captured at breakout/entry time and refreshed
/// periodically by the Maintenance worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingsSnapshot {
    pub rs_rating: Option<u8>,
    pub rs_3mo: Option<u8>,
    pub rs_6mo: Option<u8>,
    pub earnings_rating: Option<u8>,
    pub composite_rating: Option<u8>,
    pub smr_rating: Option<char>,
    pub ad_rating: Option<char>,
    pub up_down_volume_ratio: Option<f64>,
    pub industry_rank: Option<u32>,
    pub fund_count: Option<u32>,
    pub prior_uptrend_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: i64,
    pub symbol: String,
    pub portfolio: String,

    pub state: StateCode,

    // Setup attributes
    pub pivot: Decimal,
    pub pattern_label: String,
    pub base_stage: u8,
    pub base_depth_pct: f64,
    pub base_length_weeks: u32,

    pub ratings: RatingsSnapshot,

    pub entries: Vec<EntryTranche>,
    pub exits: Vec<ExitTranche>,
    pub final_close: Option<FinalClose>,

    pub hard_stop_pct: f64,
    pub stop_price: Decimal,

    pub last_price: Decimal,
    pub max_price: Decimal,
    pub max_gain_pct: f64,
    pub health_score: i32,
    pub health_rating: String,
    pub eight_week_hold_active: bool,
    pub eight_week_hold_start: Option<NaiveDate>,
    pub eight_week_hold_end: Option<NaiveDate>,
    pub power_move_pct: Option<f64>,
    pub power_move_weeks: Option<u32>,

    pub watch_date: Option<NaiveDate>,
    pub breakout_date: Option<NaiveDate>,
    pub entry_date: Option<NaiveDate>,
    pub earnings_date: Option<NaiveDate>,
    pub last_transition_at: DateTime<Utc>,

    pub py1_done: bool,
    pub py2_done: bool,
    pub tp1_sold: u32,
    pub tp2_sold: u32,

    /// Marker for the watchlist alt-entry checker: set when a state-0
    /// symbol extends > 5% above pivot; expires after 30 days (spec §4.3
    /// checker 7).
    pub prior_extended_marker: Option<NaiveDate>,
    pub alt_entry_test_count: u32,
}

impl Position {
    /// Total shares currently held: entries minus take-profit sales minus
    /// the final close, per spec §3's invariant.
    pub fn total_shares(&self) -> Decimal {
        let entered: Decimal = self.entries.iter().map(|e| e.shares).sum();
        let tp_sold: Decimal = self.exits.iter().map(|e| e.shares).sum();
        let closed = if self.final_close.is_some() {
            entered - tp_sold
        } else {
            Decimal::ZERO
        };
        entered - tp_sold - closed
    }

    /// Share-weighted average entry price across all entry tranches.
    pub fn avg_cost(&self) -> Decimal {
        let total_shares: Decimal = self.entries.iter().map(|e| e.shares).sum();
        if total_shares.is_zero() {
            return Decimal::ZERO;
        }
        let weighted: Decimal = self.entries.iter().map(|e| e.shares * e.price).sum();
        weighted / total_shares
    }

    /// Validates the invariants spec §3/§8 require on any entry/exit
    /// mutation: share-weighted avg cost, and stop price capped relative
    /// to avg cost and the configured hard-stop percentage.
    pub fn check_invariants(&self) -> Result<(), crate::domain::errors::PositionError> {
        if self.entries.is_empty() {
            return Ok(());
        }
        let avg_cost = self.avg_cost();
        let max_stop = avg_cost * (Decimal::ONE - Decimal::try_from(self.hard_stop_pct).unwrap_or_default());
        if self.stop_price > max_stop {
            return Err(crate::domain::errors::PositionError::InvariantViolated {
                symbol: self.symbol.clone(),
                detail: format!(
                    "stop_price {} exceeds avg_cost*(1-hard_stop_pct) = {}",
                    self.stop_price, max_stop
                ),
            });
        }
        Ok(())
    }

    /// Attempts a state transition, validating it against the graph in
    /// spec §6.
    pub fn transition_to(&mut self, to: StateCode) -> Result<(), crate::domain::errors::PositionError> {
        if !self.state.can_transition_to(to) {
            return Err(crate::domain::errors::PositionError::InvalidTransition {
                symbol: self.symbol.clone(),
                from: self.state,
                to,
            });
        }
        self.state = to;
        self.last_transition_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base_position() -> Position {
        Position {
            id: 1,
            symbol: "NVDA".to_string(),
            portfolio: "Swing".to_string(),
            state: StateCode::Entry2,
            pivot: dec!(95.0),
            pattern_label: "Cup with Handle".to_string(),
            base_stage: 1,
            base_depth_pct: 18.0,
            base_length_weeks: 7,
            ratings: RatingsSnapshot::default(),
            entries: vec![
                EntryTranche {
                    shares: dec!(100),
                    price: dec!(98.0),
                },
                EntryTranche {
                    shares: dec!(100),
                    price: dec!(102.0),
                },
            ],
            exits: vec![],
            final_close: None,
            hard_stop_pct: 0.07,
            stop_price: dec!(93.0),
            last_price: dec!(100.0),
            max_price: dec!(105.0),
            max_gain_pct: 5.0,
            health_score: 100,
            health_rating: "HEALTHY".to_string(),
            eight_week_hold_active: false,
            eight_week_hold_start: None,
            eight_week_hold_end: None,
            power_move_pct: None,
            power_move_weeks: None,
            watch_date: None,
            breakout_date: None,
            entry_date: None,
            earnings_date: None,
            last_transition_at: Utc::now(),
            py1_done: false,
            py2_done: false,
            tp1_sold: 0,
            tp2_sold: 0,
            prior_extended_marker: None,
            alt_entry_test_count: 0,
        }
    }

    #[test]
    fn total_shares_reflects_entries_minus_exits() {
        let pos = base_position();
        assert_eq!(pos.total_shares(), dec!(200));
    }

    #[test]
    fn avg_cost_is_share_weighted() {
        let pos = base_position();
        assert_eq!(pos.avg_cost(), dec!(100.0));
    }

    #[test]
    fn invariants_reject_stop_above_cap() {
        let mut pos = base_position();
        pos.stop_price = dec!(99.0); // too close, violates 7% hard stop off avg_cost
        assert!(pos.check_invariants().is_err());
    }

    #[test]
    fn invariants_accept_valid_stop() {
        let pos = base_position();
        assert!(pos.check_invariants().is_ok());
    }

    #[test]
    fn state_transitions_follow_graph() {
        let mut pos = base_position();
        assert!(pos.transition_to(StateCode::Entry3).is_ok());
        assert_eq!(pos.state, StateCode::Entry3);

        let mut pos2 = base_position();
        pos2.state = StateCode::Failed;
        assert!(pos2.transition_to(StateCode::Watching).is_err());
    }

    #[test]
    fn discriminant_round_trips() {
        for code in [
            StateCode::Watching,
            StateCode::Entry1,
            StateCode::Entry2,
            StateCode::Entry3,
            StateCode::Failed,
            StateCode::ExitedWatching,
            StateCode::Stopped,
        ] {
            assert_eq!(StateCode::from_discriminant(code.discriminant()), Some(code));
        }
    }

    proptest::proptest! {
        /// Spec §8 invariant 3: `avg_cost` is always the share-weighted
        /// entry price, so for any non-empty set of entry tranches it must
        /// land within `[min entry price, max entry price]`, and
        /// `total_shares` with no exits/close must equal the sum of entry
        /// shares exactly (`Decimal` arithmetic, no rounding drift).
        #[test]
        fn avg_cost_stays_within_entry_price_bounds(
            prices_cents in proptest::collection::vec(5_000i64..50_000i64, 1..6),
            share_counts in proptest::collection::vec(1i64..1_000i64, 1..6),
        ) {
            let n = prices_cents.len().min(share_counts.len());
            let entries: Vec<EntryTranche> = (0..n)
                .map(|i| EntryTranche {
                    shares: Decimal::from(share_counts[i]),
                    price: Decimal::new(prices_cents[i], 2),
                })
                .collect();

            let mut pos = base_position();
            pos.entries = entries.clone();

            let min_price = entries.iter().map(|e| e.price).min().unwrap();
            let max_price = entries.iter().map(|e| e.price).max().unwrap();
            let avg = pos.avg_cost();
            proptest::prop_assert!(avg >= min_price && avg <= max_price);

            let expected_total: Decimal = entries.iter().map(|e| e.shares).sum();
            proptest::prop_assert_eq!(pos.total_shares(), expected_total);
        }
    }
}
