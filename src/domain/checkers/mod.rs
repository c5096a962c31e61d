//! The checker chain: the Position Monitor's rule engine seam.
//!
//! Generalized from the teacher's `RiskValidator` trait
//! (`domain::risk::filters::validator_trait`), but made synchronous:
//! spec §4.3 requires each checker be "a pure function of (position,
//! context)" with no I/O, so `async_trait` buys nothing here and costs a
//! boxed future on every call.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::alert::CandidateAlert;
use crate::domain::position::{Position, StateCode};

/// Immutable per-cycle snapshot handed to every checker. Built once per
/// position per cycle from the position row, a fresh quote, cached
/// technicals, and the current regime (spec §4.3).
#[derive(Debug, Clone)]
pub struct PositionContext {
    pub symbol: String,
    pub position_id: i64,
    pub current_price: Decimal,
    pub entry_price: Decimal,
    pub pivot_price: Decimal,
    pub shares: Decimal,
    pub state: StateCode,
    pub pnl_pct: f64,
    pub pnl_dollars: Decimal,
    pub max_price: Decimal,
    pub max_gain_pct: f64,

    pub ema_21: Option<Decimal>,
    pub sma_50: Option<Decimal>,
    pub sma_200: Option<Decimal>,
    pub sma_10_week: Option<Decimal>,

    pub volume_ratio: f64,
    pub rs_rating: Option<u8>,
    pub ad_rating: Option<char>,
    pub base_stage: u8,

    pub days_in_position: i64,
    pub days_since_breakout: Option<i64>,

    pub eight_week_hold_active: bool,
    pub eight_week_hold_end: Option<chrono::NaiveDate>,

    pub py1_done: bool,
    pub py2_done: bool,
    pub tp1_sold: u32,
    pub tp2_sold: u32,

    pub days_to_earnings: Option<i64>,

    pub health_score: i32,
    pub canslim_grade: Option<char>,
    pub canslim_score: Option<f64>,

    pub market_regime: String,
    pub spy_price: Decimal,

    pub hard_stop: Decimal,
    pub trailing_stop: Option<Decimal>,

    pub day_open: Decimal,
    pub day_high: Decimal,
    pub day_low: Decimal,
    pub prev_close: Decimal,

    /// Prior-extended marker and alt-entry test count, carried from the
    /// position row for the watchlist alt-entry checker (state 0 only).
    pub prior_extended_marker: Option<chrono::NaiveDate>,
    pub alt_entry_test_count: u32,

    /// Bounded ring buffer (<=10) of recent closes, for bounce-pattern
    /// detection in the reentry/alt-entry checkers (spec §4.3 checker 6).
    pub recent_price_history: Vec<Decimal>,
}

impl PositionContext {
    pub fn from_position(position: &Position, quote: &crate::domain::providers::Quote, regime_label: &str, spy_price: Decimal, price_history: Vec<Decimal>) -> Self {
        let avg_cost = position.avg_cost();
        let shares = position.total_shares();
        let pnl_pct = if avg_cost.is_zero() {
            0.0
        } else {
            ((quote.last - avg_cost) / avg_cost * dec!(100))
                .to_string()
                .parse()
                .unwrap_or(0.0)
        };
        let pnl_dollars = (quote.last - avg_cost) * shares;
        let volume_ratio = match (quote.volume, quote.avg_volume) {
            (Some(v), Some(avg)) if avg > 0 => v as f64 / avg as f64,
            _ => 1.0,
        };
        let days_in_position = position
            .entry_date
            .map(|d| (chrono::Utc::now().date_naive() - d).num_days())
            .unwrap_or(0);
        let days_since_breakout = position
            .breakout_date
            .map(|d| (chrono::Utc::now().date_naive() - d).num_days());
        let days_to_earnings = position
            .earnings_date
            .map(|d| (d - chrono::Utc::now().date_naive()).num_days());

        PositionContext {
            symbol: position.symbol.clone(),
            position_id: position.id,
            current_price: quote.last,
            entry_price: avg_cost,
            pivot_price: position.pivot,
            shares,
            state: position.state,
            pnl_pct,
            pnl_dollars,
            max_price: position.max_price,
            max_gain_pct: position.max_gain_pct,
            ema_21: None,
            sma_50: None,
            sma_200: None,
            sma_10_week: None,
            volume_ratio,
            rs_rating: position.ratings.rs_rating,
            ad_rating: position.ratings.ad_rating,
            base_stage: position.base_stage,
            days_in_position,
            days_since_breakout,
            eight_week_hold_active: position.eight_week_hold_active,
            eight_week_hold_end: position.eight_week_hold_end,
            py1_done: position.py1_done,
            py2_done: position.py2_done,
            tp1_sold: position.tp1_sold,
            tp2_sold: position.tp2_sold,
            days_to_earnings,
            health_score: position.health_score,
            canslim_grade: None,
            canslim_score: None,
            market_regime: regime_label.to_string(),
            spy_price,
            hard_stop: position.stop_price,
            trailing_stop: None,
            day_open: quote.open.unwrap_or(quote.last),
            day_high: quote.high.unwrap_or(quote.last),
            day_low: quote.low.unwrap_or(quote.last),
            prev_close: quote.close.unwrap_or(quote.last),
            prior_extended_marker: position.prior_extended_marker,
            alt_entry_test_count: position.alt_entry_test_count,
            recent_price_history: price_history,
        }
    }

    /// Test builder with sensible defaults, mirroring the teacher's
    /// `from_test_data()` convention in the original position context.
    #[cfg(test)]
    pub fn from_test_data(symbol: &str, current_price: Decimal, entry_price: Decimal) -> Self {
        PositionContext {
            symbol: symbol.to_string(),
            position_id: 1,
            current_price,
            entry_price,
            pivot_price: entry_price,
            shares: Decimal::from(100),
            state: StateCode::Entry2,
            pnl_pct: 0.0,
            pnl_dollars: Decimal::ZERO,
            max_price: current_price,
            max_gain_pct: 0.0,
            ema_21: None,
            sma_50: None,
            sma_200: None,
            sma_10_week: None,
            volume_ratio: 1.0,
            rs_rating: Some(90),
            ad_rating: Some('A'),
            base_stage: 1,
            days_in_position: 10,
            days_since_breakout: Some(10),
            eight_week_hold_active: false,
            eight_week_hold_end: None,
            py1_done: false,
            py2_done: false,
            tp1_sold: 0,
            tp2_sold: 0,
            days_to_earnings: None,
            health_score: 100,
            canslim_grade: None,
            canslim_score: None,
            market_regime: "bullish".to_string(),
            spy_price: Decimal::from(500),
            hard_stop: entry_price * Decimal::new(93, 2),
            trailing_stop: None,
            day_open: current_price,
            day_high: current_price,
            day_low: current_price,
            prev_close: current_price,
            prior_extended_marker: None,
            alt_entry_test_count: 0,
            recent_price_history: Vec::new(),
        }
    }
}

/// A checker is a pure function of `(position, context)`. The closed,
/// ordered set (spec §9 Design Note: "no runtime polymorphism ... required;
/// the set is closed and ordered") is expressed as trait objects anyway,
/// since each checker also carries its own cooldown/history state.
pub trait Checker: Send + Sync {
    fn name(&self) -> &str;
    fn check(&self, position: &Position, context: &PositionContext) -> Vec<CandidateAlert>;
}
