//! Alert data model: the immutable record produced by a checker and, after
//! passing through the alert pipeline, persisted and routed to a chat sink.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::position::StateCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Stop,
    Profit,
    Pyramid,
    Technical,
    Health,
    Add,
    AltEntry,
    Market,
    System,
}

impl AlertType {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertType::Stop => "stop",
            AlertType::Profit => "profit",
            AlertType::Pyramid => "pyramid",
            AlertType::Technical => "technical",
            AlertType::Health => "health",
            AlertType::Add => "add",
            AlertType::AltEntry => "alt_entry",
            AlertType::Market => "market",
            AlertType::System => "system",
        }
    }

    /// Routing channel per spec §4.2's alert_routing table default.
    pub fn default_channel(self) -> &'static str {
        match self {
            AlertType::Stop | AlertType::Profit | AlertType::Pyramid | AlertType::Add => "position",
            AlertType::Technical | AlertType::Health | AlertType::AltEntry => "position",
            AlertType::Market => "market",
            AlertType::System => "system",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSubtype {
    // stop
    HardStop,
    TrailingStop,
    Warning,
    // profit
    Tp1,
    Tp2,
    EightWeekHold,
    // pyramid
    P1Ready,
    P1Extended,
    P2Ready,
    P2Extended,
    // add (pyramid pullback + reentry)
    Pullback,
    Ema21,
    InBuyZone,
    // alt_entry
    MaBounce,
    PivotRetest,
    // technical
    Ma50Warning,
    Ma50Sell,
    Ema21Sell,
    TenWeekSell,
    ClimaxTop,
    // health
    Critical,
    Earnings,
    LateStage,
    Extended,
    // market
    RegimeChange,
    DistributionDay,
    FollowThroughDay,
    // system
    Info,
    SystemWarning,
    SystemError,
    Success,
}

impl AlertSubtype {
    pub fn as_str(self) -> &'static str {
        use AlertSubtype::*;
        match self {
            HardStop => "hard_stop",
            TrailingStop => "trailing_stop",
            Warning => "warning",
            Tp1 => "tp1",
            Tp2 => "tp2",
            EightWeekHold => "eight_week_hold",
            P1Ready => "p1_ready",
            P1Extended => "p1_extended",
            P2Ready => "p2_ready",
            P2Extended => "p2_extended",
            Pullback => "pullback",
            Ema21 => "ema_21",
            InBuyZone => "in_buy_zone",
            MaBounce => "ma_bounce",
            PivotRetest => "pivot_retest",
            Ma50Warning => "ma_50_warning",
            Ma50Sell => "ma_50_sell",
            Ema21Sell => "ema_21_sell",
            TenWeekSell => "ten_week_sell",
            ClimaxTop => "climax_top",
            Critical => "critical",
            Earnings => "earnings",
            LateStage => "late_stage",
            Extended => "extended",
            RegimeChange => "regime_change",
            DistributionDay => "distribution_day",
            FollowThroughDay => "follow_through_day",
            Info => "info",
            SystemWarning => "warning",
            SystemError => "error",
            Success => "success",
        }
    }

    /// Subtypes that bypass cooldown gating entirely (spec §4.2 step 3).
    pub fn bypasses_cooldown(self) -> bool {
        matches!(
            self,
            AlertSubtype::HardStop
                | AlertSubtype::TrailingStop
                | AlertSubtype::Ma50Sell
                | AlertSubtype::TenWeekSell
                | AlertSubtype::Critical
        ) || self == AlertSubtype::ClimaxTop
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Informational; lowest urgency despite the numeric ordering below
    /// (P2 < P1 < P0 makes `max()` pick the most urgent, per spec §9 Open
    /// Question 1).
    P2 = 0,
    P1 = 1,
    P0 = 2,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::P0 => "P0",
            Priority::P1 => "P1",
            Priority::P2 => "P2",
        }
    }
}

/// Snapshot of the fields that accompany an alert at creation time, drawn
/// from the position/context that produced it. All fields are optional
/// since market/system alerts carry none of them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertPayload {
    pub price: Option<Decimal>,
    pub pivot: Option<Decimal>,
    pub avg_cost: Option<Decimal>,
    pub pnl_pct: Option<f64>,
    pub ma_21: Option<Decimal>,
    pub ma_50: Option<Decimal>,
    pub ma_200: Option<Decimal>,
    pub ma_10_week: Option<Decimal>,
    pub volume_ratio: Option<f64>,
    pub health_score: Option<i32>,
    pub market_regime: Option<String>,
    pub state_at_alert: Option<StateCode>,
    pub days_in_position: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub symbol: String,
    pub alert_type: AlertType,
    pub subtype: AlertSubtype,
    pub position_id: Option<i64>,
    pub payload: AlertPayload,
    pub message: String,
    pub action: Option<String>,
    pub thread_source: String,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn dedup_key(&self) -> (String, AlertType, AlertSubtype) {
        (self.symbol.clone(), self.alert_type, self.subtype)
    }

    /// Acknowledging an already-acknowledged alert is a no-op, per spec §8's
    /// idempotence property.
    pub fn acknowledge(&mut self, at: DateTime<Utc>) {
        if self.acknowledged {
            return;
        }
        self.acknowledged = true;
        self.acknowledged_at = Some(at);
    }
}

/// A not-yet-persisted alert emitted by a checker; the Alert Service turns
/// this into a full `Alert` (or drops/merges it).
#[derive(Debug, Clone)]
pub struct CandidateAlert {
    pub symbol: String,
    pub alert_type: AlertType,
    pub subtype: AlertSubtype,
    pub position_id: Option<i64>,
    pub payload: AlertPayload,
    pub message: String,
    pub action: Option<String>,
    pub thread_source: String,
    pub priority: Priority,
    /// Set by the profit checker when it activates an 8-week hold; the
    /// cycle writer persists this to the position row in a separate
    /// short-lived transaction (spec §4.3's detached-position note).
    pub eight_week_hold: Option<EightWeekHoldUpdate>,
}

#[derive(Debug, Clone, Copy)]
pub struct EightWeekHoldUpdate {
    pub hold_active: bool,
    pub hold_start: chrono::NaiveDate,
    pub hold_end: chrono::NaiveDate,
    pub power_move_pct: f64,
    pub power_move_weeks: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_max_picks_most_urgent() {
        assert_eq!(Priority::P0.max(Priority::P2), Priority::P0);
        assert_eq!(Priority::P1.max(Priority::P2), Priority::P1);
    }

    #[test]
    fn hard_stop_bypasses_cooldown() {
        assert!(AlertSubtype::HardStop.bypasses_cooldown());
        assert!(!AlertSubtype::Tp1.bypasses_cooldown());
    }

    #[test]
    fn acknowledge_is_idempotent() {
        let mut alert = Alert {
            id: 1,
            symbol: "NVDA".to_string(),
            alert_type: AlertType::Stop,
            subtype: AlertSubtype::HardStop,
            position_id: Some(1),
            payload: AlertPayload::default(),
            message: "hard stop".to_string(),
            action: None,
            thread_source: "position".to_string(),
            priority: Priority::P0,
            created_at: Utc::now(),
            acknowledged: false,
            acknowledged_at: None,
        };
        let first_ack_time = Utc::now();
        alert.acknowledge(first_ack_time);
        let stamp = alert.acknowledged_at;
        alert.acknowledge(Utc::now());
        assert_eq!(alert.acknowledged_at, stamp);
    }

    #[test]
    fn dedup_key_is_symbol_type_subtype() {
        let alert = Alert {
            id: 1,
            symbol: "NVDA".to_string(),
            alert_type: AlertType::Stop,
            subtype: AlertSubtype::HardStop,
            position_id: Some(1),
            payload: AlertPayload::default(),
            message: String::new(),
            action: None,
            thread_source: "position".to_string(),
            priority: Priority::P0,
            created_at: Utc::now(),
            acknowledged: false,
            acknowledged_at: None,
        };
        assert_eq!(
            alert.dedup_key(),
            ("NVDA".to_string(), AlertType::Stop, AlertSubtype::HardStop)
        );
    }
}
