//! Shared worker status, the rolling stats every worker thread reports
//! through `GET_STATUS`/`GET_STATS` (spec §4.5's BaseThread contract:
//! "rolling stats `{state, cycle_count, message_count, error_count,
//! last_check, last_error, avg_cycle_ms, is_market_hours}`"). Grounded
//! in the teacher's `AgentStatusRegistry`
//! (`application::monitoring::agent_status`), flattened to one struct
//! per worker instead of a registry keyed by agent name, since this
//! system has a fixed set of four named workers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Starting,
    Idle,
    Running,
    Gated,
    Error,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStats {
    pub state: WorkerState,
    pub cycle_count: u64,
    pub message_count: u64,
    pub error_count: u64,
    pub last_check: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub avg_cycle_ms: f64,
    pub is_market_hours: bool,
}

impl Default for WorkerStats {
    fn default() -> Self {
        WorkerStats {
            state: WorkerState::Starting,
            cycle_count: 0,
            message_count: 0,
            error_count: 0,
            last_check: None,
            last_error: None,
            avg_cycle_ms: 0.0,
            is_market_hours: false,
        }
    }
}

pub type SharedWorkerStats = Arc<RwLock<WorkerStats>>;

pub fn new_shared_stats() -> SharedWorkerStats {
    Arc::new(RwLock::new(WorkerStats::default()))
}

impl WorkerStats {
    /// Rolls a completed cycle into the running average, matching the
    /// teacher's cumulative-average update in `AgentStatusRegistry::
    /// record_cycle` rather than a fixed-size moving window.
    pub fn record_cycle(&mut self, cycle_ms: u64, messages: u64, is_market_hours: bool, error: Option<String>) {
        self.cycle_count += 1;
        self.message_count += messages;
        self.last_check = Some(Utc::now());
        self.is_market_hours = is_market_hours;
        self.avg_cycle_ms = if self.cycle_count == 1 {
            cycle_ms as f64
        } else {
            self.avg_cycle_ms + (cycle_ms as f64 - self.avg_cycle_ms) / self.cycle_count as f64
        };
        match error {
            Some(e) => {
                self.error_count += 1;
                self.last_error = Some(e);
                self.state = WorkerState::Error;
            }
            None => {
                self.state = WorkerState::Idle;
            }
        }
    }

    pub fn record_gated(&mut self, is_market_hours: bool) {
        self.state = WorkerState::Gated;
        self.is_market_hours = is_market_hours;
        self.last_check = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_average_tracks_multiple_cycles() {
        let mut stats = WorkerStats::default();
        stats.record_cycle(100, 1, true, None);
        stats.record_cycle(300, 1, true, None);
        assert_eq!(stats.cycle_count, 2);
        assert!((stats.avg_cycle_ms - 200.0).abs() < f64::EPSILON);
        assert_eq!(stats.state, WorkerState::Idle);
    }

    #[test]
    fn error_cycle_sets_error_state_and_message() {
        let mut stats = WorkerStats::default();
        stats.record_cycle(50, 0, true, Some("boom".to_string()));
        assert_eq!(stats.state, WorkerState::Error);
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.last_error.as_deref(), Some("boom"));
    }
}
