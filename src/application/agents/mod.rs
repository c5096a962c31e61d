//! Worker threads (spec §4.5/§5): four periodic agents, each extending
//! the same tick/command/shutdown `select!` shape (grounded in the
//! teacher's `Sentinel::run`), plus the shared state they read or
//! report through (`regime_state`, `worker_stats`) and the command
//! channel the service controller's `FORCE_CHECK` handler feeds.

pub mod breakout_worker;
pub mod command;
pub mod maintenance_worker;
pub mod position_worker;
pub mod regime_state;
pub mod regime_worker;
pub mod worker_stats;

pub use breakout_worker::BreakoutWorker;
pub use command::WorkerCommand;
pub use maintenance_worker::MaintenanceWorker;
pub use position_worker::PositionWorker;
pub use regime_state::{new_shared_regime_state, RegimeSnapshot, SharedRegimeState};
pub use regime_worker::RegimeWorker;
pub use worker_stats::{new_shared_stats, SharedWorkerStats, WorkerState, WorkerStats};
