//! Per-worker command channel, fed by the service controller's
//! `FORCE_CHECK` IPC handler (spec §4.6). Mirrors the shape of the
//! teacher's `SentinelCommand` (`application::agents::sentinel`), pared
//! down to what a worker thread actually needs to accept out-of-band.

#[derive(Debug, Clone)]
pub enum WorkerCommand {
    /// Runs one extra cycle immediately, outside the regular tick
    /// interval. `symbol` narrows the cycle to one symbol when present.
    ForceCheck { symbol: Option<String> },
}
