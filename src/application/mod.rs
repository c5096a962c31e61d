//! Application layer: worker threads (agents), the position-monitor
//! orchestrator, the alert-service pipeline, the regime calculator, and
//! the service controller. Depends on `domain` traits only, never on
//! concrete `infrastructure` types directly (those are injected as
//! `Arc<dyn _>` at construction, mirroring the teacher's
//! `bootstrap::{agents,persistence,services}` split).

pub mod agents;
pub mod alerts;
pub mod breakout;
pub mod position_monitor;
pub mod regime;
pub mod system;
