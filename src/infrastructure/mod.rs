//! Infrastructure layer: sqlite persistence, provider implementations,
//! the IPC transport, and chat-sink delivery. Implements the traits
//! `domain` declares; `application` depends on those traits, never on
//! this module's concrete types.

pub mod ipc;
pub mod persistence;
pub mod providers;
pub mod sinks;
