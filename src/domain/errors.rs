use thiserror::Error;

/// Errors surfaced by the provider abstraction (historical/realtime/futures).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider call timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("connection lost: {reason}")]
    ConnectionLost { reason: String },

    #[error("invalid market data for {symbol}: {reason}")]
    InvalidData { symbol: String, reason: String },

    #[error("no enabled provider configured for domain {domain}")]
    NotConfigured { domain: String },
}

/// Errors surfaced by the alert pipeline.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("delivery to {channel} failed: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("alert subtype {subtype} is suppressed by configuration")]
    SuppressedByConfig { subtype: String },

    #[error("failed to persist alert: {reason}")]
    PersistenceFailed { reason: String },
}

/// Errors surfaced by position lifecycle and invariant checks.
#[derive(Debug, Error)]
pub enum PositionError {
    #[error("invalid state transition for {symbol}: {from:?} -> {to:?}")]
    InvalidTransition {
        symbol: String,
        from: crate::domain::position::StateCode,
        to: crate::domain::position::StateCode,
    },

    #[error("invariant violated for {symbol}: {detail}")]
    InvariantViolated { symbol: String, detail: String },

    #[error("position not found: {symbol}/{portfolio}")]
    PositionNotFound { symbol: String, portfolio: String },
}

/// Errors surfaced by the regime calculator.
#[derive(Debug, Error)]
pub enum RegimeError {
    #[error("insufficient bars for {symbol}: need {need}, have {have}")]
    InsufficientBars {
        symbol: String,
        need: usize,
        have: usize,
    },

    #[error("regime snapshot for {date} already exists and overwrite was declined")]
    DuplicateSnapshot { date: chrono::NaiveDate },
}

/// Errors surfaced by the IPC transport.
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("malformed request frame: {reason}")]
    MalformedFrame { reason: String },

    #[error("unknown command: {command}")]
    UnknownCommand { command: String },

    #[error("command queue is full")]
    QueueFull,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_formats_with_context() {
        let err = ProviderError::RateLimitExceeded {
            retry_after_secs: 30,
        };
        assert!(err.to_string().contains("30"));
    }

    #[test]
    fn position_error_includes_symbol_and_states() {
        use crate::domain::position::StateCode;
        let err = PositionError::InvalidTransition {
            symbol: "NVDA".to_string(),
            from: StateCode::Stopped,
            to: StateCode::Watching,
        };
        let msg = err.to_string();
        assert!(msg.contains("NVDA"));
    }
}
