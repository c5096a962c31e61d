//! Provider implementations: the concrete historical/realtime/futures
//! adapters behind `domain::providers::ports`, plus the rate limiter and
//! factory that wire a `ProviderConfig` row to a running instance (spec
//! §4.1).

pub mod factory;
pub mod futures_provider;
pub mod historical_http;
pub mod rate_limiter;
pub mod realtime_ibkr;

pub use factory::ProviderFactory;
