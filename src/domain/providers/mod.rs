pub mod ports;

pub use ports::{
    Bar, FuturesProvider, FuturesSnapshot, HealthStatus, HistoricalProvider, ProviderHealth,
    Quote, RealtimeProvider, TechnicalSnapshot,
};
