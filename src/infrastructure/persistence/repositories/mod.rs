mod alert;
mod position;
mod provider_config;
mod regime;

pub use alert::SqliteAlertRepository;
pub use position::SqlitePositionRepository;
pub use provider_config::SqliteProviderConfigRepository;
pub use regime::SqliteRegimeAlertRepository;
