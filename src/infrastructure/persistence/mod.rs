//! SQLite persistence adapter: connection/schema bootstrap plus one
//! repository per `domain::repositories` trait (spec §5).

mod database;
mod repositories;

pub use database::Database;
pub use repositories::{
    SqliteAlertRepository, SqlitePositionRepository, SqliteProviderConfigRepository, SqliteRegimeAlertRepository,
};
