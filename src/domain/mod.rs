pub mod alert;
pub mod checkers;
pub mod errors;
pub mod market_calendar;
pub mod position;
pub mod provider_config;
pub mod providers;
pub mod regime;
pub mod repositories;
