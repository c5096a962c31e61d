mod cooldown;
mod routing;
mod service;

pub use routing::RoutingTable;
pub use service::AlertService;
