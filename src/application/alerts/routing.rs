//! Alert routing + severity mapping: `(alert_type, subtype) -> channel`.

use crate::domain::alert::AlertType;

/// Static severity-class table (spec §4.2 step 1). Currently maps 1:1 to
/// `Priority`, kept as its own seam so config-driven overrides (spec's
/// `RELOAD_CONFIG`) can later remap a subtype's class without touching the
/// checker that emits it.
pub struct RoutingTable {
    routes: std::collections::HashMap<String, String>,
}

impl RoutingTable {
    pub fn new(routes: std::collections::HashMap<String, String>) -> Self {
        RoutingTable { routes }
    }

    pub fn channel_for(&self, alert_type: AlertType) -> &str {
        self.routes
            .get(alert_type.as_str())
            .map(String::as_str)
            .unwrap_or_else(|| alert_type.default_channel())
    }

    pub fn reload(&mut self, routes: std::collections::HashMap<String, String>) {
        self.routes = routes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_default_channel_when_unmapped() {
        let table = RoutingTable::new(std::collections::HashMap::new());
        assert_eq!(table.channel_for(AlertType::Market), "market");
    }

    #[test]
    fn reload_replaces_routes() {
        let mut table = RoutingTable::new(std::collections::HashMap::new());
        let mut updated = std::collections::HashMap::new();
        updated.insert("stop".to_string(), "critical".to_string());
        table.reload(updated);
        assert_eq!(table.channel_for(AlertType::Stop), "critical");
    }
}
