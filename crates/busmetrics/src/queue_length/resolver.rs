//! Destination resolution for outbound operations

use std::collections::BTreeMap;

use busmetrics_config::QueueLengthConfig;
use busmetrics_pipeline::{AddressTag, DispatchOperation};

/// Resolves the physical destinations of an operation
///
/// Duplication produces exactly one stamped send per returned address.
pub trait DestinationResolver: Send + Sync {
    fn destinations(&self, operation: &DispatchOperation) -> Vec<String>;
}

/// Routes published message types through a fixed table
///
/// Unicast operations resolve to their own address. A multicast operation
/// resolves to every address routed for its message type, without
/// duplicates; an unrouted type has no destinations.
#[derive(Debug, Clone, Default)]
pub struct StaticRoutes {
    routes: BTreeMap<String, Vec<String>>,
}

impl StaticRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &QueueLengthConfig) -> Self {
        let mut routes = Self::new();
        for (message_type, destinations) in &config.routes {
            routes.add_route(message_type, destinations.iter().cloned());
        }
        routes
    }

    #[must_use]
    pub fn with_route<I, S>(mut self, message_type: impl Into<String>, destinations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_route(message_type, destinations);
        self
    }

    pub fn add_route<I, S>(&mut self, message_type: impl Into<String>, destinations: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.routes.entry(message_type.into()).or_default();
        for destination in destinations {
            let destination = destination.into();
            if !entry.contains(&destination) {
                entry.push(destination);
            }
        }
    }
}

impl DestinationResolver for StaticRoutes {
    fn destinations(&self, operation: &DispatchOperation) -> Vec<String> {
        match &operation.address {
            AddressTag::Unicast(destination) => vec![destination.clone()],
            AddressTag::Multicast { message_type } => {
                self.routes.get(message_type).cloned().unwrap_or_default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unicast_resolves_to_itself() {
        let routes = StaticRoutes::new();
        let op = DispatchOperation::unicast("Billing", Vec::new());
        assert_eq!(routes.destinations(&op), vec!["Billing"]);
    }

    #[test]
    fn test_multicast_uses_routes() {
        let routes = StaticRoutes::new()
            .with_route("Sales.OrderPlaced", ["Billing", "Shipping"])
            .with_route("Sales.OrderPlaced", ["Billing"]);

        let op = DispatchOperation::multicast("Sales.OrderPlaced", Vec::new());
        assert_eq!(routes.destinations(&op), vec!["Billing", "Shipping"]);

        let unrouted = DispatchOperation::multicast("Sales.OrderCancelled", Vec::new());
        assert!(routes.destinations(&unrouted).is_empty());
    }

    #[test]
    fn test_from_config() {
        let mut config = QueueLengthConfig::default();
        config
            .routes
            .insert("Sales.OrderPlaced".into(), vec!["Billing".into()]);

        let routes = StaticRoutes::from_config(&config);
        let op = DispatchOperation::multicast("Sales.OrderPlaced", Vec::new());
        assert_eq!(routes.destinations(&op), vec!["Billing"]);
    }
}
