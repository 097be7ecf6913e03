//! Connector registry keyed by supplier.

use std::collections::HashMap;
use std::sync::Arc;

use connectors::SupplierConnector;
use domain::SupplierName;

/// Registry of supplier connectors.
///
/// The dispatcher routes each item to its kind's supplier; the reconciler
/// probes every registered connector when claiming a webhook.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<SupplierName, Arc<dyn SupplierConnector>>,
}

impl ConnectorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connector under its supplier name.
    pub fn register(&mut self, connector: Arc<dyn SupplierConnector>) {
        self.connectors.insert(connector.supplier(), connector);
    }

    /// Returns the connector for a supplier, if registered.
    pub fn for_supplier(&self, supplier: SupplierName) -> Option<Arc<dyn SupplierConnector>> {
        self.connectors.get(&supplier).cloned()
    }

    /// Iterates over all registered connectors.
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn SupplierConnector>> {
        self.connectors.values()
    }

    /// Returns the number of registered connectors.
    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    /// Returns true if no connectors are registered.
    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::{DigitalProvisioner, InMemoryCourseAccessClient};

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ConnectorRegistry::new();
        assert!(registry.is_empty());

        registry.register(Arc::new(DigitalProvisioner::new(
            InMemoryCourseAccessClient::new(),
        )));

        assert_eq!(registry.len(), 1);
        assert!(registry.for_supplier(SupplierName::DigitalDelivery).is_some());
        assert!(registry.for_supplier(SupplierName::Printling).is_none());
    }
}
