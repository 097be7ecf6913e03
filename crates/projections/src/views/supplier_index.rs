//! Supplier order index — maps external order IDs back to the owning
//! order and item, used by the webhook reconciler.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateId, ItemId, OrderNumber};
use domain::{FulfillmentEvent, SupplierName};
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// Where an external order ID points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplierRef {
    pub order_id: AggregateId,
    pub order_number: OrderNumber,
    pub item_id: ItemId,
    pub supplier: SupplierName,
}

#[derive(Default)]
struct IndexState {
    by_external_id: HashMap<String, SupplierRef>,
    order_numbers: HashMap<AggregateId, OrderNumber>,
}

/// Read model mapping `external_order_id` to the owning (order, item).
#[derive(Clone, Default)]
pub struct SupplierOrderIndex {
    state: Arc<RwLock<IndexState>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl SupplierOrderIndex {
    /// Creates a new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the owner of an external order ID.
    pub async fn lookup(&self, external_order_id: &str) -> Option<SupplierRef> {
        self.state
            .read()
            .await
            .by_external_id
            .get(external_order_id)
            .cloned()
    }

    /// Returns the number of indexed supplier orders.
    pub async fn len(&self) -> usize {
        self.state.read().await.by_external_id.len()
    }

    /// Returns true if the index is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Projection for SupplierOrderIndex {
    fn name(&self) -> &'static str {
        "SupplierOrderIndex"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        {
            let mut pos = self.position.write().await;
            *pos = pos.advance();
        }

        if event.aggregate_type != "FulfillmentOrder" {
            return Ok(());
        }

        let fulfillment_event: FulfillmentEvent = serde_json::from_value(event.payload.clone())?;
        let order_id = event.aggregate_id;
        let mut state = self.state.write().await;

        match fulfillment_event {
            FulfillmentEvent::OrderReceived(data) => {
                state.order_numbers.insert(order_id, data.order_number);
            }
            FulfillmentEvent::SubmissionAccepted(data) => {
                if let Some(external_order_id) = data.external_order_id {
                    let Some(order_number) = state.order_numbers.get(&order_id).cloned() else {
                        return Ok(());
                    };
                    state.by_external_id.insert(
                        external_order_id,
                        SupplierRef {
                            order_id,
                            order_number,
                            item_id: data.item_id,
                            supplier: data.supplier,
                        },
                    );
                }
            }
            _ => {}
        }

        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.by_external_id.clear();
        state.order_numbers.clear();
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for SupplierOrderIndex {
    fn name(&self) -> &'static str {
        "SupplierOrderIndex"
    }

    fn count(&self) -> usize {
        self.state
            .try_read()
            .map(|s| s.by_external_id.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{CustomerInfo, ItemKind, ItemSpec, ShippingPreference};
    use event_store::Version;

    fn envelope(order_id: AggregateId, version: i64, event: &FulfillmentEvent) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(order_id)
            .aggregate_type("FulfillmentOrder")
            .event_type("FulfillmentEvent")
            .version(Version::new(version))
            .payload(event)
            .unwrap()
            .build()
    }

    #[tokio::test]
    async fn test_accepted_submission_is_indexed() {
        let index = SupplierOrderIndex::new();
        let number = OrderNumber::new("SO-60");
        let order_id = AggregateId::for_order(&number);

        let received = FulfillmentEvent::order_received(
            number.clone(),
            "pay-1",
            CustomerInfo {
                customer_id: "cust-1".to_string(),
                email: "ada@example.com".to_string(),
                name: "Ada".to_string(),
            },
            vec![ItemSpec {
                item_id: ItemId::new(0),
                kind: ItemKind::PodPrintling,
                product_ref: "poster-a2".to_string(),
                product_name: "A2 Poster".to_string(),
                quantity: 1,
                shipping_address: None,
                shipping_preference: ShippingPreference::Standard,
            }],
        );
        index.handle(&envelope(order_id, 1, &received)).await.unwrap();

        let accepted = FulfillmentEvent::submission_accepted(
            ItemId::new(0),
            SupplierName::Printling,
            Some("P-1001".to_string()),
            false,
            None,
        );
        index.handle(&envelope(order_id, 2, &accepted)).await.unwrap();

        let supplier_ref = index.lookup("P-1001").await.unwrap();
        assert_eq!(supplier_ref.order_id, order_id);
        assert_eq!(supplier_ref.order_number, number);
        assert_eq!(supplier_ref.item_id, ItemId::new(0));
        assert_eq!(supplier_ref.supplier, SupplierName::Printling);

        assert!(index.lookup("P-9999").await.is_none());
    }

    #[tokio::test]
    async fn test_acceptance_without_external_id_is_not_indexed() {
        let index = SupplierOrderIndex::new();
        let number = OrderNumber::new("SO-61");
        let order_id = AggregateId::for_order(&number);

        let accepted = FulfillmentEvent::submission_accepted(
            ItemId::new(0),
            SupplierName::Dropship,
            None,
            true,
            None,
        );
        index.handle(&envelope(order_id, 1, &accepted)).await.unwrap();

        assert!(index.is_empty().await);
    }
}
