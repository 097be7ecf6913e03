//! Attention queue read model — items an operator needs to act on:
//! dropship orders awaiting manual confirmation, terminally failed items,
//! and owned-inventory items staged for manual shipping.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, ItemId, OrderNumber};
use domain::FulfillmentEvent;
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// Why an item appears on the attention queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttentionReason {
    /// API-less dropship source; an operator must confirm the order.
    ManualConfirmation,

    /// Supplier permanently rejected the submission.
    Rejected,

    /// Retry ceiling was reached.
    RetriesExhausted,

    /// Owned-inventory item staged for manual shipping.
    ReadyToShip,
}

impl AttentionReason {
    /// Returns the reason as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttentionReason::ManualConfirmation => "manual-confirmation",
            AttentionReason::Rejected => "rejected",
            AttentionReason::RetriesExhausted => "retries-exhausted",
            AttentionReason::ReadyToShip => "ready-to-ship",
        }
    }
}

/// One entry on the attention queue.
#[derive(Debug, Clone)]
pub struct AttentionEntry {
    pub order_number: OrderNumber,
    pub item_id: ItemId,
    pub product_name: String,
    pub reason: AttentionReason,
    pub detail: Option<String>,
    pub since: DateTime<Utc>,
}

#[derive(Default)]
struct AttentionState {
    entries: HashMap<(AggregateId, ItemId), AttentionEntry>,
    orders: HashMap<AggregateId, (OrderNumber, HashMap<ItemId, String>)>,
}

impl AttentionState {
    fn order_context(&self, order_id: &AggregateId, item_id: ItemId) -> Option<(OrderNumber, String)> {
        let (number, names) = self.orders.get(order_id)?;
        let name = names.get(&item_id).cloned().unwrap_or_default();
        Some((number.clone(), name))
    }
}

/// Read model view of items needing operator intervention.
#[derive(Clone, Default)]
pub struct AttentionQueueView {
    state: Arc<RwLock<AttentionState>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl AttentionQueueView {
    /// Creates a new empty attention queue view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the queue ordered by how long entries have been waiting.
    pub async fn entries(&self) -> Vec<AttentionEntry> {
        let mut entries: Vec<_> = self.state.read().await.entries.values().cloned().collect();
        entries.sort_by_key(|entry| entry.since);
        entries
    }

    /// Returns the queue entries with a specific reason.
    pub async fn entries_with_reason(&self, reason: AttentionReason) -> Vec<AttentionEntry> {
        let mut entries: Vec<_> = self
            .state
            .read()
            .await
            .entries
            .values()
            .filter(|entry| entry.reason == reason)
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.since);
        entries
    }
}

#[async_trait]
impl Projection for AttentionQueueView {
    fn name(&self) -> &'static str {
        "AttentionQueueView"
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
                let names = data
                    .items
                    .iter()
                    .map(|spec| (spec.item_id, spec.product_name.clone()))
                    .collect();
                state.orders.insert(order_id, (data.order_number, names));
            }
            FulfillmentEvent::SubmissionAccepted(data) => {
                if data.awaiting_manual_confirmation
                    && let Some((order_number, product_name)) =
                        state.order_context(&order_id, data.item_id)
                {
                    state.entries.insert(
                        (order_id, data.item_id),
                        AttentionEntry {
                            order_number,
                            item_id: data.item_id,
                            product_name,
                            reason: AttentionReason::ManualConfirmation,
                            detail: None,
                            since: data.accepted_at,
                        },
                    );
                }
            }
            FulfillmentEvent::SubmissionRejected(data) => {
                if let Some((order_number, product_name)) =
                    state.order_context(&order_id, data.item_id)
                {
                    state.entries.insert(
                        (order_id, data.item_id),
                        AttentionEntry {
                            order_number,
                            item_id: data.item_id,
                            product_name,
                            reason: AttentionReason::Rejected,
                            detail: Some(data.reason),
                            since: data.rejected_at,
                        },
                    );
                }
            }
            FulfillmentEvent::SubmissionExhausted(data) => {
                if let Some((order_number, product_name)) =
                    state.order_context(&order_id, data.item_id)
                {
                    state.entries.insert(
                        (order_id, data.item_id),
                        AttentionEntry {
                            order_number,
                            item_id: data.item_id,
                            product_name,
                            reason: AttentionReason::RetriesExhausted,
                            detail: Some(data.reason),
                            since: data.failed_at,
                        },
                    );
                }
            }
            FulfillmentEvent::MarkedReadyToShip(data) => {
                if let Some((order_number, product_name)) =
                    state.order_context(&order_id, data.item_id)
                {
                    state.entries.insert(
                        (order_id, data.item_id),
                        AttentionEntry {
                            order_number,
                            item_id: data.item_id,
                            product_name,
                            reason: AttentionReason::ReadyToShip,
                            detail: None,
                            since: data.marked_at,
                        },
                    );
                }
            }
            FulfillmentEvent::ManuallyConfirmed(data) => {
                state.entries.remove(&(order_id, data.item_id));
            }
            FulfillmentEvent::ItemCancelled(data) => {
                state.entries.remove(&(order_id, data.item_id));
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
        state.entries.clear();
        state.orders.clear();
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for AttentionQueueView {
    fn name(&self) -> &'static str {
        "AttentionQueueView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.entries.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{CustomerInfo, ItemKind, ItemSpec, ShippingPreference, SupplierName};
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

    async fn seed_order(view: &AttentionQueueView, number: &OrderNumber) -> AggregateId {
        let order_id = AggregateId::for_order(number);
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
                kind: ItemKind::Dropship,
                product_ref: "opal-lamp-01".to_string(),
                product_name: "Opal Lamp".to_string(),
                quantity: 1,
                shipping_address: None,
                shipping_preference: ShippingPreference::Standard,
            }],
        );
        view.handle(&envelope(order_id, 1, &received)).await.unwrap();
        order_id
    }

    #[tokio::test]
    async fn test_manual_confirmation_enters_and_leaves_queue() {
        let view = AttentionQueueView::new();
        let number = OrderNumber::new("SO-70");
        let order_id = seed_order(&view, &number).await;

        let accepted = FulfillmentEvent::submission_accepted(
            ItemId::new(0),
            SupplierName::Dropship,
            None,
            true,
            None,
        );
        view.handle(&envelope(order_id, 2, &accepted)).await.unwrap();

        let entries = view.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].reason, AttentionReason::ManualConfirmation);
        assert_eq!(entries[0].product_name, "Opal Lamp");

        let confirmed = FulfillmentEvent::manually_confirmed(ItemId::new(0), None, None);
        view.handle(&envelope(order_id, 3, &confirmed)).await.unwrap();

        assert!(view.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejection_and_exhaustion_surface_with_detail() {
        let view = AttentionQueueView::new();
        let number = OrderNumber::new("SO-71");
        let order_id = seed_order(&view, &number).await;

        let rejected =
            FulfillmentEvent::submission_rejected(ItemId::new(0), "unsupported destination");
        view.handle(&envelope(order_id, 2, &rejected)).await.unwrap();

        let entries = view.entries_with_reason(AttentionReason::Rejected).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].detail.as_deref(), Some("unsupported destination"));
    }

    #[tokio::test]
    async fn test_cancellation_clears_entry() {
        let view = AttentionQueueView::new();
        let number = OrderNumber::new("SO-72");
        let order_id = seed_order(&view, &number).await;

        let rejected = FulfillmentEvent::submission_rejected(ItemId::new(0), "bad SKU");
        view.handle(&envelope(order_id, 2, &rejected)).await.unwrap();
        assert_eq!(view.entries().await.len(), 1);

        let cancelled = FulfillmentEvent::item_cancelled(ItemId::new(0), "refunded", None);
        view.handle(&envelope(order_id, 3, &cancelled)).await.unwrap();
        assert!(view.entries().await.is_empty());
    }
}
