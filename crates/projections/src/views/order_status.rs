//! Order status read model — the projection consumed by the storefront
//! "order status" view and the admin dashboards.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, ItemId, OrderNumber};
use domain::{
    FulfillmentEvent, ItemKind, ItemStatus, NormalizedSupplierStatus, OrderStatus, TrackingInfo,
};
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// Per-item slice of the order status view.
#[derive(Debug, Clone)]
pub struct ItemStatusSummary {
    pub item_id: ItemId,
    pub kind: ItemKind,
    pub product_ref: String,
    pub product_name: String,
    pub quantity: u32,
    pub status: ItemStatus,
    pub tracking: Option<TrackingInfo>,
    pub external_order_id: Option<String>,
    pub access_url: Option<String>,
    pub shared_folder_url: Option<String>,
    pub revoked: bool,
    pub awaiting_manual_confirmation: bool,
    pub last_error: Option<String>,
}

/// One order in the status view.
#[derive(Debug, Clone)]
pub struct OrderStatusSummary {
    pub order_number: OrderNumber,
    pub customer_email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: BTreeMap<ItemId, ItemStatusSummary>,
}

impl OrderStatusSummary {
    /// The derived order-level status.
    pub fn status(&self) -> OrderStatus {
        OrderStatus::derive(self.items.values().map(|item| item.status))
    }

    /// Returns true once every item is terminal.
    pub fn is_settled(&self) -> bool {
        !self.items.is_empty() && self.items.values().all(|item| item.status.is_terminal())
    }
}

/// Read model view of order and per-item fulfillment status.
#[derive(Clone, Default)]
pub struct OrderStatusView {
    orders: Arc<RwLock<HashMap<AggregateId, OrderStatusSummary>>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl OrderStatusView {
    /// Creates a new empty order status view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the status summary for an order by its order number.
    pub async fn get(&self, order_number: &OrderNumber) -> Option<OrderStatusSummary> {
        let id = AggregateId::for_order(order_number);
        self.orders.read().await.get(&id).cloned()
    }

    /// Gets all orders that have not settled yet.
    pub async fn active_orders(&self) -> Vec<OrderStatusSummary> {
        let mut orders: Vec<_> = self
            .orders
            .read()
            .await
            .values()
            .filter(|o| !o.is_settled())
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.order_number.cmp(&b.order_number));
        orders
    }

    /// Gets every order in the view.
    pub async fn all_orders(&self) -> Vec<OrderStatusSummary> {
        let mut orders: Vec<_> = self.orders.read().await.values().cloned().collect();
        orders.sort_by(|a, b| a.order_number.cmp(&b.order_number));
        orders
    }

}

#[async_trait]
impl Projection for OrderStatusView {
    fn name(&self) -> &'static str {
        "OrderStatusView"
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
        let mut orders = self.orders.write().await;

        match fulfillment_event {
            FulfillmentEvent::OrderReceived(data) => {
                let items = data
                    .items
                    .into_iter()
                    .map(|spec| {
                        (
                            spec.item_id,
                            ItemStatusSummary {
                                item_id: spec.item_id,
                                kind: spec.kind,
                                product_ref: spec.product_ref,
                                product_name: spec.product_name,
                                quantity: spec.quantity,
                                status: ItemStatus::Queued,
                                tracking: None,
                                external_order_id: None,
                                access_url: None,
                                shared_folder_url: None,
                                revoked: false,
                                awaiting_manual_confirmation: false,
                                last_error: None,
                            },
                        )
                    })
                    .collect();

                orders.insert(
                    order_id,
                    OrderStatusSummary {
                        order_number: data.order_number,
                        customer_email: data.customer.email,
                        created_at: data.received_at,
                        updated_at: data.received_at,
                        items,
                    },
                );
            }
            FulfillmentEvent::SubmissionStarted(data) => {
                if let Some(order) = orders.get_mut(&order_id) {
                    order.updated_at = data.started_at;
                    if let Some(item) = order.items.get_mut(&data.item_id) {
                        item.status = ItemStatus::Submitting;
                    }
                }
            }
            FulfillmentEvent::SubmissionAccepted(data) => {
                if let Some(order) = orders.get_mut(&order_id) {
                    order.updated_at = data.accepted_at;
                    if let Some(item) = order.items.get_mut(&data.item_id) {
                        item.status = ItemStatus::PendingSupplier;
                        item.external_order_id = data.external_order_id;
                        item.awaiting_manual_confirmation = data.awaiting_manual_confirmation;
                        item.last_error = None;
                    }
                }
            }
            FulfillmentEvent::SubmissionRejected(data) => {
                if let Some(order) = orders.get_mut(&order_id) {
                    order.updated_at = data.rejected_at;
                    if let Some(item) = order.items.get_mut(&data.item_id) {
                        item.status = ItemStatus::Failed;
                        item.last_error = Some(data.reason);
                    }
                }
            }
            FulfillmentEvent::SubmissionDeferred(data) => {
                if let Some(order) = orders.get_mut(&order_id) {
                    order.updated_at = data.deferred_at;
                    if let Some(item) = order.items.get_mut(&data.item_id) {
                        item.status = ItemStatus::Queued;
                        item.last_error = Some(data.reason);
                    }
                }
            }
            FulfillmentEvent::SubmissionExhausted(data) => {
                if let Some(order) = orders.get_mut(&order_id) {
                    order.updated_at = data.failed_at;
                    if let Some(item) = order.items.get_mut(&data.item_id) {
                        item.status = ItemStatus::Failed;
                        item.last_error = Some(data.reason);
                    }
                }
            }
            FulfillmentEvent::DigitalAccessGranted(data) => {
                if let Some(order) = orders.get_mut(&order_id) {
                    order.updated_at = data.granted_at;
                    if let Some(item) = order.items.get_mut(&data.item_id) {
                        item.status = ItemStatus::Fulfilled;
                        item.access_url = Some(data.access_url);
                        item.shared_folder_url = data.shared_folder_url;
                        item.revoked = false;
                        item.last_error = None;
                    }
                }
            }
            FulfillmentEvent::DigitalAccessRevoked(data) => {
                if let Some(order) = orders.get_mut(&order_id) {
                    order.updated_at = data.revoked_at;
                    if let Some(item) = order.items.get_mut(&data.item_id) {
                        item.revoked = true;
                    }
                }
            }
            FulfillmentEvent::MarkedReadyToShip(data) => {
                if let Some(order) = orders.get_mut(&order_id) {
                    order.updated_at = data.marked_at;
                    if let Some(item) = order.items.get_mut(&data.item_id) {
                        item.status = ItemStatus::Fulfilled;
                        item.last_error = None;
                    }
                }
            }
            FulfillmentEvent::SupplierStatusObserved(data) => {
                if let Some(order) = orders.get_mut(&order_id) {
                    order.updated_at = data.observed_at;
                    if data.advanced
                        && let Some(item) = order.items.get_mut(&data.item_id)
                    {
                        if let Some(tracking) = &data.tracking {
                            item.tracking
                                .get_or_insert_with(TrackingInfo::default)
                                .merge(tracking);
                        }
                        match data.normalized {
                            NormalizedSupplierStatus::Shipped => {
                                item.status = ItemStatus::Shipped;
                            }
                            NormalizedSupplierStatus::Delivered => {
                                item.status = ItemStatus::Delivered;
                            }
                            NormalizedSupplierStatus::Cancelled => {
                                item.status = ItemStatus::Cancelled;
                            }
                            NormalizedSupplierStatus::Accepted
                            | NormalizedSupplierStatus::InProduction => {}
                        }
                    }
                }
            }
            FulfillmentEvent::ManuallyConfirmed(data) => {
                if let Some(order) = orders.get_mut(&order_id) {
                    order.updated_at = data.confirmed_at;
                    if let Some(item) = order.items.get_mut(&data.item_id) {
                        item.awaiting_manual_confirmation = false;
                        if let Some(tracking) = &data.tracking {
                            item.tracking
                                .get_or_insert_with(TrackingInfo::default)
                                .merge(tracking);
                            item.status = ItemStatus::Shipped;
                        }
                    }
                }
            }
            FulfillmentEvent::ItemCancelled(data) => {
                if let Some(order) = orders.get_mut(&order_id) {
                    order.updated_at = data.cancelled_at;
                    if let Some(item) = order.items.get_mut(&data.item_id) {
                        item.status = ItemStatus::Cancelled;
                        item.last_error = Some(data.reason);
                    }
                }
            }
            FulfillmentEvent::NotificationRecorded(_) => {
                // Notification bookkeeping does not surface in the status view.
            }
        }

        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        self.orders.write().await.clear();
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for OrderStatusView {
    fn name(&self) -> &'static str {
        "OrderStatusView"
    }

    fn count(&self) -> usize {
        self.orders.try_read().map(|o| o.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{CustomerInfo, ItemSpec, ShippingPreference};
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

    fn received(order_number: &OrderNumber) -> FulfillmentEvent {
        FulfillmentEvent::order_received(
            order_number.clone(),
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
        )
    }

    #[tokio::test]
    async fn test_order_lifecycle_flows_into_view() {
        let view = OrderStatusView::new();
        let number = OrderNumber::new("SO-50");
        let order_id = AggregateId::for_order(&number);

        view.handle(&envelope(order_id, 1, &received(&number)))
            .await
            .unwrap();
        view.handle(&envelope(
            order_id,
            2,
            &FulfillmentEvent::submission_started(ItemId::new(0), None, 1),
        ))
        .await
        .unwrap();
        view.handle(&envelope(
            order_id,
            3,
            &FulfillmentEvent::submission_accepted(
                ItemId::new(0),
                domain::SupplierName::Printling,
                Some("P-1".to_string()),
                false,
                None,
            ),
        ))
        .await
        .unwrap();

        let summary = view.get(&number).await.unwrap();
        assert_eq!(summary.status(), OrderStatus::Processing);
        let item = summary.items.get(&ItemId::new(0)).unwrap();
        assert_eq!(item.status, ItemStatus::PendingSupplier);
        assert_eq!(item.external_order_id.as_deref(), Some("P-1"));
        assert!(!summary.is_settled());
    }

    #[tokio::test]
    async fn test_shipped_observation_carries_tracking() {
        let view = OrderStatusView::new();
        let number = OrderNumber::new("SO-51");
        let order_id = AggregateId::for_order(&number);

        view.handle(&envelope(order_id, 1, &received(&number)))
            .await
            .unwrap();
        view.handle(&envelope(
            order_id,
            2,
            &FulfillmentEvent::supplier_status_observed(
                ItemId::new(0),
                "shipped",
                NormalizedSupplierStatus::Shipped,
                Some(TrackingInfo {
                    carrier: Some("UPS".to_string()),
                    tracking_number: Some("TRK123".to_string()),
                    tracking_url: None,
                }),
                true,
            ),
        ))
        .await
        .unwrap();

        let summary = view.get(&number).await.unwrap();
        let item = summary.items.get(&ItemId::new(0)).unwrap();
        assert_eq!(item.status, ItemStatus::Shipped);
        assert_eq!(
            item.tracking.as_ref().unwrap().tracking_number.as_deref(),
            Some("TRK123")
        );
    }

    #[tokio::test]
    async fn test_non_advancing_observation_is_ignored() {
        let view = OrderStatusView::new();
        let number = OrderNumber::new("SO-52");
        let order_id = AggregateId::for_order(&number);

        view.handle(&envelope(order_id, 1, &received(&number)))
            .await
            .unwrap();
        view.handle(&envelope(
            order_id,
            2,
            &FulfillmentEvent::supplier_status_observed(
                ItemId::new(0),
                "delivered",
                NormalizedSupplierStatus::Delivered,
                None,
                true,
            ),
        ))
        .await
        .unwrap();
        view.handle(&envelope(
            order_id,
            3,
            &FulfillmentEvent::supplier_status_observed(
                ItemId::new(0),
                "shipped",
                NormalizedSupplierStatus::Shipped,
                None,
                false,
            ),
        ))
        .await
        .unwrap();

        let summary = view.get(&number).await.unwrap();
        assert_eq!(
            summary.items.get(&ItemId::new(0)).unwrap().status,
            ItemStatus::Delivered
        );
        assert_eq!(summary.status(), OrderStatus::Fulfilled);
        assert!(summary.is_settled());
    }

    #[tokio::test]
    async fn test_active_orders_excludes_settled() {
        let view = OrderStatusView::new();
        let number = OrderNumber::new("SO-53");
        let order_id = AggregateId::for_order(&number);

        view.handle(&envelope(order_id, 1, &received(&number)))
            .await
            .unwrap();
        assert_eq!(view.active_orders().await.len(), 1);

        view.handle(&envelope(
            order_id,
            2,
            &FulfillmentEvent::supplier_status_observed(
                ItemId::new(0),
                "delivered",
                NormalizedSupplierStatus::Delivered,
                None,
                true,
            ),
        ))
        .await
        .unwrap();

        assert!(view.active_orders().await.is_empty());
        assert_eq!(view.all_orders().await.len(), 1);
    }
}
