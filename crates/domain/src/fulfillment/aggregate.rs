//! Fulfillment order aggregate implementation.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use common::{AggregateId, ItemId, OrderNumber};
use event_store::Version;

use crate::aggregate::Aggregate;

use super::FulfillmentError;
use super::entities::{DigitalDelivery, FulfillmentItem, RawStatusEntry, SupplierOrder};
use super::events::{FulfillmentEvent, ItemSpec};
use super::state::{ItemStatus, NormalizedSupplierStatus, OrderStatus, SupplierOrderStatus};
use super::value_objects::{
    CustomerInfo, DeliveryType, NotificationKey, SupplierCharge, SupplierName, TrackingInfo,
};

/// Fulfillment order aggregate root, one per paid order.
///
/// The item set is fixed at receipt; only item-level status and the
/// supplier-order / digital-delivery sub-entities mutate afterwards, and
/// every mutation flows through a command method so the state-machine
/// invariants hold.
#[derive(Debug, Default)]
pub struct FulfillmentOrder {
    /// Aggregate ID, derived from the order number at receipt.
    id: Option<AggregateId>,

    /// Current version for optimistic concurrency.
    version: Version,

    order_number: Option<OrderNumber>,
    payment_id: Option<String>,
    customer: Option<CustomerInfo>,

    /// Items keyed by their line position; append-only after creation.
    items: BTreeMap<ItemId, FulfillmentItem>,

    /// Idempotent suppression set for user-visible notifications.
    notifications_sent: BTreeSet<NotificationKey>,

    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Aggregate for FulfillmentOrder {
    type Event = FulfillmentEvent;
    type Error = FulfillmentError;

    fn aggregate_type() -> &'static str {
        "FulfillmentOrder"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            FulfillmentEvent::OrderReceived(data) => {
                self.id = Some(AggregateId::for_order(&data.order_number));
                self.order_number = Some(data.order_number);
                self.payment_id = Some(data.payment_id);
                self.customer = Some(data.customer);
                self.created_at = Some(data.received_at);
                self.updated_at = Some(data.received_at);
                for spec in data.items {
                    self.items.insert(
                        spec.item_id,
                        FulfillmentItem {
                            item_id: spec.item_id,
                            kind: spec.kind,
                            product_ref: spec.product_ref,
                            product_name: spec.product_name,
                            quantity: spec.quantity,
                            shipping_address: spec.shipping_address,
                            shipping_preference: spec.shipping_preference,
                            status: ItemStatus::Queued,
                            attempts: 0,
                            last_error: None,
                            supplier_order: None,
                            digital_delivery: None,
                        },
                    );
                }
            }
            FulfillmentEvent::SubmissionStarted(data) => {
                self.updated_at = Some(data.started_at);
                if let Some(item) = self.items.get_mut(&data.item_id) {
                    item.status = ItemStatus::Submitting;
                    item.attempts = data.attempt;
                }
            }
            FulfillmentEvent::SubmissionAccepted(data) => {
                self.updated_at = Some(data.accepted_at);
                if let Some(item) = self.items.get_mut(&data.item_id) {
                    item.status = ItemStatus::PendingSupplier;
                    item.last_error = None;
                    let status = if data.external_order_id.is_some() {
                        SupplierOrderStatus::Accepted
                    } else {
                        SupplierOrderStatus::Submitted
                    };
                    item.supplier_order = Some(SupplierOrder {
                        supplier: data.supplier,
                        external_order_id: data.external_order_id,
                        status,
                        tracking: TrackingInfo::default(),
                        awaiting_manual_confirmation: data.awaiting_manual_confirmation,
                        charge: data.charge,
                        raw_status_history: Vec::new(),
                    });
                }
            }
            FulfillmentEvent::SubmissionRejected(data) => {
                self.updated_at = Some(data.rejected_at);
                if let Some(item) = self.items.get_mut(&data.item_id) {
                    item.status = ItemStatus::Failed;
                    item.last_error = Some(data.reason);
                }
            }
            FulfillmentEvent::SubmissionDeferred(data) => {
                self.updated_at = Some(data.deferred_at);
                if let Some(item) = self.items.get_mut(&data.item_id) {
                    item.status = ItemStatus::Queued;
                    item.last_error = Some(data.reason);
                }
            }
            FulfillmentEvent::SubmissionExhausted(data) => {
                self.updated_at = Some(data.failed_at);
                if let Some(item) = self.items.get_mut(&data.item_id) {
                    item.status = ItemStatus::Failed;
                    item.last_error = Some(data.reason);
                }
            }
            FulfillmentEvent::DigitalAccessGranted(data) => {
                self.updated_at = Some(data.granted_at);
                if let Some(item) = self.items.get_mut(&data.item_id) {
                    item.status = ItemStatus::Fulfilled;
                    item.last_error = None;
                    item.digital_delivery = Some(DigitalDelivery {
                        delivery_type: data.delivery_type,
                        access_url: data.access_url,
                        shared_folder_url: data.shared_folder_url,
                        granted_at: data.granted_at,
                        revoked_at: None,
                    });
                }
            }
            FulfillmentEvent::DigitalAccessRevoked(data) => {
                self.updated_at = Some(data.revoked_at);
                if let Some(item) = self.items.get_mut(&data.item_id)
                    && let Some(delivery) = item.digital_delivery.as_mut()
                {
                    delivery.revoked_at = Some(data.revoked_at);
                }
            }
            FulfillmentEvent::MarkedReadyToShip(data) => {
                self.updated_at = Some(data.marked_at);
                if let Some(item) = self.items.get_mut(&data.item_id) {
                    item.status = ItemStatus::Fulfilled;
                    item.last_error = None;
                }
            }
            FulfillmentEvent::SupplierStatusObserved(data) => {
                self.updated_at = Some(data.observed_at);
                if let Some(item) = self.items.get_mut(&data.item_id)
                    && let Some(so) = item.supplier_order.as_mut()
                {
                    if !so.has_observed(&data.raw_status) {
                        so.raw_status_history.push(RawStatusEntry {
                            raw_status: data.raw_status,
                            observed_at: data.observed_at,
                        });
                    }
                    if data.advanced {
                        so.status = data.normalized.as_supplier_status();
                        if let Some(tracking) = &data.tracking {
                            so.tracking.merge(tracking);
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
                self.updated_at = Some(data.confirmed_at);
                if let Some(item) = self.items.get_mut(&data.item_id)
                    && let Some(so) = item.supplier_order.as_mut()
                {
                    so.awaiting_manual_confirmation = false;
                    if let Some(tracking) = &data.tracking {
                        so.status = SupplierOrderStatus::Shipped;
                        so.tracking.merge(tracking);
                        item.status = ItemStatus::Shipped;
                    } else if so.status == SupplierOrderStatus::Submitted {
                        so.status = SupplierOrderStatus::Accepted;
                    }
                }
            }
            FulfillmentEvent::ItemCancelled(data) => {
                self.updated_at = Some(data.cancelled_at);
                if let Some(item) = self.items.get_mut(&data.item_id) {
                    item.status = ItemStatus::Cancelled;
                    item.last_error = Some(data.reason);
                    if let Some(so) = item.supplier_order.as_mut() {
                        so.status = SupplierOrderStatus::Cancelled;
                    }
                }
            }
            FulfillmentEvent::NotificationRecorded(data) => {
                self.updated_at = Some(data.recorded_at);
                self.notifications_sent.insert(data.key);
            }
        }
    }
}

// Query methods
impl FulfillmentOrder {
    /// Returns the human-facing order number.
    pub fn order_number(&self) -> Option<&OrderNumber> {
        self.order_number.as_ref()
    }

    /// Returns the upstream payment record reference.
    pub fn payment_id(&self) -> Option<&str> {
        self.payment_id.as_deref()
    }

    /// Returns the customer the order is fulfilled for.
    pub fn customer(&self) -> Option<&CustomerInfo> {
        self.customer.as_ref()
    }

    /// Returns all items in line order.
    pub fn items(&self) -> impl Iterator<Item = &FulfillmentItem> {
        self.items.values()
    }

    /// Returns an item by its ID.
    pub fn item(&self, item_id: ItemId) -> Option<&FulfillmentItem> {
        self.items.get(&item_id)
    }

    /// Returns the number of items.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// The order-level status, derived from item statuses on every read.
    pub fn status(&self) -> OrderStatus {
        OrderStatus::derive(self.items.values().map(|item| item.status))
    }

    /// Returns true once every item has reached a terminal state.
    pub fn is_settled(&self) -> bool {
        !self.items.is_empty() && self.items.values().all(|item| item.status.is_terminal())
    }

    /// Returns true if a notification under this key was already recorded.
    pub fn has_sent(&self, key: NotificationKey) -> bool {
        self.notifications_sent.contains(&key)
    }

    /// Returns the recorded notification keys.
    pub fn notifications_sent(&self) -> impl Iterator<Item = &NotificationKey> {
        self.notifications_sent.iter()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    fn require_item(&self, item_id: ItemId) -> Result<&FulfillmentItem, FulfillmentError> {
        self.items
            .get(&item_id)
            .ok_or(FulfillmentError::ItemNotFound { item_id })
    }
}

// Command methods (return events)
impl FulfillmentOrder {
    /// Records receipt of a paid order from checkout.
    pub fn receive(
        &self,
        order_number: OrderNumber,
        payment_id: impl Into<String>,
        customer: CustomerInfo,
        items: Vec<ItemSpec>,
    ) -> Result<Vec<FulfillmentEvent>, FulfillmentError> {
        if self.id.is_some() {
            return Err(FulfillmentError::AlreadyReceived);
        }
        if order_number.is_empty() {
            return Err(FulfillmentError::EmptyOrderNumber);
        }
        if items.is_empty() {
            return Err(FulfillmentError::NoItems);
        }
        for spec in &items {
            if spec.quantity == 0 {
                return Err(FulfillmentError::InvalidQuantity {
                    quantity: spec.quantity,
                });
            }
        }

        Ok(vec![FulfillmentEvent::order_received(
            order_number,
            payment_id,
            customer,
            items,
        )])
    }

    /// Starts a submission attempt for an item.
    pub fn begin_submission(
        &self,
        item_id: ItemId,
        supplier: Option<SupplierName>,
    ) -> Result<Vec<FulfillmentEvent>, FulfillmentError> {
        let item = self.require_item(item_id)?;
        if !item.status.can_submit() {
            return Err(FulfillmentError::InvalidStateTransition {
                current_status: item.status,
                action: "begin submission",
            });
        }

        Ok(vec![FulfillmentEvent::submission_started(
            item_id,
            supplier,
            item.attempts + 1,
        )])
    }

    /// Records a supplier accepting the submission.
    pub fn record_acceptance(
        &self,
        item_id: ItemId,
        supplier: SupplierName,
        external_order_id: Option<String>,
        awaiting_manual_confirmation: bool,
        charge: Option<SupplierCharge>,
    ) -> Result<Vec<FulfillmentEvent>, FulfillmentError> {
        let item = self.require_item(item_id)?;
        if !item.status.can_record_outcome() {
            return Err(FulfillmentError::InvalidStateTransition {
                current_status: item.status,
                action: "record acceptance",
            });
        }

        Ok(vec![FulfillmentEvent::submission_accepted(
            item_id,
            supplier,
            external_order_id,
            awaiting_manual_confirmation,
            charge,
        )])
    }

    /// Records a permanent supplier rejection. The item fails terminally
    /// and is never retried.
    pub fn record_rejection(
        &self,
        item_id: ItemId,
        reason: impl Into<String>,
    ) -> Result<Vec<FulfillmentEvent>, FulfillmentError> {
        let item = self.require_item(item_id)?;
        if !item.status.can_record_outcome() {
            return Err(FulfillmentError::InvalidStateTransition {
                current_status: item.status,
                action: "record rejection",
            });
        }

        Ok(vec![FulfillmentEvent::submission_rejected(item_id, reason)])
    }

    /// Records a transient failure; the item returns to the queue for retry.
    pub fn record_deferral(
        &self,
        item_id: ItemId,
        reason: impl Into<String>,
    ) -> Result<Vec<FulfillmentEvent>, FulfillmentError> {
        let item = self.require_item(item_id)?;
        if !item.status.can_record_outcome() {
            return Err(FulfillmentError::InvalidStateTransition {
                current_status: item.status,
                action: "record deferral",
            });
        }

        Ok(vec![FulfillmentEvent::submission_deferred(
            item_id,
            reason,
            item.attempts,
        )])
    }

    /// Records that the retry ceiling was reached for a queued item.
    pub fn record_exhaustion(
        &self,
        item_id: ItemId,
        reason: impl Into<String>,
    ) -> Result<Vec<FulfillmentEvent>, FulfillmentError> {
        let item = self.require_item(item_id)?;
        if item.status != ItemStatus::Queued {
            return Err(FulfillmentError::InvalidStateTransition {
                current_status: item.status,
                action: "record exhaustion",
            });
        }

        Ok(vec![FulfillmentEvent::submission_exhausted(
            item_id,
            reason,
            item.attempts,
        )])
    }

    /// Records a digital access grant; the item is fulfilled.
    ///
    /// Granting twice is a no-op, keyed on an existing non-revoked delivery.
    pub fn record_digital_grant(
        &self,
        item_id: ItemId,
        delivery_type: DeliveryType,
        access_url: impl Into<String>,
        shared_folder_url: Option<String>,
    ) -> Result<Vec<FulfillmentEvent>, FulfillmentError> {
        let item = self.require_item(item_id)?;
        if item.has_active_digital_delivery() {
            return Ok(vec![]);
        }
        if !item.status.can_record_outcome() {
            return Err(FulfillmentError::InvalidStateTransition {
                current_status: item.status,
                action: "record digital grant",
            });
        }

        Ok(vec![FulfillmentEvent::digital_access_granted(
            item_id,
            delivery_type,
            access_url,
            shared_folder_url,
        )])
    }

    /// Revokes a granted digital entitlement (refund / chargeback path).
    ///
    /// Revoking twice is a no-op; history stays intact.
    pub fn revoke_digital(
        &self,
        item_id: ItemId,
        reason: impl Into<String>,
    ) -> Result<Vec<FulfillmentEvent>, FulfillmentError> {
        let item = self.require_item(item_id)?;
        let delivery = item
            .digital_delivery
            .as_ref()
            .ok_or(FulfillmentError::NoDigitalDelivery { item_id })?;
        if delivery.revoked_at.is_some() {
            return Ok(vec![]);
        }

        Ok(vec![FulfillmentEvent::digital_access_revoked(item_id, reason)])
    }

    /// Marks an owned-inventory item ready for manual shipping (terminal).
    pub fn mark_ready_to_ship(
        &self,
        item_id: ItemId,
    ) -> Result<Vec<FulfillmentEvent>, FulfillmentError> {
        let item = self.require_item(item_id)?;
        if !item.status.can_record_outcome() {
            return Err(FulfillmentError::InvalidStateTransition {
                current_status: item.status,
                action: "mark ready to ship",
            });
        }

        Ok(vec![FulfillmentEvent::marked_ready_to_ship(item_id)])
    }

    /// Records an asynchronous supplier status observation.
    ///
    /// Transitions are monotonic: an observation at or behind the recorded
    /// supplier status is appended to the raw history but does not regress
    /// state, and an exact duplicate of an already-logged raw status is a
    /// complete no-op.
    pub fn observe_supplier_status(
        &self,
        item_id: ItemId,
        raw_status: impl Into<String>,
        normalized: NormalizedSupplierStatus,
        tracking: Option<TrackingInfo>,
    ) -> Result<Vec<FulfillmentEvent>, FulfillmentError> {
        let item = self.require_item(item_id)?;
        let so = item
            .supplier_order
            .as_ref()
            .ok_or(FulfillmentError::NoSupplierOrder { item_id })?;

        let raw_status = raw_status.into();
        let advanced = match normalized {
            NormalizedSupplierStatus::Cancelled => {
                !so.status.is_terminal() && item.status.can_cancel()
            }
            other => {
                let target = other.as_supplier_status();
                !so.status.is_terminal()
                    && target.rank() > so.status.rank()
                    && !item.status.is_terminal()
            }
        };

        if !advanced && so.has_observed(&raw_status) {
            return Ok(vec![]);
        }

        Ok(vec![FulfillmentEvent::supplier_status_observed(
            item_id, raw_status, normalized, tracking, advanced,
        )])
    }

    /// Resolves a manual-confirmation dropship item.
    ///
    /// With tracking the item moves to shipped; without, the supplier order
    /// is only confirmed as placed.
    pub fn confirm_manually(
        &self,
        item_id: ItemId,
        tracking: Option<TrackingInfo>,
        confirmed_by: Option<String>,
    ) -> Result<Vec<FulfillmentEvent>, FulfillmentError> {
        let item = self.require_item(item_id)?;
        let so = item
            .supplier_order
            .as_ref()
            .ok_or(FulfillmentError::NoSupplierOrder { item_id })?;
        if !so.awaiting_manual_confirmation || item.status.is_terminal() {
            return Err(FulfillmentError::NotAwaitingConfirmation { item_id });
        }

        Ok(vec![FulfillmentEvent::manually_confirmed(
            item_id,
            tracking,
            confirmed_by,
        )])
    }

    /// Cancels an item before delivery.
    pub fn cancel_item(
        &self,
        item_id: ItemId,
        reason: impl Into<String>,
        cancelled_by: Option<String>,
    ) -> Result<Vec<FulfillmentEvent>, FulfillmentError> {
        let item = self.require_item(item_id)?;
        if !item.status.can_cancel() {
            return Err(FulfillmentError::InvalidStateTransition {
                current_status: item.status,
                action: "cancel",
            });
        }

        Ok(vec![FulfillmentEvent::item_cancelled(
            item_id,
            reason,
            cancelled_by,
        )])
    }

    /// Records a notification send; a duplicate key is a no-op.
    pub fn record_notification(
        &self,
        key: NotificationKey,
        recipient: impl Into<String>,
    ) -> Result<Vec<FulfillmentEvent>, FulfillmentError> {
        if self.id.is_none() {
            return Err(FulfillmentError::NotReceived);
        }
        if self.notifications_sent.contains(&key) {
            return Ok(vec![]);
        }
        if let Some(item_id) = key.item {
            self.require_item(item_id)?;
        }

        Ok(vec![FulfillmentEvent::notification_recorded(key, recipient)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fulfillment::value_objects::{Currency, ItemKind, ShippingPreference};
    use crate::fulfillment::NotificationKind;

    fn customer() -> CustomerInfo {
        CustomerInfo {
            customer_id: "cust-1".to_string(),
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
        }
    }

    fn spec(item_id: u32, kind: ItemKind) -> ItemSpec {
        ItemSpec {
            item_id: ItemId::new(item_id),
            kind,
            product_ref: "poster-a2".to_string(),
            product_name: "A2 Poster".to_string(),
            quantity: 1,
            shipping_address: None,
            shipping_preference: ShippingPreference::Standard,
        }
    }

    fn received_order(specs: Vec<ItemSpec>) -> FulfillmentOrder {
        let mut order = FulfillmentOrder::default();
        let events = order
            .receive(OrderNumber::new("SO-1"), "pay-1", customer(), specs)
            .unwrap();
        order.apply_events(events);
        order
    }

    fn accept_pod_item(order: &mut FulfillmentOrder, item_id: ItemId, external_id: &str) {
        order.apply_events(
            order
                .begin_submission(item_id, Some(SupplierName::Printling))
                .unwrap(),
        );
        order.apply_events(
            order
                .record_acceptance(
                    item_id,
                    SupplierName::Printling,
                    Some(external_id.to_string()),
                    false,
                    Some(SupplierCharge::native(1250, Currency::Usd)),
                )
                .unwrap(),
        );
    }

    #[test]
    fn test_receive_creates_queued_items() {
        let order = received_order(vec![
            spec(0, ItemKind::DigitalCourse),
            spec(1, ItemKind::PodPrintling),
        ]);

        assert!(order.id().is_some());
        assert_eq!(order.item_count(), 2);
        assert!(order.items().all(|i| i.status == ItemStatus::Queued));
        assert_eq!(order.status(), OrderStatus::Processing);
        assert_eq!(
            order.id(),
            Some(AggregateId::for_order(&OrderNumber::new("SO-1")))
        );
    }

    #[test]
    fn test_receive_twice_fails() {
        let order = received_order(vec![spec(0, ItemKind::DigitalCourse)]);
        let result = order.receive(
            OrderNumber::new("SO-1"),
            "pay-1",
            customer(),
            vec![spec(0, ItemKind::DigitalCourse)],
        );
        assert!(matches!(result, Err(FulfillmentError::AlreadyReceived)));
    }

    #[test]
    fn test_receive_without_items_fails() {
        let order = FulfillmentOrder::default();
        let result = order.receive(OrderNumber::new("SO-1"), "pay-1", customer(), vec![]);
        assert!(matches!(result, Err(FulfillmentError::NoItems)));
    }

    #[test]
    fn test_receive_zero_quantity_fails() {
        let order = FulfillmentOrder::default();
        let mut bad = spec(0, ItemKind::PodPrintling);
        bad.quantity = 0;
        let result = order.receive(OrderNumber::new("SO-1"), "pay-1", customer(), vec![bad]);
        assert!(matches!(
            result,
            Err(FulfillmentError::InvalidQuantity { quantity: 0 })
        ));
    }

    #[test]
    fn test_submission_attempt_counter() {
        let mut order = received_order(vec![spec(0, ItemKind::PodPrintling)]);
        let item_id = ItemId::new(0);

        order.apply_events(
            order
                .begin_submission(item_id, Some(SupplierName::Printling))
                .unwrap(),
        );
        assert_eq!(order.item(item_id).unwrap().attempts, 1);
        assert_eq!(order.item(item_id).unwrap().status, ItemStatus::Submitting);

        order.apply_events(order.record_deferral(item_id, "supplier 503").unwrap());
        assert_eq!(order.item(item_id).unwrap().status, ItemStatus::Queued);
        assert_eq!(
            order.item(item_id).unwrap().last_error.as_deref(),
            Some("supplier 503")
        );

        order.apply_events(
            order
                .begin_submission(item_id, Some(SupplierName::Printling))
                .unwrap(),
        );
        assert_eq!(order.item(item_id).unwrap().attempts, 2);
    }

    #[test]
    fn test_cannot_submit_while_submitting() {
        let mut order = received_order(vec![spec(0, ItemKind::PodPrintling)]);
        let item_id = ItemId::new(0);
        order.apply_events(order.begin_submission(item_id, None).unwrap());

        let result = order.begin_submission(item_id, None);
        assert!(matches!(
            result,
            Err(FulfillmentError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_acceptance_creates_supplier_order_and_clears_error() {
        let mut order = received_order(vec![spec(0, ItemKind::PodPrintling)]);
        let item_id = ItemId::new(0);

        order.apply_events(order.begin_submission(item_id, None).unwrap());
        order.apply_events(order.record_deferral(item_id, "timeout").unwrap());
        order.apply_events(order.begin_submission(item_id, None).unwrap());
        order.apply_events(
            order
                .record_acceptance(item_id, SupplierName::Printling, Some("P-1".into()), false, None)
                .unwrap(),
        );

        let item = order.item(item_id).unwrap();
        assert_eq!(item.status, ItemStatus::PendingSupplier);
        assert!(item.last_error.is_none());
        let so = item.supplier_order.as_ref().unwrap();
        assert_eq!(so.external_order_id.as_deref(), Some("P-1"));
        assert_eq!(so.status, SupplierOrderStatus::Accepted);
    }

    #[test]
    fn test_rejection_is_terminal() {
        let mut order = received_order(vec![spec(0, ItemKind::PodPrintling)]);
        let item_id = ItemId::new(0);

        order.apply_events(order.begin_submission(item_id, None).unwrap());
        order.apply_events(order.record_rejection(item_id, "does not ship there").unwrap());

        let item = order.item(item_id).unwrap();
        assert_eq!(item.status, ItemStatus::Failed);
        assert!(order.begin_submission(item_id, None).is_err());
    }

    #[test]
    fn test_exhaustion_requires_queued() {
        let mut order = received_order(vec![spec(0, ItemKind::PodPrintling)]);
        let item_id = ItemId::new(0);

        order.apply_events(order.begin_submission(item_id, None).unwrap());
        assert!(order.record_exhaustion(item_id, "ceiling").is_err());

        order.apply_events(order.record_deferral(item_id, "timeout").unwrap());
        order.apply_events(order.record_exhaustion(item_id, "ceiling").unwrap());
        assert_eq!(order.item(item_id).unwrap().status, ItemStatus::Failed);
    }

    #[test]
    fn test_digital_grant_is_idempotent() {
        let mut order = received_order(vec![spec(0, ItemKind::DigitalCourse)]);
        let item_id = ItemId::new(0);

        order.apply_events(
            order
                .begin_submission(item_id, Some(SupplierName::DigitalDelivery))
                .unwrap(),
        );
        order.apply_events(
            order
                .record_digital_grant(
                    item_id,
                    DeliveryType::CourseAccess,
                    "https://courses.example/intro",
                    None,
                )
                .unwrap(),
        );
        assert_eq!(order.item(item_id).unwrap().status, ItemStatus::Fulfilled);

        // Second grant is a no-op, not an error.
        let events = order
            .record_digital_grant(
                item_id,
                DeliveryType::CourseAccess,
                "https://courses.example/intro",
                None,
            )
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_revoke_keeps_history_and_is_idempotent() {
        let mut order = received_order(vec![spec(0, ItemKind::DigitalCourse)]);
        let item_id = ItemId::new(0);
        order.apply_events(order.begin_submission(item_id, None).unwrap());
        order.apply_events(
            order
                .record_digital_grant(item_id, DeliveryType::CourseAccess, "https://c", None)
                .unwrap(),
        );

        order.apply_events(order.revoke_digital(item_id, "chargeback").unwrap());
        let item = order.item(item_id).unwrap();
        assert!(item.digital_delivery.as_ref().unwrap().revoked_at.is_some());
        assert!(!item.has_active_digital_delivery());

        assert!(order.revoke_digital(item_id, "again").unwrap().is_empty());
    }

    #[test]
    fn test_revoke_without_delivery_fails() {
        let order = received_order(vec![spec(0, ItemKind::PodPrintling)]);
        let result = order.revoke_digital(ItemId::new(0), "refund");
        assert!(matches!(
            result,
            Err(FulfillmentError::NoDigitalDelivery { .. })
        ));
    }

    #[test]
    fn test_supplier_status_advances_item() {
        let mut order = received_order(vec![spec(0, ItemKind::PodPrintling)]);
        let item_id = ItemId::new(0);
        accept_pod_item(&mut order, item_id, "P-1");

        let tracking = TrackingInfo {
            carrier: Some("UPS".to_string()),
            tracking_number: Some("TRK123".to_string()),
            tracking_url: None,
        };
        order.apply_events(
            order
                .observe_supplier_status(
                    item_id,
                    "shipped",
                    NormalizedSupplierStatus::Shipped,
                    Some(tracking),
                )
                .unwrap(),
        );

        let item = order.item(item_id).unwrap();
        assert_eq!(item.status, ItemStatus::Shipped);
        let so = item.supplier_order.as_ref().unwrap();
        assert_eq!(so.status, SupplierOrderStatus::Shipped);
        assert_eq!(so.tracking.tracking_number.as_deref(), Some("TRK123"));
        assert_eq!(so.raw_status_history.len(), 1);
    }

    #[test]
    fn test_out_of_order_status_does_not_regress() {
        let mut order = received_order(vec![spec(0, ItemKind::PodPrintling)]);
        let item_id = ItemId::new(0);
        accept_pod_item(&mut order, item_id, "P-1");

        order.apply_events(
            order
                .observe_supplier_status(item_id, "delivered", NormalizedSupplierStatus::Delivered, None)
                .unwrap(),
        );
        assert_eq!(order.item(item_id).unwrap().status, ItemStatus::Delivered);

        // A late "shipped" is logged but does not regress state.
        let events = order
            .observe_supplier_status(item_id, "shipped", NormalizedSupplierStatus::Shipped, None)
            .unwrap();
        assert_eq!(events.len(), 1);
        order.apply_events(events);

        let item = order.item(item_id).unwrap();
        assert_eq!(item.status, ItemStatus::Delivered);
        let so = item.supplier_order.as_ref().unwrap();
        assert_eq!(so.status, SupplierOrderStatus::Delivered);
        assert_eq!(so.raw_status_history.len(), 2);
    }

    #[test]
    fn test_duplicate_observation_is_noop() {
        let mut order = received_order(vec![spec(0, ItemKind::PodPrintling)]);
        let item_id = ItemId::new(0);
        accept_pod_item(&mut order, item_id, "P-1");

        order.apply_events(
            order
                .observe_supplier_status(item_id, "shipped", NormalizedSupplierStatus::Shipped, None)
                .unwrap(),
        );

        let events = order
            .observe_supplier_status(item_id, "shipped", NormalizedSupplierStatus::Shipped, None)
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(
            order
                .item(item_id)
                .unwrap()
                .supplier_order
                .as_ref()
                .unwrap()
                .raw_status_history
                .len(),
            1
        );
    }

    #[test]
    fn test_observe_without_supplier_order_fails() {
        let order = received_order(vec![spec(0, ItemKind::PodPrintling)]);
        let result = order.observe_supplier_status(
            ItemId::new(0),
            "shipped",
            NormalizedSupplierStatus::Shipped,
            None,
        );
        assert!(matches!(
            result,
            Err(FulfillmentError::NoSupplierOrder { .. })
        ));
    }

    #[test]
    fn test_cancellation_webhook_before_delivery() {
        let mut order = received_order(vec![spec(0, ItemKind::PodPrintling)]);
        let item_id = ItemId::new(0);
        accept_pod_item(&mut order, item_id, "P-1");

        order.apply_events(
            order
                .observe_supplier_status(item_id, "canceled", NormalizedSupplierStatus::Cancelled, None)
                .unwrap(),
        );
        assert_eq!(order.item(item_id).unwrap().status, ItemStatus::Cancelled);
    }

    #[test]
    fn test_cancellation_webhook_after_delivery_is_ignored() {
        let mut order = received_order(vec![spec(0, ItemKind::PodPrintling)]);
        let item_id = ItemId::new(0);
        accept_pod_item(&mut order, item_id, "P-1");

        order.apply_events(
            order
                .observe_supplier_status(item_id, "delivered", NormalizedSupplierStatus::Delivered, None)
                .unwrap(),
        );
        let events = order
            .observe_supplier_status(item_id, "canceled", NormalizedSupplierStatus::Cancelled, None)
            .unwrap();
        order.apply_events(events);

        assert_eq!(order.item(item_id).unwrap().status, ItemStatus::Delivered);
    }

    #[test]
    fn test_manual_confirmation_with_tracking_ships_item() {
        let mut order = received_order(vec![spec(0, ItemKind::Dropship)]);
        let item_id = ItemId::new(0);

        order.apply_events(order.begin_submission(item_id, Some(SupplierName::Dropship)).unwrap());
        order.apply_events(
            order
                .record_acceptance(item_id, SupplierName::Dropship, None, true, None)
                .unwrap(),
        );
        assert!(order.item(item_id).unwrap().awaiting_manual_confirmation());

        let tracking = TrackingInfo {
            carrier: Some("USPS".to_string()),
            tracking_number: Some("940055".to_string()),
            tracking_url: None,
        };
        order.apply_events(
            order
                .confirm_manually(item_id, Some(tracking), Some("ops@example.com".to_string()))
                .unwrap(),
        );

        let item = order.item(item_id).unwrap();
        assert!(!item.awaiting_manual_confirmation());
        assert_eq!(item.status, ItemStatus::Shipped);
        assert_eq!(
            item.supplier_order.as_ref().unwrap().status,
            SupplierOrderStatus::Shipped
        );
    }

    #[test]
    fn test_manual_confirmation_requires_waiting_item() {
        let mut order = received_order(vec![spec(0, ItemKind::PodPrintling)]);
        let item_id = ItemId::new(0);
        accept_pod_item(&mut order, item_id, "P-1");

        let result = order.confirm_manually(item_id, None, None);
        assert!(matches!(
            result,
            Err(FulfillmentError::NotAwaitingConfirmation { .. })
        ));
    }

    #[test]
    fn test_notification_recording_is_idempotent() {
        let mut order = received_order(vec![spec(0, ItemKind::DigitalCourse)]);
        let key = NotificationKey::order(NotificationKind::OrderConfirmed);

        let events = order.record_notification(key, "ada@example.com").unwrap();
        assert_eq!(events.len(), 1);
        order.apply_events(events);
        assert!(order.has_sent(key));

        let events = order.record_notification(key, "ada@example.com").unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_partial_fulfillment_derivation() {
        let mut order = received_order(vec![
            spec(0, ItemKind::DigitalCourse),
            spec(1, ItemKind::PodPrintling),
        ]);

        // Digital item fulfilled
        order.apply_events(order.begin_submission(ItemId::new(0), None).unwrap());
        order.apply_events(
            order
                .record_digital_grant(ItemId::new(0), DeliveryType::CourseAccess, "https://c", None)
                .unwrap(),
        );

        // POD item rejected
        order.apply_events(order.begin_submission(ItemId::new(1), None).unwrap());
        order.apply_events(
            order
                .record_rejection(ItemId::new(1), "unsupported destination")
                .unwrap(),
        );

        assert_eq!(order.status(), OrderStatus::PartiallyFulfilled);
        assert!(order.is_settled());
    }

    #[test]
    fn test_all_items_delivered_order_fulfilled() {
        let mut order = received_order(vec![spec(0, ItemKind::PodPrintling)]);
        let item_id = ItemId::new(0);
        accept_pod_item(&mut order, item_id, "P-1");

        order.apply_events(
            order
                .observe_supplier_status(item_id, "shipped", NormalizedSupplierStatus::Shipped, None)
                .unwrap(),
        );
        assert_eq!(order.status(), OrderStatus::Processing);

        order.apply_events(
            order
                .observe_supplier_status(item_id, "delivered", NormalizedSupplierStatus::Delivered, None)
                .unwrap(),
        );
        assert_eq!(order.status(), OrderStatus::Fulfilled);
        assert!(order.is_settled());
    }
}
