//! Fulfillment domain events.

use chrono::{DateTime, Utc};
use common::{ItemId, OrderNumber};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::state::NormalizedSupplierStatus;
use super::value_objects::{
    CustomerInfo, DeliveryType, ItemKind, NotificationKey, ShippingAddress, ShippingPreference,
    SupplierCharge, SupplierName, TrackingInfo,
};

/// Events that can occur on a fulfillment order aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum FulfillmentEvent {
    /// A paid order was handed over by checkout.
    OrderReceived(OrderReceivedData),

    /// A submission attempt against an item's connector started.
    SubmissionStarted(SubmissionStartedData),

    /// The supplier accepted the submission.
    SubmissionAccepted(SubmissionAcceptedData),

    /// The supplier rejected the submission (terminal, never retried).
    SubmissionRejected(SubmissionRejectedData),

    /// The submission failed transiently; the item returns to the queue.
    SubmissionDeferred(SubmissionDeferredData),

    /// The retry ceiling was reached; the item failed terminally.
    SubmissionExhausted(SubmissionExhaustedData),

    /// Digital access was granted; the item is fulfilled.
    DigitalAccessGranted(DigitalAccessGrantedData),

    /// A previously granted digital entitlement was revoked.
    DigitalAccessRevoked(DigitalAccessRevokedData),

    /// An owned-inventory item was staged for manual shipping.
    MarkedReadyToShip(MarkedReadyToShipData),

    /// A supplier webhook status was observed.
    SupplierStatusObserved(SupplierStatusObservedData),

    /// An operator resolved a manual-confirmation dropship item.
    ManuallyConfirmed(ManuallyConfirmedData),

    /// An item was cancelled before delivery.
    ItemCancelled(ItemCancelledData),

    /// A user-visible notification was recorded as sent.
    NotificationRecorded(NotificationRecordedData),
}

impl DomainEvent for FulfillmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FulfillmentEvent::OrderReceived(_) => "OrderReceived",
            FulfillmentEvent::SubmissionStarted(_) => "SubmissionStarted",
            FulfillmentEvent::SubmissionAccepted(_) => "SubmissionAccepted",
            FulfillmentEvent::SubmissionRejected(_) => "SubmissionRejected",
            FulfillmentEvent::SubmissionDeferred(_) => "SubmissionDeferred",
            FulfillmentEvent::SubmissionExhausted(_) => "SubmissionExhausted",
            FulfillmentEvent::DigitalAccessGranted(_) => "DigitalAccessGranted",
            FulfillmentEvent::DigitalAccessRevoked(_) => "DigitalAccessRevoked",
            FulfillmentEvent::MarkedReadyToShip(_) => "MarkedReadyToShip",
            FulfillmentEvent::SupplierStatusObserved(_) => "SupplierStatusObserved",
            FulfillmentEvent::ManuallyConfirmed(_) => "ManuallyConfirmed",
            FulfillmentEvent::ItemCancelled(_) => "ItemCancelled",
            FulfillmentEvent::NotificationRecorded(_) => "NotificationRecorded",
        }
    }
}

/// One line of the intake payload, classified and frozen at receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSpec {
    pub item_id: ItemId,
    pub kind: ItemKind,
    pub product_ref: String,
    pub product_name: String,
    pub quantity: u32,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default)]
    pub shipping_preference: ShippingPreference,
}

/// Data for OrderReceived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReceivedData {
    pub order_number: OrderNumber,
    pub payment_id: String,
    pub customer: CustomerInfo,
    pub items: Vec<ItemSpec>,
    pub received_at: DateTime<Utc>,
}

/// Data for SubmissionStarted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionStartedData {
    pub item_id: ItemId,
    pub supplier: Option<SupplierName>,
    /// 1-based attempt counter, compared against the retry ceiling.
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
}

/// Data for SubmissionAccepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionAcceptedData {
    pub item_id: ItemId,
    pub supplier: SupplierName,
    #[serde(default)]
    pub external_order_id: Option<String>,
    #[serde(default)]
    pub awaiting_manual_confirmation: bool,
    #[serde(default)]
    pub charge: Option<SupplierCharge>,
    pub accepted_at: DateTime<Utc>,
}

/// Data for SubmissionRejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRejectedData {
    pub item_id: ItemId,
    pub reason: String,
    pub rejected_at: DateTime<Utc>,
}

/// Data for SubmissionDeferred.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionDeferredData {
    pub item_id: ItemId,
    pub reason: String,
    pub attempt: u32,
    pub deferred_at: DateTime<Utc>,
}

/// Data for SubmissionExhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionExhaustedData {
    pub item_id: ItemId,
    pub reason: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

/// Data for DigitalAccessGranted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigitalAccessGrantedData {
    pub item_id: ItemId,
    pub delivery_type: DeliveryType,
    pub access_url: String,
    #[serde(default)]
    pub shared_folder_url: Option<String>,
    pub granted_at: DateTime<Utc>,
}

/// Data for DigitalAccessRevoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigitalAccessRevokedData {
    pub item_id: ItemId,
    pub reason: String,
    pub revoked_at: DateTime<Utc>,
}

/// Data for MarkedReadyToShip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkedReadyToShipData {
    pub item_id: ItemId,
    pub marked_at: DateTime<Utc>,
}

/// Data for SupplierStatusObserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierStatusObservedData {
    pub item_id: ItemId,
    /// The supplier's status string exactly as received.
    pub raw_status: String,
    pub normalized: NormalizedSupplierStatus,
    #[serde(default)]
    pub tracking: Option<TrackingInfo>,
    /// Whether this observation advanced the recorded supplier status.
    /// Observations behind the recorded status are logged without effect.
    pub advanced: bool,
    pub observed_at: DateTime<Utc>,
}

/// Data for ManuallyConfirmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManuallyConfirmedData {
    pub item_id: ItemId,
    #[serde(default)]
    pub tracking: Option<TrackingInfo>,
    #[serde(default)]
    pub confirmed_by: Option<String>,
    pub confirmed_at: DateTime<Utc>,
}

/// Data for ItemCancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemCancelledData {
    pub item_id: ItemId,
    pub reason: String,
    #[serde(default)]
    pub cancelled_by: Option<String>,
    pub cancelled_at: DateTime<Utc>,
}

/// Data for NotificationRecorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecordedData {
    pub key: NotificationKey,
    pub recipient: String,
    pub recorded_at: DateTime<Utc>,
}

// Convenience constructors
impl FulfillmentEvent {
    /// Creates an OrderReceived event.
    pub fn order_received(
        order_number: OrderNumber,
        payment_id: impl Into<String>,
        customer: CustomerInfo,
        items: Vec<ItemSpec>,
    ) -> Self {
        FulfillmentEvent::OrderReceived(OrderReceivedData {
            order_number,
            payment_id: payment_id.into(),
            customer,
            items,
            received_at: Utc::now(),
        })
    }

    /// Creates a SubmissionStarted event.
    pub fn submission_started(item_id: ItemId, supplier: Option<SupplierName>, attempt: u32) -> Self {
        FulfillmentEvent::SubmissionStarted(SubmissionStartedData {
            item_id,
            supplier,
            attempt,
            started_at: Utc::now(),
        })
    }

    /// Creates a SubmissionAccepted event.
    pub fn submission_accepted(
        item_id: ItemId,
        supplier: SupplierName,
        external_order_id: Option<String>,
        awaiting_manual_confirmation: bool,
        charge: Option<SupplierCharge>,
    ) -> Self {
        FulfillmentEvent::SubmissionAccepted(SubmissionAcceptedData {
            item_id,
            supplier,
            external_order_id,
            awaiting_manual_confirmation,
            charge,
            accepted_at: Utc::now(),
        })
    }

    /// Creates a SubmissionRejected event.
    pub fn submission_rejected(item_id: ItemId, reason: impl Into<String>) -> Self {
        FulfillmentEvent::SubmissionRejected(SubmissionRejectedData {
            item_id,
            reason: reason.into(),
            rejected_at: Utc::now(),
        })
    }

    /// Creates a SubmissionDeferred event.
    pub fn submission_deferred(item_id: ItemId, reason: impl Into<String>, attempt: u32) -> Self {
        FulfillmentEvent::SubmissionDeferred(SubmissionDeferredData {
            item_id,
            reason: reason.into(),
            attempt,
            deferred_at: Utc::now(),
        })
    }

    /// Creates a SubmissionExhausted event.
    pub fn submission_exhausted(item_id: ItemId, reason: impl Into<String>, attempts: u32) -> Self {
        FulfillmentEvent::SubmissionExhausted(SubmissionExhaustedData {
            item_id,
            reason: reason.into(),
            attempts,
            failed_at: Utc::now(),
        })
    }

    /// Creates a DigitalAccessGranted event.
    pub fn digital_access_granted(
        item_id: ItemId,
        delivery_type: DeliveryType,
        access_url: impl Into<String>,
        shared_folder_url: Option<String>,
    ) -> Self {
        FulfillmentEvent::DigitalAccessGranted(DigitalAccessGrantedData {
            item_id,
            delivery_type,
            access_url: access_url.into(),
            shared_folder_url,
            granted_at: Utc::now(),
        })
    }

    /// Creates a DigitalAccessRevoked event.
    pub fn digital_access_revoked(item_id: ItemId, reason: impl Into<String>) -> Self {
        FulfillmentEvent::DigitalAccessRevoked(DigitalAccessRevokedData {
            item_id,
            reason: reason.into(),
            revoked_at: Utc::now(),
        })
    }

    /// Creates a MarkedReadyToShip event.
    pub fn marked_ready_to_ship(item_id: ItemId) -> Self {
        FulfillmentEvent::MarkedReadyToShip(MarkedReadyToShipData {
            item_id,
            marked_at: Utc::now(),
        })
    }

    /// Creates a SupplierStatusObserved event.
    pub fn supplier_status_observed(
        item_id: ItemId,
        raw_status: impl Into<String>,
        normalized: NormalizedSupplierStatus,
        tracking: Option<TrackingInfo>,
        advanced: bool,
    ) -> Self {
        FulfillmentEvent::SupplierStatusObserved(SupplierStatusObservedData {
            item_id,
            raw_status: raw_status.into(),
            normalized,
            tracking,
            advanced,
            observed_at: Utc::now(),
        })
    }

    /// Creates a ManuallyConfirmed event.
    pub fn manually_confirmed(
        item_id: ItemId,
        tracking: Option<TrackingInfo>,
        confirmed_by: Option<String>,
    ) -> Self {
        FulfillmentEvent::ManuallyConfirmed(ManuallyConfirmedData {
            item_id,
            tracking,
            confirmed_by,
            confirmed_at: Utc::now(),
        })
    }

    /// Creates an ItemCancelled event.
    pub fn item_cancelled(
        item_id: ItemId,
        reason: impl Into<String>,
        cancelled_by: Option<String>,
    ) -> Self {
        FulfillmentEvent::ItemCancelled(ItemCancelledData {
            item_id,
            reason: reason.into(),
            cancelled_by,
            cancelled_at: Utc::now(),
        })
    }

    /// Creates a NotificationRecorded event.
    pub fn notification_recorded(key: NotificationKey, recipient: impl Into<String>) -> Self {
        FulfillmentEvent::NotificationRecorded(NotificationRecordedData {
            key,
            recipient: recipient.into(),
            recorded_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fulfillment::NotificationKind;

    #[test]
    fn test_event_types() {
        let event = FulfillmentEvent::submission_started(ItemId::new(0), None, 1);
        assert_eq!(event.event_type(), "SubmissionStarted");

        let event = FulfillmentEvent::submission_rejected(ItemId::new(0), "no such SKU");
        assert_eq!(event.event_type(), "SubmissionRejected");

        let event = FulfillmentEvent::supplier_status_observed(
            ItemId::new(1),
            "shipped",
            NormalizedSupplierStatus::Shipped,
            None,
            true,
        );
        assert_eq!(event.event_type(), "SupplierStatusObserved");
    }

    #[test]
    fn test_event_serialization_roundtrip() {
        let event = FulfillmentEvent::submission_accepted(
            ItemId::new(2),
            SupplierName::Printling,
            Some("P-1001".to_string()),
            false,
            Some(SupplierCharge::native(1250, super::super::Currency::Usd)),
        );

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("SubmissionAccepted"));

        let deserialized: FulfillmentEvent = serde_json::from_str(&json).unwrap();
        if let FulfillmentEvent::SubmissionAccepted(data) = deserialized {
            assert_eq!(data.item_id, ItemId::new(2));
            assert_eq!(data.supplier, SupplierName::Printling);
            assert_eq!(data.external_order_id.as_deref(), Some("P-1001"));
        } else {
            panic!("Expected SubmissionAccepted event");
        }
    }

    #[test]
    fn test_notification_recorded_roundtrip() {
        let key = NotificationKey::item(NotificationKind::ItemShipped, ItemId::new(3));
        let event = FulfillmentEvent::notification_recorded(key, "ada@example.com");

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: FulfillmentEvent = serde_json::from_str(&json).unwrap();

        if let FulfillmentEvent::NotificationRecorded(data) = deserialized {
            assert_eq!(data.key, key);
            assert_eq!(data.recipient, "ada@example.com");
        } else {
            panic!("Expected NotificationRecorded event");
        }
    }
}
