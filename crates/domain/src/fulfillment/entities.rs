//! Entities owned by the fulfillment order aggregate.

use chrono::{DateTime, Utc};
use common::ItemId;
use serde::{Deserialize, Serialize};

use super::state::{ItemStatus, SupplierOrderStatus};
use super::value_objects::{
    DeliveryType, ItemKind, ShippingAddress, ShippingPreference, SupplierCharge, SupplierName,
    TrackingInfo,
};

/// One purchased line within an order, independently tracked to completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentItem {
    pub item_id: ItemId,

    /// Classification, set once at intake; never changes.
    pub kind: ItemKind,

    pub product_ref: String,
    pub product_name: String,
    pub quantity: u32,

    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default)]
    pub shipping_preference: ShippingPreference,

    pub status: ItemStatus,

    /// Submission attempts made so far, compared against the retry ceiling.
    pub attempts: u32,

    /// Last recorded failure reason; cleared on success.
    #[serde(default)]
    pub last_error: Option<String>,

    /// Present once a supplier submission attempt has been accepted.
    #[serde(default)]
    pub supplier_order: Option<SupplierOrder>,

    /// Present for digital/subscription kinds once granted.
    #[serde(default)]
    pub digital_delivery: Option<DigitalDelivery>,
}

impl FulfillmentItem {
    /// Returns true if the item sits in the manual-confirmation queue.
    pub fn awaiting_manual_confirmation(&self) -> bool {
        self.supplier_order
            .as_ref()
            .is_some_and(|so| so.awaiting_manual_confirmation && !self.status.is_terminal())
    }

    /// Returns true if a non-revoked digital delivery exists.
    pub fn has_active_digital_delivery(&self) -> bool {
        self.digital_delivery
            .as_ref()
            .is_some_and(|d| d.revoked_at.is_none())
    }
}

/// A single raw status observation from a supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStatusEntry {
    pub raw_status: String,
    pub observed_at: DateTime<Utc>,
}

/// An order placed with an external supplier, created on the first
/// accepted submission attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierOrder {
    pub supplier: SupplierName,

    /// Assigned by the supplier once it accepts the submission; absent for
    /// API-less dropship sources until an operator confirms.
    #[serde(default)]
    pub external_order_id: Option<String>,

    pub status: SupplierOrderStatus,

    #[serde(default)]
    pub tracking: TrackingInfo,

    /// True for dropship sources with no order API; the item waits for an
    /// operator instead of a webhook.
    #[serde(default)]
    pub awaiting_manual_confirmation: bool,

    /// Conversion-audit record captured once at submission.
    #[serde(default)]
    pub charge: Option<SupplierCharge>,

    /// Every raw status string ever observed for this supplier order.
    /// Append-only, so reconciliation stays auditable and idempotent.
    #[serde(default)]
    pub raw_status_history: Vec<RawStatusEntry>,
}

impl SupplierOrder {
    /// Returns true if this raw status string has been observed before.
    pub fn has_observed(&self, raw_status: &str) -> bool {
        self.raw_status_history
            .iter()
            .any(|entry| entry.raw_status == raw_status)
    }
}

/// A granted digital entitlement.
///
/// The lifecycle is explicit so revocation (refund, chargeback) is
/// representable without deleting history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigitalDelivery {
    pub delivery_type: DeliveryType,
    pub access_url: String,

    /// Reference to the shared materials folder, when provisioned.
    #[serde(default)]
    pub shared_folder_url: Option<String>,

    pub granted_at: DateTime<Utc>,
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
}
