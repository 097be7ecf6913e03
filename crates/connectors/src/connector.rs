//! The uniform contract every supplier integration implements.

use async_trait::async_trait;
use common::{ItemId, OrderNumber};
use domain::{
    CustomerInfo, DeliveryType, ItemKind, NormalizedSupplierStatus, ShippingAddress,
    ShippingPreference, SupplierCharge, SupplierName, TrackingInfo,
};

/// Everything a connector needs to submit one item to its supplier.
///
/// Assembled by the dispatcher from the order aggregate; connectors never
/// read or write fulfillment state themselves.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub order_number: OrderNumber,
    pub item_id: ItemId,
    pub kind: ItemKind,
    pub product_ref: String,
    pub product_name: String,
    pub quantity: u32,
    pub shipping_address: Option<ShippingAddress>,
    pub shipping_preference: ShippingPreference,
    pub customer: CustomerInfo,
}

impl SubmissionRequest {
    /// The reference under which the supplier knows this submission.
    pub fn supplier_reference(&self) -> String {
        format!("{}/{}", self.order_number, self.item_id)
    }
}

/// A digital entitlement granted as part of a successful submission.
#[derive(Debug, Clone)]
pub struct DigitalGrant {
    pub delivery_type: DeliveryType,
    pub access_url: String,
    pub shared_folder_url: Option<String>,
}

/// Details of an accepted submission.
#[derive(Debug, Clone, Default)]
pub struct Acceptance {
    /// Assigned by the supplier; absent for API-less dropship sources.
    pub external_order_id: Option<String>,

    /// Present when the connector delivered value synchronously.
    pub digital: Option<DigitalGrant>,

    /// True when an operator must confirm the order was actually placed.
    pub awaiting_manual_confirmation: bool,

    /// Charge audit record, captured once at submission.
    pub charge: Option<SupplierCharge>,
}

/// Result of a submission attempt.
///
/// The rejected/transient distinction is load-bearing: rejections are
/// terminal and never retried, transient failures retry up to the
/// dispatcher's ceiling.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// The supplier accepted the submission.
    Accepted(Acceptance),

    /// The supplier permanently rejected the submission (4xx validation,
    /// unsupported destination, unknown shipping method).
    Rejected { reason: String },

    /// The submission failed transiently (network, 5xx, rate limit).
    Transient { reason: String },
}

/// A webhook payload normalized into the shared status vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct SupplierStatusUpdate {
    pub external_order_id: String,
    pub raw_status: String,
    pub normalized: NormalizedSupplierStatus,
    pub tracking: Option<TrackingInfo>,
}

/// Contract implemented by every external supplier integration.
#[async_trait]
pub trait SupplierConnector: Send + Sync {
    /// The supplier this connector talks to.
    fn supplier(&self) -> SupplierName;

    /// Submits one item to the supplier.
    ///
    /// Safe to call at most once per attempt; the dispatcher, not the
    /// connector, enforces retry ceilings.
    async fn submit(&self, request: &SubmissionRequest) -> SubmitOutcome;

    /// Attempts to claim and normalize a raw webhook payload.
    ///
    /// Returns `None` for payloads that belong to a different integration
    /// or cannot be understood; never panics or errors, so the reconciler
    /// can probe connectors safely.
    fn normalize_webhook(&self, payload: &serde_json::Value) -> Option<SupplierStatusUpdate>;
}
