//! Fulfillment commands.

use common::{AggregateId, ItemId, OrderNumber};

use crate::command::Command;

use super::aggregate::FulfillmentOrder;
use super::events::ItemSpec;
use super::state::NormalizedSupplierStatus;
use super::value_objects::{
    CustomerInfo, DeliveryType, NotificationKey, SupplierCharge, SupplierName, TrackingInfo,
};

macro_rules! fulfillment_command {
    ($name:ident) => {
        impl Command for $name {
            type Aggregate = FulfillmentOrder;

            fn aggregate_id(&self) -> AggregateId {
                self.order_id
            }
        }
    };
}

/// Command to record a paid order handed over by checkout.
///
/// The aggregate ID derives from the order number, so re-delivery of the
/// same intake targets the same aggregate.
#[derive(Debug, Clone)]
pub struct ReceiveOrder {
    pub order_number: OrderNumber,
    pub payment_id: String,
    pub customer: CustomerInfo,
    pub items: Vec<ItemSpec>,
}

impl ReceiveOrder {
    /// Creates a new ReceiveOrder command.
    pub fn new(
        order_number: OrderNumber,
        payment_id: impl Into<String>,
        customer: CustomerInfo,
        items: Vec<ItemSpec>,
    ) -> Self {
        Self {
            order_number,
            payment_id: payment_id.into(),
            customer,
            items,
        }
    }
}

impl Command for ReceiveOrder {
    type Aggregate = FulfillmentOrder;

    fn aggregate_id(&self) -> AggregateId {
        AggregateId::for_order(&self.order_number)
    }
}

/// Command to start a submission attempt for an item.
#[derive(Debug, Clone)]
pub struct BeginSubmission {
    pub order_id: AggregateId,
    pub item_id: ItemId,
    pub supplier: Option<SupplierName>,
}

impl BeginSubmission {
    pub fn new(order_id: AggregateId, item_id: ItemId, supplier: Option<SupplierName>) -> Self {
        Self {
            order_id,
            item_id,
            supplier,
        }
    }
}

fulfillment_command!(BeginSubmission);

/// Command to record a supplier accepting a submission.
#[derive(Debug, Clone)]
pub struct RecordAcceptance {
    pub order_id: AggregateId,
    pub item_id: ItemId,
    pub supplier: SupplierName,
    pub external_order_id: Option<String>,
    pub awaiting_manual_confirmation: bool,
    pub charge: Option<SupplierCharge>,
}

fulfillment_command!(RecordAcceptance);

/// Command to record a permanent supplier rejection.
#[derive(Debug, Clone)]
pub struct RecordRejection {
    pub order_id: AggregateId,
    pub item_id: ItemId,
    pub reason: String,
}

impl RecordRejection {
    pub fn new(order_id: AggregateId, item_id: ItemId, reason: impl Into<String>) -> Self {
        Self {
            order_id,
            item_id,
            reason: reason.into(),
        }
    }
}

fulfillment_command!(RecordRejection);

/// Command to record a transient submission failure.
#[derive(Debug, Clone)]
pub struct RecordDeferral {
    pub order_id: AggregateId,
    pub item_id: ItemId,
    pub reason: String,
}

impl RecordDeferral {
    pub fn new(order_id: AggregateId, item_id: ItemId, reason: impl Into<String>) -> Self {
        Self {
            order_id,
            item_id,
            reason: reason.into(),
        }
    }
}

fulfillment_command!(RecordDeferral);

/// Command to fail an item whose retry ceiling was reached.
#[derive(Debug, Clone)]
pub struct RecordExhaustion {
    pub order_id: AggregateId,
    pub item_id: ItemId,
    pub reason: String,
}

impl RecordExhaustion {
    pub fn new(order_id: AggregateId, item_id: ItemId, reason: impl Into<String>) -> Self {
        Self {
            order_id,
            item_id,
            reason: reason.into(),
        }
    }
}

fulfillment_command!(RecordExhaustion);

/// Command to record a digital access grant.
#[derive(Debug, Clone)]
pub struct GrantDigitalAccess {
    pub order_id: AggregateId,
    pub item_id: ItemId,
    pub delivery_type: DeliveryType,
    pub access_url: String,
    pub shared_folder_url: Option<String>,
}

fulfillment_command!(GrantDigitalAccess);

/// Command to revoke a granted digital entitlement.
#[derive(Debug, Clone)]
pub struct RevokeDigitalAccess {
    pub order_id: AggregateId,
    pub item_id: ItemId,
    pub reason: String,
}

impl RevokeDigitalAccess {
    pub fn new(order_id: AggregateId, item_id: ItemId, reason: impl Into<String>) -> Self {
        Self {
            order_id,
            item_id,
            reason: reason.into(),
        }
    }
}

fulfillment_command!(RevokeDigitalAccess);

/// Command to stage an owned-inventory item for manual shipping.
#[derive(Debug, Clone)]
pub struct MarkReadyToShip {
    pub order_id: AggregateId,
    pub item_id: ItemId,
}

impl MarkReadyToShip {
    pub fn new(order_id: AggregateId, item_id: ItemId) -> Self {
        Self { order_id, item_id }
    }
}

fulfillment_command!(MarkReadyToShip);

/// Command to record an asynchronous supplier status observation.
#[derive(Debug, Clone)]
pub struct ObserveSupplierStatus {
    pub order_id: AggregateId,
    pub item_id: ItemId,
    pub raw_status: String,
    pub normalized: NormalizedSupplierStatus,
    pub tracking: Option<TrackingInfo>,
}

fulfillment_command!(ObserveSupplierStatus);

/// Command to resolve a manual-confirmation dropship item.
#[derive(Debug, Clone)]
pub struct ConfirmManually {
    pub order_id: AggregateId,
    pub item_id: ItemId,
    pub tracking: Option<TrackingInfo>,
    pub confirmed_by: Option<String>,
}

fulfillment_command!(ConfirmManually);

/// Command to cancel an item before delivery.
#[derive(Debug, Clone)]
pub struct CancelItem {
    pub order_id: AggregateId,
    pub item_id: ItemId,
    pub reason: String,
    pub cancelled_by: Option<String>,
}

impl CancelItem {
    pub fn new(
        order_id: AggregateId,
        item_id: ItemId,
        reason: impl Into<String>,
        cancelled_by: Option<String>,
    ) -> Self {
        Self {
            order_id,
            item_id,
            reason: reason.into(),
            cancelled_by,
        }
    }
}

fulfillment_command!(CancelItem);

/// Command to record a notification send for idempotent suppression.
#[derive(Debug, Clone)]
pub struct RecordNotification {
    pub order_id: AggregateId,
    pub key: NotificationKey,
    pub recipient: String,
}

impl RecordNotification {
    pub fn new(order_id: AggregateId, key: NotificationKey, recipient: impl Into<String>) -> Self {
        Self {
            order_id,
            key,
            recipient: recipient.into(),
        }
    }
}

fulfillment_command!(RecordNotification);
