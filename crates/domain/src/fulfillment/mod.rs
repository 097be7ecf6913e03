//! Fulfillment order aggregate and related types.

mod aggregate;
pub mod commands;
mod entities;
mod events;
mod service;
mod state;
mod value_objects;

pub use aggregate::FulfillmentOrder;
pub use entities::{DigitalDelivery, FulfillmentItem, RawStatusEntry, SupplierOrder};
pub use events::{
    DigitalAccessGrantedData, DigitalAccessRevokedData, FulfillmentEvent, ItemCancelledData,
    ItemSpec, ManuallyConfirmedData, MarkedReadyToShipData, NotificationRecordedData,
    OrderReceivedData, SubmissionAcceptedData, SubmissionDeferredData, SubmissionExhaustedData,
    SubmissionRejectedData, SubmissionStartedData, SupplierStatusObservedData,
};
pub use service::FulfillmentService;
pub use state::{ItemStatus, NormalizedSupplierStatus, OrderStatus, SupplierOrderStatus};
pub use value_objects::{
    Currency, CustomerInfo, DeliveryType, ItemKind, NotificationKey, NotificationKind,
    ShippingAddress, ShippingPreference, SupplierCharge, SupplierName, TrackingInfo,
};

use common::ItemId;
use thiserror::Error;

/// Errors that can occur during fulfillment order operations.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// The order was already received; intake is idempotent on order number.
    #[error("Order already received")]
    AlreadyReceived,

    /// No order has been received yet for this aggregate.
    #[error("Order not received")]
    NotReceived,

    /// The intake carried no line items.
    #[error("Order has no items")]
    NoItems,

    /// The intake carried an empty order number.
    #[error("Order number must not be empty")]
    EmptyOrderNumber,

    /// A line item had an invalid quantity.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Item not found in the order.
    #[error("Item not found: {item_id}")]
    ItemNotFound { item_id: ItemId },

    /// The item is not in the expected state for this transition.
    #[error("Invalid state transition: cannot {action} from {current_status} status")]
    InvalidStateTransition {
        current_status: ItemStatus,
        action: &'static str,
    },

    /// The item has no supplier order to reconcile against.
    #[error("Item {item_id} has no supplier order")]
    NoSupplierOrder { item_id: ItemId },

    /// The item has no digital delivery to revoke.
    #[error("Item {item_id} has no digital delivery")]
    NoDigitalDelivery { item_id: ItemId },

    /// The item is not waiting for manual confirmation.
    #[error("Item {item_id} is not awaiting manual confirmation")]
    NotAwaitingConfirmation { item_id: ItemId },
}
