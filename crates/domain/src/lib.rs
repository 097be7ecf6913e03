//! Domain layer for the fulfillment core.
//!
//! This crate provides the core domain abstractions:
//! - Aggregate trait for event-sourced entities
//! - DomainEvent trait for domain events
//! - Command trait and CommandHandler for command processing
//! - FulfillmentOrder aggregate with per-item state machines

pub mod aggregate;
pub mod command;
pub mod error;
pub mod fulfillment;

pub use aggregate::{Aggregate, DomainEvent};
pub use command::{Command, CommandHandler, CommandResult};
pub use error::DomainError;
pub use fulfillment::{
    Currency, CustomerInfo, DeliveryType, DigitalDelivery, FulfillmentError, FulfillmentEvent,
    FulfillmentItem, FulfillmentOrder, FulfillmentService, ItemKind, ItemSpec, ItemStatus,
    NormalizedSupplierStatus, NotificationKey, NotificationKind, OrderStatus, RawStatusEntry,
    ShippingAddress, ShippingPreference, SupplierCharge, SupplierName, SupplierOrder,
    SupplierOrderStatus, TrackingInfo,
};
pub use fulfillment::commands::*;
