//! Read models and projections for the fulfillment query side.
//!
//! The storefront "order status" view, the reconciler's supplier-order
//! index, and the operational attention queue are all projections folded
//! from the fulfillment event stream; consumers never mutate them.

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::attention::{AttentionEntry, AttentionQueueView, AttentionReason};
pub use views::order_status::{ItemStatusSummary, OrderStatusSummary, OrderStatusView};
pub use views::supplier_index::{SupplierOrderIndex, SupplierRef};
