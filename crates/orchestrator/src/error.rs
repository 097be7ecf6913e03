//! Orchestration error types.

use common::AggregateId;
use domain::{DomainError, ItemKind};
use projections::ProjectionError;
use thiserror::Error;

/// Errors that can occur during dispatch and reconciliation.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Domain error (state machine, event store).
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Projection error while catching read models up.
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// The intake carried a kind hint the catalog does not know.
    #[error("Unknown item kind hint: {hint}")]
    UnknownKind { hint: String },

    /// The intake carried no line items.
    #[error("Intake has no items")]
    EmptyOrder,

    /// No connector is registered for the item's supplier.
    #[error("No connector registered for {kind} items")]
    NoConnector { kind: ItemKind },

    /// The order does not exist.
    #[error("Fulfillment order not found: {0}")]
    OrderNotFound(AggregateId),
}
