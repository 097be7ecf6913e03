//! Append-only event persistence with optimistic concurrency.
//!
//! Every mutation of a fulfillment order is recorded as an event; the
//! store enforces per-aggregate version expectations so that concurrent
//! writers (a retry attempt and a late webhook, say) cannot both apply
//! stale transitions.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream};
