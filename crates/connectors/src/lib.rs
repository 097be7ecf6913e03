//! Supplier connector contracts and implementations.
//!
//! Every external integration implements the same [`SupplierConnector`]
//! contract: translate an internal fulfillment item into a supplier
//! submission, and normalize the supplier's webhook payloads back into the
//! shared status vocabulary. Connectors do network I/O only (through an
//! injected client trait) and hold no persistence, so each one is
//! independently testable with its in-memory client fake.

pub mod connector;
pub mod digital;
pub mod dropship;
pub mod nordica;
pub mod printling;

pub use connector::{
    Acceptance, DigitalGrant, SubmissionRequest, SubmitOutcome, SupplierConnector,
    SupplierStatusUpdate,
};
pub use digital::{
    AccessApiError, CourseAccessClient, DigitalProvisioner, GrantAck, InMemoryCourseAccessClient,
};
pub use dropship::{
    DropshipApiError, DropshipClient, DropshipConnector, DropshipSource, InMemoryDropshipClient,
};
pub use nordica::{InMemoryNordicaClient, NordicaApiError, NordicaClient, NordicaConnector};
pub use printling::{
    InMemoryPrintlingClient, PrintlingApiError, PrintlingClient, PrintlingConnector,
};
