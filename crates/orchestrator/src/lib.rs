//! Fulfillment orchestration.
//!
//! The dispatcher turns a paid order into per-item submissions against the
//! supplier connectors; the reconciler feeds asynchronous supplier webhooks
//! back into order state; the notification emitter sends exactly one
//! transactional message per user-visible transition.

pub mod dispatcher;
pub mod error;
pub mod notifier;
pub mod reconciler;
pub mod registry;
pub mod retry;

pub use dispatcher::{FulfillmentDispatcher, IntakeLine, OrderIntake};
pub use error::DispatchError;
pub use notifier::{
    EmailLineItem, EmailPayload, InMemoryMailer, Mailer, MailerError, NotificationEmitter,
    OutboundEmail,
};
pub use reconciler::{ReconcileOutcome, WebhookReconciler};
pub use registry::ConnectorRegistry;
pub use retry::RetryPolicy;
