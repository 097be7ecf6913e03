//! Notification emitter.
//!
//! Sends exactly one transactional message per user-visible transition.
//! The suppression key is recorded on the order aggregate first; the
//! transport send happens only when the key was newly recorded, and a
//! transport failure never rolls back fulfillment state.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{ItemId, OrderNumber};
use domain::{
    Aggregate, FulfillmentOrder, FulfillmentService, NotificationKey, NotificationKind,
    RecordNotification, TrackingInfo,
};
use event_store::EventStore;
use thiserror::Error;

use crate::error::DispatchError;

/// One line item summarized for an email template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailLineItem {
    pub product_name: String,
    pub quantity: u32,
}

/// The shipping-or-digital payload attached to a message.
#[derive(Debug, Clone, PartialEq)]
pub enum EmailPayload {
    None,
    Tracking(TrackingInfo),
    Digital { access_url: String },
    Failure { reason: String },
}

/// A typed transactional message handed to the email transport.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub recipient: String,
    pub template: NotificationKind,
    pub order_number: OrderNumber,
    pub items: Vec<EmailLineItem>,
    pub payload: EmailPayload,
}

/// Errors the email transport can return.
#[derive(Debug, Error)]
pub enum MailerError {
    /// The transport failed to accept the message.
    #[error("mail transport error: {0}")]
    Transport(String),
}

/// Outbound transactional email transport.
///
/// The transport (templates, provider) is an external collaborator; the
/// core's contract with it is "send this typed message once".
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends a single transactional message.
    async fn send(&self, email: OutboundEmail) -> Result<(), MailerError>;
}

#[derive(Debug, Default)]
struct InMemoryMailerState {
    sent: Vec<OutboundEmail>,
    fail_on_send: bool,
}

/// In-memory mailer for testing and default wiring.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMailer {
    state: Arc<RwLock<InMemoryMailerState>>,
}

impl InMemoryMailer {
    /// Creates a new in-memory mailer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the mailer to fail on subsequent sends.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.state.write().unwrap().fail_on_send = fail;
    }

    /// Returns all messages sent so far.
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.state.read().unwrap().sent.clone()
    }

    /// Returns the number of messages sent.
    pub fn sent_count(&self) -> usize {
        self.state.read().unwrap().sent.len()
    }

    /// Returns the number of messages sent with the given template.
    pub fn sent_count_of(&self, template: NotificationKind) -> usize {
        self.state
            .read()
            .unwrap()
            .sent
            .iter()
            .filter(|email| email.template == template)
            .count()
    }
}

#[async_trait]
impl Mailer for InMemoryMailer {
    async fn send(&self, email: OutboundEmail) -> Result<(), MailerError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_send {
            return Err(MailerError::Transport("smtp refused".to_string()));
        }
        state.sent.push(email);
        Ok(())
    }
}

/// Emits user-visible notifications with idempotent suppression.
pub struct NotificationEmitter<S: EventStore, M: Mailer> {
    service: FulfillmentService<S>,
    mailer: M,
}

impl<S: EventStore, M: Mailer> NotificationEmitter<S, M> {
    /// Creates a new emitter over the given store and transport.
    pub fn new(store: S, mailer: M) -> Self {
        Self {
            service: FulfillmentService::new(store),
            mailer,
        }
    }

    /// Emits one notification for a transition, suppressing duplicates.
    ///
    /// Returns true if this call recorded (and attempted to send) the
    /// notification, false if it was already recorded for this transition.
    /// Transport failures are logged and swallowed: notification delivery
    /// is best-effort and decoupled from fulfillment correctness.
    #[tracing::instrument(skip(self, order, payload), fields(kind = %kind))]
    pub async fn emit(
        &self,
        order: &FulfillmentOrder,
        kind: NotificationKind,
        item: Option<ItemId>,
        payload: EmailPayload,
    ) -> Result<bool, DispatchError> {
        let Some(order_id) = order.id() else {
            return Err(DispatchError::Domain(domain::DomainError::Fulfillment(
                domain::FulfillmentError::NotReceived,
            )));
        };
        let recipient = order
            .customer()
            .map(|customer| customer.email.clone())
            .unwrap_or_default();

        let key = NotificationKey { kind, item };
        let result = self
            .service
            .record_notification(RecordNotification::new(order_id, key, recipient.clone()))
            .await?;

        if result.events.is_empty() {
            tracing::debug!("notification already recorded for this transition, suppressing");
            return Ok(false);
        }

        let items: Vec<EmailLineItem> = order
            .items()
            .filter(|line| item.is_none_or(|wanted| line.item_id == wanted))
            .map(|line| EmailLineItem {
                product_name: line.product_name.clone(),
                quantity: line.quantity,
            })
            .collect();

        let email = OutboundEmail {
            recipient,
            template: kind,
            order_number: order
                .order_number()
                .cloned()
                .unwrap_or_else(|| OrderNumber::new("")),
            items,
            payload,
        };

        match self.mailer.send(email).await {
            Ok(()) => {
                metrics::counter!("notifications_sent_total").increment(1);
            }
            Err(e) => {
                // Best-effort: the state change stands, the message can be
                // re-sent through the transport's own retry path.
                metrics::counter!("notifications_failed_total").increment(1);
                tracing::warn!(error = %e, "notification send failed, fulfillment state unaffected");
            }
        }

        Ok(true)
    }
}
