//! Fulfillment dispatcher.
//!
//! Classifies intake line items, drives each through its supplier
//! connector, and aggregates item outcomes into order state. Item
//! submissions within one order run sequentially: every transition is an
//! optimistic-append critical section on the order aggregate, so a
//! concurrent webhook cannot race a retry into stale state.

use common::{AggregateId, ItemId, OrderNumber};
use connectors::{SubmissionRequest, SubmitOutcome};
use domain::{
    BeginSubmission, CancelItem, ConfirmManually, CustomerInfo, DeliveryType, DomainError,
    FulfillmentError, FulfillmentOrder, FulfillmentService, GrantDigitalAccess, ItemKind,
    ItemSpec, MarkReadyToShip, NotificationKind, OrderStatus, ReceiveOrder, RecordAcceptance,
    RecordDeferral, RecordExhaustion, RecordRejection, RevokeDigitalAccess, ShippingAddress,
    ShippingPreference, TrackingInfo,
};
use event_store::EventStore;

use crate::error::DispatchError;
use crate::notifier::{EmailPayload, Mailer, NotificationEmitter};
use crate::registry::ConnectorRegistry;
use crate::retry::RetryPolicy;

/// One line of the order-intake call from checkout.
#[derive(Debug, Clone)]
pub struct IntakeLine {
    pub product_ref: String,
    pub product_name: String,
    pub quantity: u32,
    pub kind_hint: String,
    pub shipping_address: Option<ShippingAddress>,
    pub shipping_preference: Option<ShippingPreference>,
}

/// The order-intake call: a finalized paid order handed over by checkout.
///
/// Payment authorization/capture happened upstream; `payment_id` is an
/// immutable fact here.
#[derive(Debug, Clone)]
pub struct OrderIntake {
    pub order_number: OrderNumber,
    pub payment_id: String,
    pub customer: CustomerInfo,
    pub items: Vec<IntakeLine>,
}

/// Orchestrates fulfillment of paid orders.
pub struct FulfillmentDispatcher<S, M>
where
    S: EventStore + Clone,
    M: Mailer,
{
    service: FulfillmentService<S>,
    emitter: NotificationEmitter<S, M>,
    connectors: ConnectorRegistry,
    policy: RetryPolicy,
}

impl<S, M> FulfillmentDispatcher<S, M>
where
    S: EventStore + Clone,
    M: Mailer,
{
    /// Creates a new dispatcher.
    pub fn new(store: S, connectors: ConnectorRegistry, mailer: M, policy: RetryPolicy) -> Self {
        let service = FulfillmentService::new(store.clone());
        let emitter = NotificationEmitter::new(store, mailer);
        Self {
            service,
            emitter,
            connectors,
            policy,
        }
    }

    /// Records a paid order and drives every item to its first outcome.
    ///
    /// Idempotent on order number: re-delivery of the same intake returns
    /// the existing order instead of creating a duplicate. Connector
    /// failures never escape; they surface only through the read model.
    #[tracing::instrument(skip(self, intake), fields(order_number = %intake.order_number))]
    pub async fn process_intake(&self, intake: OrderIntake) -> Result<AggregateId, DispatchError> {
        let order_id = self.intake(intake).await?;
        self.run_order(order_id).await?;
        Ok(order_id)
    }

    /// Records a paid order as queued without driving submissions.
    #[tracing::instrument(skip(self, intake), fields(order_number = %intake.order_number))]
    pub async fn intake(&self, intake: OrderIntake) -> Result<AggregateId, DispatchError> {
        if intake.items.is_empty() {
            return Err(DispatchError::EmptyOrder);
        }

        let specs = classify(&intake)?;
        let order_id = AggregateId::for_order(&intake.order_number);

        match self
            .service
            .receive_order(ReceiveOrder::new(
                intake.order_number.clone(),
                intake.payment_id,
                intake.customer,
                specs,
            ))
            .await
        {
            Ok(_) => {}
            Err(e) if is_duplicate_intake(&e) => {
                metrics::counter!("fulfillment_intake_duplicates_total").increment(1);
                tracing::info!("duplicate intake, returning existing order");
                return Ok(order_id);
            }
            Err(e) => return Err(e.into()),
        }

        // Order confirmation strictly precedes any item-level notification.
        let order = self.load(order_id).await?;
        self.emitter
            .emit(&order, NotificationKind::OrderConfirmed, None, EmailPayload::None)
            .await?;

        Ok(order_id)
    }

    /// Drives every non-terminal queued item of an order to an outcome.
    #[tracing::instrument(skip(self))]
    pub async fn run_order(&self, order_id: AggregateId) -> Result<(), DispatchError> {
        let started = std::time::Instant::now();

        let order = self.load(order_id).await?;
        let item_ids: Vec<ItemId> = order.items().map(|item| item.item_id).collect();

        for item_id in item_ids {
            self.drive_item(order_id, item_id).await?;
        }

        // Order-level failure surfaces exactly once, after every item is
        // terminal.
        let order = self.load(order_id).await?;
        if order.is_settled() && order.status() == OrderStatus::Failed {
            self.emitter
                .emit(&order, NotificationKind::OrderFailed, None, EmailPayload::None)
                .await?;
        }

        metrics::histogram!("dispatch_duration_seconds").record(started.elapsed().as_secs_f64());
        Ok(())
    }

    /// Drives a single item until it is terminal or waiting on a supplier.
    async fn drive_item(&self, order_id: AggregateId, item_id: ItemId) -> Result<(), DispatchError> {
        loop {
            let order = self.load(order_id).await?;
            let Some(item) = order.item(item_id) else {
                return Err(DispatchError::Domain(DomainError::Fulfillment(
                    FulfillmentError::ItemNotFound { item_id },
                )));
            };

            if !item.status.can_submit() {
                return Ok(());
            }

            if item.attempts >= self.policy.max_attempts {
                let reason = format!(
                    "retry ceiling reached after {} attempts: {}",
                    item.attempts,
                    item.last_error.as_deref().unwrap_or("transient failure")
                );
                let result = self
                    .service
                    .record_exhaustion(RecordExhaustion::new(order_id, item_id, reason.clone()))
                    .await?;
                tracing::warn!(%order_id, item = %item_id, "item failed: retry ceiling reached");
                self.emitter
                    .emit(
                        &result.aggregate,
                        NotificationKind::ItemFailed,
                        Some(item_id),
                        EmailPayload::Failure { reason },
                    )
                    .await?;
                return Ok(());
            }

            if item.attempts > 0 {
                tokio::time::sleep(self.policy.backoff_delay(item.attempts)).await;
            }

            let kind = item.kind;
            let result = self
                .service
                .begin_submission(BeginSubmission::new(order_id, item_id, kind.supplier()))
                .await?;
            let order = result.aggregate;

            if kind == ItemKind::OwnedInventory {
                // No external supplier: the item is staged for manual
                // shipping and terminal immediately.
                let result = self
                    .service
                    .mark_ready_to_ship(MarkReadyToShip::new(order_id, item_id))
                    .await?;
                self.emitter
                    .emit(
                        &result.aggregate,
                        NotificationKind::ItemFulfilled,
                        Some(item_id),
                        EmailPayload::None,
                    )
                    .await?;
                return Ok(());
            }

            let supplier = kind
                .supplier()
                .ok_or(DispatchError::NoConnector { kind })?;
            let connector = self
                .connectors
                .for_supplier(supplier)
                .ok_or(DispatchError::NoConnector { kind })?;

            let request = build_request(&order, item_id)?;
            metrics::counter!("item_submissions_total").increment(1);

            let outcome =
                match tokio::time::timeout(self.policy.submit_timeout, connector.submit(&request))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => SubmitOutcome::Transient {
                        reason: format!("submission timed out after {:?}", self.policy.submit_timeout),
                    },
                };

            match outcome {
                SubmitOutcome::Accepted(acceptance) => {
                    if let Some(grant) = acceptance.digital {
                        let result = self
                            .service
                            .grant_digital_access(GrantDigitalAccess {
                                order_id,
                                item_id,
                                delivery_type: grant.delivery_type,
                                access_url: grant.access_url.clone(),
                                shared_folder_url: grant.shared_folder_url,
                            })
                            .await?;
                        let kind = match grant.delivery_type {
                            DeliveryType::Subscription => NotificationKind::SubscriptionActivated,
                            DeliveryType::CourseAccess => NotificationKind::CourseAccess,
                            DeliveryType::Download => NotificationKind::ItemFulfilled,
                        };
                        self.emitter
                            .emit(
                                &result.aggregate,
                                kind,
                                Some(item_id),
                                EmailPayload::Digital {
                                    access_url: grant.access_url,
                                },
                            )
                            .await?;
                    } else {
                        self.service
                            .record_acceptance(RecordAcceptance {
                                order_id,
                                item_id,
                                supplier,
                                external_order_id: acceptance.external_order_id,
                                awaiting_manual_confirmation: acceptance
                                    .awaiting_manual_confirmation,
                                charge: acceptance.charge,
                            })
                            .await?;
                        if acceptance.awaiting_manual_confirmation {
                            tracing::info!(
                                %order_id,
                                item = %item_id,
                                "item waiting on manual confirmation"
                            );
                        }
                    }
                    return Ok(());
                }
                SubmitOutcome::Rejected { reason } => {
                    let result = self
                        .service
                        .record_rejection(RecordRejection::new(order_id, item_id, reason.clone()))
                        .await?;
                    tracing::warn!(%order_id, item = %item_id, %reason, "submission rejected");
                    self.emitter
                        .emit(
                            &result.aggregate,
                            NotificationKind::ItemFailed,
                            Some(item_id),
                            EmailPayload::Failure { reason },
                        )
                        .await?;
                    return Ok(());
                }
                SubmitOutcome::Transient { reason } => {
                    tracing::info!(%order_id, item = %item_id, %reason, "transient failure, will retry");
                    self.service
                        .record_deferral(RecordDeferral::new(order_id, item_id, reason))
                        .await?;
                    // Loop: the ceiling check at the top decides whether to
                    // retry or exhaust.
                }
            }
        }
    }

    /// Operator confirmation of an API-less dropship item.
    #[tracing::instrument(skip(self, tracking))]
    pub async fn confirm_item(
        &self,
        order_number: &OrderNumber,
        item_id: ItemId,
        tracking: Option<TrackingInfo>,
        confirmed_by: Option<String>,
    ) -> Result<(), DispatchError> {
        let order_id = AggregateId::for_order(order_number);
        let has_tracking = tracking.as_ref().is_some_and(|t| !t.is_empty());
        let result = self
            .service
            .confirm_manually(ConfirmManually {
                order_id,
                item_id,
                tracking: tracking.clone(),
                confirmed_by,
            })
            .await?;

        if has_tracking && let Some(tracking) = tracking {
            self.emitter
                .emit(
                    &result.aggregate,
                    NotificationKind::ItemShipped,
                    Some(item_id),
                    EmailPayload::Tracking(tracking),
                )
                .await?;
        }
        Ok(())
    }

    /// Revokes a granted digital entitlement (refund / chargeback path).
    #[tracing::instrument(skip(self))]
    pub async fn revoke_digital(
        &self,
        order_number: &OrderNumber,
        item_id: ItemId,
        reason: impl Into<String> + std::fmt::Debug,
    ) -> Result<(), DispatchError> {
        let order_id = AggregateId::for_order(order_number);
        self.service
            .revoke_digital_access(RevokeDigitalAccess::new(order_id, item_id, reason))
            .await?;
        Ok(())
    }

    /// Cancels an item before delivery.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_item(
        &self,
        order_number: &OrderNumber,
        item_id: ItemId,
        reason: impl Into<String> + std::fmt::Debug,
        cancelled_by: Option<String>,
    ) -> Result<(), DispatchError> {
        let order_id = AggregateId::for_order(order_number);
        let result = self
            .service
            .cancel_item(CancelItem::new(order_id, item_id, reason, cancelled_by))
            .await?;

        let order = result.aggregate;
        if order.is_settled() && order.status() == OrderStatus::Failed {
            self.emitter
                .emit(&order, NotificationKind::OrderFailed, None, EmailPayload::None)
                .await?;
        }
        Ok(())
    }

    async fn load(&self, order_id: AggregateId) -> Result<FulfillmentOrder, DispatchError> {
        self.service
            .get_order(order_id)
            .await?
            .ok_or(DispatchError::OrderNotFound(order_id))
    }
}

fn classify(intake: &OrderIntake) -> Result<Vec<ItemSpec>, DispatchError> {
    intake
        .items
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let kind =
                ItemKind::from_hint(&line.kind_hint).ok_or_else(|| DispatchError::UnknownKind {
                    hint: line.kind_hint.clone(),
                })?;
            Ok(ItemSpec {
                item_id: ItemId::new(index as u32),
                kind,
                product_ref: line.product_ref.clone(),
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                shipping_address: line.shipping_address.clone(),
                shipping_preference: line.shipping_preference.unwrap_or_default(),
            })
        })
        .collect()
}

fn is_duplicate_intake(error: &DomainError) -> bool {
    matches!(
        error,
        DomainError::Fulfillment(FulfillmentError::AlreadyReceived)
    ) || error.is_concurrency_conflict()
}

fn build_request(
    order: &FulfillmentOrder,
    item_id: ItemId,
) -> Result<SubmissionRequest, DispatchError> {
    let item = order
        .item(item_id)
        .ok_or(DispatchError::Domain(DomainError::Fulfillment(
            FulfillmentError::ItemNotFound { item_id },
        )))?;
    let customer = order
        .customer()
        .cloned()
        .ok_or(DispatchError::Domain(DomainError::Fulfillment(
            FulfillmentError::NotReceived,
        )))?;
    let order_number = order
        .order_number()
        .cloned()
        .ok_or(DispatchError::Domain(DomainError::Fulfillment(
            FulfillmentError::NotReceived,
        )))?;

    Ok(SubmissionRequest {
        order_number,
        item_id,
        kind: item.kind,
        product_ref: item.product_ref.clone(),
        product_name: item.product_name.clone(),
        quantity: item.quantity,
        shipping_address: item.shipping_address.clone(),
        shipping_preference: item.shipping_preference,
        customer,
    })
}
