//! Fulfillment service providing a simplified API for order operations.

use common::AggregateId;
use event_store::EventStore;

use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::aggregate::FulfillmentOrder;
use super::commands::{
    BeginSubmission, CancelItem, ConfirmManually, GrantDigitalAccess, MarkReadyToShip,
    ObserveSupplierStatus, ReceiveOrder, RecordAcceptance, RecordDeferral, RecordExhaustion,
    RecordNotification, RecordRejection, RevokeDigitalAccess,
};

impl From<super::FulfillmentError> for DomainError {
    fn from(e: super::FulfillmentError) -> Self {
        DomainError::Fulfillment(e)
    }
}

/// Service for mutating and loading fulfillment orders.
///
/// Wraps the command handler; every mutation goes through a single
/// optimistic-append critical section per order.
pub struct FulfillmentService<S: EventStore> {
    handler: CommandHandler<S, FulfillmentOrder>,
}

impl<S: EventStore> FulfillmentService<S> {
    /// Creates a new fulfillment service with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, FulfillmentOrder> {
        &self.handler
    }

    /// Records a paid order handed over by checkout.
    #[tracing::instrument(skip(self, cmd), fields(order_number = %cmd.order_number))]
    pub async fn receive_order(
        &self,
        cmd: ReceiveOrder,
    ) -> Result<CommandResult<FulfillmentOrder>, DomainError> {
        metrics::counter!("fulfillment_orders_total").increment(1);
        let order_id = AggregateId::for_order(&cmd.order_number);
        let ReceiveOrder {
            order_number,
            payment_id,
            customer,
            items,
        } = cmd;

        self.handler
            .execute(order_id, |order| {
                order.receive(order_number, payment_id, customer, items)
            })
            .await
    }

    /// Starts a submission attempt for an item.
    #[tracing::instrument(skip(self))]
    pub async fn begin_submission(
        &self,
        cmd: BeginSubmission,
    ) -> Result<CommandResult<FulfillmentOrder>, DomainError> {
        self.handler
            .execute(cmd.order_id, |order| {
                order.begin_submission(cmd.item_id, cmd.supplier)
            })
            .await
    }

    /// Records a supplier accepting a submission.
    #[tracing::instrument(skip(self))]
    pub async fn record_acceptance(
        &self,
        cmd: RecordAcceptance,
    ) -> Result<CommandResult<FulfillmentOrder>, DomainError> {
        let RecordAcceptance {
            order_id,
            item_id,
            supplier,
            external_order_id,
            awaiting_manual_confirmation,
            charge,
        } = cmd;

        self.handler
            .execute(order_id, |order| {
                order.record_acceptance(
                    item_id,
                    supplier,
                    external_order_id,
                    awaiting_manual_confirmation,
                    charge,
                )
            })
            .await
    }

    /// Records a permanent supplier rejection.
    #[tracing::instrument(skip(self))]
    pub async fn record_rejection(
        &self,
        cmd: RecordRejection,
    ) -> Result<CommandResult<FulfillmentOrder>, DomainError> {
        self.handler
            .execute(cmd.order_id, |order| {
                order.record_rejection(cmd.item_id, cmd.reason)
            })
            .await
    }

    /// Records a transient submission failure.
    #[tracing::instrument(skip(self))]
    pub async fn record_deferral(
        &self,
        cmd: RecordDeferral,
    ) -> Result<CommandResult<FulfillmentOrder>, DomainError> {
        self.handler
            .execute(cmd.order_id, |order| {
                order.record_deferral(cmd.item_id, cmd.reason)
            })
            .await
    }

    /// Fails an item whose retry ceiling was reached.
    #[tracing::instrument(skip(self))]
    pub async fn record_exhaustion(
        &self,
        cmd: RecordExhaustion,
    ) -> Result<CommandResult<FulfillmentOrder>, DomainError> {
        self.handler
            .execute(cmd.order_id, |order| {
                order.record_exhaustion(cmd.item_id, cmd.reason)
            })
            .await
    }

    /// Records a digital access grant.
    #[tracing::instrument(skip(self))]
    pub async fn grant_digital_access(
        &self,
        cmd: GrantDigitalAccess,
    ) -> Result<CommandResult<FulfillmentOrder>, DomainError> {
        self.handler
            .execute(cmd.order_id, |order| {
                order.record_digital_grant(
                    cmd.item_id,
                    cmd.delivery_type,
                    cmd.access_url,
                    cmd.shared_folder_url,
                )
            })
            .await
    }

    /// Revokes a granted digital entitlement.
    #[tracing::instrument(skip(self))]
    pub async fn revoke_digital_access(
        &self,
        cmd: RevokeDigitalAccess,
    ) -> Result<CommandResult<FulfillmentOrder>, DomainError> {
        self.handler
            .execute(cmd.order_id, |order| {
                order.revoke_digital(cmd.item_id, cmd.reason)
            })
            .await
    }

    /// Stages an owned-inventory item for manual shipping.
    #[tracing::instrument(skip(self))]
    pub async fn mark_ready_to_ship(
        &self,
        cmd: MarkReadyToShip,
    ) -> Result<CommandResult<FulfillmentOrder>, DomainError> {
        self.handler
            .execute(cmd.order_id, |order| order.mark_ready_to_ship(cmd.item_id))
            .await
    }

    /// Records an asynchronous supplier status observation.
    #[tracing::instrument(skip(self), fields(raw_status = %cmd.raw_status))]
    pub async fn observe_supplier_status(
        &self,
        cmd: ObserveSupplierStatus,
    ) -> Result<CommandResult<FulfillmentOrder>, DomainError> {
        self.handler
            .execute(cmd.order_id, |order| {
                order.observe_supplier_status(
                    cmd.item_id,
                    cmd.raw_status,
                    cmd.normalized,
                    cmd.tracking,
                )
            })
            .await
    }

    /// Resolves a manual-confirmation dropship item.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_manually(
        &self,
        cmd: ConfirmManually,
    ) -> Result<CommandResult<FulfillmentOrder>, DomainError> {
        self.handler
            .execute(cmd.order_id, |order| {
                order.confirm_manually(cmd.item_id, cmd.tracking, cmd.confirmed_by)
            })
            .await
    }

    /// Cancels an item before delivery.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_item(
        &self,
        cmd: CancelItem,
    ) -> Result<CommandResult<FulfillmentOrder>, DomainError> {
        self.handler
            .execute(cmd.order_id, |order| {
                order.cancel_item(cmd.item_id, cmd.reason, cmd.cancelled_by)
            })
            .await
    }

    /// Records a notification send for idempotent suppression.
    #[tracing::instrument(skip(self))]
    pub async fn record_notification(
        &self,
        cmd: RecordNotification,
    ) -> Result<CommandResult<FulfillmentOrder>, DomainError> {
        self.handler
            .execute(cmd.order_id, |order| {
                order.record_notification(cmd.key, cmd.recipient)
            })
            .await
    }

    /// Loads an order by aggregate ID.
    ///
    /// Returns None if the order doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(
        &self,
        order_id: AggregateId,
    ) -> Result<Option<FulfillmentOrder>, DomainError> {
        self.handler.load_existing(order_id).await
    }

    /// Loads an order by its order number.
    #[tracing::instrument(skip(self))]
    pub async fn get_order_by_number(
        &self,
        order_number: &common::OrderNumber,
    ) -> Result<Option<FulfillmentOrder>, DomainError> {
        self.get_order(AggregateId::for_order(order_number)).await
    }
}
