//! Webhook/callback reconciler.
//!
//! Receives raw supplier payloads, finds the connector that claims them,
//! resolves the supplier order through the read-model index, and applies
//! the observation to the order aggregate. Unclaimed or unmatched payloads
//! are logged and dropped; foreign webhooks are not this system's problem
//! to resolve.

use std::sync::Arc;
use std::time::Duration;

use common::{ItemId, OrderNumber};
use connectors::SupplierStatusUpdate;
use domain::{
    FulfillmentEvent, FulfillmentService, NormalizedSupplierStatus, NotificationKind,
    ObserveSupplierStatus, OrderStatus, SupplierName, TrackingInfo,
};
use event_store::EventStore;
use projections::{ProjectionProcessor, SupplierOrderIndex, SupplierRef};

use crate::error::DispatchError;
use crate::notifier::{EmailPayload, Mailer, NotificationEmitter};
use crate::registry::ConnectorRegistry;

/// What happened to an ingested webhook payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// The observation was recorded against an item.
    Applied {
        order_number: OrderNumber,
        item_id: ItemId,
        /// Whether the observation advanced the recorded status.
        advanced: bool,
    },

    /// Exact duplicate of an already-logged observation; nothing changed.
    Duplicate {
        order_number: OrderNumber,
        item_id: ItemId,
    },

    /// No registered connector claimed the payload.
    Unclaimed,

    /// The external order ID matched nothing, even after buffered retries.
    UnknownOrder { external_order_id: String },
}

/// Ingests asynchronous supplier status pushes.
pub struct WebhookReconciler<S, M>
where
    S: EventStore + Clone,
    M: Mailer,
{
    service: FulfillmentService<S>,
    emitter: NotificationEmitter<S, M>,
    connectors: ConnectorRegistry,
    index: Arc<SupplierOrderIndex>,
    processor: Arc<ProjectionProcessor<S>>,
    /// Backoff schedule for index lookups racing the submission ack.
    lookup_delays: Vec<Duration>,
}

impl<S, M> WebhookReconciler<S, M>
where
    S: EventStore + Clone,
    M: Mailer,
{
    /// Creates a new reconciler.
    pub fn new(
        store: S,
        connectors: ConnectorRegistry,
        index: Arc<SupplierOrderIndex>,
        processor: Arc<ProjectionProcessor<S>>,
        mailer: M,
    ) -> Self {
        let service = FulfillmentService::new(store.clone());
        let emitter = NotificationEmitter::new(store, mailer);
        Self {
            service,
            emitter,
            connectors,
            index,
            processor,
            lookup_delays: vec![
                Duration::from_millis(50),
                Duration::from_millis(100),
                Duration::from_millis(200),
            ],
        }
    }

    /// Overrides the lookup backoff schedule.
    pub fn with_lookup_delays(mut self, delays: Vec<Duration>) -> Self {
        self.lookup_delays = delays;
        self
    }

    /// Ingests one raw webhook payload.
    #[tracing::instrument(skip(self, payload))]
    pub async fn ingest(
        &self,
        payload: &serde_json::Value,
    ) -> Result<ReconcileOutcome, DispatchError> {
        metrics::counter!("supplier_webhooks_total").increment(1);

        let Some((supplier, update)) = self.claim(payload) else {
            metrics::counter!("supplier_webhooks_unclaimed_total").increment(1);
            tracing::warn!("webhook claimed by no connector, dropping");
            return Ok(ReconcileOutcome::Unclaimed);
        };

        tracing::debug!(
            supplier = %supplier,
            external_order_id = %update.external_order_id,
            raw_status = %update.raw_status,
            "webhook claimed"
        );

        let Some(supplier_ref) = self.lookup_with_retry(&update.external_order_id).await? else {
            metrics::counter!("supplier_webhooks_unmatched_total").increment(1);
            tracing::warn!(
                external_order_id = %update.external_order_id,
                "webhook references unknown supplier order, dropping"
            );
            return Ok(ReconcileOutcome::UnknownOrder {
                external_order_id: update.external_order_id,
            });
        };

        self.apply(supplier_ref, update).await
    }

    /// Probes each registered connector until one claims the payload.
    fn claim(&self, payload: &serde_json::Value) -> Option<(SupplierName, SupplierStatusUpdate)> {
        self.connectors.all().find_map(|connector| {
            connector
                .normalize_webhook(payload)
                .map(|update| (connector.supplier(), update))
        })
    }

    /// Looks up the supplier order, retrying briefly in case the webhook
    /// raced the synchronous submission ack.
    async fn lookup_with_retry(
        &self,
        external_order_id: &str,
    ) -> Result<Option<SupplierRef>, DispatchError> {
        self.processor.run_catch_up().await?;
        if let Some(found) = self.index.lookup(external_order_id).await {
            return Ok(Some(found));
        }

        for delay in &self.lookup_delays {
            tokio::time::sleep(*delay).await;
            self.processor.run_catch_up().await?;
            if let Some(found) = self.index.lookup(external_order_id).await {
                return Ok(Some(found));
            }
        }

        Ok(None)
    }

    async fn apply(
        &self,
        supplier_ref: SupplierRef,
        update: SupplierStatusUpdate,
    ) -> Result<ReconcileOutcome, DispatchError> {
        let SupplierRef {
            order_id,
            order_number,
            item_id,
            ..
        } = supplier_ref;

        let result = self
            .service
            .observe_supplier_status(ObserveSupplierStatus {
                order_id,
                item_id,
                raw_status: update.raw_status.clone(),
                normalized: update.normalized,
                tracking: update.tracking.clone(),
            })
            .await?;

        if result.events.is_empty() {
            tracing::debug!(
                %order_number,
                item = %item_id,
                raw_status = %update.raw_status,
                "duplicate webhook, no-op"
            );
            return Ok(ReconcileOutcome::Duplicate {
                order_number,
                item_id,
            });
        }

        let advanced = result.events.iter().any(|event| {
            matches!(
                event,
                FulfillmentEvent::SupplierStatusObserved(data) if data.advanced
            )
        });

        if advanced {
            let order = &result.aggregate;
            match update.normalized {
                NormalizedSupplierStatus::Shipped => {
                    self.emitter
                        .emit(
                            order,
                            NotificationKind::ItemShipped,
                            Some(item_id),
                            EmailPayload::Tracking(update.tracking.unwrap_or_else(TrackingInfo::default)),
                        )
                        .await?;
                }
                NormalizedSupplierStatus::Delivered => {
                    self.emitter
                        .emit(
                            order,
                            NotificationKind::ItemDelivered,
                            Some(item_id),
                            EmailPayload::None,
                        )
                        .await?;
                }
                NormalizedSupplierStatus::Cancelled => {
                    if order.is_settled() && order.status() == OrderStatus::Failed {
                        self.emitter
                            .emit(order, NotificationKind::OrderFailed, None, EmailPayload::None)
                            .await?;
                    }
                }
                NormalizedSupplierStatus::Accepted | NormalizedSupplierStatus::InProduction => {}
            }
        }

        Ok(ReconcileOutcome::Applied {
            order_number,
            item_id,
            advanced,
        })
    }
}
