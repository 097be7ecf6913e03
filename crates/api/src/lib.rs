//! HTTP surface for the fulfillment core.
//!
//! Exposes the order-intake endpoint consumed by checkout, the read-model
//! routes consumed by the storefront and admin dashboards, the per-supplier
//! webhook endpoints, and health/metrics, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use connectors::{
    DigitalProvisioner, DropshipConnector, InMemoryCourseAccessClient, InMemoryDropshipClient,
    InMemoryNordicaClient, InMemoryPrintlingClient, NordicaConnector, PrintlingConnector,
};
use domain::FulfillmentService;
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::{
    ConnectorRegistry, FulfillmentDispatcher, InMemoryMailer, Mailer, RetryPolicy,
    WebhookReconciler,
};
use projections::{
    AttentionQueueView, OrderStatusView, Projection, ProjectionProcessor, SupplierOrderIndex,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, M>(state: Arc<AppState<S, M>>, metrics_handle: PrometheusHandle) -> Router
where
    S: EventStore + Clone + 'static,
    M: Mailer + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/fulfillment/orders", post(routes::orders::intake::<S, M>))
        .route("/fulfillment/orders", get(routes::orders::list::<S, M>))
        .route(
            "/fulfillment/orders/{order_number}",
            get(routes::orders::get::<S, M>),
        )
        .route(
            "/fulfillment/orders/{order_number}/events",
            get(routes::orders::events::<S, M>),
        )
        .route(
            "/fulfillment/orders/{order_number}/items/{item_id}/confirm",
            post(routes::orders::confirm_item::<S, M>),
        )
        .route(
            "/fulfillment/orders/{order_number}/items/{item_id}/revoke",
            post(routes::orders::revoke_item::<S, M>),
        )
        .route("/fulfillment/attention", get(routes::orders::attention::<S, M>))
        .route("/webhooks/{supplier}", post(routes::webhooks::ingest::<S, M>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state: all connectors wired with their
/// in-memory clients and the in-memory mailer.
pub fn create_default_state<S>(
    event_store: S,
    config: Config,
) -> (
    Arc<AppState<S, InMemoryMailer>>,
    Arc<ProjectionProcessor<S>>,
)
where
    S: EventStore + Clone + 'static,
{
    let mailer = InMemoryMailer::new();

    let mut registry = ConnectorRegistry::new();
    registry.register(Arc::new(PrintlingConnector::new(
        InMemoryPrintlingClient::new(),
    )));
    registry.register(Arc::new(NordicaConnector::new(
        InMemoryNordicaClient::new(),
        config.eur_usd_rate_micros,
    )));
    registry.register(Arc::new(DropshipConnector::with_default_sources(
        InMemoryDropshipClient::new(),
    )));
    registry.register(Arc::new(DigitalProvisioner::new(
        InMemoryCourseAccessClient::new(),
    )));

    let supplier_index = Arc::new(SupplierOrderIndex::new());
    let order_status = Arc::new(OrderStatusView::new());
    let attention = Arc::new(AttentionQueueView::new());

    let mut processor = ProjectionProcessor::new(event_store.clone());
    processor.register(Box::new(supplier_index.as_ref().clone()) as Box<dyn Projection>);
    processor.register(Box::new(order_status.as_ref().clone()) as Box<dyn Projection>);
    processor.register(Box::new(attention.as_ref().clone()) as Box<dyn Projection>);
    let processor = Arc::new(processor);

    let dispatcher = FulfillmentDispatcher::new(
        event_store.clone(),
        registry.clone(),
        mailer.clone(),
        RetryPolicy::default(),
    );
    let reconciler = WebhookReconciler::new(
        event_store.clone(),
        registry,
        supplier_index,
        processor.clone(),
        mailer,
    );

    let state = Arc::new(AppState {
        dispatcher,
        reconciler,
        service: FulfillmentService::new(event_store.clone()),
        order_status,
        attention,
        projection_processor: processor.clone(),
        event_store,
        config,
    });

    (state, processor)
}
