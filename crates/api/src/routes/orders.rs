//! Order intake, read-model, and operator endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{AggregateId, ItemId, OrderNumber};
use domain::{CustomerInfo, FulfillmentService, ShippingAddress, ShippingPreference, TrackingInfo};
use event_store::EventStore;
use orchestrator::{
    FulfillmentDispatcher, IntakeLine, Mailer, OrderIntake, WebhookReconciler,
};
use projections::{
    AttentionQueueView, OrderStatusSummary, OrderStatusView, ProjectionProcessor,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S, M>
where
    S: EventStore + Clone,
    M: Mailer,
{
    pub dispatcher: FulfillmentDispatcher<S, M>,
    pub reconciler: WebhookReconciler<S, M>,
    pub service: FulfillmentService<S>,
    pub order_status: Arc<OrderStatusView>,
    pub attention: Arc<AttentionQueueView>,
    pub projection_processor: Arc<ProjectionProcessor<S>>,
    pub event_store: S,
    pub config: Config,
}

// -- Request types --

#[derive(Deserialize)]
pub struct OrderIntakeRequest {
    pub order_number: String,
    pub payment_id: String,
    pub customer: CustomerRequest,
    pub items: Vec<IntakeLineRequest>,
}

#[derive(Deserialize)]
pub struct CustomerRequest {
    pub customer_id: String,
    pub email: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct IntakeLineRequest {
    pub product_ref: String,
    pub product_name: String,
    pub quantity: u32,
    pub kind_hint: String,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default)]
    pub shipping_preference: Option<ShippingPreference>,
}

#[derive(Deserialize)]
pub struct ConfirmItemRequest {
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub tracking_url: Option<String>,
    #[serde(default)]
    pub confirmed_by: Option<String>,
}

#[derive(Deserialize)]
pub struct RevokeItemRequest {
    pub reason: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderAcceptedResponse {
    pub order_number: String,
    pub status: String,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub order_number: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    pub items: Vec<ItemResponse>,
}

#[derive(Serialize)]
pub struct ItemResponse {
    pub item_id: u32,
    pub kind: String,
    pub product_ref: String,
    pub product_name: String,
    pub quantity: u32,
    pub status: String,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub external_order_id: Option<String>,
    pub access_url: Option<String>,
    pub shared_folder_url: Option<String>,
    pub revoked: bool,
    pub awaiting_manual_confirmation: bool,
    pub last_error: Option<String>,
}

#[derive(Serialize)]
pub struct AttentionEntryResponse {
    pub order_number: String,
    pub item_id: u32,
    pub product_name: String,
    pub reason: String,
    pub detail: Option<String>,
    pub since: String,
}

#[derive(Serialize)]
pub struct EventEnvelopeResponse {
    pub event_id: String,
    pub event_type: String,
    pub version: i64,
    pub timestamp: String,
    pub payload: serde_json::Value,
}

fn to_order_response(summary: &OrderStatusSummary) -> OrderResponse {
    let items = summary
        .items
        .values()
        .map(|item| ItemResponse {
            item_id: item.item_id.as_u32(),
            kind: item.kind.to_string(),
            product_ref: item.product_ref.clone(),
            product_name: item.product_name.clone(),
            quantity: item.quantity,
            status: item.status.to_string(),
            carrier: item.tracking.as_ref().and_then(|t| t.carrier.clone()),
            tracking_number: item
                .tracking
                .as_ref()
                .and_then(|t| t.tracking_number.clone()),
            tracking_url: item.tracking.as_ref().and_then(|t| t.tracking_url.clone()),
            external_order_id: item.external_order_id.clone(),
            access_url: item.access_url.clone(),
            shared_folder_url: item.shared_folder_url.clone(),
            revoked: item.revoked,
            awaiting_manual_confirmation: item.awaiting_manual_confirmation,
            last_error: item.last_error.clone(),
        })
        .collect();

    OrderResponse {
        order_number: summary.order_number.to_string(),
        status: summary.status().to_string(),
        created_at: summary.created_at.to_rfc3339(),
        updated_at: summary.updated_at.to_rfc3339(),
        items,
    }
}

// -- Handlers --

/// POST /fulfillment/orders — the order-intake call from checkout.
///
/// Idempotent on order number; connector failures never surface here, only
/// through the read model.
#[tracing::instrument(skip(state, req), fields(order_number = %req.order_number))]
pub async fn intake<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
    Json(req): Json<OrderIntakeRequest>,
) -> Result<(StatusCode, Json<OrderAcceptedResponse>), ApiError>
where
    S: EventStore + Clone + 'static,
    M: Mailer + 'static,
{
    if req.order_number.trim().is_empty() {
        return Err(ApiError::BadRequest("order_number must not be empty".to_string()));
    }

    let order_number = OrderNumber::new(req.order_number);
    let order_intake = OrderIntake {
        order_number: order_number.clone(),
        payment_id: req.payment_id,
        customer: CustomerInfo {
            customer_id: req.customer.customer_id,
            email: req.customer.email,
            name: req.customer.name,
        },
        items: req
            .items
            .into_iter()
            .map(|line| IntakeLine {
                product_ref: line.product_ref,
                product_name: line.product_name,
                quantity: line.quantity,
                kind_hint: line.kind_hint,
                shipping_address: line.shipping_address,
                shipping_preference: line.shipping_preference,
            })
            .collect(),
    };

    let order_id = state.dispatcher.process_intake(order_intake).await?;
    let order = state
        .service
        .get_order(order_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::Internal("order missing after intake".to_string()))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(OrderAcceptedResponse {
            order_number: order_number.to_string(),
            status: order.status().to_string(),
        }),
    ))
}

/// GET /fulfillment/orders — active orders from the read model.
#[tracing::instrument(skip(state))]
pub async fn list<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
) -> Result<Json<Vec<OrderResponse>>, ApiError>
where
    S: EventStore + Clone + 'static,
    M: Mailer + 'static,
{
    state
        .projection_processor
        .run_catch_up()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let orders = state.order_status.active_orders().await;
    Ok(Json(orders.iter().map(to_order_response).collect()))
}

/// GET /fulfillment/orders/{order_number} — order + per-item status,
/// tracking info, and digital access links.
#[tracing::instrument(skip(state))]
pub async fn get<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
    Path(order_number): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: EventStore + Clone + 'static,
    M: Mailer + 'static,
{
    state
        .projection_processor
        .run_catch_up()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let number = OrderNumber::new(order_number.clone());
    let summary = state
        .order_status
        .get(&number)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Order {order_number} not found")))?;

    Ok(Json(to_order_response(&summary)))
}

/// GET /fulfillment/orders/{order_number}/events — audit log of the order.
#[tracing::instrument(skip(state))]
pub async fn events<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
    Path(order_number): Path<String>,
) -> Result<Json<Vec<EventEnvelopeResponse>>, ApiError>
where
    S: EventStore + Clone + 'static,
    M: Mailer + 'static,
{
    let number = OrderNumber::new(order_number.clone());
    let aggregate_id = AggregateId::for_order(&number);

    let envelopes = state
        .event_store
        .get_events_for_aggregate(aggregate_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    if envelopes.is_empty() {
        return Err(ApiError::NotFound(format!("Order {order_number} not found")));
    }

    let responses = envelopes
        .into_iter()
        .map(|e| EventEnvelopeResponse {
            event_id: e.event_id.to_string(),
            event_type: e.event_type,
            version: e.version.as_i64(),
            timestamp: e.timestamp.to_rfc3339(),
            payload: e.payload,
        })
        .collect();

    Ok(Json(responses))
}

/// GET /fulfillment/attention — items needing operator intervention.
#[tracing::instrument(skip(state))]
pub async fn attention<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
) -> Result<Json<Vec<AttentionEntryResponse>>, ApiError>
where
    S: EventStore + Clone + 'static,
    M: Mailer + 'static,
{
    state
        .projection_processor
        .run_catch_up()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let entries = state
        .attention
        .entries()
        .await
        .into_iter()
        .map(|entry| AttentionEntryResponse {
            order_number: entry.order_number.to_string(),
            item_id: entry.item_id.as_u32(),
            product_name: entry.product_name,
            reason: entry.reason.as_str().to_string(),
            detail: entry.detail,
            since: entry.since.to_rfc3339(),
        })
        .collect();

    Ok(Json(entries))
}

/// POST /fulfillment/orders/{order_number}/items/{item_id}/confirm —
/// operator confirmation for API-less dropship items.
#[tracing::instrument(skip(state, req))]
pub async fn confirm_item<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
    Path((order_number, item_id)): Path<(String, u32)>,
    Json(req): Json<ConfirmItemRequest>,
) -> Result<StatusCode, ApiError>
where
    S: EventStore + Clone + 'static,
    M: Mailer + 'static,
{
    let tracking = TrackingInfo {
        carrier: req.carrier,
        tracking_number: req.tracking_number,
        tracking_url: req.tracking_url,
    };
    let tracking = if tracking.is_empty() {
        None
    } else {
        Some(tracking)
    };

    state
        .dispatcher
        .confirm_item(
            &OrderNumber::new(order_number),
            ItemId::new(item_id),
            tracking,
            req.confirmed_by,
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /fulfillment/orders/{order_number}/items/{item_id}/revoke —
/// revoke a digital entitlement (refund / chargeback path).
#[tracing::instrument(skip(state, req))]
pub async fn revoke_item<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
    Path((order_number, item_id)): Path<(String, u32)>,
    Json(req): Json<RevokeItemRequest>,
) -> Result<StatusCode, ApiError>
where
    S: EventStore + Clone + 'static,
    M: Mailer + 'static,
{
    state
        .dispatcher
        .revoke_digital(
            &OrderNumber::new(order_number),
            ItemId::new(item_id),
            req.reason,
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
