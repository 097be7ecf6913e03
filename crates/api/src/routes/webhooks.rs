//! Supplier webhook endpoints.
//!
//! Authenticity is checked against the per-supplier shared secret before
//! the payload reaches the reconciler. The endpoint acknowledges with 202
//! regardless of the reconciliation outcome: malformed or unmatched
//! payloads are the reconciler's to log and drop, not the supplier's to
//! retry forever.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use event_store::EventStore;
use orchestrator::{Mailer, ReconcileOutcome};
use serde::Serialize;

use crate::error::ApiError;
use crate::routes::orders::AppState;

const TOKEN_HEADER: &str = "x-webhook-token";

#[derive(Serialize)]
pub struct WebhookAckResponse {
    pub outcome: String,
}

/// POST /webhooks/{supplier} — ingest a raw supplier status push.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn ingest<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
    Path(supplier): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<WebhookAckResponse>), ApiError>
where
    S: EventStore + Clone + 'static,
    M: Mailer + 'static,
{
    let Some(expected) = state.config.webhook_token(&supplier) else {
        return Err(ApiError::NotFound(format!("unknown supplier {supplier}")));
    };

    let presented = headers
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if presented != expected {
        metrics::counter!("supplier_webhooks_unauthorized_total").increment(1);
        return Err(ApiError::Unauthorized);
    }

    let outcome = state.reconciler.ingest(&payload).await?;
    let outcome = match outcome {
        ReconcileOutcome::Applied { advanced: true, .. } => "applied",
        ReconcileOutcome::Applied { advanced: false, .. } => "logged",
        ReconcileOutcome::Duplicate { .. } => "duplicate",
        ReconcileOutcome::Unclaimed => "unclaimed",
        ReconcileOutcome::UnknownOrder { .. } => "unknown-order",
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(WebhookAckResponse {
            outcome: outcome.to_string(),
        }),
    ))
}
