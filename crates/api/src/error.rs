//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, FulfillmentError};
use event_store::EventStoreError;
use orchestrator::DispatchError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Webhook signature/secret check failed.
    Unauthorized,
    /// Orchestration error.
    Dispatch(DispatchError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "invalid webhook token".to_string(),
            ),
            ApiError::Dispatch(err) => dispatch_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn dispatch_error_to_response(err: DispatchError) -> (StatusCode, String) {
    match &err {
        DispatchError::UnknownKind { .. } | DispatchError::EmptyOrder => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        DispatchError::OrderNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        DispatchError::Domain(domain_err) => domain_error_to_response(domain_err, &err),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn domain_error_to_response(err: &DomainError, outer: &DispatchError) -> (StatusCode, String) {
    match err {
        DomainError::Fulfillment(fulfillment_err) => match fulfillment_err {
            FulfillmentError::ItemNotFound { .. } | FulfillmentError::NotReceived => {
                (StatusCode::NOT_FOUND, outer.to_string())
            }
            FulfillmentError::InvalidStateTransition { .. }
            | FulfillmentError::AlreadyReceived
            | FulfillmentError::NotAwaitingConfirmation { .. } => {
                (StatusCode::CONFLICT, outer.to_string())
            }
            FulfillmentError::NoItems
            | FulfillmentError::EmptyOrderNumber
            | FulfillmentError::InvalidQuantity { .. }
            | FulfillmentError::NoSupplierOrder { .. }
            | FulfillmentError::NoDigitalDelivery { .. } => {
                (StatusCode::BAD_REQUEST, outer.to_string())
            }
        },
        DomainError::EventStore(EventStoreError::ConcurrencyConflict { .. }) => {
            (StatusCode::CONFLICT, outer.to_string())
        }
        DomainError::AggregateNotFound { .. } => (StatusCode::NOT_FOUND, outer.to_string()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, outer.to_string()),
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        ApiError::Dispatch(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Dispatch(DispatchError::Domain(err))
    }
}
