//! Dropship connector.
//!
//! Lower-trust integration: most upstream source catalogs expose no order
//! API. Submissions to those sources are accepted without an external
//! order ID and flagged for manual confirmation, so an operator resolves
//! them instead of the item being silently marked fulfilled. Sources that
//! do expose an API behave like the POD connectors.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{NormalizedSupplierStatus, SupplierName, TrackingInfo};
use thiserror::Error;

use crate::connector::{
    Acceptance, SubmissionRequest, SubmitOutcome, SupplierConnector, SupplierStatusUpdate,
};

/// A third-party source catalog items can be dropshipped from.
#[derive(Debug, Clone)]
pub struct DropshipSource {
    /// Product-reference prefix that routes to this source.
    pub prefix: String,

    /// Human-readable source name.
    pub name: String,

    /// Whether the source exposes an order API.
    pub has_api: bool,
}

impl DropshipSource {
    /// Creates a source definition.
    pub fn new(prefix: impl Into<String>, name: impl Into<String>, has_api: bool) -> Self {
        Self {
            prefix: prefix.into(),
            name: name.into(),
            has_api,
        }
    }
}

/// Order payload sent to an API-backed dropship source.
#[derive(Debug, Clone)]
pub struct DropshipOrder {
    pub reference: String,
    pub product_ref: String,
    pub quantity: u32,
    pub recipient_name: String,
    pub recipient_country: String,
}

/// Acknowledgement from an API-backed dropship source.
#[derive(Debug, Clone)]
pub struct DropshipAck {
    pub order_id: String,
}

/// Errors an API-backed dropship source can return.
#[derive(Debug, Error)]
pub enum DropshipApiError {
    /// 4xx validation failure; permanent.
    #[error("dropship validation: {0}")]
    Validation(String),

    /// 5xx / network failure; retryable.
    #[error("dropship unavailable: {0}")]
    Unavailable(String),
}

/// Network boundary to API-backed dropship sources.
#[async_trait]
pub trait DropshipClient: Send + Sync {
    /// Places an order with the source.
    async fn place_order(&self, order: &DropshipOrder) -> Result<DropshipAck, DropshipApiError>;
}

#[derive(Debug, Default)]
struct InMemoryDropshipState {
    orders: HashMap<String, DropshipOrder>,
    next_id: u32,
    unavailable: bool,
}

/// In-memory dropship client for testing and default wiring.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDropshipClient {
    state: Arc<RwLock<InMemoryDropshipState>>,
}

impl InMemoryDropshipClient {
    /// Creates a new in-memory dropship client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the client to fail with a 5xx on the next calls.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }

    /// Returns the number of orders placed.
    pub fn order_count(&self) -> usize {
        self.state.read().unwrap().orders.len()
    }
}

#[async_trait]
impl DropshipClient for InMemoryDropshipClient {
    async fn place_order(&self, order: &DropshipOrder) -> Result<DropshipAck, DropshipApiError> {
        let mut state = self.state.write().unwrap();

        if state.unavailable {
            return Err(DropshipApiError::Unavailable("503 source down".to_string()));
        }

        state.next_id += 1;
        let order_id = format!("KS-{:04}", state.next_id);
        state.orders.insert(order_id.clone(), order.clone());

        Ok(DropshipAck { order_id })
    }
}

/// Connector forwarding items to third-party dropship sources.
pub struct DropshipConnector<C: DropshipClient> {
    sources: Vec<DropshipSource>,
    client: C,
}

impl<C: DropshipClient> DropshipConnector<C> {
    /// Creates a connector with an explicit source registry.
    pub fn new(sources: Vec<DropshipSource>, client: C) -> Self {
        Self { sources, client }
    }

    /// Creates a connector with the stock source registry.
    pub fn with_default_sources(client: C) -> Self {
        Self::new(
            vec![
                DropshipSource::new("opal-", "Opal Home Goods", false),
                DropshipSource::new("keystone-", "Keystone Supply", true),
            ],
            client,
        )
    }

    fn source_for(&self, product_ref: &str) -> Option<&DropshipSource> {
        self.sources
            .iter()
            .find(|source| product_ref.starts_with(&source.prefix))
    }
}

#[async_trait]
impl<C: DropshipClient> SupplierConnector for DropshipConnector<C> {
    fn supplier(&self) -> SupplierName {
        SupplierName::Dropship
    }

    async fn submit(&self, request: &SubmissionRequest) -> SubmitOutcome {
        let Some(source) = self.source_for(&request.product_ref) else {
            return SubmitOutcome::Rejected {
                reason: format!("no dropship source for product {}", request.product_ref),
            };
        };

        let Some(address) = &request.shipping_address else {
            return SubmitOutcome::Rejected {
                reason: "no shipping address on item".to_string(),
            };
        };

        if !source.has_api {
            // No order API: the order must be placed by hand at the source,
            // so the item parks in the manual-confirmation queue.
            tracing::info!(
                source = %source.name,
                product_ref = %request.product_ref,
                "dropship source has no API, queueing for manual confirmation"
            );
            return SubmitOutcome::Accepted(Acceptance {
                external_order_id: None,
                digital: None,
                awaiting_manual_confirmation: true,
                charge: None,
            });
        }

        let order = DropshipOrder {
            reference: request.supplier_reference(),
            product_ref: request.product_ref.clone(),
            quantity: request.quantity,
            recipient_name: address.name.clone(),
            recipient_country: address.country.clone(),
        };

        match self.client.place_order(&order).await {
            Ok(ack) => SubmitOutcome::Accepted(Acceptance {
                external_order_id: Some(ack.order_id),
                digital: None,
                awaiting_manual_confirmation: false,
                charge: None,
            }),
            Err(DropshipApiError::Validation(reason)) => SubmitOutcome::Rejected { reason },
            Err(DropshipApiError::Unavailable(reason)) => SubmitOutcome::Transient { reason },
        }
    }

    fn normalize_webhook(&self, payload: &serde_json::Value) -> Option<SupplierStatusUpdate> {
        // Keystone pushes {"source": "keystone", "reference": "KS-...", ...}
        let source = payload.get("source")?.as_str()?;
        if source != "keystone" {
            return None;
        }
        let reference = payload.get("reference")?.as_str()?;
        let raw_status = payload.get("state")?.as_str()?;

        let normalized = match raw_status {
            "accepted" => NormalizedSupplierStatus::Accepted,
            "shipped" => NormalizedSupplierStatus::Shipped,
            "delivered" => NormalizedSupplierStatus::Delivered,
            "cancelled" => NormalizedSupplierStatus::Cancelled,
            _ => return None,
        };

        let tracking = payload.get("tracking").map(|tracking| TrackingInfo {
            carrier: tracking
                .get("carrier")
                .and_then(|v| v.as_str())
                .map(String::from),
            tracking_number: tracking
                .get("number")
                .and_then(|v| v.as_str())
                .map(String::from),
            tracking_url: tracking
                .get("url")
                .and_then(|v| v.as_str())
                .map(String::from),
        });

        Some(SupplierStatusUpdate {
            external_order_id: reference.to_string(),
            raw_status: raw_status.to_string(),
            normalized,
            tracking,
        })
    }
}
