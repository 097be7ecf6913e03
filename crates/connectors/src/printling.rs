//! Printling print-on-demand connector (supplier A, quotes in USD).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{
    Currency, NormalizedSupplierStatus, ShippingPreference, SupplierCharge, SupplierName,
    TrackingInfo,
};
use thiserror::Error;

use crate::connector::{
    Acceptance, SubmissionRequest, SubmitOutcome, SupplierConnector, SupplierStatusUpdate,
};

/// Shipping methods Printling offers.
///
/// Printling has no overnight service; an overnight preference is a
/// rejection rather than a silent downgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintlingShipping {
    Standard,
    Express,
}

impl PrintlingShipping {
    fn from_preference(preference: ShippingPreference) -> Option<Self> {
        match preference {
            ShippingPreference::Standard => Some(PrintlingShipping::Standard),
            ShippingPreference::Expedited => Some(PrintlingShipping::Express),
            ShippingPreference::Overnight => None,
        }
    }

    /// The method code sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrintlingShipping::Standard => "standard",
            PrintlingShipping::Express => "express",
        }
    }
}

/// Order payload sent to Printling.
#[derive(Debug, Clone)]
pub struct PrintlingOrder {
    pub reference: String,
    pub sku: String,
    pub quantity: u32,
    pub shipping: PrintlingShipping,
    pub recipient_name: String,
    pub recipient_country: String,
}

/// Printling's acknowledgement of an accepted order.
#[derive(Debug, Clone)]
pub struct PrintlingAck {
    pub order_id: String,
    /// Quoted production + shipping cost in USD cents.
    pub cost_cents: i64,
}

/// Errors the Printling API can return.
#[derive(Debug, Error)]
pub enum PrintlingApiError {
    /// 4xx validation failure; permanent.
    #[error("printling validation: {0}")]
    Validation(String),

    /// 5xx / network failure; retryable.
    #[error("printling unavailable: {0}")]
    Unavailable(String),
}

/// Network boundary to the Printling order API.
#[async_trait]
pub trait PrintlingClient: Send + Sync {
    /// Places an order with Printling.
    async fn create_order(&self, order: &PrintlingOrder) -> Result<PrintlingAck, PrintlingApiError>;
}

#[derive(Debug, Default)]
struct InMemoryPrintlingState {
    orders: HashMap<String, PrintlingOrder>,
    next_id: u32,
    unavailable: bool,
    unserviceable_countries: HashSet<String>,
}

/// In-memory Printling client for testing and default wiring.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPrintlingClient {
    state: Arc<RwLock<InMemoryPrintlingState>>,
}

impl InMemoryPrintlingClient {
    /// Creates a new in-memory Printling client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the client to fail with a 5xx on the next calls.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }

    /// Marks a destination country as unserviceable (rejected with a 4xx).
    pub fn add_unserviceable_country(&self, country: impl Into<String>) {
        self.state
            .write()
            .unwrap()
            .unserviceable_countries
            .insert(country.into());
    }

    /// Returns the number of orders placed.
    pub fn order_count(&self) -> usize {
        self.state.read().unwrap().orders.len()
    }
}

#[async_trait]
impl PrintlingClient for InMemoryPrintlingClient {
    async fn create_order(&self, order: &PrintlingOrder) -> Result<PrintlingAck, PrintlingApiError> {
        let mut state = self.state.write().unwrap();

        if state.unavailable {
            return Err(PrintlingApiError::Unavailable(
                "503 service unavailable".to_string(),
            ));
        }

        if state
            .unserviceable_countries
            .contains(&order.recipient_country)
        {
            return Err(PrintlingApiError::Validation(format!(
                "does not ship to {}",
                order.recipient_country
            )));
        }

        state.next_id += 1;
        let order_id = format!("P-{:04}", 1000 + state.next_id);
        state.orders.insert(order_id.clone(), order.clone());

        Ok(PrintlingAck {
            order_id,
            cost_cents: 1250 * order.quantity as i64,
        })
    }
}

/// Connector translating internal fulfillment items into Printling orders.
pub struct PrintlingConnector<C: PrintlingClient> {
    client: C,
}

impl<C: PrintlingClient> PrintlingConnector<C> {
    /// Creates a new Printling connector over the given client.
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Maps an internal product reference onto Printling's SKU catalog.
    fn sku_for(product_ref: &str) -> Option<&'static str> {
        match product_ref {
            "poster-a2" => Some("PL-POSTER-A2"),
            "poster-a3" => Some("PL-POSTER-A3"),
            "mug-11oz" => Some("PL-MUG-11"),
            "tee-classic" => Some("PL-TEE-CLS"),
            "hoodie-zip" => Some("PL-HOOD-ZIP"),
            _ => None,
        }
    }
}

#[async_trait]
impl<C: PrintlingClient> SupplierConnector for PrintlingConnector<C> {
    fn supplier(&self) -> SupplierName {
        SupplierName::Printling
    }

    async fn submit(&self, request: &SubmissionRequest) -> SubmitOutcome {
        let Some(sku) = Self::sku_for(&request.product_ref) else {
            return SubmitOutcome::Rejected {
                reason: format!("no Printling SKU for product {}", request.product_ref),
            };
        };

        let Some(shipping) = PrintlingShipping::from_preference(request.shipping_preference) else {
            return SubmitOutcome::Rejected {
                reason: format!(
                    "Printling does not offer {} shipping",
                    request.shipping_preference
                ),
            };
        };

        let Some(address) = &request.shipping_address else {
            return SubmitOutcome::Rejected {
                reason: "no shipping address on item".to_string(),
            };
        };

        let order = PrintlingOrder {
            reference: request.supplier_reference(),
            sku: sku.to_string(),
            quantity: request.quantity,
            shipping,
            recipient_name: address.name.clone(),
            recipient_country: address.country.clone(),
        };

        match self.client.create_order(&order).await {
            Ok(ack) => SubmitOutcome::Accepted(Acceptance {
                external_order_id: Some(ack.order_id),
                digital: None,
                awaiting_manual_confirmation: false,
                charge: Some(SupplierCharge::native(ack.cost_cents, Currency::Usd)),
            }),
            Err(PrintlingApiError::Validation(reason)) => SubmitOutcome::Rejected { reason },
            Err(PrintlingApiError::Unavailable(reason)) => SubmitOutcome::Transient { reason },
        }
    }

    fn normalize_webhook(&self, payload: &serde_json::Value) -> Option<SupplierStatusUpdate> {
        // Printling pushes {"event": "order.updated", "order_id": "...", ...}
        let event = payload.get("event")?.as_str()?;
        if !event.starts_with("order.") {
            return None;
        }
        let order_id = payload.get("order_id")?.as_str()?;
        let raw_status = payload.get("status")?.as_str()?;

        let normalized = match raw_status {
            "received" | "confirmed" => NormalizedSupplierStatus::Accepted,
            "in_production" => NormalizedSupplierStatus::InProduction,
            "shipped" => NormalizedSupplierStatus::Shipped,
            "delivered" => NormalizedSupplierStatus::Delivered,
            "canceled" => NormalizedSupplierStatus::Cancelled,
            _ => return None,
        };

        let tracking = payload.get("shipment").map(|shipment| TrackingInfo {
            carrier: shipment
                .get("carrier")
                .and_then(|v| v.as_str())
                .map(String::from),
            tracking_number: shipment
                .get("tracking_number")
                .and_then(|v| v.as_str())
                .map(String::from),
            tracking_url: shipment
                .get("tracking_url")
                .and_then(|v| v.as_str())
                .map(String::from),
        });

        Some(SupplierStatusUpdate {
            external_order_id: order_id.to_string(),
            raw_status: raw_status.to_string(),
            normalized,
            tracking,
        })
    }
}
