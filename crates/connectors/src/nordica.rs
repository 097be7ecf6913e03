//! Nordica print-on-demand connector (supplier B, quotes in EUR).
//!
//! Nordica quotes in euros; the connector converts to the settlement
//! currency once at submission time and records the rate alongside the
//! supplier order, so the charge is auditable without recomputation.

use std::collections::HashMap;
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

/// EUR→USD rate in micro-units used when none is injected.
pub const DEFAULT_EUR_USD_RATE_MICROS: i64 = 1_080_000;

/// Shipping methods Nordica offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NordicaShipping {
    DhlParcel,
    DhlExpress,
}

impl NordicaShipping {
    fn from_preference(preference: ShippingPreference) -> Option<Self> {
        match preference {
            ShippingPreference::Standard => Some(NordicaShipping::DhlParcel),
            ShippingPreference::Expedited => Some(NordicaShipping::DhlExpress),
            ShippingPreference::Overnight => None,
        }
    }

    /// The method code sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            NordicaShipping::DhlParcel => "dhl-parcel",
            NordicaShipping::DhlExpress => "dhl-express",
        }
    }
}

/// Order payload sent to Nordica.
#[derive(Debug, Clone)]
pub struct NordicaOrder {
    pub referenz: String,
    pub artikel: String,
    pub menge: u32,
    pub versandart: NordicaShipping,
    pub empfaenger_name: String,
    pub empfaenger_land: String,
}

/// Nordica's acknowledgement of an accepted order.
#[derive(Debug, Clone)]
pub struct NordicaAck {
    pub bestellnummer: String,
    /// Quoted total in EUR cents.
    pub gesamt_cents: i64,
}

/// Errors the Nordica API can return.
#[derive(Debug, Error)]
pub enum NordicaApiError {
    /// 4xx validation failure; permanent.
    #[error("nordica validation: {0}")]
    Validation(String),

    /// 5xx / network failure; retryable.
    #[error("nordica unavailable: {0}")]
    Unavailable(String),
}

/// Network boundary to the Nordica order API.
#[async_trait]
pub trait NordicaClient: Send + Sync {
    /// Places an order with Nordica.
    async fn place_order(&self, order: &NordicaOrder) -> Result<NordicaAck, NordicaApiError>;
}

#[derive(Debug, Default)]
struct InMemoryNordicaState {
    orders: HashMap<String, NordicaOrder>,
    next_id: u32,
    unavailable: bool,
}

/// In-memory Nordica client for testing and default wiring.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNordicaClient {
    state: Arc<RwLock<InMemoryNordicaState>>,
}

impl InMemoryNordicaClient {
    /// Creates a new in-memory Nordica client.
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
impl NordicaClient for InMemoryNordicaClient {
    async fn place_order(&self, order: &NordicaOrder) -> Result<NordicaAck, NordicaApiError> {
        let mut state = self.state.write().unwrap();

        if state.unavailable {
            return Err(NordicaApiError::Unavailable("503 nicht erreichbar".to_string()));
        }

        // Nordica only ships within Europe.
        const SERVICED: [&str; 8] = ["DE", "AT", "CH", "NL", "BE", "FR", "DK", "SE"];
        if !SERVICED.contains(&order.empfaenger_land.as_str()) {
            return Err(NordicaApiError::Validation(format!(
                "kein Versand nach {}",
                order.empfaenger_land
            )));
        }

        state.next_id += 1;
        let bestellnummer = format!("NB-{:04}", 2000 + state.next_id);
        state.orders.insert(bestellnummer.clone(), order.clone());

        Ok(NordicaAck {
            bestellnummer,
            gesamt_cents: 1800 * order.menge as i64,
        })
    }
}

/// Connector translating internal fulfillment items into Nordica orders.
pub struct NordicaConnector<C: NordicaClient> {
    client: C,
    eur_usd_rate_micros: i64,
}

impl<C: NordicaClient> NordicaConnector<C> {
    /// Creates a new Nordica connector with the given conversion rate.
    ///
    /// The rate is injected so the operator can refresh it out of band;
    /// each submission records the rate it was converted at.
    pub fn new(client: C, eur_usd_rate_micros: i64) -> Self {
        Self {
            client,
            eur_usd_rate_micros,
        }
    }

    /// Maps an internal product reference onto Nordica's article catalog.
    fn artikel_for(product_ref: &str) -> Option<&'static str> {
        match product_ref {
            "poster-a2" => Some("NRD-PLAKAT-A2"),
            "print-giclee" => Some("NRD-GICLEE"),
            "canvas-30x40" => Some("NRD-LEINWAND-3040"),
            "calendar-wall" => Some("NRD-KALENDER"),
            _ => None,
        }
    }
}

#[async_trait]
impl<C: NordicaClient> SupplierConnector for NordicaConnector<C> {
    fn supplier(&self) -> SupplierName {
        SupplierName::Nordica
    }

    async fn submit(&self, request: &SubmissionRequest) -> SubmitOutcome {
        let Some(artikel) = Self::artikel_for(&request.product_ref) else {
            return SubmitOutcome::Rejected {
                reason: format!("no Nordica article for product {}", request.product_ref),
            };
        };

        let Some(versandart) = NordicaShipping::from_preference(request.shipping_preference) else {
            return SubmitOutcome::Rejected {
                reason: format!(
                    "Nordica does not offer {} shipping",
                    request.shipping_preference
                ),
            };
        };

        let Some(address) = &request.shipping_address else {
            return SubmitOutcome::Rejected {
                reason: "no shipping address on item".to_string(),
            };
        };

        let order = NordicaOrder {
            referenz: request.supplier_reference(),
            artikel: artikel.to_string(),
            menge: request.quantity,
            versandart,
            empfaenger_name: address.name.clone(),
            empfaenger_land: address.country.clone(),
        };

        match self.client.place_order(&order).await {
            Ok(ack) => SubmitOutcome::Accepted(Acceptance {
                external_order_id: Some(ack.bestellnummer),
                digital: None,
                awaiting_manual_confirmation: false,
                charge: Some(SupplierCharge::converted(
                    ack.gesamt_cents,
                    Currency::Eur,
                    self.eur_usd_rate_micros,
                )),
            }),
            Err(NordicaApiError::Validation(reason)) => SubmitOutcome::Rejected { reason },
            Err(NordicaApiError::Unavailable(reason)) => SubmitOutcome::Transient { reason },
        }
    }

    fn normalize_webhook(&self, payload: &serde_json::Value) -> Option<SupplierStatusUpdate> {
        // Nordica pushes {"meldung": "bestellstatus", "bestellnummer": "...", ...}
        let bestellnummer = payload.get("bestellnummer")?.as_str()?;
        let raw_status = payload.get("status_code")?.as_str()?;

        let normalized = match raw_status {
            "ANGENOMMEN" => NormalizedSupplierStatus::Accepted,
            "IN_PRODUKTION" => NormalizedSupplierStatus::InProduction,
            "VERSANDT" => NormalizedSupplierStatus::Shipped,
            "ZUGESTELLT" => NormalizedSupplierStatus::Delivered,
            "STORNIERT" => NormalizedSupplierStatus::Cancelled,
            _ => return None,
        };

        let tracking = payload.get("sendungsnummer").map(|_| TrackingInfo {
            carrier: payload
                .get("paketdienst")
                .and_then(|v| v.as_str())
                .map(String::from),
            tracking_number: payload
                .get("sendungsnummer")
                .and_then(|v| v.as_str())
                .map(String::from),
            tracking_url: payload
                .get("sendungslink")
                .and_then(|v| v.as_str())
                .map(String::from),
        });

        Some(SupplierStatusUpdate {
            external_order_id: bestellnummer.to_string(),
            raw_status: raw_status.to_string(),
            normalized,
            tracking,
        })
    }
}
