//! Digital delivery provisioner.
//!
//! Grants course/content access, provisions a shared materials folder,
//! and issues/extends subscription entitlements. Both digital kinds
//! complete synchronously within the dispatch call; there is nothing to
//! reconcile, so `normalize_webhook` never claims a payload.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{DeliveryType, ItemKind, SupplierName};
use thiserror::Error;

use crate::connector::{
    Acceptance, DigitalGrant, SubmissionRequest, SubmitOutcome, SupplierConnector,
    SupplierStatusUpdate,
};

/// Acknowledgement of a grant or subscription activation.
#[derive(Debug, Clone)]
pub struct GrantAck {
    pub access_url: String,

    /// True when the entitlement already existed and nothing changed.
    pub already_granted: bool,
}

/// Errors the access platform can return.
#[derive(Debug, Error)]
pub enum AccessApiError {
    /// 4xx validation failure; permanent.
    #[error("access platform validation: {0}")]
    Validation(String),

    /// 5xx / network failure; retryable.
    #[error("access platform unavailable: {0}")]
    Unavailable(String),
}

/// Network boundary to the course/subscription platform.
#[async_trait]
pub trait CourseAccessClient: Send + Sync {
    /// Grants course access. Idempotent on (customer, product).
    async fn grant_course_access(
        &self,
        customer_id: &str,
        product_ref: &str,
        reference: &str,
    ) -> Result<GrantAck, AccessApiError>;

    /// Shares the supplementary-materials folder with the customer.
    /// Returns the folder URL.
    async fn share_materials_folder(
        &self,
        customer_email: &str,
        product_ref: &str,
    ) -> Result<String, AccessApiError>;

    /// Activates or extends a subscription entitlement window.
    /// Idempotent on (customer, plan): re-running with the same reference
    /// must not double-extend.
    async fn activate_subscription(
        &self,
        customer_id: &str,
        plan_ref: &str,
        reference: &str,
    ) -> Result<GrantAck, AccessApiError>;
}

#[derive(Debug, Default)]
struct InMemoryAccessState {
    course_grants: HashMap<(String, String), String>,
    subscription_extensions: HashMap<(String, String), u32>,
    applied_references: HashSet<String>,
    folder_shares: u32,
    fail_folder_share: bool,
    unavailable: bool,
}

/// In-memory access platform for testing and default wiring.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCourseAccessClient {
    state: Arc<RwLock<InMemoryAccessState>>,
}

impl InMemoryCourseAccessClient {
    /// Creates a new in-memory access client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the platform to fail with a 5xx on the next calls.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }

    /// Configures folder sharing to fail while grants keep working.
    pub fn set_fail_folder_share(&self, fail: bool) {
        self.state.write().unwrap().fail_folder_share = fail;
    }

    /// Returns the number of distinct course grants.
    pub fn grant_count(&self) -> usize {
        self.state.read().unwrap().course_grants.len()
    }

    /// Returns how many times a subscription window was extended.
    pub fn subscription_extensions(&self, customer_id: &str, plan_ref: &str) -> u32 {
        self.state
            .read()
            .unwrap()
            .subscription_extensions
            .get(&(customer_id.to_string(), plan_ref.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Returns the number of successful folder shares.
    pub fn folder_share_count(&self) -> u32 {
        self.state.read().unwrap().folder_shares
    }
}

#[async_trait]
impl CourseAccessClient for InMemoryCourseAccessClient {
    async fn grant_course_access(
        &self,
        customer_id: &str,
        product_ref: &str,
        _reference: &str,
    ) -> Result<GrantAck, AccessApiError> {
        let mut state = self.state.write().unwrap();

        if state.unavailable {
            return Err(AccessApiError::Unavailable("503 platform down".to_string()));
        }

        let key = (customer_id.to_string(), product_ref.to_string());
        if let Some(url) = state.course_grants.get(&key) {
            return Ok(GrantAck {
                access_url: url.clone(),
                already_granted: true,
            });
        }

        let url = format!("https://learn.example/courses/{product_ref}");
        state.course_grants.insert(key, url.clone());
        Ok(GrantAck {
            access_url: url,
            already_granted: false,
        })
    }

    async fn share_materials_folder(
        &self,
        _customer_email: &str,
        product_ref: &str,
    ) -> Result<String, AccessApiError> {
        let mut state = self.state.write().unwrap();

        if state.unavailable || state.fail_folder_share {
            return Err(AccessApiError::Unavailable(
                "folder share failed".to_string(),
            ));
        }

        state.folder_shares += 1;
        Ok(format!("https://drive.example/shared/{product_ref}"))
    }

    async fn activate_subscription(
        &self,
        customer_id: &str,
        plan_ref: &str,
        reference: &str,
    ) -> Result<GrantAck, AccessApiError> {
        let mut state = self.state.write().unwrap();

        if state.unavailable {
            return Err(AccessApiError::Unavailable("503 platform down".to_string()));
        }

        let key = (customer_id.to_string(), plan_ref.to_string());
        let url = format!("https://learn.example/subscriptions/{plan_ref}");

        if state.applied_references.contains(reference) {
            return Ok(GrantAck {
                access_url: url,
                already_granted: true,
            });
        }

        state.applied_references.insert(reference.to_string());
        *state.subscription_extensions.entry(key).or_insert(0) += 1;

        Ok(GrantAck {
            access_url: url,
            already_granted: false,
        })
    }
}

/// Provisioner delivering digital kinds through the access platform.
pub struct DigitalProvisioner<C: CourseAccessClient> {
    client: C,
}

impl<C: CourseAccessClient> DigitalProvisioner<C> {
    /// Creates a new digital delivery provisioner.
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: CourseAccessClient> SupplierConnector for DigitalProvisioner<C> {
    fn supplier(&self) -> SupplierName {
        SupplierName::DigitalDelivery
    }

    async fn submit(&self, request: &SubmissionRequest) -> SubmitOutcome {
        let reference = request.supplier_reference();

        match request.kind {
            ItemKind::DigitalCourse => {
                let ack = match self
                    .client
                    .grant_course_access(
                        &request.customer.customer_id,
                        &request.product_ref,
                        &reference,
                    )
                    .await
                {
                    Ok(ack) => ack,
                    Err(AccessApiError::Validation(reason)) => {
                        return SubmitOutcome::Rejected { reason };
                    }
                    Err(AccessApiError::Unavailable(reason)) => {
                        return SubmitOutcome::Transient { reason };
                    }
                };

                // Folder sharing is best-effort: the access grant is the
                // authoritative success signal, materials can be re-shared.
                let shared_folder_url = match self
                    .client
                    .share_materials_folder(&request.customer.email, &request.product_ref)
                    .await
                {
                    Ok(url) => Some(url),
                    Err(e) => {
                        tracing::warn!(
                            product_ref = %request.product_ref,
                            error = %e,
                            "materials folder share failed, continuing without it"
                        );
                        None
                    }
                };

                SubmitOutcome::Accepted(Acceptance {
                    external_order_id: None,
                    digital: Some(DigitalGrant {
                        delivery_type: DeliveryType::CourseAccess,
                        access_url: ack.access_url,
                        shared_folder_url,
                    }),
                    awaiting_manual_confirmation: false,
                    charge: None,
                })
            }
            ItemKind::Subscription => {
                match self
                    .client
                    .activate_subscription(
                        &request.customer.customer_id,
                        &request.product_ref,
                        &reference,
                    )
                    .await
                {
                    Ok(ack) => SubmitOutcome::Accepted(Acceptance {
                        external_order_id: None,
                        digital: Some(DigitalGrant {
                            delivery_type: DeliveryType::Subscription,
                            access_url: ack.access_url,
                            shared_folder_url: None,
                        }),
                        awaiting_manual_confirmation: false,
                        charge: None,
                    }),
                    Err(AccessApiError::Validation(reason)) => SubmitOutcome::Rejected { reason },
                    Err(AccessApiError::Unavailable(reason)) => SubmitOutcome::Transient { reason },
                }
            }
            other => SubmitOutcome::Rejected {
                reason: format!("{other} is not a digital kind"),
            },
        }
    }

    fn normalize_webhook(&self, _payload: &serde_json::Value) -> Option<SupplierStatusUpdate> {
        // Digital delivery is synchronous; there are no webhooks to claim.
        None
    }
}
