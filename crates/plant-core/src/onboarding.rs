//! # Seller Onboarding
//!
//! Customer applies, admin decides. The admin decision comes in two forms
//! that share one route but have separate contracts:
//!
//! - [`OnboardingWorkflow::approve_seller_request`] consumes a pending
//!   application and sets the applicant's role.
//! - [`OnboardingWorkflow::set_user_role`] re-grades any existing principal
//!   directly.

use crate::error::{MarketError, MarketResult};
use crate::principal::Role;
use crate::store::SharedStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// A pending application for the seller role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerRequest {
    pub id: String,
    pub name: String,
    pub email: String,
    pub image: String,
    pub created_at: DateTime<Utc>,
}

impl SellerRequest {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            email: email.into(),
            image: image.into(),
            created_at: Utc::now(),
        }
    }

    /// Duplicate detection key: (name, email, image)
    pub fn same_applicant(&self, other: &SellerRequest) -> bool {
        self.name == other.name && self.email == other.email && self.image == other.image
    }
}

/// Admin decision acknowledgment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleDecision {
    pub message: String,
    pub email: String,
    pub role: Role,
}

pub struct OnboardingWorkflow {
    store: SharedStore,
}

impl OnboardingWorkflow {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Open an application. `Conflict` if an identical one is already open.
    #[instrument(skip(self, image))]
    pub async fn submit_request(
        &self,
        name: &str,
        email: &str,
        image: &str,
    ) -> MarketResult<SellerRequest> {
        if email.trim().is_empty() {
            return Err(MarketError::BadRequest("Email is required".to_string()));
        }
        let request = self
            .store
            .insert_request(SellerRequest::new(name, email, image))
            .await?;
        info!(request_id = %request.id, "seller request submitted");
        Ok(request)
    }

    pub async fn list_requests(&self) -> MarketResult<Vec<SellerRequest>> {
        self.store.list_requests().await
    }

    /// Consume a pending application, setting the applicant's role.
    #[instrument(skip(self))]
    pub async fn approve_seller_request(
        &self,
        request_id: &str,
        role: Role,
    ) -> MarketResult<RoleDecision> {
        let (request, updated) = self
            .store
            .resolve_request(request_id, role)
            .await?
            .ok_or_else(|| MarketError::not_found("Seller request", request_id))?;

        if !updated {
            warn!(
                email = %request.email,
                "seller request consumed but principal role unchanged"
            );
        }
        info!(email = %request.email, %role, "seller request decided");

        Ok(RoleDecision {
            message: decision_message(role, updated),
            email: request.email,
            role,
        })
    }

    /// Directly re-grade an existing principal.
    ///
    /// `BadRequest` without an email; `NotFound` if the principal is absent or
    /// already holds `role`.
    #[instrument(skip(self))]
    pub async fn set_user_role(&self, email: &str, role: Role) -> MarketResult<RoleDecision> {
        let email = email.trim();
        if email.is_empty() {
            return Err(MarketError::BadRequest("Email is required".to_string()));
        }

        if !self.store.set_role(email, role).await? {
            return Err(MarketError::NotFound {
                entity: "User",
                id: format!("{} (not found or role unchanged)", email),
            });
        }
        info!(%email, %role, "user role updated");

        Ok(RoleDecision {
            message: "User role updated successfully".to_string(),
            email: email.to_string(),
            role,
        })
    }
}

fn decision_message(role: Role, updated: bool) -> String {
    match (role, updated) {
        (_, false) => "Seller request closed; user role unchanged".to_string(),
        (Role::Seller, true) => "Seller request approved & role updated".to_string(),
        (Role::Customer, true) => "Seller request rejected".to_string(),
        (Role::Admin, true) => "Seller request closed & role set to admin".to_string(),
    }
}
