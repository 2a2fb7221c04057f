//! # Checkout Session Broker
//!
//! Trait over the external payment provider's hosted checkout sessions.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   CheckoutBroker (trait)                    │
//! │  ├── create_session()                                       │
//! │  ├── retrieve_session()                                     │
//! │  └── provider_name()                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                    ┌───────┴───────┐
//!                    │ StripeSession │
//!                    │    Broker     │
//!                    └───────────────┘
//! ```
//!
//! The application metadata written at session creation (`plantId`,
//! `customerEmail`) is the only input fulfillment trusts.

use crate::catalog::Currency;
use crate::error::{MarketError, MarketResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Metadata key carrying the purchased plant id
pub const METADATA_PLANT_ID: &str = "plantId";

/// Metadata key carrying the purchasing customer's email
pub const METADATA_CUSTOMER_EMAIL: &str = "customerEmail";

/// Placeholder the provider substitutes with the session id in redirect URLs
pub const SESSION_ID_TEMPLATE: &str = "{CHECKOUT_SESSION_ID}";

/// One cart line submitted by the client
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub plant_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    /// Unit price in major units
    pub price: f64,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

impl CartLine {
    /// Unit price in minor units for `currency`
    pub fn unit_amount(&self, currency: Currency) -> i64 {
        currency.to_smallest_unit(self.price)
    }

    pub fn validate(&self) -> MarketResult<()> {
        if self.plant_id.trim().is_empty() {
            return Err(MarketError::BadRequest("plantId is required".to_string()));
        }
        if self.quantity == 0 {
            return Err(MarketError::BadRequest(
                "quantity must be at least 1".to_string(),
            ));
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(MarketError::BadRequest(
                "price must be a positive amount".to_string(),
            ));
        }
        Ok(())
    }
}

/// Handle returned after creating a hosted checkout session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider's session ID
    pub session_id: String,

    /// URL to redirect customer to for payment
    pub checkout_url: String,

    /// Provider name (e.g., "stripe")
    pub provider: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Status of a checkout session as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session created, awaiting payment
    Open,
    /// Payment completed
    Complete,
    /// Session expired
    Expired,
}

/// Authoritative session state fetched from the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,

    pub status: SessionStatus,

    /// Paid amount in minor units
    pub amount_total: i64,

    pub currency: Currency,

    /// Provider payment reference (payment intent); the order idempotency key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,

    /// Application metadata as written at creation
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl SessionState {
    pub fn is_complete(&self) -> bool {
        self.status == SessionStatus::Complete
    }

    pub fn plant_id(&self) -> Option<&str> {
        self.metadata.get(METADATA_PLANT_ID).map(|s| s.as_str())
    }

    pub fn customer_email(&self) -> Option<&str> {
        self.metadata
            .get(METADATA_CUSTOMER_EMAIL)
            .map(|s| s.as_str())
    }

    /// Paid amount in major units
    pub fn amount_paid(&self) -> f64 {
        self.currency.from_smallest_unit(self.amount_total)
    }
}

/// Core trait for payment provider implementations.
#[async_trait]
pub trait CheckoutBroker: Send + Sync {
    /// Create a hosted checkout session for one cart line.
    ///
    /// `plantId` and `customerEmail` must be attached as session metadata.
    async fn create_session(
        &self,
        line: &CartLine,
        customer_email: &str,
        urls: &CheckoutUrls,
    ) -> MarketResult<CheckoutSession>;

    /// Fetch the current state of a session. Must not mutate anything.
    async fn retrieve_session(&self, session_id: &str) -> MarketResult<SessionState>;

    /// Get the provider name (for logging).
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared broker (dynamic dispatch)
pub type BoxedCheckoutBroker = Arc<dyn CheckoutBroker>;

/// Redirect targets for checkout, built from the client application's base URL
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    /// Base URL of the client application (e.g., "https://plants.example")
    pub base_url: String,
}

impl CheckoutUrls {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Success URL with the provider's session id placeholder
    pub fn success_url(&self) -> String {
        format!(
            "{}/payment-success?session_id={}",
            self.base_url, SESSION_ID_TEMPLATE
        )
    }

    /// Cancel URL returning the customer to the plant page
    pub fn cancel_url(&self, plant_id: &str) -> String {
        format!("{}/plant/{}", self.base_url, plant_id)
    }
}

impl Default for CheckoutUrls {
    fn default() -> Self {
        Self::new("http://localhost:5173")
    }
}
