//! # Firebase Identity Verification
//!
//! Verifies Firebase ID tokens through the Identity Toolkit `accounts:lookup`
//! endpoint. Firebase checks signature and expiry; we read back the email.

use async_trait::async_trait;
use plant_core::{IdentityVerifier, MarketError, MarketResult, VerifiedIdentity};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, instrument};

const PROVIDER: &str = "firebase";

pub struct FirebaseIdentityVerifier {
    api_key: String,
    api_base_url: String,
    client: Client,
}

impl FirebaseIdentityVerifier {
    pub fn new(api_key: impl Into<String>) -> MarketResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| MarketError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            api_key: api_key.into(),
            api_base_url: "https://identitytoolkit.googleapis.com".to_string(),
            client,
        })
    }

    /// Required env vars:
    /// - `FIREBASE_API_KEY`
    pub fn from_env() -> MarketResult<Self> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var("FIREBASE_API_KEY")
            .map_err(|_| MarketError::Configuration("FIREBASE_API_KEY not set".to_string()))?;
        Self::new(api_key)
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

#[async_trait]
impl IdentityVerifier for FirebaseIdentityVerifier {
    #[instrument(skip_all)]
    async fn verify(&self, token: &str) -> MarketResult<VerifiedIdentity> {
        let url = format!("{}/v1/accounts:lookup", self.api_base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&serde_json::json!({ "idToken": token }))
            .send()
            .await
            .map_err(|e| MarketError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            return Err(MarketError::Unauthenticated(
                "Unauthorized Access!".to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Firebase lookup error: status={}, body={}", status, body);
            return Err(MarketError::ProviderError {
                provider: PROVIDER.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        let lookup: LookupResponse = response
            .json()
            .await
            .map_err(|e| MarketError::Serialization(format!("Firebase lookup: {}", e)))?;

        let email = lookup
            .users
            .into_iter()
            .next()
            .and_then(|u| u.email)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                MarketError::Unauthenticated("token carries no email claim".to_string())
            })?;

        debug!(%email, "firebase token verified");
        Ok(VerifiedIdentity { email })
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
struct LookupUser {
    #[serde(default)]
    email: Option<String>,
}
