//! # Stripe Checkout Sessions
//!
//! `CheckoutBroker` backed by the Stripe Checkout Sessions API.
//! Creates single-line `payment` sessions and retrieves them by id.

use crate::config::StripeConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use plant_core::{
    CartLine, CheckoutBroker, CheckoutSession, CheckoutUrls, Currency, MarketError, MarketResult,
    SessionState, SessionStatus, METADATA_CUSTOMER_EMAIL, METADATA_PLANT_ID,
};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, error, info, instrument};

const PROVIDER: &str = "stripe";

/// Stripe Checkout Session broker
///
/// Uses Stripe's hosted checkout page; card data never touches this service.
pub struct StripeSessionBroker {
    config: StripeConfig,
    client: Client,
    currency: Currency,
}

impl StripeSessionBroker {
    /// Create a new Stripe broker
    pub fn new(config: StripeConfig) -> MarketResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| MarketError::Configuration(format!("HTTP client: {}", e)))?;

        info!(test_mode = config.is_test_mode(), "Stripe broker configured");

        Ok(Self {
            config,
            client,
            currency: Currency::USD,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> MarketResult<Self> {
        Self::new(StripeConfig::from_env()?)
    }

    /// Build form parameters for `POST /v1/checkout/sessions`
    fn session_form(
        &self,
        line: &CartLine,
        customer_email: &str,
        urls: &CheckoutUrls,
    ) -> Vec<(String, String)> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), urls.success_url()),
            ("cancel_url".to_string(), urls.cancel_url(&line.plant_id)),
            (
                "line_items[0][price_data][currency]".to_string(),
                self.currency.as_str().to_string(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                line.unit_amount(self.currency).to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                line.name.clone(),
            ),
            (
                "line_items[0][quantity]".to_string(),
                line.quantity.to_string(),
            ),
            ("customer_email".to_string(), customer_email.to_string()),
            (
                format!("metadata[{}]", METADATA_PLANT_ID),
                line.plant_id.clone(),
            ),
            (
                format!("metadata[{}]", METADATA_CUSTOMER_EMAIL),
                customer_email.to_string(),
            ),
        ];

        if let Some(ref desc) = line.description {
            form.push((
                "line_items[0][price_data][product_data][description]".to_string(),
                desc.clone(),
            ));
        }
        if let Some(ref image) = line.image {
            form.push((
                "line_items[0][price_data][product_data][images][0]".to_string(),
                image.clone(),
            ));
        }

        form
    }

    /// Read the body, mapping non-2xx statuses to typed errors
    async fn read_body(response: Response, session_id: Option<&str>) -> MarketResult<String> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MarketError::NetworkError(e.to_string()))?;

        if status.is_success() {
            return Ok(body);
        }

        error!("Stripe API error: status={}, body={}", status, body);

        if status == StatusCode::NOT_FOUND {
            if let Some(id) = session_id {
                return Err(MarketError::not_found("checkout session", id));
            }
        }

        let message = serde_json::from_str::<StripeErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));

        if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketError::BadRequest(message));
        }

        Err(MarketError::ProviderError {
            provider: PROVIDER.to_string(),
            message,
        })
    }
}

/// Stripe ids are `[A-Za-z0-9_]`; anything else never reaches the URL path.
fn validate_session_id(session_id: &str) -> MarketResult<()> {
    let valid = !session_id.is_empty()
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(MarketError::BadRequest(format!(
            "invalid session id: {:?}",
            session_id
        )))
    }
}

fn parse_status(status: Option<&str>) -> SessionStatus {
    match status {
        Some("complete") => SessionStatus::Complete,
        Some("expired") => SessionStatus::Expired,
        _ => SessionStatus::Open,
    }
}

fn parse_currency(currency: Option<&str>) -> MarketResult<Currency> {
    match currency {
        None => Ok(Currency::default()),
        Some(code) => Currency::from_code(code).ok_or_else(|| MarketError::ProviderError {
            provider: PROVIDER.to_string(),
            message: format!("unsupported session currency '{}'", code),
        }),
    }
}

#[async_trait]
impl CheckoutBroker for StripeSessionBroker {
    #[instrument(skip(self, line, urls), fields(plant_id = %line.plant_id))]
    async fn create_session(
        &self,
        line: &CartLine,
        customer_email: &str,
        urls: &CheckoutUrls,
    ) -> MarketResult<CheckoutSession> {
        line.validate()?;

        let form = self.session_form(line, customer_email, urls);
        debug!(
            "Creating Stripe checkout session: unit_amount={}, quantity={}",
            line.unit_amount(self.currency),
            line.quantity
        );

        let url = format!("{}/v1/checkout/sessions", self.config.api_base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .form(&form)
            .send()
            .await
            .map_err(|e| MarketError::NetworkError(e.to_string()))?;

        let body = Self::read_body(response, None).await?;
        let session: StripeSessionObject = serde_json::from_str(&body).map_err(|e| {
            MarketError::Serialization(format!("Failed to parse Stripe response: {}", e))
        })?;

        let checkout_url = session.url.ok_or_else(|| MarketError::ProviderError {
            provider: PROVIDER.to_string(),
            message: format!("session {} has no checkout url", session.id),
        })?;

        info!("Created Stripe checkout session: id={}", session.id);

        Ok(CheckoutSession {
            session_id: session.id,
            checkout_url,
            provider: PROVIDER.to_string(),
            expires_at: session
                .expires_at
                .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
        })
    }

    #[instrument(skip(self))]
    async fn retrieve_session(&self, session_id: &str) -> MarketResult<SessionState> {
        validate_session_id(session_id)?;

        let url = format!(
            "{}/v1/checkout/sessions/{}",
            self.config.api_base_url, session_id
        );
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .send()
            .await
            .map_err(|e| MarketError::NetworkError(e.to_string()))?;

        let body = Self::read_body(response, Some(session_id)).await?;
        let session: StripeSessionObject = serde_json::from_str(&body).map_err(|e| {
            MarketError::Serialization(format!("Failed to parse Stripe session: {}", e))
        })?;

        debug!(
            "Retrieved Stripe session: id={}, status={:?}",
            session.id, session.status
        );

        Ok(SessionState {
            status: parse_status(session.status.as_deref()),
            amount_total: session.amount_total.unwrap_or(0),
            currency: parse_currency(session.currency.as_deref())?,
            transaction_id: session.payment_intent,
            metadata: session.metadata,
            session_id: session.id,
        })
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeSessionObject {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    payment_intent: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
    #[serde(default)]
    expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn line() -> CartLine {
        CartLine {
            plant_id: "P1".into(),
            name: "Fern".into(),
            description: Some("Lush".into()),
            image: Some("https://img/fern.png".into()),
            price: 15.0,
            quantity: 1,
        }
    }

    fn broker(server: &MockServer) -> StripeSessionBroker {
        StripeSessionBroker::new(StripeConfig::new("sk_test_abc").with_api_base_url(server.uri()))
            .unwrap()
    }

    #[test]
    fn test_session_form_carries_metadata_and_urls() {
        let broker = StripeSessionBroker::new(StripeConfig::new("sk_test_abc")).unwrap();
        let urls = CheckoutUrls::new("https://plants.example");
        let form: HashMap<_, _> = broker
            .session_form(&line(), "a@x.com", &urls)
            .into_iter()
            .collect();

        assert_eq!(form["mode"], "payment");
        assert_eq!(form["line_items[0][price_data][unit_amount]"], "1500");
        assert_eq!(form["line_items[0][price_data][currency]"], "usd");
        assert_eq!(form["metadata[plantId]"], "P1");
        assert_eq!(form["metadata[customerEmail]"], "a@x.com");
        assert_eq!(
            form["success_url"],
            "https://plants.example/payment-success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(form["cancel_url"], "https://plants.example/plant/P1");
    }

    #[test]
    fn test_validate_session_id() {
        assert!(validate_session_id("cs_test_a1B2").is_ok());
        assert!(validate_session_id("").is_err());
        assert!(validate_session_id("../v1/customers").is_err());
    }

    #[tokio::test]
    async fn test_create_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(header("Authorization", "Bearer sk_test_abc"))
            .and(body_string_contains("metadata%5BplantId%5D=P1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_1",
                "url": "https://checkout.stripe.com/c/pay/cs_test_1",
                "status": "open",
                "expires_at": 1_900_000_000
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = broker(&server)
            .create_session(&line(), "a@x.com", &CheckoutUrls::default())
            .await
            .unwrap();

        assert_eq!(session.session_id, "cs_test_1");
        assert_eq!(session.provider, "stripe");
        assert!(session.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_retrieve_complete_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/sess_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "sess_1",
                "status": "complete",
                "amount_total": 1500,
                "currency": "usd",
                "payment_intent": "pi_123",
                "metadata": { "plantId": "P1", "customerEmail": "a@x.com" }
            })))
            .mount(&server)
            .await;

        let state = broker(&server).retrieve_session("sess_1").await.unwrap();

        assert!(state.is_complete());
        assert_eq!(state.amount_paid(), 15.0);
        assert_eq!(state.transaction_id.as_deref(), Some("pi_123"));
        assert_eq!(state.plant_id(), Some("P1"));
        assert_eq!(state.customer_email(), Some("a@x.com"));
    }

    #[tokio::test]
    async fn test_retrieve_rejects_foreign_currency() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/sess_eur"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "sess_eur",
                "status": "complete",
                "amount_total": 1500,
                "currency": "eur",
                "payment_intent": "pi_eur",
                "metadata": { "plantId": "P1", "customerEmail": "a@x.com" }
            })))
            .mount(&server)
            .await;

        let err = broker(&server)
            .retrieve_session("sess_eur")
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::ProviderError { .. }));
    }

    #[tokio::test]
    async fn test_retrieve_missing_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/sess_404"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "message": "No such checkout.session: 'sess_404'" }
            })))
            .mount(&server)
            .await;

        let err = broker(&server)
            .retrieve_session("sess_404")
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_provider_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/sess_1"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": { "message": "boom" }
            })))
            .mount(&server)
            .await;

        let err = broker(&server).retrieve_session("sess_1").await.unwrap_err();
        match err {
            MarketError::ProviderError { provider, message } => {
                assert_eq!(provider, "stripe");
                assert_eq!(message, "boom");
            }
            other => panic!("expected ProviderError, got {other:?}"),
        }
    }
}
