//! # Application State
//!
//! Shared state for the Axum application.
//! Built once at startup; every request borrows the same store, broker and
//! verifier handles.

use crate::identity::FirebaseIdentityVerifier;
use plant_core::{
    BoxedCheckoutBroker, BoxedIdentityVerifier, CheckoutUrls, FulfillmentEngine,
    OnboardingWorkflow, SharedStore,
};
use plant_postgres::PgMarketStore;
use plant_stripe::StripeSessionBroker;
use std::sync::Arc;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Client application origin; CORS origin and redirect base
    pub client_domain: String,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Deadline for payment provider session retrieval
    pub provider_timeout: Duration,
    /// Deadline for identity token verification
    pub identity_timeout: Duration,
    /// PostgreSQL connection string
    pub database_url: Option<String>,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env_parse("PORT").unwrap_or(3000),
            client_domain: std::env::var("CLIENT_DOMAIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            provider_timeout: Duration::from_secs(env_parse("PROVIDER_TIMEOUT_SECS").unwrap_or(10)),
            identity_timeout: Duration::from_secs(env_parse("IDENTITY_TIMEOUT_SECS").unwrap_or(5)),
            database_url: std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            client_domain: "http://localhost:5173".to_string(),
            environment: "development".to_string(),
            provider_timeout: Duration::from_secs(10),
            identity_timeout: Duration::from_secs(5),
            database_url: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Principals, catalog, orders and seller requests
    pub store: SharedStore,
    /// Payment provider
    pub broker: BoxedCheckoutBroker,
    /// Identity provider
    pub verifier: BoxedIdentityVerifier,
    pub fulfillment: Arc<FulfillmentEngine>,
    pub onboarding: Arc<OnboardingWorkflow>,
    /// Checkout redirect URLs
    pub urls: CheckoutUrls,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Create a new AppState with Stripe, Firebase and the PostgreSQL store
    pub async fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();

        let database_url = config
            .database_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL not set"))?;
        let store = PgMarketStore::connect(database_url)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
        store
            .migrate()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to migrate database: {}", e))?;

        let broker = StripeSessionBroker::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;
        let verifier = FirebaseIdentityVerifier::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize identity verifier: {}", e))?;

        Ok(Self::from_parts(
            config,
            Arc::new(store),
            Arc::new(broker),
            Arc::new(verifier),
        ))
    }

    /// Wire state from explicit collaborators
    pub fn from_parts(
        config: AppConfig,
        store: SharedStore,
        broker: BoxedCheckoutBroker,
        verifier: BoxedIdentityVerifier,
    ) -> Self {
        let fulfillment = FulfillmentEngine::new(
            broker.clone(),
            store.clone(),
            config.provider_timeout,
        );
        let onboarding = OnboardingWorkflow::new(store.clone());

        Self {
            urls: CheckoutUrls::new(&config.client_domain),
            fulfillment: Arc::new(fulfillment),
            onboarding: Arc::new(onboarding),
            store,
            broker,
            verifier,
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert_eq!(config.provider_timeout, Duration::from_secs(10));
        assert!(config.database_url.is_none());
        assert!(!config.is_production());
    }

    #[test]
    fn test_socket_addr() {
        let config = AppConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
            ..AppConfig::default()
        };

        let addr = config.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "0.0.0.0:3000");
    }
}
