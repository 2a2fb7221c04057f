//! # plant-stripe
//!
//! Stripe checkout session broker for plantmart.
//!
//! **StripeSessionBroker** wraps the Checkout Sessions API:
//! - one `payment`-mode line item per session
//! - customer email prefill
//! - `plantId` / `customerEmail` metadata that fulfillment reads back
//! - side-effect-free retrieval by session id
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use plant_stripe::StripeSessionBroker;
//! use plant_core::{CheckoutBroker, CheckoutUrls};
//!
//! let broker = StripeSessionBroker::from_env()?;
//! let urls = CheckoutUrls::new("https://plants.example");
//!
//! let session = broker.create_session(&line, "a@x.com", &urls).await?;
//! // Redirect user to session.checkout_url
//!
//! // Later, after redirect back to /payment-success:
//! let state = broker.retrieve_session(&session.session_id).await?;
//! ```

pub mod checkout;
pub mod config;

// Re-exports
pub use checkout::StripeSessionBroker;
pub use config::StripeConfig;
