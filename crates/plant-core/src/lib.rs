//! # plant-core
//!
//! Core types, stores and workflows for the plantmart marketplace.
//!
//! This crate provides:
//! - `Principal`, `Role` and the `RoleStore` consulted by authorization gates
//! - `GateChain` for ordered authentication/role checks
//! - `CatalogItem` and the `CatalogStore`
//! - `CheckoutBroker` trait for hosted payment sessions
//! - `FulfillmentEngine` turning a paid session into exactly one `Order`
//! - `OnboardingWorkflow` for seller applications and role decisions
//! - `MemoryStore`, an in-process `MarketStore` for tests
//! - `MarketError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use plant_core::{FulfillmentEngine, MemoryStore};
//!
//! let store = Arc::new(MemoryStore::new());
//! let engine = FulfillmentEngine::new(broker, store.clone(), Duration::from_secs(10));
//!
//! // Called with the session id relayed by the client after redirect
//! let outcome = engine.fulfill("cs_test_123").await?;
//! println!("{:?}", outcome.receipt());
//! ```

pub mod broker;
pub mod catalog;
pub mod error;
pub mod fulfillment;
pub mod gate;
pub mod identity;
pub mod memory;
pub mod onboarding;
pub mod order;
pub mod principal;
pub mod store;

// Re-exports for convenience
pub use broker::{
    BoxedCheckoutBroker, CartLine, CheckoutBroker, CheckoutSession, CheckoutUrls, SessionState,
    SessionStatus, METADATA_CUSTOMER_EMAIL, METADATA_PLANT_ID, SESSION_ID_TEMPLATE,
};
pub use catalog::{CatalogItem, Currency, NewCatalogItem, SellerDisplay, SellerRef};
pub use error::{MarketError, MarketResult};
pub use fulfillment::{Fulfillment, FulfillmentEngine, FulfillmentReceipt};
pub use gate::{Gate, GateChain, GateContext};
pub use identity::{BoxedIdentityVerifier, IdentityVerifier, VerifiedIdentity};
pub use memory::MemoryStore;
pub use onboarding::{OnboardingWorkflow, RoleDecision, SellerRequest};
pub use order::{Order, OrderStatus};
pub use principal::{Principal, Role, SignIn, SignInOutcome};
pub use store::{
    CatalogStore, LedgerCommit, MarketStore, OrderLedger, RoleStore, SellerRequestStore,
    SharedStore,
};
