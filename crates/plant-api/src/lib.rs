//! # plant-api
//!
//! HTTP API layer for plantmart.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Role-gated extractors backed by Firebase identity tokens
//! - REST endpoints for the catalog, checkout, orders and seller onboarding
//!
//! ## Endpoints
//!
//! | Method | Path | Gate | Description |
//! |--------|------|------|-------------|
//! | GET | `/health` | - | Health check |
//! | POST | `/user` | - | Upsert principal on sign-in |
//! | GET | `/users` | admin | All principals except the caller |
//! | POST | `/plants` | seller | List a plant |
//! | GET | `/plants` | - | Catalog |
//! | GET | `/plants/{id}` | - | One plant |
//! | POST | `/create-checkout-session` | - | Hosted checkout for one plant |
//! | POST | `/payment-success` | - | Fulfill a paid session |
//! | GET | `/my-orders` | token | Caller's orders |
//! | GET | `/manage-orders/{email}` | seller | Orders received by a seller |
//! | GET | `/my-inventory/{email}` | seller | Plants listed by a seller |
//! | POST | `/become-seller` | token | Apply for the seller role |
//! | GET | `/seller-request` | admin | Pending applications |
//! | PATCH | `/update-role` | admin | Approve a request or re-grade a user |
//! | GET | `/user/role` | token | Caller's role |

pub mod auth;
pub mod extract;
pub mod handlers;
pub mod identity;
pub mod routes;
pub mod state;

pub use identity::FirebaseIdentityVerifier;
pub use routes::create_router;
pub use state::{AppConfig, AppState};
