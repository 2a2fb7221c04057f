//! # plant-postgres
//!
//! PostgreSQL `MarketStore` for plantmart.
//!
//! ## Tables
//!
//! - `principals` - users keyed by email, with their role
//! - `plants` - catalog items and stock counters
//! - `orders` - append-only ledger, unique on `transaction_id`
//! - `seller_requests` - open seller applications, unique on (name, email, image)
//!
//! Multi-statement operations (`commit_fulfillment`, `resolve_request`) run
//! inside a single database transaction.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use plant_postgres::PgMarketStore;
//!
//! let store = PgMarketStore::connect(&std::env::var("DATABASE_URL")?).await?;
//! store.migrate().await?;
//! ```

mod rows;
pub mod store;

pub use store::PgMarketStore;
