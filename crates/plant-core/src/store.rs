//! # Store Traits
//!
//! Persistence seams for principals, catalog, orders and seller requests.
//! Every method is one logical transaction: implementations must apply each
//! call atomically with respect to concurrent callers.

use crate::catalog::CatalogItem;
use crate::error::MarketResult;
use crate::onboarding::SellerRequest;
use crate::order::Order;
use crate::principal::{Principal, Role, SignIn, SignInOutcome};
use async_trait::async_trait;
use std::sync::Arc;

/// Authoritative principal → role mapping
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Insert a new customer, or refresh `last_logged_in` for a known email.
    async fn upsert_on_sign_in(&self, sign_in: SignIn) -> MarketResult<SignInOutcome>;

    async fn find_principal(&self, email: &str) -> MarketResult<Option<Principal>>;

    /// All principals except `email`
    async fn list_principals_except(&self, email: &str) -> MarketResult<Vec<Principal>>;

    /// Set the role of an existing principal. Returns true only if a stored
    /// value actually changed.
    async fn set_role(&self, email: &str, role: Role) -> MarketResult<bool>;
}

/// Inventory items with stock counters
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_item(&self, item: CatalogItem) -> MarketResult<CatalogItem>;

    async fn list_items(&self) -> MarketResult<Vec<CatalogItem>>;

    async fn get_item(&self, id: &str) -> MarketResult<Option<CatalogItem>>;

    async fn items_by_seller(&self, seller_email: &str) -> MarketResult<Vec<CatalogItem>>;

    /// Conditionally decrement stock.
    ///
    /// Fails with `NotFound` for an unknown id and `InsufficientStock` (no
    /// mutation) if the result would be negative.
    async fn decrement_quantity(&self, id: &str, by: u32) -> MarketResult<CatalogItem>;
}

/// Result of committing a fulfillment to the ledger
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerCommit {
    /// Order inserted and stock decremented
    Created(Order),
    /// An order already holds this transaction id; nothing was written
    Duplicate(Order),
}

impl LedgerCommit {
    pub fn order(&self) -> &Order {
        match self {
            LedgerCommit::Created(order) | LedgerCommit::Duplicate(order) => order,
        }
    }
}

/// Append-only order ledger
#[async_trait]
pub trait OrderLedger: Send + Sync {
    async fn find_by_transaction(&self, transaction_id: &str) -> MarketResult<Option<Order>>;

    async fn orders_for_customer(&self, email: &str) -> MarketResult<Vec<Order>>;

    async fn orders_for_seller(&self, seller_email: &str) -> MarketResult<Vec<Order>>;

    /// Insert `order` and decrement its plant's stock by `order.quantity` as
    /// one unit.
    ///
    /// - transaction id already present: `Duplicate`, no writes
    /// - plant missing: `InconsistentState`, no writes
    /// - not enough stock: `InsufficientStock`, no writes
    async fn commit_fulfillment(&self, order: Order) -> MarketResult<LedgerCommit>;
}

/// Open seller applications
#[async_trait]
pub trait SellerRequestStore: Send + Sync {
    /// Fails with `Conflict` if an identical (name, email, image) request is open.
    async fn insert_request(&self, request: SellerRequest) -> MarketResult<SellerRequest>;

    async fn list_requests(&self) -> MarketResult<Vec<SellerRequest>>;

    /// Set the applicant's role and delete the request as one unit.
    ///
    /// Returns `None` if no request has this id. The flag reports whether a
    /// principal record was updated.
    async fn resolve_request(
        &self,
        id: &str,
        role: Role,
    ) -> MarketResult<Option<(SellerRequest, bool)>>;
}

/// Everything the marketplace persists
pub trait MarketStore: RoleStore + CatalogStore + OrderLedger + SellerRequestStore {}

impl<T> MarketStore for T where T: RoleStore + CatalogStore + OrderLedger + SellerRequestStore {}

pub type SharedStore = Arc<dyn MarketStore>;
