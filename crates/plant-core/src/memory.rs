//! # In-Memory Store
//!
//! In-process `MarketStore`, used by tests and local tooling. All tables live behind one async
//! mutex, so every trait method runs as a single critical section: the
//! transaction-id uniqueness check, the order insert and the stock decrement
//! of a fulfillment can never interleave with another caller.

use crate::catalog::CatalogItem;
use crate::error::{MarketError, MarketResult};
use crate::onboarding::SellerRequest;
use crate::order::Order;
use crate::principal::{Principal, Role, SignIn, SignInOutcome};
use crate::store::{CatalogStore, LedgerCommit, OrderLedger, RoleStore, SellerRequestStore};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct Tables {
    principals: Vec<Principal>,
    items: Vec<CatalogItem>,
    orders: Vec<Order>,
    /// transaction id → index into `orders`
    transactions: HashMap<String, usize>,
    requests: Vec<SellerRequest>,
}

impl Tables {
    fn principal_mut(&mut self, email: &str) -> Option<&mut Principal> {
        self.principals.iter_mut().find(|p| p.email == email)
    }

    fn item_mut(&mut self, id: &str) -> Option<&mut CatalogItem> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    fn set_role(&mut self, email: &str, role: Role) -> bool {
        match self.principal_mut(email) {
            Some(principal) if principal.role != role => {
                principal.role = role;
                true
            }
            _ => false,
        }
    }
}

/// Process-wide in-memory store
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn upsert_on_sign_in(&self, sign_in: SignIn) -> MarketResult<SignInOutcome> {
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables.principal_mut(&sign_in.email) {
            existing.last_logged_in = Utc::now();
            return Ok(SignInOutcome::Refreshed);
        }
        tables.principals.push(Principal::from_sign_in(sign_in));
        Ok(SignInOutcome::Created)
    }

    async fn find_principal(&self, email: &str) -> MarketResult<Option<Principal>> {
        let tables = self.tables.lock().await;
        Ok(tables.principals.iter().find(|p| p.email == email).cloned())
    }

    async fn list_principals_except(&self, email: &str) -> MarketResult<Vec<Principal>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .principals
            .iter()
            .filter(|p| p.email != email)
            .cloned()
            .collect())
    }

    async fn set_role(&self, email: &str, role: Role) -> MarketResult<bool> {
        let mut tables = self.tables.lock().await;
        Ok(tables.set_role(email, role))
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert_item(&self, item: CatalogItem) -> MarketResult<CatalogItem> {
        let mut tables = self.tables.lock().await;
        if tables.items.iter().any(|i| i.id == item.id) {
            return Err(MarketError::Conflict(format!(
                "plant {} already exists",
                item.id
            )));
        }
        tables.items.push(item.clone());
        Ok(item)
    }

    async fn list_items(&self) -> MarketResult<Vec<CatalogItem>> {
        Ok(self.tables.lock().await.items.clone())
    }

    async fn get_item(&self, id: &str) -> MarketResult<Option<CatalogItem>> {
        let tables = self.tables.lock().await;
        Ok(tables.items.iter().find(|i| i.id == id).cloned())
    }

    async fn items_by_seller(&self, seller_email: &str) -> MarketResult<Vec<CatalogItem>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .items
            .iter()
            .filter(|i| i.seller.email == seller_email)
            .cloned()
            .collect())
    }

    async fn decrement_quantity(&self, id: &str, by: u32) -> MarketResult<CatalogItem> {
        let mut tables = self.tables.lock().await;
        let item = tables
            .item_mut(id)
            .ok_or_else(|| MarketError::not_found("plant", id))?;
        item.quantity = item
            .quantity
            .checked_sub(by)
            .ok_or_else(|| MarketError::InsufficientStock {
                plant_id: id.to_string(),
            })?;
        Ok(item.clone())
    }
}

#[async_trait]
impl OrderLedger for MemoryStore {
    async fn find_by_transaction(&self, transaction_id: &str) -> MarketResult<Option<Order>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .transactions
            .get(transaction_id)
            .and_then(|&idx| tables.orders.get(idx))
            .cloned())
    }

    async fn orders_for_customer(&self, email: &str) -> MarketResult<Vec<Order>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .iter()
            .filter(|o| o.customer == email)
            .cloned()
            .collect())
    }

    async fn orders_for_seller(&self, seller_email: &str) -> MarketResult<Vec<Order>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .iter()
            .filter(|o| o.seller.email == seller_email)
            .cloned()
            .collect())
    }

    async fn commit_fulfillment(&self, order: Order) -> MarketResult<LedgerCommit> {
        let mut tables = self.tables.lock().await;

        if let Some(existing) = tables
            .transactions
            .get(&order.transaction_id)
            .and_then(|&idx| tables.orders.get(idx))
        {
            debug!(transaction_id = %order.transaction_id, "duplicate fulfillment folded");
            return Ok(LedgerCommit::Duplicate(existing.clone()));
        }

        let item = tables.item_mut(&order.plant_id).ok_or_else(|| {
            MarketError::InconsistentState(format!(
                "plant {} referenced by transaction {} does not exist",
                order.plant_id, order.transaction_id
            ))
        })?;
        item.quantity = item.quantity.checked_sub(order.quantity).ok_or_else(|| {
            MarketError::InsufficientStock {
                plant_id: order.plant_id.clone(),
            }
        })?;

        let idx = tables.orders.len();
        tables.transactions.insert(order.transaction_id.clone(), idx);
        tables.orders.push(order.clone());
        Ok(LedgerCommit::Created(order))
    }
}

#[async_trait]
impl SellerRequestStore for MemoryStore {
    async fn insert_request(&self, request: SellerRequest) -> MarketResult<SellerRequest> {
        let mut tables = self.tables.lock().await;
        if tables.requests.iter().any(|r| r.same_applicant(&request)) {
            return Err(MarketError::Conflict(
                "already you requested, please wait".to_string(),
            ));
        }
        tables.requests.push(request.clone());
        Ok(request)
    }

    async fn list_requests(&self) -> MarketResult<Vec<SellerRequest>> {
        Ok(self.tables.lock().await.requests.clone())
    }

    async fn resolve_request(
        &self,
        id: &str,
        role: Role,
    ) -> MarketResult<Option<(SellerRequest, bool)>> {
        let mut tables = self.tables.lock().await;
        let Some(pos) = tables.requests.iter().position(|r| r.id == id) else {
            return Ok(None);
        };
        let request = tables.requests.remove(pos);
        let updated = tables.set_role(&request.email, role);
        Ok(Some((request, updated)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SellerRef;
    use std::sync::Arc;

    fn item(id: &str, quantity: u32) -> CatalogItem {
        CatalogItem {
            id: id.into(),
            name: "Fern".into(),
            category: "Outdoor".into(),
            description: None,
            price: 15.0,
            quantity,
            seller: SellerRef {
                email: "s@x.com".into(),
                name: None,
                image: None,
            },
            image: None,
        }
    }

    fn sign_in(email: &str) -> SignIn {
        SignIn {
            email: email.into(),
            name: None,
            image: None,
        }
    }

    #[tokio::test]
    async fn test_sign_in_upsert_keeps_role() {
        let store = MemoryStore::new();
        assert_eq!(
            store.upsert_on_sign_in(sign_in("a@x.com")).await.unwrap(),
            SignInOutcome::Created
        );
        assert!(store.set_role("a@x.com", Role::Seller).await.unwrap());

        assert_eq!(
            store.upsert_on_sign_in(sign_in("a@x.com")).await.unwrap(),
            SignInOutcome::Refreshed
        );
        let principal = store.find_principal("a@x.com").await.unwrap().unwrap();
        assert_eq!(principal.role, Role::Seller);
    }

    #[tokio::test]
    async fn test_set_role_reports_changes_only() {
        let store = MemoryStore::new();
        store.upsert_on_sign_in(sign_in("a@x.com")).await.unwrap();

        assert!(!store.set_role("a@x.com", Role::Customer).await.unwrap());
        assert!(!store.set_role("ghost@x.com", Role::Admin).await.unwrap());
        assert!(store.set_role("a@x.com", Role::Admin).await.unwrap());
    }

    #[tokio::test]
    async fn test_decrement_never_goes_negative() {
        let store = MemoryStore::new();
        store.insert_item(item("P1", 1)).await.unwrap();

        let after = store.decrement_quantity("P1", 1).await.unwrap();
        assert_eq!(after.quantity, 0);

        let err = store.decrement_quantity("P1", 1).await.unwrap_err();
        assert!(matches!(err, MarketError::InsufficientStock { .. }));
        assert_eq!(store.get_item("P1").await.unwrap().unwrap().quantity, 0);

        let err = store.decrement_quantity("nope", 1).await.unwrap_err();
        assert!(matches!(err, MarketError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_commit_fulfillment_is_unique_per_transaction() {
        let store = Arc::new(MemoryStore::new());
        let plant = store.insert_item(item("P1", 5)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let order = Order::for_item(&plant, "pi_1", "a@x.com", 15.0);
            handles.push(tokio::spawn(async move {
                store.commit_fulfillment(order).await
            }));
        }

        let mut created = 0;
        for handle in handles {
            if let LedgerCommit::Created(_) = handle.await.unwrap().unwrap() {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(store.get_item("P1").await.unwrap().unwrap().quantity, 4);
        assert_eq!(store.orders_for_customer("a@x.com").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_fulfillment_writes_nothing_on_failure() {
        let store = MemoryStore::new();
        let plant = store.insert_item(item("P1", 0)).await.unwrap();

        let err = store
            .commit_fulfillment(Order::for_item(&plant, "pi_1", "a@x.com", 15.0))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::InsufficientStock { .. }));
        assert!(store.find_by_transaction("pi_1").await.unwrap().is_none());

        let ghost = item("P404", 3);
        let err = store
            .commit_fulfillment(Order::for_item(&ghost, "pi_2", "a@x.com", 15.0))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::InconsistentState(_)));
        assert!(store.find_by_transaction("pi_2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_request_sets_role_and_removes() {
        let store = MemoryStore::new();
        store.upsert_on_sign_in(sign_in("a@x.com")).await.unwrap();
        let request = store
            .insert_request(SellerRequest::new("Ada", "a@x.com", "img"))
            .await
            .unwrap();

        let (resolved, updated) = store
            .resolve_request(&request.id, Role::Seller)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, request.id);
        assert!(updated);
        assert!(store.list_requests().await.unwrap().is_empty());
        assert!(store
            .resolve_request(&request.id, Role::Seller)
            .await
            .unwrap()
            .is_none());
    }
}
