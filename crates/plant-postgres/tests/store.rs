//! Store contract tests against a live PostgreSQL.
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/plantmart_test cargo test -p plant-postgres -- --ignored
//! ```

use chrono::Utc;
use plant_core::{
    CatalogItem, CatalogStore, LedgerCommit, MarketError, Order, OrderLedger, Role, RoleStore,
    SellerRef, SellerRequest, SellerRequestStore, SignIn, SignInOutcome,
};
use plant_postgres::PgMarketStore;
use std::sync::Arc;

async fn store() -> PgMarketStore {
    let url = std::env::var("DATABASE_URL").unwrap();
    let store = PgMarketStore::connect(&url).await.unwrap();
    store.migrate().await.unwrap();
    store
}

/// Unique per test run so tests can share one database
fn unique(prefix: &str) -> String {
    format!(
        "{}-{}",
        prefix,
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    )
}

fn plant(id: &str, quantity: u32) -> CatalogItem {
    CatalogItem {
        id: id.to_string(),
        name: "Fern".into(),
        category: "Outdoor".into(),
        description: None,
        price: 15.0,
        quantity,
        seller: SellerRef {
            email: "s@x.com".into(),
            name: Some("Sam".into()),
            image: None,
        },
        image: None,
    }
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_sign_in_upsert() {
    let store = store().await;
    let email = format!("{}@x.com", unique("user"));
    let sign_in = SignIn {
        email: email.clone(),
        name: Some("Ada".into()),
        image: None,
    };

    assert_eq!(
        store.upsert_on_sign_in(sign_in.clone()).await.unwrap(),
        SignInOutcome::Created
    );
    assert!(store.set_role(&email, Role::Seller).await.unwrap());
    assert!(!store.set_role(&email, Role::Seller).await.unwrap());
    assert_eq!(
        store.upsert_on_sign_in(sign_in).await.unwrap(),
        SignInOutcome::Refreshed
    );

    let principal = store.find_principal(&email).await.unwrap().unwrap();
    assert_eq!(principal.role, Role::Seller);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_fulfillment_survives_reconnect() {
    let store = store().await;
    let item = store.insert_item(plant(&unique("P"), 3)).await.unwrap();
    let tx_id = unique("pi");

    let first = store
        .commit_fulfillment(Order::for_item(&item, &tx_id, "c@x.com", 15.0))
        .await
        .unwrap();
    assert!(matches!(first, LedgerCommit::Created(_)));

    // A fresh pool sees the same ledger
    let reopened = self::store().await;
    let replay = reopened
        .commit_fulfillment(Order::for_item(&item, &tx_id, "c@x.com", 15.0))
        .await
        .unwrap();
    assert!(matches!(replay, LedgerCommit::Duplicate(_)));
    assert_eq!(replay.order().id, first.order().id);
    assert_eq!(
        reopened.get_item(&item.id).await.unwrap().unwrap().quantity,
        2
    );
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_concurrent_fulfillment_yields_one_order() {
    let store = Arc::new(store().await);
    let item = store.insert_item(plant(&unique("P"), 5)).await.unwrap();
    let tx_id = unique("pi");

    let mut handles = Vec::new();
    for _ in 0..10 {
        let store = store.clone();
        let order = Order::for_item(&item, &tx_id, "c@x.com", 15.0);
        handles.push(tokio::spawn(
            async move { store.commit_fulfillment(order).await },
        ));
    }

    let mut created = 0;
    for handle in handles {
        if let LedgerCommit::Created(_) = handle.await.unwrap().unwrap() {
            created += 1;
        }
    }
    assert_eq!(created, 1);
    assert_eq!(store.get_item(&item.id).await.unwrap().unwrap().quantity, 4);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_no_write_without_stock_or_plant() {
    let store = store().await;
    let item = store.insert_item(plant(&unique("P"), 0)).await.unwrap();
    let tx_id = unique("pi");

    let err = store
        .commit_fulfillment(Order::for_item(&item, &tx_id, "c@x.com", 15.0))
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::InsufficientStock { .. }));
    assert!(store.find_by_transaction(&tx_id).await.unwrap().is_none());

    let ghost = plant(&unique("ghost"), 1);
    let err = store
        .commit_fulfillment(Order::for_item(&ghost, &unique("pi"), "c@x.com", 15.0))
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::InconsistentState(_)));

    let err = store.decrement_quantity(&item.id, 1).await.unwrap_err();
    assert!(matches!(err, MarketError::InsufficientStock { .. }));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_seller_request_lifecycle() {
    let store = store().await;
    let email = format!("{}@x.com", unique("applicant"));
    store
        .upsert_on_sign_in(SignIn {
            email: email.clone(),
            name: None,
            image: None,
        })
        .await
        .unwrap();

    let request = store
        .insert_request(SellerRequest::new("Cal", &email, "cal.png"))
        .await
        .unwrap();
    let err = store
        .insert_request(SellerRequest::new("Cal", &email, "cal.png"))
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::Conflict(_)));

    let (resolved, updated) = store
        .resolve_request(&request.id, Role::Seller)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.email, email);
    assert!(updated);
    assert!(store
        .resolve_request(&request.id, Role::Seller)
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        store.find_principal(&email).await.unwrap().unwrap().role,
        Role::Seller
    );
}
