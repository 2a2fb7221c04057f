//! # PostgreSQL Market Store
//!
//! Runtime-checked queries (`sqlx::query_as`) against the schema in
//! `migrations/`. Single-statement operations rely on row-level atomicity;
//! fulfillment and request resolution open an explicit transaction.

use crate::rows::{
    collect, to_db_quantity, OrderRow, PlantRow, PrincipalRow, SellerRequestRow,
};
use async_trait::async_trait;
use chrono::Utc;
use plant_core::{
    CatalogItem, CatalogStore, LedgerCommit, MarketError, MarketResult, Order, OrderLedger,
    Principal, Role, RoleStore, SellerRequest, SellerRequestStore, SignIn, SignInOutcome,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;
use tracing::{debug, info, instrument};

const PRINCIPAL_COLUMNS: &str = "email, name, image, role, created_at, last_logged_in";

const PLANT_COLUMNS: &str = "id, name, category, description, price, quantity, \
     seller_email, seller_name, seller_image, image";

const ORDER_COLUMNS: &str = "id, plant_id, transaction_id, customer, status, \
     seller_email, seller_name, seller_image, name, category, image, quantity, price, created_at";

const REQUEST_COLUMNS: &str = "id, name, email, image, created_at";

/// `MarketStore` backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgMarketStore {
    pool: PgPool,
}

impl PgMarketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool for `database_url`.
    pub async fn connect(database_url: &str) -> MarketResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(|e| MarketError::Configuration(format!("database connection: {}", e)))?;
        Ok(Self::new(pool))
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> MarketResult<()> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .map_err(|e| MarketError::Storage(format!("migration failed: {}", e)))?;
        info!("database schema up to date");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn plant_exists(
        tx: &mut Transaction<'_, Postgres>,
        plant_id: &str,
    ) -> MarketResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM plants WHERE id = $1)")
            .bind(plant_id)
            .fetch_one(&mut **tx)
            .await
            .map_err(storage_error)
    }
}

fn storage_error(err: sqlx::Error) -> MarketError {
    match err {
        sqlx::Error::PoolTimedOut => MarketError::Timeout {
            operation: "database connection",
        },
        other => MarketError::Storage(other.to_string()),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

#[async_trait]
impl RoleStore for PgMarketStore {
    #[instrument(skip(self, sign_in), fields(email = %sign_in.email))]
    async fn upsert_on_sign_in(&self, sign_in: SignIn) -> MarketResult<SignInOutcome> {
        // xmax is zero only for a freshly inserted tuple
        let inserted: bool = sqlx::query_scalar(
            r"
            INSERT INTO principals (email, name, image, role, created_at, last_logged_in)
            VALUES ($1, $2, $3, 'customer', $4, $4)
            ON CONFLICT (email) DO UPDATE SET last_logged_in = EXCLUDED.last_logged_in
            RETURNING (xmax = 0)
            ",
        )
        .bind(&sign_in.email)
        .bind(&sign_in.name)
        .bind(&sign_in.image)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(if inserted {
            SignInOutcome::Created
        } else {
            SignInOutcome::Refreshed
        })
    }

    async fn find_principal(&self, email: &str) -> MarketResult<Option<Principal>> {
        let row: Option<PrincipalRow> = sqlx::query_as(&format!(
            "SELECT {} FROM principals WHERE email = $1",
            PRINCIPAL_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;
        row.map(Principal::try_from).transpose()
    }

    async fn list_principals_except(&self, email: &str) -> MarketResult<Vec<Principal>> {
        let rows: Vec<PrincipalRow> = sqlx::query_as(&format!(
            "SELECT {} FROM principals WHERE email <> $1 ORDER BY created_at",
            PRINCIPAL_COLUMNS
        ))
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        collect(rows)
    }

    async fn set_role(&self, email: &str, role: Role) -> MarketResult<bool> {
        let result = sqlx::query("UPDATE principals SET role = $2 WHERE email = $1 AND role <> $2")
            .bind(email)
            .bind(role.as_str())
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl CatalogStore for PgMarketStore {
    #[instrument(skip(self, item), fields(plant_id = %item.id))]
    async fn insert_item(&self, item: CatalogItem) -> MarketResult<CatalogItem> {
        sqlx::query(
            r"
            INSERT INTO plants (id, name, category, description, price, quantity,
                                seller_email, seller_name, seller_image, image)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(&item.category)
        .bind(&item.description)
        .bind(item.price)
        .bind(to_db_quantity(item.quantity)?)
        .bind(&item.seller.email)
        .bind(&item.seller.name)
        .bind(&item.seller.image)
        .bind(&item.image)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                MarketError::Conflict(format!("plant {} already exists", item.id))
            } else {
                storage_error(e)
            }
        })?;
        Ok(item)
    }

    async fn list_items(&self) -> MarketResult<Vec<CatalogItem>> {
        let rows: Vec<PlantRow> = sqlx::query_as(&format!(
            "SELECT {} FROM plants ORDER BY listed_at",
            PLANT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        collect(rows)
    }

    async fn get_item(&self, id: &str) -> MarketResult<Option<CatalogItem>> {
        let row: Option<PlantRow> =
            sqlx::query_as(&format!("SELECT {} FROM plants WHERE id = $1", PLANT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_error)?;
        row.map(CatalogItem::try_from).transpose()
    }

    async fn items_by_seller(&self, seller_email: &str) -> MarketResult<Vec<CatalogItem>> {
        let rows: Vec<PlantRow> = sqlx::query_as(&format!(
            "SELECT {} FROM plants WHERE seller_email = $1 ORDER BY listed_at",
            PLANT_COLUMNS
        ))
        .bind(seller_email)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        collect(rows)
    }

    async fn decrement_quantity(&self, id: &str, by: u32) -> MarketResult<CatalogItem> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;
        let row: Option<PlantRow> = sqlx::query_as(&format!(
            "UPDATE plants SET quantity = quantity - $2 \
             WHERE id = $1 AND quantity >= $2 RETURNING {}",
            PLANT_COLUMNS
        ))
        .bind(id)
        .bind(to_db_quantity(by)?)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_error)?;

        if let Some(row) = row {
            tx.commit().await.map_err(storage_error)?;
            return CatalogItem::try_from(row);
        }
        if Self::plant_exists(&mut tx, id).await? {
            Err(MarketError::InsufficientStock {
                plant_id: id.to_string(),
            })
        } else {
            Err(MarketError::not_found("plant", id))
        }
    }
}

#[async_trait]
impl OrderLedger for PgMarketStore {
    async fn find_by_transaction(&self, transaction_id: &str) -> MarketResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {} FROM orders WHERE transaction_id = $1",
            ORDER_COLUMNS
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;
        row.map(Order::try_from).transpose()
    }

    async fn orders_for_customer(&self, email: &str) -> MarketResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {} FROM orders WHERE customer = $1 ORDER BY created_at",
            ORDER_COLUMNS
        ))
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        collect(rows)
    }

    async fn orders_for_seller(&self, seller_email: &str) -> MarketResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {} FROM orders WHERE seller_email = $1 ORDER BY created_at",
            ORDER_COLUMNS
        ))
        .bind(seller_email)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        collect(rows)
    }

    /// Insert-or-skip on the `transaction_id` unique index, then a guarded
    /// decrement, in one transaction. A concurrent insert of the same
    /// transaction id blocks on the index until the first commits, then skips.
    #[instrument(skip(self, order), fields(transaction_id = %order.transaction_id))]
    async fn commit_fulfillment(&self, order: Order) -> MarketResult<LedgerCommit> {
        let quantity = to_db_quantity(order.quantity)?;
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let inserted = sqlx::query(
            r"
            INSERT INTO orders (id, plant_id, transaction_id, customer, status,
                                seller_email, seller_name, seller_image,
                                name, category, image, quantity, price, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (transaction_id) DO NOTHING
            ",
        )
        .bind(&order.id)
        .bind(&order.plant_id)
        .bind(&order.transaction_id)
        .bind(&order.customer)
        .bind(order.status.as_str())
        .bind(&order.seller.email)
        .bind(&order.seller.name)
        .bind(&order.seller.image)
        .bind(&order.name)
        .bind(&order.category)
        .bind(&order.image)
        .bind(quantity)
        .bind(order.price)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await.map_err(storage_error)?;
            debug!("duplicate fulfillment folded");
            let existing = self
                .find_by_transaction(&order.transaction_id)
                .await?
                .ok_or_else(|| {
                    MarketError::InconsistentState(format!(
                        "transaction {} conflicted but no order holds it",
                        order.transaction_id
                    ))
                })?;
            return Ok(LedgerCommit::Duplicate(existing));
        }

        let decremented = sqlx::query(
            "UPDATE plants SET quantity = quantity - $2 WHERE id = $1 AND quantity >= $2",
        )
        .bind(&order.plant_id)
        .bind(quantity)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?
        .rows_affected();

        if decremented == 0 {
            let exists = Self::plant_exists(&mut tx, &order.plant_id).await?;
            tx.rollback().await.map_err(storage_error)?;
            return Err(if exists {
                MarketError::InsufficientStock {
                    plant_id: order.plant_id,
                }
            } else {
                MarketError::InconsistentState(format!(
                    "plant {} referenced by transaction {} does not exist",
                    order.plant_id, order.transaction_id
                ))
            });
        }

        tx.commit().await.map_err(storage_error)?;
        Ok(LedgerCommit::Created(order))
    }
}

#[async_trait]
impl SellerRequestStore for PgMarketStore {
    async fn insert_request(&self, request: SellerRequest) -> MarketResult<SellerRequest> {
        sqlx::query(
            "INSERT INTO seller_requests (id, name, email, image, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&request.id)
        .bind(&request.name)
        .bind(&request.email)
        .bind(&request.image)
        .bind(request.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                MarketError::Conflict("already you requested, please wait".to_string())
            } else {
                storage_error(e)
            }
        })?;
        Ok(request)
    }

    async fn list_requests(&self) -> MarketResult<Vec<SellerRequest>> {
        let rows: Vec<SellerRequestRow> = sqlx::query_as(&format!(
            "SELECT {} FROM seller_requests ORDER BY created_at",
            REQUEST_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(rows.into_iter().map(SellerRequest::from).collect())
    }

    #[instrument(skip(self))]
    async fn resolve_request(
        &self,
        id: &str,
        role: Role,
    ) -> MarketResult<Option<(SellerRequest, bool)>> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let row: Option<SellerRequestRow> = sqlx::query_as(&format!(
            "DELETE FROM seller_requests WHERE id = $1 RETURNING {}",
            REQUEST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_error)?;

        let Some(row) = row else {
            tx.rollback().await.map_err(storage_error)?;
            return Ok(None);
        };
        let request = SellerRequest::from(row);

        let updated = sqlx::query("UPDATE principals SET role = $2 WHERE email = $1 AND role <> $2")
            .bind(&request.email)
            .bind(role.as_str())
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?
            .rows_affected()
            == 1;

        tx.commit().await.map_err(storage_error)?;
        Ok(Some((request, updated)))
    }
}
