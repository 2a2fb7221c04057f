//! Row shapes and conversions between SQL rows and domain records.

use chrono::{DateTime, Utc};
use plant_core::{
    CatalogItem, MarketError, MarketResult, Order, Principal, SellerRef, SellerRequest,
};

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PrincipalRow {
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub last_logged_in: DateTime<Utc>,
}

impl TryFrom<PrincipalRow> for Principal {
    type Error = MarketError;

    fn try_from(row: PrincipalRow) -> MarketResult<Self> {
        Ok(Principal {
            role: row.role.parse()?,
            email: row.email,
            name: row.name,
            image: row.image,
            created_at: row.created_at,
            last_logged_in: row.last_logged_in,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PlantRow {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub price: f64,
    pub quantity: i32,
    pub seller_email: String,
    pub seller_name: Option<String>,
    pub seller_image: Option<String>,
    pub image: Option<String>,
}

impl TryFrom<PlantRow> for CatalogItem {
    type Error = MarketError;

    fn try_from(row: PlantRow) -> MarketResult<Self> {
        Ok(CatalogItem {
            quantity: from_db_quantity(row.quantity)?,
            id: row.id,
            name: row.name,
            category: row.category,
            description: row.description,
            price: row.price,
            seller: SellerRef {
                email: row.seller_email,
                name: row.seller_name,
                image: row.seller_image,
            },
            image: row.image,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct OrderRow {
    pub id: String,
    pub plant_id: String,
    pub transaction_id: String,
    pub customer: String,
    pub status: String,
    pub seller_email: String,
    pub seller_name: Option<String>,
    pub seller_image: Option<String>,
    pub name: String,
    pub category: String,
    pub image: Option<String>,
    pub quantity: i32,
    pub price: f64,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = MarketError;

    fn try_from(row: OrderRow) -> MarketResult<Self> {
        Ok(Order {
            status: row.status.parse()?,
            quantity: from_db_quantity(row.quantity)?,
            id: row.id,
            plant_id: row.plant_id,
            transaction_id: row.transaction_id,
            customer: row.customer,
            seller: SellerRef {
                email: row.seller_email,
                name: row.seller_name,
                image: row.seller_image,
            },
            name: row.name,
            category: row.category,
            image: row.image,
            price: row.price,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SellerRequestRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub image: String,
    pub created_at: DateTime<Utc>,
}

impl From<SellerRequestRow> for SellerRequest {
    fn from(row: SellerRequestRow) -> Self {
        SellerRequest {
            id: row.id,
            name: row.name,
            email: row.email,
            image: row.image,
            created_at: row.created_at,
        }
    }
}

pub(crate) fn to_db_quantity(quantity: u32) -> MarketResult<i32> {
    i32::try_from(quantity)
        .map_err(|_| MarketError::BadRequest(format!("quantity {} is out of range", quantity)))
}

pub(crate) fn from_db_quantity(quantity: i32) -> MarketResult<u32> {
    u32::try_from(quantity)
        .map_err(|_| MarketError::Storage(format!("negative quantity {} in storage", quantity)))
}

/// Convert every row, failing on the first bad one
pub(crate) fn collect<R, T>(rows: Vec<R>) -> MarketResult<Vec<T>>
where
    T: TryFrom<R, Error = MarketError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use plant_core::{OrderStatus, Role};

    fn order_row(status: &str, quantity: i32) -> OrderRow {
        OrderRow {
            id: "O1".into(),
            plant_id: "P1".into(),
            transaction_id: "pi_1".into(),
            customer: "c@x.com".into(),
            status: status.into(),
            seller_email: "s@x.com".into(),
            seller_name: Some("Sam".into()),
            seller_image: None,
            name: "Fern".into(),
            category: "Outdoor".into(),
            image: None,
            quantity,
            price: 15.0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_order_row_conversion() {
        let order = Order::try_from(order_row("pending", 1)).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.seller.email, "s@x.com");
        assert_eq!(order.quantity, 1);

        assert!(Order::try_from(order_row("lost", 1)).is_err());
        assert!(Order::try_from(order_row("pending", -1)).is_err());
    }

    #[test]
    fn test_principal_row_role() {
        let row = PrincipalRow {
            email: "a@x.com".into(),
            name: None,
            image: None,
            role: "admin".into(),
            created_at: Utc::now(),
            last_logged_in: Utc::now(),
        };
        assert_eq!(Principal::try_from(row).unwrap().role, Role::Admin);
    }

    #[test]
    fn test_quantity_bounds() {
        assert_eq!(to_db_quantity(3).unwrap(), 3);
        assert!(to_db_quantity(u32::MAX).is_err());
    }
}
