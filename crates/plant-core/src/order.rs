//! # Order Types
//!
//! Append-only order ledger entries, one per payment transaction.

use crate::catalog::{CatalogItem, SellerRef};
use crate::error::MarketError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Order lifecycle status. Fulfillment only ever records `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Paid, awaiting shipment by the seller
    #[default]
    Pending,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            other => Err(MarketError::Storage(format!("unknown order status '{}'", other))),
        }
    }
}

/// A fulfilled purchase of a single plant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,

    pub plant_id: String,

    /// External payment reference; unique across the ledger
    pub transaction_id: String,

    /// Customer email
    pub customer: String,

    #[serde(default)]
    pub status: OrderStatus,

    pub seller: SellerRef,

    /// Plant name (denormalized for display)
    pub name: String,

    pub category: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    pub quantity: u32,

    /// Paid amount in major units
    pub price: f64,

    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Build a pending single-unit order for `item`.
    pub fn for_item(
        item: &CatalogItem,
        transaction_id: impl Into<String>,
        customer: impl Into<String>,
        price: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            plant_id: item.id.clone(),
            transaction_id: transaction_id.into(),
            customer: customer.into(),
            status: OrderStatus::Pending,
            seller: item.seller.clone(),
            name: item.name.clone(),
            category: item.category.clone(),
            image: item.image.clone(),
            quantity: 1,
            price,
            created_at: Utc::now(),
        }
    }
}
