//! # Catalog Types
//!
//! Plants listed by sellers, with stock counters.

use crate::error::{MarketError, MarketResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Settlement currency (ISO 4217). The marketplace charges in USD only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    #[default]
    USD,
}

impl Currency {
    /// Returns the ISO 4217 currency code
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::USD => "usd",
        }
    }

    /// Parse a provider-reported currency code
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_lowercase().as_str() {
            "usd" => Some(Currency::USD),
            _ => None,
        }
    }

    /// Convert a decimal amount to cents
    pub fn to_smallest_unit(&self, amount: f64) -> i64 {
        (amount * 100.0).round() as i64
    }

    /// Convert cents back to a decimal amount
    pub fn from_smallest_unit(&self, amount: i64) -> f64 {
        amount as f64 / 100.0
    }
}

/// Seller identity embedded in items and orders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerRef {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// A plant in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: String,

    pub name: String,

    pub category: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Unit price in major units (dollars)
    pub price: f64,

    /// Units in stock, never negative
    pub quantity: u32,

    pub seller: SellerRef,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Listing data submitted by a seller
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCatalogItem {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    pub quantity: u32,
    #[serde(default)]
    pub image: Option<String>,
    /// Display fields only; the email is always taken from the verified caller.
    #[serde(default)]
    pub seller: Option<SellerDisplay>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SellerDisplay {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl NewCatalogItem {
    pub fn validate(&self) -> MarketResult<()> {
        if self.name.trim().is_empty() {
            return Err(MarketError::BadRequest("name is required".to_string()));
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(MarketError::BadRequest(
                "price must be a positive amount".to_string(),
            ));
        }
        Ok(())
    }
}

impl CatalogItem {
    /// Build a listing owned by `seller_email`.
    pub fn list(seller_email: impl Into<String>, data: NewCatalogItem) -> Self {
        let display = data.seller.unwrap_or_default();
        Self {
            id: Uuid::new_v4().to_string(),
            name: data.name,
            category: data.category,
            description: data.description,
            price: data.price,
            quantity: data.quantity,
            seller: SellerRef {
                email: seller_email.into(),
                name: display.name,
                image: display.image,
            },
            image: data.image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_conversion() {
        assert_eq!(Currency::USD.to_smallest_unit(15.0), 1500);
        assert_eq!(Currency::USD.to_smallest_unit(19.99), 1999);
        assert_eq!(Currency::USD.from_smallest_unit(1500), 15.0);
        assert_eq!(Currency::from_code("USD"), Some(Currency::USD));
        assert_eq!(Currency::from_code("eur"), None);
    }

    #[test]
    fn test_listing_takes_seller_email_from_caller() {
        let data: NewCatalogItem = serde_json::from_value(serde_json::json!({
            "name": "Monstera",
            "category": "Indoor",
            "price": 15.0,
            "quantity": 3,
            "seller": { "name": "Sam", "email": "spoofed@x.com" }
        }))
        .unwrap();

        let item = CatalogItem::list("sam@x.com", data);
        assert_eq!(item.seller.email, "sam@x.com");
        assert_eq!(item.seller.name.as_deref(), Some("Sam"));
        assert_eq!(item.quantity, 3);
    }

    #[test]
    fn test_listing_validation() {
        let data: NewCatalogItem = serde_json::from_value(serde_json::json!({
            "name": " ",
            "category": "Indoor",
            "price": 15.0,
            "quantity": 3
        }))
        .unwrap();
        assert!(matches!(data.validate(), Err(MarketError::BadRequest(_))));
    }
}
