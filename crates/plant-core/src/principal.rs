//! # Principal Types
//!
//! Users tracked by email and role.

use crate::error::MarketError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Marketplace role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Seller,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Seller => "seller",
            Role::Admin => "admin",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Customer
    }
}

impl FromStr for Role {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "seller" => Ok(Role::Seller),
            "admin" => Ok(Role::Admin),
            other => Err(MarketError::Storage(format!("unknown role '{}'", other))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signed-in user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// Unique key
    pub email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default)]
    pub role: Role,

    pub created_at: DateTime<Utc>,

    pub last_logged_in: DateTime<Utc>,
}

impl Principal {
    /// A first-time sign-in. Role is always `customer`.
    pub fn from_sign_in(sign_in: SignIn) -> Self {
        let now = Utc::now();
        Self {
            email: sign_in.email,
            name: sign_in.name,
            image: sign_in.image,
            role: Role::Customer,
            created_at: now,
            last_logged_in: now,
        }
    }
}

/// Profile data sent by the client on sign-in
#[derive(Debug, Clone, Deserialize)]
pub struct SignIn {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Result of a sign-in upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignInOutcome {
    Created,
    Refreshed,
}
