//! # Marketplace Error Types
//!
//! Typed error handling for the plantmart backend.
//! All store, broker and workflow operations return `Result<T, MarketError>`.

use crate::principal::Role;
use thiserror::Error;

/// Core error type for all marketplace operations
#[derive(Debug, Error)]
pub enum MarketError {
    /// Missing, malformed or rejected bearer credential
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Valid identity, wrong role
    #[error("{message}")]
    Forbidden {
        message: String,
        /// The role actually stored for the principal (None if no record)
        role: Option<Role>,
    },

    /// Referenced entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Duplicate submission
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing or invalid request field
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Decrement would take quantity below zero
    #[error("Insufficient stock for plant {plant_id}")]
    InsufficientStock { plant_id: String },

    /// Store contents contradict a completed payment
    #[error("Inconsistent state: {0}")]
    InconsistentState(String),

    /// External call exceeded its deadline
    #[error("Timed out waiting for {operation}")]
    Timeout { operation: &'static str },

    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Payment or identity provider API error
    #[error("Provider error [{provider}]: {message}")]
    ProviderError { provider: String, message: String },

    /// Network/HTTP error communicating with a provider
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backing store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MarketError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        MarketError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>, role: Option<Role>) -> Self {
        MarketError::Forbidden {
            message: message.into(),
            role,
        }
    }

    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MarketError::NetworkError(_)
                | MarketError::Timeout { .. }
                | MarketError::ProviderError { .. }
        )
    }

    /// Returns true for failures whose details must not leave the process
    pub fn is_internal(&self) -> bool {
        self.status_code() >= 500
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            MarketError::Unauthenticated(_) => 401,
            MarketError::Forbidden { .. } => 403,
            MarketError::NotFound { .. } => 404,
            MarketError::Conflict(_) => 409,
            MarketError::BadRequest(_) => 400,
            MarketError::InsufficientStock { .. } => 409,
            MarketError::InconsistentState(_) => 500,
            MarketError::Timeout { .. } => 504,
            MarketError::Configuration(_) => 500,
            MarketError::ProviderError { .. } => 502,
            MarketError::NetworkError(_) => 503,
            MarketError::Serialization(_) => 500,
            MarketError::Storage(_) => 500,
            MarketError::Internal(_) => 500,
        }
    }
}

/// Result type alias for marketplace operations
pub type MarketResult<T> = Result<T, MarketError>;
