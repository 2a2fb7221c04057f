//! # Order Fulfillment
//!
//! Turns a completed checkout session into exactly one order and exactly one
//! stock decrement. Triggered by a client-relayed session id; all facts are
//! re-read from the payment provider.
//!
//! ```text
//! retrieve_session(id)
//!   ├── not complete ───────────────────────────▶ NotComplete (no writes)
//!   ├── order exists for transaction ───────────▶ Replayed    (no writes)
//!   ├── plant missing ──────────────────────────▶ InconsistentState
//!   └── commit_fulfillment(order) ─┬─ Created ──▶ Fulfilled
//!                                  └─ Duplicate ▶ Replayed    (lost race)
//! ```

use crate::broker::BoxedCheckoutBroker;
use crate::error::{MarketError, MarketResult};
use crate::order::Order;
use crate::store::{LedgerCommit, SharedStore};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// What a fulfillment call did
#[derive(Debug, Clone, PartialEq)]
pub enum Fulfillment {
    /// Session not paid yet; nothing written
    NotComplete { transaction_id: Option<String> },
    /// New order written and stock decremented
    Fulfilled(Order),
    /// Order already existed for this transaction
    Replayed(Order),
}

impl Fulfillment {
    pub fn order(&self) -> Option<&Order> {
        match self {
            Fulfillment::NotComplete { .. } => None,
            Fulfillment::Fulfilled(order) | Fulfillment::Replayed(order) => Some(order),
        }
    }

    pub fn receipt(&self) -> FulfillmentReceipt {
        match self {
            Fulfillment::NotComplete { transaction_id } => FulfillmentReceipt {
                transaction_id: transaction_id.clone(),
                order_id: None,
            },
            Fulfillment::Fulfilled(order) | Fulfillment::Replayed(order) => FulfillmentReceipt {
                transaction_id: Some(order.transaction_id.clone()),
                order_id: Some(order.id.clone()),
            },
        }
    }
}

/// Response body for the payment-success route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentReceipt {
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

pub struct FulfillmentEngine {
    broker: BoxedCheckoutBroker,
    store: SharedStore,
    retrieve_timeout: Duration,
}

impl FulfillmentEngine {
    pub fn new(broker: BoxedCheckoutBroker, store: SharedStore, retrieve_timeout: Duration) -> Self {
        Self {
            broker,
            store,
            retrieve_timeout,
        }
    }

    #[instrument(skip(self), fields(provider = self.broker.provider_name()))]
    pub async fn fulfill(&self, session_id: &str) -> MarketResult<Fulfillment> {
        if session_id.trim().is_empty() {
            return Err(MarketError::BadRequest("sessionId is required".to_string()));
        }

        let session = tokio::time::timeout(
            self.retrieve_timeout,
            self.broker.retrieve_session(session_id),
        )
        .await
        .map_err(|_| MarketError::Timeout {
            operation: "checkout session retrieval",
        })??;

        if !session.is_complete() {
            info!(status = ?session.status, "session not complete, nothing to fulfill");
            return Ok(Fulfillment::NotComplete {
                transaction_id: session.transaction_id,
            });
        }

        let transaction_id = session.transaction_id.as_deref().ok_or_else(|| {
            MarketError::InconsistentState(format!(
                "complete session {} has no payment reference",
                session_id
            ))
        })?;

        if let Some(existing) = self.store.find_by_transaction(transaction_id).await? {
            info!(order_id = %existing.id, %transaction_id, "replaying fulfilled transaction");
            return Ok(Fulfillment::Replayed(existing));
        }

        let (plant_id, customer) = match (session.plant_id(), session.customer_email()) {
            (Some(plant_id), Some(customer)) => (plant_id, customer),
            _ => {
                return Err(MarketError::InconsistentState(format!(
                    "complete session {} is missing application metadata",
                    session_id
                )))
            }
        };

        let plant = self.store.get_item(plant_id).await?.ok_or_else(|| {
            MarketError::InconsistentState(format!(
                "paid session {} references missing plant {}",
                session_id, plant_id
            ))
        })?;

        let order = Order::for_item(&plant, transaction_id, customer, session.amount_paid());

        match self.store.commit_fulfillment(order).await? {
            LedgerCommit::Created(order) => {
                info!(order_id = %order.id, %transaction_id, %plant_id, "order fulfilled");
                Ok(Fulfillment::Fulfilled(order))
            }
            LedgerCommit::Duplicate(order) => {
                warn!(order_id = %order.id, %transaction_id, "concurrent fulfillment folded into replay");
                Ok(Fulfillment::Replayed(order))
            }
        }
    }
}
