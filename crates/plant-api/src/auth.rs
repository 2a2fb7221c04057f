//! # Authorization Extractors
//!
//! Each extractor runs a [`GateChain`] before the handler body executes, so a
//! rejected request never reaches handler logic.
//!
//! ```rust,ignore
//! async fn admin_handler(AdminOnly(admin): AdminOnly) -> impl IntoResponse {
//!     format!("Hello {}", admin.email)
//! }
//! ```

use crate::handlers::{market_error_to_response, ApiError};
use crate::state::AppState;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use plant_core::{GateChain, GateContext, MarketError, Principal, Role};

/// Caller with a verified identity token
pub struct Authenticated {
    pub email: String,
}

/// Caller whose stored role is `admin`
pub struct AdminOnly(pub Principal);

/// Caller whose stored role is `seller`
pub struct SellerOnly(pub Principal);

async fn run_chain(
    chain: GateChain,
    parts: &Parts,
    state: &AppState,
) -> Result<GateContext, ApiError> {
    let authorization = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    chain
        .evaluate(
            authorization,
            state.verifier.as_ref(),
            state.store.as_ref(),
            state.config.identity_timeout,
        )
        .await
        .map_err(market_error_to_response)
}

fn into_principal(ctx: GateContext) -> Result<Principal, ApiError> {
    ctx.principal.ok_or_else(|| {
        market_error_to_response(MarketError::Internal(
            "role gate passed without a principal".to_string(),
        ))
    })
}

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ctx = run_chain(GateChain::authenticated(), parts, state).await?;
        let email = ctx.email.ok_or_else(|| {
            market_error_to_response(MarketError::Unauthenticated(
                "no verified identity".to_string(),
            ))
        })?;
        Ok(Self { email })
    }
}

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ctx = run_chain(GateChain::role(Role::Admin), parts, state).await?;
        Ok(Self(into_principal(ctx)?))
    }
}

impl FromRequestParts<AppState> for SellerOnly {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ctx = run_chain(GateChain::role(Role::Seller), parts, state).await?;
        Ok(Self(into_principal(ctx)?))
    }
}
