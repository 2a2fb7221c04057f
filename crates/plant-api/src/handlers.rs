//! # Request Handlers
//!
//! Axum request handlers for the marketplace API.
//! Authorization runs in the extractors from [`crate::auth`]; handlers only
//! see callers that already passed their gates.

use crate::auth::{AdminOnly, Authenticated, SellerOnly};
use crate::extract::ApiJson;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use plant_core::{
    CartLine, CatalogItem, CatalogStore, FulfillmentReceipt, MarketError, NewCatalogItem, Order,
    OrderLedger, Principal, Role, RoleDecision, RoleStore, SellerRequest, SignIn,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Create checkout request
#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    #[serde(flatten)]
    pub line: CartLine,
    pub customer: CustomerRef,
}

#[derive(Debug, Deserialize)]
pub struct CustomerRef {
    pub email: String,
}

/// Create checkout response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutResponse {
    /// Checkout URL (redirect user here)
    pub url: String,
    pub session_id: String,
}

/// Payment success relay from the client
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSuccessRequest {
    pub session_id: String,
}

/// Seller application
#[derive(Debug, Deserialize)]
pub struct BecomeSellerRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
}

/// Role decision; `id` selects the seller-request branch
#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub role: Option<Role>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub code: u16,
    /// Caller's actual role on 403
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code,
            role: None,
        }
    }

    pub fn with_role(mut self, role: Option<Role>) -> Self {
        self.role = role;
        self
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// Map a domain error to a response. 5xx details stay in the logs.
pub fn market_error_to_response(err: MarketError) -> ApiError {
    let code = err.status_code();
    let response = if err.is_internal() {
        error!(retryable = err.is_retryable(), "request failed: {}", err);
        ErrorResponse::new("Internal server error", code)
    } else {
        match err {
            MarketError::Forbidden { message, role } => {
                ErrorResponse::new(message, code).with_role(role)
            }
            other => ErrorResponse::new(other.to_string(), code),
        }
    };
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "plantmart",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Upsert a principal on sign-in
#[instrument(skip(state, sign_in), fields(email = %sign_in.email))]
pub async fn save_user(
    State(state): State<AppState>,
    ApiJson(sign_in): ApiJson<SignIn>,
) -> Result<impl IntoResponse, ApiError> {
    if sign_in.email.trim().is_empty() {
        return Err(market_error_to_response(MarketError::BadRequest(
            "Email is required".to_string(),
        )));
    }
    let outcome = state
        .store
        .upsert_on_sign_in(sign_in)
        .await
        .map_err(market_error_to_response)?;
    info!(?outcome, "principal signed in");
    Ok(Json(serde_json::json!({ "status": outcome })))
}

/// All principals except the calling admin
pub async fn list_users(
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
) -> ApiResult<Vec<Principal>> {
    state
        .store
        .list_principals_except(&admin.email)
        .await
        .map(Json)
        .map_err(market_error_to_response)
}

/// List a new plant under the calling seller
#[instrument(skip(state, seller, data), fields(seller = %seller.email))]
pub async fn create_plant(
    State(state): State<AppState>,
    SellerOnly(seller): SellerOnly,
    ApiJson(data): ApiJson<NewCatalogItem>,
) -> ApiResult<CatalogItem> {
    data.validate().map_err(market_error_to_response)?;
    let item = state
        .store
        .insert_item(CatalogItem::list(seller.email, data))
        .await
        .map_err(market_error_to_response)?;
    info!(plant_id = %item.id, "plant listed");
    Ok(Json(item))
}

pub async fn list_plants(State(state): State<AppState>) -> ApiResult<Vec<CatalogItem>> {
    state
        .store
        .list_items()
        .await
        .map(Json)
        .map_err(market_error_to_response)
}

pub async fn get_plant(
    State(state): State<AppState>,
    Path(plant_id): Path<String>,
) -> ApiResult<CatalogItem> {
    state
        .store
        .get_item(&plant_id)
        .await
        .map_err(market_error_to_response)?
        .map(Json)
        .ok_or_else(|| market_error_to_response(MarketError::not_found("plant", plant_id)))
}

/// Create a hosted checkout session for one plant
#[instrument(skip(state, request), fields(plant_id = %request.line.plant_id))]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateCheckoutRequest>,
) -> ApiResult<CreateCheckoutResponse> {
    let CreateCheckoutRequest { mut line, customer } = request;
    if customer.email.trim().is_empty() {
        return Err(market_error_to_response(MarketError::BadRequest(
            "customer email is required".to_string(),
        )));
    }

    // Fulfillment records one unit per paid session.
    if line.quantity > 1 {
        return Err(market_error_to_response(MarketError::BadRequest(
            "only one plant can be purchased per checkout".to_string(),
        )));
    }

    let plant = state
        .store
        .get_item(&line.plant_id)
        .await
        .map_err(market_error_to_response)?
        .ok_or_else(|| market_error_to_response(MarketError::not_found("plant", &line.plant_id)))?;

    if plant.quantity < line.quantity {
        return Err(market_error_to_response(MarketError::InsufficientStock {
            plant_id: plant.id,
        }));
    }

    // Charge the listed price, not whatever the client sent.
    line.price = plant.price;
    line.name = plant.name;

    let session = state
        .broker
        .create_session(&line, &customer.email, &state.urls)
        .await
        .map_err(|e| {
            error!("Failed to create checkout: {}", e);
            market_error_to_response(e)
        })?;

    info!("Created checkout session: {}", session.session_id);

    Ok(Json(CreateCheckoutResponse {
        url: session.checkout_url,
        session_id: session.session_id,
    }))
}

/// Fulfill a paid session relayed by the client
#[instrument(skip(state, request), fields(session_id = %request.session_id))]
pub async fn payment_success(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<PaymentSuccessRequest>,
) -> ApiResult<FulfillmentReceipt> {
    let outcome = state
        .fulfillment
        .fulfill(&request.session_id)
        .await
        .map_err(market_error_to_response)?;
    Ok(Json(outcome.receipt()))
}

/// Orders placed by the caller
pub async fn my_orders(
    State(state): State<AppState>,
    caller: Authenticated,
) -> ApiResult<Vec<Order>> {
    state
        .store
        .orders_for_customer(&caller.email)
        .await
        .map(Json)
        .map_err(market_error_to_response)
}

/// Orders received by a seller
pub async fn manage_orders(
    State(state): State<AppState>,
    SellerOnly(_seller): SellerOnly,
    Path(email): Path<String>,
) -> ApiResult<Vec<Order>> {
    state
        .store
        .orders_for_seller(&email)
        .await
        .map(Json)
        .map_err(market_error_to_response)
}

/// Plants listed by a seller
pub async fn my_inventory(
    State(state): State<AppState>,
    SellerOnly(_seller): SellerOnly,
    Path(email): Path<String>,
) -> ApiResult<Vec<CatalogItem>> {
    state
        .store
        .items_by_seller(&email)
        .await
        .map(Json)
        .map_err(market_error_to_response)
}

/// Apply for the seller role; the applicant is always the caller
#[instrument(skip(state, caller, request), fields(email = %caller.email))]
pub async fn become_seller(
    State(state): State<AppState>,
    caller: Authenticated,
    ApiJson(request): ApiJson<BecomeSellerRequest>,
) -> ApiResult<SellerRequest> {
    state
        .onboarding
        .submit_request(&request.name, &caller.email, &request.image)
        .await
        .map(Json)
        .map_err(market_error_to_response)
}

pub async fn list_seller_requests(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
) -> ApiResult<Vec<SellerRequest>> {
    state
        .onboarding
        .list_requests()
        .await
        .map(Json)
        .map_err(market_error_to_response)
}

/// Approve a seller request by id, or re-grade a user by email
#[instrument(skip(state, admin, request), fields(admin = %admin.email, role = %request.role))]
pub async fn update_role(
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
    ApiJson(request): ApiJson<UpdateRoleRequest>,
) -> ApiResult<RoleDecision> {
    let decision = match (request.id.as_deref(), request.email.as_deref()) {
        (Some(id), _) if !id.is_empty() => {
            state
                .onboarding
                .approve_seller_request(id, request.role)
                .await
        }
        (_, email) => {
            state
                .onboarding
                .set_user_role(email.unwrap_or_default(), request.role)
                .await
        }
    };

    decision.map(Json).map_err(|e| {
        warn!("role update rejected: {}", e);
        market_error_to_response(e)
    })
}

/// The caller's stored role, if any
pub async fn user_role(
    State(state): State<AppState>,
    caller: Authenticated,
) -> ApiResult<RoleResponse> {
    let principal = state
        .store
        .find_principal(&caller.email)
        .await
        .map_err(market_error_to_response)?;
    Ok(Json(RoleResponse {
        role: principal.map(|p| p.role),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response() {
        let err = ErrorResponse::new("Test error", 400);
        assert_eq!(err.message, "Test error");
        assert_eq!(err.code, 400);
        assert!(err.role.is_none());
    }

    #[test]
    fn test_forbidden_carries_role() {
        let (status, Json(body)) = market_error_to_response(MarketError::forbidden(
            "Admin only Action!",
            Some(Role::Customer),
        ));
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.message, "Admin only Action!");
        assert_eq!(body.role, Some(Role::Customer));
    }

    #[test]
    fn test_internal_errors_are_generic() {
        let (status, Json(body)) = market_error_to_response(MarketError::InconsistentState(
            "plant P1 referenced by transaction pi_1 does not exist".to_string(),
        ));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message, "Internal server error");
    }
}
