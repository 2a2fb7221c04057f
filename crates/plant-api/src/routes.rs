//! # Routes
//!
//! Axum router configuration for the marketplace API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

/// Create the main application router
///
/// Routes:
/// - Public:
///   - POST /user - Upsert principal on sign-in
///   - GET  /plants, GET /plants/{id} - Catalog
///   - POST /create-checkout-session - Start hosted checkout
///   - POST /payment-success - Fulfill a paid session
///
/// - Authenticated:
///   - GET  /my-orders, GET /user/role
///   - POST /become-seller
///
/// - Seller:
///   - POST /plants
///   - GET  /manage-orders/{email}, GET /my-inventory/{email}
///
/// - Admin:
///   - GET   /users, GET /seller-request
///   - PATCH /update-role
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.client_domain);

    let catalog_routes = Router::new()
        .route("/plants", get(handlers::list_plants).post(handlers::create_plant))
        .route("/plants/{plant_id}", get(handlers::get_plant));

    let checkout_routes = Router::new()
        .route("/create-checkout-session", post(handlers::create_checkout_session))
        .route("/payment-success", post(handlers::payment_success));

    let order_routes = Router::new()
        .route("/my-orders", get(handlers::my_orders))
        .route("/manage-orders/{email}", get(handlers::manage_orders))
        .route("/my-inventory/{email}", get(handlers::my_inventory));

    let principal_routes = Router::new()
        .route("/user", post(handlers::save_user))
        .route("/user/role", get(handlers::user_role))
        .route("/users", get(handlers::list_users))
        .route("/become-seller", post(handlers::become_seller))
        .route("/seller-request", get(handlers::list_seller_requests))
        .route("/update-role", patch(handlers::update_role));

    Router::new()
        .route("/", get(handlers::health))
        .route("/health", get(handlers::health))
        .merge(catalog_routes)
        .merge(checkout_routes)
        .merge(order_routes)
        .merge(principal_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Credentialed CORS restricted to the client origin
fn cors_layer(client_domain: &str) -> CorsLayer {
    let origin = match client_domain.parse::<HeaderValue>() {
        Ok(value) => AllowOrigin::exact(value),
        Err(e) => {
            warn!(%client_domain, "invalid CLIENT_DOMAIN, no origin allowed: {}", e);
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN};
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    async fn preflight_origin(client_domain: &str, origin: &str) -> Option<HeaderValue> {
        let app: Router = Router::new()
            .route("/plants", get(|| async { "ok" }))
            .layer(cors_layer(client_domain));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/plants")
                    .header(ORIGIN, origin)
                    .header("access-control-request-method", "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        if let Some(creds) = response.headers().get(ACCESS_CONTROL_ALLOW_CREDENTIALS) {
            assert_eq!(creds, "true");
        }
        response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).cloned()
    }

    #[tokio::test]
    async fn test_cors_allows_client_origin() {
        let allowed = preflight_origin("http://localhost:5173", "http://localhost:5173").await;
        assert_eq!(allowed.unwrap(), "http://localhost:5173");
    }

    #[tokio::test]
    async fn test_cors_rejects_other_origins() {
        let allowed = preflight_origin("http://localhost:5173", "http://evil.example").await;
        assert!(allowed.is_none());
    }
}
