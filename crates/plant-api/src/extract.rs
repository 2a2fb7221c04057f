//! # Body Extractors
//!
//! `ApiJson` wraps [`axum::Json`] so malformed or incomplete bodies are
//! rejected as `BadRequest` with the usual JSON error body.

use crate::handlers::{market_error_to_response, ApiError};
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use plant_core::MarketError;
use tracing::debug;

/// JSON request body; rejections map to 400
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                debug!("rejected request body: {}", rejection.body_text());
                Err(market_error_to_response(MarketError::BadRequest(
                    rejection.body_text(),
                )))
            }
        }
    }
}
