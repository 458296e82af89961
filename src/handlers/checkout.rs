use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::AuthenticatedUser;
use crate::errors::ServiceError;
use crate::services::checkout::CheckoutRequest;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutPayload {
    #[validate(length(min = 1, message = "Shipping address is required"))]
    pub shipping_address: String,
    pub promo_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub payment_link: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/v1/checkout", post(checkout))
}

/// Places an order from the user's cart and returns the payment link for
/// the client redirect.
async fn checkout(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(payload): Json<CheckoutPayload>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;

    let outcome = state
        .services
        .checkout
        .checkout(
            user_id,
            CheckoutRequest {
                shipping_address: payload.shipping_address,
                promo_code: payload.promo_code,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            payment_link: outcome.payment_link,
        }),
    ))
}
