use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::AuthenticatedUser;
use crate::entities::{cart_item, product};
use crate::errors::ServiceError;
use crate::services::cart::MAX_LINE_QUANTITY;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertLineRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 100))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuantityRequest {
    #[validate(range(min = 1, max = 100))]
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct CartLineResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl CartLineResponse {
    fn from_pair(line: cart_item::Model, product: product::Model) -> Self {
        let unit_price = product.effective_price();
        Self {
            id: line.id,
            product_id: product.id,
            title: product.title,
            quantity: line.quantity,
            unit_price,
            line_total: unit_price * Decimal::from(line.quantity),
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/cart", get(list_cart).post(upsert_line))
        .route(
            "/api/v1/cart/:line_id",
            patch(update_quantity).delete(remove_line),
        )
}

async fn list_cart(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<Vec<CartLineResponse>>, ServiceError> {
    let lines = state.services.cart.list_lines(user_id).await?;
    Ok(Json(
        lines
            .into_iter()
            .map(|(line, product)| CartLineResponse::from_pair(line, product))
            .collect(),
    ))
}

async fn upsert_line(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(payload): Json<UpsertLineRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate().map_err(|_| {
        ServiceError::ValidationError(format!(
            "quantity must be between 1 and {}",
            MAX_LINE_QUANTITY
        ))
    })?;
    let line = state
        .services
        .cart
        .upsert_line(user_id, payload.product_id, payload.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(line)))
}

async fn update_quantity(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(line_id): Path<Uuid>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<Json<cart_item::Model>, ServiceError> {
    payload.validate().map_err(|_| {
        ServiceError::ValidationError(format!(
            "quantity must be between 1 and {}",
            MAX_LINE_QUANTITY
        ))
    })?;
    let line = state
        .services
        .cart
        .update_quantity(user_id, line_id, payload.quantity)
        .await?;
    Ok(Json(line))
}

async fn remove_line(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(line_id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.cart.remove_line(user_id, line_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
