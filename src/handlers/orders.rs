use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::AuthenticatedUser;
use crate::entities::order::OrderStatus;
use crate::entities::{order, order_item};
use crate::errors::ServiceError;
use crate::services::settlement::SweepSummary;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub status: OrderStatus,
    pub total_price: Decimal,
    pub payment_link: String,
    pub shipping_address: String,
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

impl OrderResponse {
    fn from_order(order: order::Model, items: Vec<order_item::Model>) -> Self {
        Self {
            id: order.id,
            status: order.status,
            total_price: order.total_price,
            payment_link: order.payment_link,
            shipping_address: order.shipping_address,
            tracking_number: order.tracking_number,
            created_at: order.created_at,
            items: items
                .into_iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PendingOrdersResponse {
    pub sweep: SweepSummary,
    pub orders: Vec<order::Model>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ShipOrderRequest {
    #[validate(length(min = 1, message = "Tracking number is required"))]
    pub tracking_number: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/orders", get(list_my_orders))
        .route("/api/v1/admin/orders/pending", get(list_pending_orders))
        .route("/api/v1/admin/orders/:order_id/ship", post(ship_order))
}

async fn list_my_orders(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<Vec<OrderResponse>>, ServiceError> {
    let orders = state.services.orders.list_for_user(user_id).await?;
    Ok(Json(
        orders
            .into_iter()
            .map(|(order, items)| OrderResponse::from_order(order, items))
            .collect(),
    ))
}

/// Admin view of pending orders. Listing runs a settlement sweep first,
/// so the statuses shown are as fresh as the gateway allows.
async fn list_pending_orders(
    State(state): State<AppState>,
) -> Result<Json<PendingOrdersResponse>, ServiceError> {
    let sweep = state.services.settlement.run_sweep().await?;
    let orders = state.services.orders.list_pending().await?;
    Ok(Json(PendingOrdersResponse { sweep, orders }))
}

async fn ship_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<ShipOrderRequest>,
) -> Result<Json<order::Model>, ServiceError> {
    payload.validate()?;
    let shipped = state
        .services
        .orders
        .ship(order_id, payload.tracking_number)
        .await?;
    Ok(Json(shipped))
}
