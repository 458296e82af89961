use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::errors::ServiceError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PromoResponse {
    pub code: String,
    pub active: bool,
    pub percent: i32,
    pub min_subtotal: Decimal,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/v1/promocodes/:code", get(get_promo))
}

async fn get_promo(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<PromoResponse>, ServiceError> {
    let promo = state.services.promos.require_by_code(&code).await?;
    Ok(Json(PromoResponse {
        code: promo.code,
        active: promo.active,
        percent: promo.percent,
        min_subtotal: promo.min_subtotal,
    }))
}
