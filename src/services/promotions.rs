use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;

use crate::entities::{promocode, Promocode};
use crate::errors::ServiceError;

/// Read-only promo code lookups.
#[derive(Clone)]
pub struct PromoService {
    db: Arc<DatabaseConnection>,
}

impl PromoService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_code(
        &self,
        code: &str,
    ) -> Result<Option<promocode::Model>, ServiceError> {
        Ok(Promocode::find()
            .filter(promocode::Column::Code.eq(code))
            .one(&*self.db)
            .await?)
    }

    /// Resolves a code or fails with `NotFound`. Activity and
    /// minimum-subtotal checks belong to the pricing engine.
    pub async fn require_by_code(&self, code: &str) -> Result<promocode::Model, ServiceError> {
        self.find_by_code(code)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Promo code {} not found", code)))
    }
}
