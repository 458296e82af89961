use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::{cart_item, product, CartItem, Product};
use crate::errors::ServiceError;

/// Upper bound on a single cart line's quantity.
pub const MAX_LINE_QUANTITY: i32 = 100;

/// Cart line management: one row per (user, product), quantity within
/// [1, MAX_LINE_QUANTITY]. The checkout service clears the cart as part
/// of its own transaction; nothing here touches orders.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn validate_quantity(quantity: i32) -> Result<(), ServiceError> {
        if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
            return Err(ServiceError::ValidationError(format!(
                "quantity must be between 1 and {}",
                MAX_LINE_QUANTITY
            )));
        }
        Ok(())
    }

    /// Adds a product to the user's cart, or replaces the quantity when
    /// the product is already there.
    #[instrument(skip(self))]
    pub async fn upsert_line(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<cart_item::Model, ServiceError> {
        Self::validate_quantity(quantity)?;

        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let existing = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?;

        let now = Utc::now();
        let line = match existing {
            Some(line) => {
                let mut update: cart_item::ActiveModel = line.into();
                update.quantity = Set(quantity);
                update.updated_at = Set(now);
                update.update(&*self.db).await?
            }
            None => {
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    product_id: Set(product_id),
                    quantity: Set(quantity),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&*self.db)
                .await?
            }
        };

        info!(user_id = %user_id, product_id = %product_id, quantity, "Cart line upserted");
        Ok(line)
    }

    /// Changes the quantity of an existing line owned by the user.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: Uuid,
        line_id: Uuid,
        quantity: i32,
    ) -> Result<cart_item::Model, ServiceError> {
        Self::validate_quantity(quantity)?;

        let line = self.find_owned_line(user_id, line_id).await?;
        let mut update: cart_item::ActiveModel = line.into();
        update.quantity = Set(quantity);
        update.updated_at = Set(Utc::now());
        Ok(update.update(&*self.db).await?)
    }

    /// Removes a single line from the user's cart.
    #[instrument(skip(self))]
    pub async fn remove_line(&self, user_id: Uuid, line_id: Uuid) -> Result<(), ServiceError> {
        let line = self.find_owned_line(user_id, line_id).await?;
        line.delete(&*self.db).await?;
        Ok(())
    }

    /// Lists the user's cart lines with their products, oldest first.
    pub async fn list_lines(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(cart_item::Model, product::Model)>, ServiceError> {
        let rows = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        rows.into_iter()
            .map(|(line, product)| {
                let product = product.ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "cart line {} references a missing product",
                        line.id
                    ))
                })?;
                Ok((line, product))
            })
            .collect()
    }

    async fn find_owned_line(
        &self,
        user_id: Uuid,
        line_id: Uuid,
    ) -> Result<cart_item::Model, ServiceError> {
        CartItem::find_by_id(line_id)
            .filter(cart_item::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart line {} not found", line_id)))
    }
}
