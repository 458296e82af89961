use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::order::OrderStatus;
use crate::entities::{order, order_item, Order, OrderItem};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Order queries and guarded status transitions.
///
/// Checkout inserts orders inside its own transaction; everything after
/// that (listing, settlement transitions, the manual ship transition)
/// goes through here.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<order::Model>, ServiceError> {
        Ok(Order::find_by_id(order_id).one(&*self.db).await?)
    }

    /// All orders of one user with their line items, newest first.
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(order::Model, Vec<order_item::Model>)>, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .find_with_related(OrderItem)
            .all(&*self.db)
            .await?)
    }

    /// Orders the settlement reconciler still has to look at.
    pub async fn list_pending(&self) -> Result<Vec<order::Model>, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::Status.eq(OrderStatus::New))
            .order_by_asc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Moves an order out of `New` into `target`.
    ///
    /// Returns `false` without touching the row when the order is no
    /// longer `New` (another sweep or an admin got there first); the
    /// status guard is re-checked inside the transaction.
    #[instrument(skip(self))]
    pub async fn transition_from_new(
        &self,
        order_id: Uuid,
        target: OrderStatus,
    ) -> Result<bool, ServiceError> {
        let txn = self.db.begin().await?;

        let Some(current) = Order::find_by_id(order_id).one(&txn).await? else {
            txn.rollback().await?;
            return Err(ServiceError::NotFound(format!("Order {} not found", order_id)));
        };
        if current.status != OrderStatus::New {
            txn.rollback().await?;
            warn!(order_id = %order_id, status = ?current.status, "Order already settled; skipping transition");
            return Ok(false);
        }

        let mut update: order::ActiveModel = current.into();
        update.status = Set(target);
        update.updated_at = Set(Utc::now());
        update.update(&txn).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: OrderStatus::New,
                new_status: target,
            })
            .await;
        info!(order_id = %order_id, new_status = ?target, "Order status updated");
        Ok(true)
    }

    /// Manual admin transition: a paid order leaves the warehouse.
    #[instrument(skip(self))]
    pub async fn ship(
        &self,
        order_id: Uuid,
        tracking_number: String,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let Some(current) = Order::find_by_id(order_id).one(&txn).await? else {
            txn.rollback().await?;
            return Err(ServiceError::NotFound(format!("Order {} not found", order_id)));
        };
        if current.status != OrderStatus::Paid {
            txn.rollback().await?;
            return Err(ServiceError::Conflict(format!(
                "Only paid orders can be shipped; order {} is {:?}",
                order_id, current.status
            )));
        }

        let mut update: order::ActiveModel = current.into();
        update.status = Set(OrderStatus::Shipped);
        update.tracking_number = Set(Some(tracking_number));
        update.updated_at = Set(Utc::now());
        let shipped = update.update(&txn).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: OrderStatus::Paid,
                new_status: OrderStatus::Shipped,
            })
            .await;
        Ok(shipped)
    }
}
