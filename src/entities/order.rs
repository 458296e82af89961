use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placed order. `total_price` is frozen at checkout time and never
/// recomputed from live catalog prices.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub status: OrderStatus,
    pub user_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_price: Decimal,
    /// Payment session identifier assigned by the acquiring provider
    pub operation_id: String,
    pub payment_link: String,
    #[sea_orm(nullable)]
    pub promo_id: Option<Uuid>,
    pub shipping_address: String,
    #[sea_orm(nullable)]
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::promocode::Entity",
        from = "Column::PromoId",
        to = "super::promocode::Column::Id"
    )]
    Promocode,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::promocode::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Promocode.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Order status lifecycle.
///
/// `New → Paid` and `New → Canceled` are applied by the settlement
/// reconciler; `Paid → Shipped` only by a manual admin transition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "new")]
    New,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "canceled")]
    Canceled,
}

impl OrderStatus {
    /// The reconciler only ever moves an order forward out of `New`.
    pub fn is_settled(&self) -> bool {
        !matches!(self, OrderStatus::New)
    }
}
