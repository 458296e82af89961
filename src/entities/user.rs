use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storefront customer. Managed by the user directory; the checkout core
/// only reads identity and recipient details from it.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    #[sea_orm(nullable)]
    pub phone: Option<String>,
    #[sea_orm(nullable)]
    pub first_name: Option<String>,
    #[sea_orm(nullable)]
    pub last_name: Option<String>,
    #[sea_orm(nullable)]
    pub patronymic: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Recipient details an order and a payment session need from the buyer.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub full_name: String,
    pub email: String,
    pub phone: String,
}

impl Model {
    /// Returns the recipient details if the profile is complete
    /// (first name, last name, patronymic and phone all present).
    pub fn recipient(&self) -> Option<Recipient> {
        let first = self.first_name.as_deref().filter(|s| !s.trim().is_empty())?;
        let last = self.last_name.as_deref().filter(|s| !s.trim().is_empty())?;
        let patronymic = self.patronymic.as_deref().filter(|s| !s.trim().is_empty())?;
        let phone = self.phone.as_deref().filter(|s| !s.trim().is_empty())?;

        Some(Recipient {
            full_name: format!("{} {} {}", first, last, patronymic),
            email: self.email.clone(),
            phone: format!("+{}", phone.trim_start_matches('+')),
        })
    }
}
