//! Customer entity - The owner of subscriptions, a wallet and ad accounts.
//!
//! Contact fields are optional; a customer without any contact channel is never notified.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Customer database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "customers")]
pub struct Model {
    /// Unique identifier for the customer
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// Email address used for notifications
    pub email: Option<String>,
    /// Telegram chat id used for notifications
    pub telegram_chat_id: Option<String>,
    /// When the customer was created
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Whether the customer can be reached by any notification channel.
    #[must_use]
    pub fn has_contact_channel(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        filled(&self.email) || filled(&self.telegram_chat_id)
    }
}

/// Defines relationships between Customer and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One customer has one wallet
    #[sea_orm(has_one = "super::wallet::Entity")]
    Wallet,
    /// One customer has many subscriptions
    #[sea_orm(has_many = "super::subscription::Entity")]
    Subscriptions,
}

impl Related<super::wallet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallet.def()
    }
}

impl Related<super::subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscriptions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
