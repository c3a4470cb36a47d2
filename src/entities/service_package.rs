//! Service package entity - What a subscription buys, including its fee schedule.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Service package database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "service_packages")]
pub struct Model {
    /// Unique identifier for the package
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Package name
    pub name: String,
    /// Ordered fee-tier table: `[{"range": "0-999", "fee_percent": "5%"}, ...]`
    pub monthly_spending_fee_structure: Option<Json>,
    /// When the package was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `ServicePackage` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One package is used by many subscriptions
    #[sea_orm(has_many = "super::subscription::Entity")]
    Subscriptions,
}

impl Related<super::subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscriptions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
