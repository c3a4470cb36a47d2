//! Subscription entity - A customer's active service instance.
//!
//! Postpay subscriptions carry a billing cursor (`last_postpay_billed_at`) marking the
//! end of the last billed or waived window. A null cursor means "since `created_at`".

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How the subscription pays for its service fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum PaymentMode {
    /// Charged up front
    #[sea_orm(string_value = "prepay")]
    Prepay,
    /// Charged retroactively from actual spend
    #[sea_orm(string_value = "postpay")]
    Postpay,
}

/// Subscription lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum SubscriptionStatus {
    /// In service
    #[sea_orm(string_value = "active")]
    Active,
    /// Temporarily suspended
    #[sea_orm(string_value = "paused")]
    Paused,
    /// Ended
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// Subscription database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscriptions")]
pub struct Model {
    /// Unique identifier for the subscription
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Subscribing customer
    pub customer_id: i64,
    /// Purchased service package
    pub service_package_id: i64,
    /// Prepay or postpay
    pub payment_mode: PaymentMode,
    /// Lifecycle status
    pub status: SubscriptionStatus,
    /// Advertising budget attached to the subscription
    pub budget: Decimal,
    /// Billing cursor; `None` until the first postpay window closes
    pub last_postpay_billed_at: Option<DateTimeUtc>,
    /// When the subscription was purchased
    pub created_at: DateTimeUtc,
    /// When the row last changed
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Start of the current postpay window.
    #[must_use]
    pub fn window_start(&self) -> DateTimeUtc {
        self.last_postpay_billed_at.unwrap_or(self.created_at)
    }
}

/// Defines relationships between Subscription and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each subscription belongs to one customer
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
    /// Each subscription uses one service package
    #[sea_orm(
        belongs_to = "super::service_package::Entity",
        from = "Column::ServicePackageId",
        to = "super::service_package::Column::Id"
    )]
    ServicePackage,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::service_package::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ServicePackage.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
