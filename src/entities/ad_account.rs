//! Ad account entity - A platform ad account with its platform-reported balance.
//!
//! Balances and exhaustion flags are written by the platform sync job. The auto-pause
//! controller only writes `status` and `last_notified_on`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Advertising platform an account lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum AdPlatform {
    /// Meta (Facebook) ads
    #[sea_orm(string_value = "meta")]
    Meta,
    /// Google Ads
    #[sea_orm(string_value = "google")]
    Google,
}

impl AdPlatform {
    /// Lowercase platform key used in settings and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Meta => "meta",
            Self::Google => "google",
        }
    }
}

impl std::fmt::Display for AdPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery status of an ad account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum AdAccountStatus {
    /// Delivering ads
    #[sea_orm(string_value = "active")]
    Active,
    /// Paused, either manually or by auto-pause
    #[sea_orm(string_value = "paused")]
    Paused,
}

/// Ad account database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ad_accounts")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning customer
    pub customer_id: i64,
    /// Platform the account lives on
    pub platform: AdPlatform,
    /// Platform account id
    pub account_id: String,
    /// Platform-reported balance; `None` when the platform has not reported one
    pub balance: Option<Decimal>,
    /// Platform says the prepaid balance is used up
    pub balance_exhausted: bool,
    /// Active or paused
    pub status: AdAccountStatus,
    /// Day the customer was last told about a low balance
    pub last_notified_on: Option<Date>,
    /// When the row last changed
    pub updated_at: DateTimeUtc,
}

/// Each ad account belongs to one customer
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Owning customer
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
