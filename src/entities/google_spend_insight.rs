//! Google Ads spend insight entity - One row per ad account per day.
//!
//! Rows are upserted by the platform sync job; this crate only reads them.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Google Ads daily spend row
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "google_spend_insights")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Subscription the ad account is attached to
    pub subscription_id: i64,
    /// Platform ad account id
    pub account_id: String,
    /// Reporting day
    pub date: Date,
    /// Amount spent on that day
    pub spend: Decimal,
}

/// Insight rows are read in aggregate and have no navigable relationships
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
