//! Commission rate entity - Rate configuration per employee and commission type.
//!
//! A row with `employee_id = None` is the default for its type. A row carries either a
//! flat `rate` or an ordered `tiers` table using the same range format as fee tiers.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of commission a rate or a transaction applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum CommissionType {
    /// Commission on service package sales
    #[sea_orm(string_value = "service")]
    Service,
    /// Commission on customers' monthly ad spend
    #[sea_orm(string_value = "spending")]
    Spending,
    /// Commission on ad account sales
    #[sea_orm(string_value = "account_sale")]
    AccountSale,
}

/// Commission rate database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "commission_rates")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Employee this rate applies to; `None` for the default rate
    pub employee_id: Option<i64>,
    /// Commission type
    pub commission_type: CommissionType,
    /// Flat percentage, used when `tiers` is absent
    pub rate: Option<Decimal>,
    /// Ordered tier table: `[{"range": "0-10000", "rate": "2%"}, ...]`
    pub tiers: Option<Json>,
    /// When the rate was configured
    pub created_at: DateTimeUtc,
}

/// Rates are matched by column filters only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
