//! Commission transaction entity - Employee commission ledger, separate from wallets.
//!
//! At most one row exists per `(employee_id, customer_id, commission_type, period)`.

use super::commission_rate::CommissionType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Commission transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "commission_transactions")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Employee earning the commission
    pub employee_id: i64,
    /// Customer the commission was earned on
    pub customer_id: i64,
    /// Commission type
    pub commission_type: CommissionType,
    /// Optional reference (order id, subscription id)
    pub reference_id: Option<String>,
    /// Amount the rate was applied to
    pub base_amount: Decimal,
    /// Applied rate in percent
    pub commission_rate: Decimal,
    /// Resulting commission
    pub commission_amount: Decimal,
    /// Period key, `YYYY-MM`
    pub period: String,
    /// Whether the commission has been paid out
    pub is_paid: bool,
    /// When the row was first written
    pub created_at: DateTimeUtc,
    /// When the row was last recalculated
    pub updated_at: DateTimeUtc,
}

/// Commission rows are keyed by employee and customer ids only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
