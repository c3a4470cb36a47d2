//! Subscription transaction entity - Subscription-level log of postpay charges.
//!
//! Every successful postpay debit writes one row here referencing the wallet ledger entry.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Subscription transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscription_transactions")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Billed subscription
    pub subscription_id: i64,
    /// Wallet ledger entry that carried the debit
    pub wallet_transaction_id: i64,
    /// Aggregated ad spend for the window
    pub spend_amount: Decimal,
    /// Fee percent resolved from the package tiers
    pub fee_percent: Decimal,
    /// Fee charged (positive)
    pub amount: Decimal,
    /// First day of the billed window
    pub window_start: Date,
    /// Last day of the billed window
    pub window_end: Date,
    /// When the charge was recorded
    pub created_at: DateTimeUtc,
}

/// Subscription transactions are looked up by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
