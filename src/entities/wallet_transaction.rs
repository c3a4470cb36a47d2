//! Wallet transaction entity - The append-only wallet ledger.
//!
//! Each row has a signed `amount` (negative for debits, positive for credits).
//! The sum of `completed` amounts for a wallet equals the wallet balance.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum TransactionStatus {
    /// Recorded but not yet applied to the balance
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Applied to the balance
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Never applied
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// Ledger entry written for a postpay fee debit
pub const TYPE_POSTPAY_FEE: &str = "postpay_fee";
/// Ledger entry written for a customer top-up
pub const TYPE_TOP_UP: &str = "top_up";
/// Ledger entry written for an operator adjustment
pub const TYPE_ADJUSTMENT: &str = "adjustment";

/// Wallet transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wallet_transactions")]
pub struct Model {
    /// Unique identifier for the ledger entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Wallet this entry belongs to
    pub wallet_id: i64,
    /// Signed amount (positive for credits, negative for debits)
    pub amount: Decimal,
    /// Entry type, e.g. `"postpay_fee"` or `"top_up"`
    pub transaction_type: String,
    /// Lifecycle status
    pub status: TransactionStatus,
    /// Caller supplied reference (subscription id, payment id)
    pub reference_id: Option<String>,
    /// Human-readable description
    pub description: String,
    /// Wallet balance right after this entry was applied
    pub balance_after: Decimal,
    /// When the entry was written
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `WalletTransaction` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to one wallet
    #[sea_orm(
        belongs_to = "super::wallet::Entity",
        from = "Column::WalletId",
        to = "super::wallet::Column::Id"
    )]
    Wallet,
}

impl Related<super::wallet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallet.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
