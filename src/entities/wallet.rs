//! Wallet entity - One balance per customer.
//!
//! The balance is never written directly by application code; every change goes
//! through the ledger in `core::wallet` so it stays reconciled with `wallet_transactions`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Whether the wallet accepts balance mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum WalletStatus {
    /// Debits and credits are accepted
    #[sea_orm(string_value = "active")]
    Active,
    /// Every mutation is refused until unlocked
    #[sea_orm(string_value = "locked")]
    Locked,
}

/// Wallet database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    /// Unique identifier for the wallet
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning customer, at most one wallet per customer
    #[sea_orm(unique)]
    pub customer_id: i64,
    /// Current balance; kept non-negative by the ledger
    pub balance: Decimal,
    /// Active or locked
    pub status: WalletStatus,
    /// Optional password hash protecting manual wallet operations
    pub password_hash: Option<String>,
    /// When the wallet was created
    pub created_at: DateTimeUtc,
    /// When the balance or status last changed
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Wallet and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each wallet belongs to one customer
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
    /// One wallet has many ledger entries
    #[sea_orm(has_many = "super::wallet_transaction::Entity")]
    Transactions,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::wallet_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
