//! Read-only ledger consistency checks.
//!
//! These checks never write. They are meant to be run after a batch or after an incident
//! to confirm that wallet balances still match their ledgers and that no commission was
//! emitted twice for the same period.

use crate::{
    entities::{
        CommissionTransaction, CommissionType, TransactionStatus, Wallet, WalletTransaction,
        commission_transaction, wallet_transaction,
    },
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, prelude::*};
use std::collections::HashMap;
use tracing::warn;

/// Balance of one wallet compared with the sum of its completed ledger entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletReconciliation {
    /// Wallet checked
    pub wallet_id: i64,
    /// Stored balance
    pub balance: Decimal,
    /// Sum of completed ledger amounts
    pub ledger_sum: Decimal,
    /// Whether the two agree
    pub consistent: bool,
}

/// Commission key that has more than one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateCommission {
    /// Employee part of the key
    pub employee_id: i64,
    /// Customer part of the key
    pub customer_id: i64,
    /// Type part of the key
    pub commission_type: CommissionType,
    /// Period part of the key
    pub period: String,
    /// Rows sharing the key
    pub commission_ids: Vec<i64>,
}

/// Compares one wallet's balance with its completed ledger entries.
pub async fn reconcile_wallet<C>(db: &C, wallet_id: i64) -> Result<WalletReconciliation>
where
    C: ConnectionTrait,
{
    let wallet = Wallet::find_by_id(wallet_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::WalletNotFound {
            key: wallet_id.to_string(),
        })?;

    let entries = WalletTransaction::find()
        .filter(wallet_transaction::Column::WalletId.eq(wallet_id))
        .filter(wallet_transaction::Column::Status.eq(TransactionStatus::Completed))
        .all(db)
        .await?;
    let ledger_sum: Decimal = entries.iter().map(|entry| entry.amount).sum();

    Ok(WalletReconciliation {
        wallet_id,
        balance: wallet.balance,
        ledger_sum,
        consistent: wallet.balance == ledger_sum,
    })
}

/// Returns every wallet whose balance disagrees with its ledger.
pub async fn find_unbalanced_wallets<C>(db: &C) -> Result<Vec<WalletReconciliation>>
where
    C: ConnectionTrait,
{
    let wallet_ids: Vec<i64> = Wallet::find()
        .order_by_asc(crate::entities::wallet::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(|wallet| wallet.id)
        .collect();

    let mut unbalanced = Vec::new();
    for wallet_id in wallet_ids {
        let report = reconcile_wallet(db, wallet_id).await?;
        if !report.consistent {
            warn!(
                wallet_id,
                balance = %report.balance,
                ledger_sum = %report.ledger_sum,
                "Wallet balance does not match ledger"
            );
            unbalanced.push(report);
        }
    }
    Ok(unbalanced)
}

/// Returns every `(employee, customer, type, period)` key with more than one row.
pub async fn find_duplicate_commissions<C>(db: &C) -> Result<Vec<DuplicateCommission>>
where
    C: ConnectionTrait,
{
    let rows = CommissionTransaction::find()
        .order_by_asc(commission_transaction::Column::Id)
        .all(db)
        .await?;

    let mut groups: HashMap<(i64, i64, CommissionType, String), Vec<i64>> = HashMap::new();
    for row in rows {
        groups
            .entry((row.employee_id, row.customer_id, row.commission_type, row.period))
            .or_default()
            .push(row.id);
    }

    let mut duplicates: Vec<DuplicateCommission> = groups
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(
            |((employee_id, customer_id, commission_type, period), commission_ids)| {
                DuplicateCommission {
                    employee_id,
                    customer_id,
                    commission_type,
                    period,
                    commission_ids,
                }
            },
        )
        .collect();
    duplicates.sort_by_key(|d| d.commission_ids[0]);
    Ok(duplicates)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::wallet;
    use crate::entities::wallet_transaction::TYPE_ADJUSTMENT;
    use crate::test_utils::*;
    use chrono::Utc;
    use sea_orm::{Set, sea_query::Expr};

    #[tokio::test]
    async fn test_reconcile_fresh_wallet_is_consistent() -> Result<()> {
        let db = setup_test_db().await?;
        let customer = create_test_customer(&db, "Acme").await?;
        let created = wallet::get_or_create_wallet(&db, customer.id).await?;

        let report = reconcile_wallet(&db, created.id).await?;
        assert!(report.consistent);
        assert_eq!(report.ledger_sum, Decimal::ZERO);

        Ok(())
    }

    #[tokio::test]
    async fn test_find_unbalanced_wallets_flags_direct_balance_edit() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, good) = create_funded_wallet(&db, "Good", Decimal::from(10)).await?;
        let (_, bad) = create_funded_wallet(&db, "Bad", Decimal::from(10)).await?;

        // Bypass the ledger entirely.
        Wallet::update_many()
            .col_expr(
                crate::entities::wallet::Column::Balance,
                Expr::value(Decimal::from(99)),
            )
            .filter(crate::entities::wallet::Column::Id.eq(bad.id))
            .exec(&db)
            .await?;
        wallet::debit(&db, good.id, Decimal::from(3), TYPE_ADJUSTMENT, None, "adj".into()).await?;

        let unbalanced = find_unbalanced_wallets(&db).await?;
        assert_eq!(unbalanced.len(), 1);
        assert_eq!(unbalanced[0].wallet_id, bad.id);
        assert_eq!(unbalanced[0].balance, Decimal::from(99));
        assert_eq!(unbalanced[0].ledger_sum, Decimal::from(10));

        Ok(())
    }

    #[tokio::test]
    async fn test_reconcile_ignores_non_completed_entries() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, funded) = create_funded_wallet(&db, "Acme", Decimal::from(10)).await?;

        wallet_transaction::ActiveModel {
            wallet_id: Set(funded.id),
            amount: Set(Decimal::from(-5)),
            transaction_type: Set(TYPE_ADJUSTMENT.to_string()),
            status: Set(TransactionStatus::Failed),
            reference_id: Set(None),
            description: Set("failed attempt".to_string()),
            balance_after: Set(Decimal::from(10)),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        assert!(reconcile_wallet(&db, funded.id).await?.consistent);

        Ok(())
    }

    #[tokio::test]
    async fn test_find_duplicate_commissions() -> Result<()> {
        // Without the unique index, so duplicates can be written at all.
        let db = setup_test_db().await?;
        db.execute_unprepared("DROP INDEX idx_commission_transactions_period_key")
            .await?;

        for _ in 0..2 {
            insert_commission_row(&db, 7, 1, "2024-01").await?;
        }
        insert_commission_row(&db, 7, 1, "2024-02").await?;

        let duplicates = find_duplicate_commissions(&db).await?;
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].period, "2024-01");
        assert_eq!(duplicates[0].commission_ids.len(), 2);

        Ok(())
    }
}
