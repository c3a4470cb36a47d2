//! Wallet ledger - balance mutation plus append-only transaction log.
//!
//! Every balance change reads the wallet, computes the new balance on `Decimal`, writes it
//! back guarded by the `updated_at` stamp it read, then appends a ledger entry, all inside one
//! database transaction. Either both are committed or neither is, so the sum of
//! `completed` entries for a wallet always equals its balance at rest.
//!
//! The `*_in` variants run inside a caller-owned transaction so billing can commit the
//! debit together with its own writes. The ledger never sends notifications.

use crate::{
    entities::{
        TransactionStatus, Wallet, WalletStatus, WalletTransaction, wallet, wallet_transaction,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{debug, info, warn};

/// Guarded balance writes retried before giving up on a busy wallet.
const MAX_BALANCE_WRITE_ATTEMPTS: u32 = 3;

/// Finds the wallet owned by `customer_id`.
pub async fn find_wallet_by_customer<C>(db: &C, customer_id: i64) -> Result<Option<wallet::Model>>
where
    C: ConnectionTrait,
{
    Wallet::find()
        .filter(wallet::Column::CustomerId.eq(customer_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a wallet by id.
pub async fn get_wallet<C>(db: &C, wallet_id: i64) -> Result<Option<wallet::Model>>
where
    C: ConnectionTrait,
{
    Wallet::find_by_id(wallet_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Returns the customer's wallet, creating an empty active one on first use.
pub async fn get_or_create_wallet(db: &DatabaseConnection, customer_id: i64) -> Result<wallet::Model> {
    if let Some(existing) = find_wallet_by_customer(db, customer_id).await? {
        return Ok(existing);
    }

    let now = Utc::now();
    let created = wallet::ActiveModel {
        customer_id: Set(customer_id),
        balance: Set(Decimal::ZERO),
        status: Set(WalletStatus::Active),
        password_hash: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(customer_id, wallet_id = created.id, "Created wallet");
    Ok(created)
}

/// Debits `amount` from the wallet in its own unit of work.
///
/// # Errors
/// * `InvalidAmount` if `amount` is not positive
/// * `InsufficientBalance` if `amount` exceeds the balance
/// * `WalletLocked` / `WalletNotFound` for unusable wallets
pub async fn debit(
    db: &DatabaseConnection,
    wallet_id: i64,
    amount: Decimal,
    transaction_type: &str,
    reference_id: Option<String>,
    description: String,
) -> Result<wallet_transaction::Model> {
    let txn = db.begin().await?;
    let entry = debit_in(&txn, wallet_id, amount, transaction_type, reference_id, description).await?;
    txn.commit().await?;
    Ok(entry)
}

/// Credits `amount` to the wallet in its own unit of work.
///
/// There is no upper bound; only locked or missing wallets are refused.
pub async fn credit(
    db: &DatabaseConnection,
    wallet_id: i64,
    amount: Decimal,
    transaction_type: &str,
    reference_id: Option<String>,
    description: String,
) -> Result<wallet_transaction::Model> {
    let txn = db.begin().await?;
    let entry =
        credit_in(&txn, wallet_id, amount, transaction_type, reference_id, description).await?;
    txn.commit().await?;
    Ok(entry)
}

/// Debits inside an existing transaction. The caller commits or rolls back.
pub async fn debit_in<C>(
    conn: &C,
    wallet_id: i64,
    amount: Decimal,
    transaction_type: &str,
    reference_id: Option<String>,
    description: String,
) -> Result<wallet_transaction::Model>
where
    C: ConnectionTrait,
{
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }

    let balance_after = write_balance(conn, wallet_id, -amount).await?;
    append_entry(
        conn,
        wallet_id,
        -amount,
        balance_after,
        transaction_type,
        reference_id,
        description,
    )
    .await
}

/// Credits inside an existing transaction. The caller commits or rolls back.
pub async fn credit_in<C>(
    conn: &C,
    wallet_id: i64,
    amount: Decimal,
    transaction_type: &str,
    reference_id: Option<String>,
    description: String,
) -> Result<wallet_transaction::Model>
where
    C: ConnectionTrait,
{
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }

    let balance_after = write_balance(conn, wallet_id, amount).await?;
    append_entry(
        conn,
        wallet_id,
        amount,
        balance_after,
        transaction_type,
        reference_id,
        description,
    )
    .await
}

/// Applies `delta` to the wallet balance and returns the new balance.
///
/// The sum is computed on `Decimal`, never in SQL, and written as an absolute value
/// guarded by the `updated_at` stamp that was read. A guard miss means another writer
/// got in between, so the row is read again.
async fn write_balance<C>(conn: &C, wallet_id: i64, delta: Decimal) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    for attempt in 1..=MAX_BALANCE_WRITE_ATTEMPTS {
        let wallet = get_wallet(conn, wallet_id)
            .await?
            .ok_or_else(|| Error::WalletNotFound {
                key: wallet_id.to_string(),
            })?;

        if wallet.status == WalletStatus::Locked {
            return Err(Error::WalletLocked { wallet_id });
        }
        if delta < Decimal::ZERO && wallet.balance < -delta {
            return Err(Error::InsufficientBalance {
                balance: wallet.balance,
                required: -delta,
            });
        }

        let new_balance = (wallet.balance + delta).normalize();
        let updated = Wallet::update_many()
            .col_expr(wallet::Column::Balance, Expr::value(new_balance))
            .col_expr(wallet::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(wallet::Column::Id.eq(wallet_id))
            .filter(wallet::Column::Status.eq(WalletStatus::Active))
            .filter(wallet::Column::UpdatedAt.eq(wallet.updated_at))
            .exec(conn)
            .await?;

        if updated.rows_affected == 1 {
            return Ok(new_balance);
        }
        warn!(wallet_id, attempt, "Wallet balance changed underneath, retrying");
    }

    Err(Error::BalanceConflict { wallet_id })
}

async fn append_entry<C>(
    conn: &C,
    wallet_id: i64,
    signed_amount: Decimal,
    balance_after: Decimal,
    transaction_type: &str,
    reference_id: Option<String>,
    description: String,
) -> Result<wallet_transaction::Model>
where
    C: ConnectionTrait,
{
    let entry = wallet_transaction::ActiveModel {
        wallet_id: Set(wallet_id),
        amount: Set(signed_amount),
        transaction_type: Set(transaction_type.to_string()),
        status: Set(TransactionStatus::Completed),
        reference_id: Set(reference_id),
        description: Set(description),
        balance_after: Set(balance_after),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    debug!(
        wallet_id,
        amount = %signed_amount,
        balance_after = %balance_after,
        transaction_type,
        "Ledger entry appended"
    );
    Ok(entry)
}

/// Locks a wallet; subsequent debits and credits fail with `WalletLocked`.
pub async fn lock_wallet(db: &DatabaseConnection, wallet_id: i64) -> Result<wallet::Model> {
    set_wallet_status(db, wallet_id, WalletStatus::Locked).await
}

/// Unlocks a previously locked wallet.
pub async fn unlock_wallet(db: &DatabaseConnection, wallet_id: i64) -> Result<wallet::Model> {
    set_wallet_status(db, wallet_id, WalletStatus::Active).await
}

async fn set_wallet_status(
    db: &DatabaseConnection,
    wallet_id: i64,
    status: WalletStatus,
) -> Result<wallet::Model> {
    let wallet = get_wallet(db, wallet_id)
        .await?
        .ok_or_else(|| Error::WalletNotFound {
            key: wallet_id.to_string(),
        })?;

    let mut active_model: wallet::ActiveModel = wallet.into();
    active_model.status = Set(status);
    active_model.updated_at = Set(Utc::now());
    let updated = active_model.update(db).await?;

    info!(wallet_id, status = ?status, "Wallet status changed");
    Ok(updated)
}

/// Ledger entries for a wallet, newest first.
pub async fn wallet_history(
    db: &DatabaseConnection,
    wallet_id: i64,
) -> Result<Vec<wallet_transaction::Model>> {
    WalletTransaction::find()
        .filter(wallet_transaction::Column::WalletId.eq(wallet_id))
        .order_by_desc(wallet_transaction::Column::CreatedAt)
        .order_by_desc(wallet_transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
