//! Unified error types for the billing core.
//!
//! Business conditions that callers branch on (`InsufficientBalance`, `WalletLocked`)
//! are plain variants so batch jobs can match them without string inspection.

use rust_decimal::Decimal;
use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or a stored setting is malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Debit larger than the available balance
    #[error("Insufficient balance: have {balance}, need {required}")]
    InsufficientBalance {
        /// Balance at the time of the attempt
        balance: Decimal,
        /// Amount that was requested
        required: Decimal,
    },

    /// Wallet is locked against mutations
    #[error("Wallet {wallet_id} is locked")]
    WalletLocked {
        /// Locked wallet
        wallet_id: i64,
    },

    /// No wallet exists for the lookup key
    #[error("Wallet not found: {key}")]
    WalletNotFound {
        /// Wallet or customer identifier used for the lookup
        key: String,
    },

    /// Subscription references a package that does not exist
    #[error("Service package {package_id} not found")]
    PackageNotFound {
        /// Missing package
        package_id: i64,
    },

    /// Subscription id does not exist
    #[error("Subscription {subscription_id} not found")]
    SubscriptionNotFound {
        /// Missing subscription
        subscription_id: i64,
    },

    /// Amount is zero, negative or otherwise unusable
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// Rejected amount
        amount: Decimal,
    },

    /// Period key is not `YYYY-MM`
    #[error("Invalid period: {period}")]
    InvalidPeriod {
        /// Rejected period key
        period: String,
    },

    /// Tier table JSON is not an array of tier objects
    #[error("Invalid tier table: {message}")]
    InvalidTierTable {
        /// Decoding failure
        message: String,
    },

    /// The commission for this key was already paid and cannot be recalculated
    #[error("Commission {commission_id} for period {period} is already paid")]
    CommissionAlreadyPaid {
        /// Existing commission row
        commission_id: i64,
        /// Its period
        period: String,
    },

    /// Customer has no employee to credit a commission to
    #[error("Customer {customer_id} has no assigned employee")]
    NoAssignedEmployee {
        /// Customer without assignment
        customer_id: i64,
    },

    /// Notification dispatch failed
    #[error("Notification error: {0}")]
    Notification(String),

    /// Platform pause action failed
    #[error("Platform action failed: {0}")]
    PlatformAction(String),

    /// Wallet kept changing underneath a balance write
    #[error("Wallet {wallet_id} is busy, balance write abandoned")]
    BalanceConflict {
        /// Contended wallet
        wallet_id: i64,
    },

    /// Job scheduler failure
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
