//! Postpay billing cycle.
//!
//! A periodic batch over every active postpay subscription. For each one:
//! 1. The window runs from the billing cursor (or `created_at`) to today.
//! 2. Windows shorter than `window_days` are left waiting.
//! 3. Spend over the window is aggregated and resolved against the package tiers.
//! 4. The fee is debited from the customer's wallet, a subscription-level log row is
//!    written and the cursor moves to now. All three commit together.
//!
//! When nothing is due the cursor still moves. When the wallet cannot pay (insufficient
//! balance or locked) nothing is written and the same, now longer, window is retried on
//! the next run. Per-subscription errors never stop the batch; the cursor is advanced
//! past them so a broken record is not retried forever.
//!
//! The run iterates a snapshot of subscription ids taken once at the start.

use crate::{
    core::{
        fee_tier,
        spend::SpendAggregator,
        subscription::{
            advance_billing_cursor, get_package, get_subscription, postpay_subscription_ids,
        },
        wallet::{debit_in, find_wallet_by_customer},
    },
    entities::{subscription, subscription_transaction, wallet_transaction::TYPE_POSTPAY_FEE},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{DatabaseTransaction, Set, TransactionTrait, prelude::*};
use tracing::{error, info, instrument, warn};

/// Days a postpay window must span before it is billed.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Why a due window produced no charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoFeeReason {
    /// The package has no fee-tier table
    NoTierTable,
    /// The fee-tier table could not be decoded
    MalformedTierTable,
    /// No tier matched the spend
    NoMatchingTier,
    /// Spend over the window was zero or negative
    NoSpend,
    /// The computed fee rounds to zero cents
    FeeRoundsToZero,
}

/// What happened to one subscription during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingOutcome {
    /// Window not yet elapsed; nothing written
    Waiting {
        /// Whole days since the window started
        days_elapsed: i64,
    },
    /// Fee debited, logged and cursor advanced
    Billed {
        /// Aggregated spend
        spend: Decimal,
        /// Resolved fee percent
        fee_percent: Decimal,
        /// Charged amount
        fee: Decimal,
        /// Wallet ledger entry id
        wallet_transaction_id: i64,
        /// Subscription log row id
        subscription_transaction_id: i64,
    },
    /// Nothing due; cursor advanced
    SkippedNoFee {
        /// Aggregated spend
        spend: Decimal,
        /// Why no fee applied
        reason: NoFeeReason,
    },
    /// Wallet could not cover the fee; cursor left in place
    SkippedInsufficientBalance {
        /// Fee that was attempted
        fee: Decimal,
        /// Wallet balance at the time
        balance: Decimal,
    },
    /// Wallet locked; cursor left in place
    DeferredWalletLocked {
        /// Fee that was attempted
        fee: Decimal,
    },
    /// Processing failed; cursor advanced past the window
    Errored {
        /// Error text
        message: String,
    },
}

/// Result of one billing run.
#[derive(Debug, Clone)]
pub struct BillingRunReport {
    /// Clock value the run used
    pub run_at: DateTime<Utc>,
    /// Outcome per subscription id, in processing order
    pub outcomes: Vec<(i64, BillingOutcome)>,
    /// Subscriptions charged
    pub billed: usize,
    /// Subscriptions still inside their window
    pub waiting: usize,
    /// Due windows with no fee
    pub skipped_no_fee: usize,
    /// Charges deferred for lack of balance
    pub skipped_insufficient_balance: usize,
    /// Charges deferred because the wallet is locked
    pub deferred_locked: usize,
    /// Subscriptions that failed
    pub errored: usize,
    /// Sum of all charged fees
    pub total_fees: Decimal,
}

impl BillingRunReport {
    fn new(run_at: DateTime<Utc>) -> Self {
        Self {
            run_at,
            outcomes: Vec::new(),
            billed: 0,
            waiting: 0,
            skipped_no_fee: 0,
            skipped_insufficient_balance: 0,
            deferred_locked: 0,
            errored: 0,
            total_fees: Decimal::ZERO,
        }
    }

    fn record(&mut self, subscription_id: i64, outcome: BillingOutcome) {
        match &outcome {
            BillingOutcome::Waiting { .. } => self.waiting += 1,
            BillingOutcome::Billed { fee, .. } => {
                self.billed += 1;
                self.total_fees += *fee;
            }
            BillingOutcome::SkippedNoFee { .. } => self.skipped_no_fee += 1,
            BillingOutcome::SkippedInsufficientBalance { .. } => {
                self.skipped_insufficient_balance += 1;
            }
            BillingOutcome::DeferredWalletLocked { .. } => self.deferred_locked += 1,
            BillingOutcome::Errored { .. } => self.errored += 1,
        }
        self.outcomes.push((subscription_id, outcome));
    }

    /// Outcome recorded for `subscription_id`, if it was in the snapshot.
    #[must_use]
    pub fn outcome_for(&self, subscription_id: i64) -> Option<&BillingOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| *id == subscription_id)
            .map(|(_, outcome)| outcome)
    }
}

/// Rounds a fee to cents, half away from zero.
#[must_use]
pub fn compute_fee(spend: Decimal, fee_percent: Decimal) -> Decimal {
    (spend * fee_percent / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Postpay billing over the subscription registry, the spend aggregator and the wallet
/// ledger.
#[derive(Debug, Clone)]
pub struct PostpayBillingCycle {
    db: DatabaseConnection,
    aggregator: SpendAggregator,
    window_days: i64,
}

impl PostpayBillingCycle {
    /// Creates a cycle with the default 30-day window.
    #[must_use]
    pub fn new(db: DatabaseConnection, aggregator: SpendAggregator) -> Self {
        Self {
            db,
            aggregator,
            window_days: DEFAULT_WINDOW_DAYS,
        }
    }

    /// Overrides the window length.
    #[must_use]
    pub const fn with_window_days(mut self, window_days: i64) -> Self {
        self.window_days = window_days;
        self
    }

    /// Runs the cycle against the current wall clock.
    pub async fn run(&self) -> Result<BillingRunReport> {
        self.run_at(Utc::now()).await
    }

    /// Runs the cycle as if the current time were `now`.
    ///
    /// Only the initial snapshot query can fail the whole run; every per-subscription
    /// failure is recorded as [`BillingOutcome::Errored`].
    #[instrument(skip(self), fields(window_days = self.window_days))]
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<BillingRunReport> {
        let subscription_ids = postpay_subscription_ids(&self.db).await?;
        info!(count = subscription_ids.len(), "Starting postpay billing run");

        let mut report = BillingRunReport::new(now);
        for subscription_id in subscription_ids {
            let outcome = match self.bill_subscription(subscription_id, now).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(subscription_id, error = %e, "Postpay billing failed, advancing cursor");
                    // A failing record would otherwise be retried on every run.
                    if let Err(cursor_err) =
                        advance_billing_cursor(&self.db, subscription_id, now).await
                    {
                        error!(subscription_id, error = %cursor_err, "Failed to advance cursor after error");
                    }
                    BillingOutcome::Errored {
                        message: e.to_string(),
                    }
                }
            };
            report.record(subscription_id, outcome);
        }

        info!(
            billed = report.billed,
            waiting = report.waiting,
            skipped_no_fee = report.skipped_no_fee,
            skipped_insufficient_balance = report.skipped_insufficient_balance,
            deferred_locked = report.deferred_locked,
            errored = report.errored,
            total_fees = %report.total_fees,
            "Postpay billing run finished"
        );
        Ok(report)
    }

    /// Processes one subscription at `now`.
    pub async fn bill_subscription(
        &self,
        subscription_id: i64,
        now: DateTime<Utc>,
    ) -> Result<BillingOutcome> {
        let subscription = get_subscription(&self.db, subscription_id)
            .await?
            .ok_or(Error::SubscriptionNotFound { subscription_id })?;

        let window_start = subscription.window_start().date_naive();
        let window_end = now.date_naive();
        let days_elapsed = (window_end - window_start).num_days();
        if days_elapsed < self.window_days {
            return Ok(BillingOutcome::Waiting { days_elapsed });
        }

        let spend = self
            .aggregator
            .total_spend(subscription_id, window_start, window_end)
            .await?;

        let package = get_package(&self.db, subscription.service_package_id)
            .await?
            .ok_or(Error::PackageNotFound {
                package_id: subscription.service_package_id,
            })
            .inspect_err(|_| {
                error!(
                    subscription_id,
                    %window_start,
                    %window_end,
                    spend = %spend,
                    "Service package missing"
                );
            })?;

        let fee_percent = match resolve_fee(
            subscription_id,
            package.id,
            package.monthly_spending_fee_structure.as_ref(),
            spend,
        ) {
            Ok(fee_percent) => fee_percent,
            Err(reason) => {
                advance_billing_cursor(&self.db, subscription_id, now).await?;
                info!(subscription_id, spend = %spend, reason = ?reason, "No postpay fee due");
                return Ok(BillingOutcome::SkippedNoFee { spend, reason });
            }
        };

        let fee = compute_fee(spend, fee_percent);
        if fee <= Decimal::ZERO {
            advance_billing_cursor(&self.db, subscription_id, now).await?;
            return Ok(BillingOutcome::SkippedNoFee {
                spend,
                reason: NoFeeReason::FeeRoundsToZero,
            });
        }

        let wallet = find_wallet_by_customer(&self.db, subscription.customer_id)
            .await?
            .ok_or_else(|| Error::WalletNotFound {
                key: format!("customer:{}", subscription.customer_id),
            })
            .inspect_err(|_| {
                error!(
                    subscription_id,
                    customer_id = subscription.customer_id,
                    %window_start,
                    %window_end,
                    spend = %spend,
                    fee = %fee,
                    "Customer has no wallet"
                );
            })?;

        let charge = Charge {
            subscription: &subscription,
            wallet_id: wallet.id,
            spend,
            fee_percent,
            fee,
            window_start,
            window_end,
            now,
        };

        let txn = self.db.begin().await?;
        match charge.apply(&txn).await {
            Ok(outcome) => {
                txn.commit().await?;
                info!(subscription_id, spend = %spend, fee = %fee, "Postpay fee billed");
                Ok(outcome)
            }
            Err(Error::InsufficientBalance { balance, required }) => {
                txn.rollback().await?;
                info!(
                    subscription_id,
                    balance = %balance,
                    fee = %required,
                    "Insufficient balance, deferring postpay fee"
                );
                Ok(BillingOutcome::SkippedInsufficientBalance { fee, balance })
            }
            Err(Error::WalletLocked { wallet_id }) => {
                txn.rollback().await?;
                warn!(subscription_id, wallet_id, fee = %fee, "Wallet locked, deferring postpay fee");
                Ok(BillingOutcome::DeferredWalletLocked { fee })
            }
            Err(e) => {
                txn.rollback().await?;
                Err(e)
            }
        }
    }
}

/// Resolves the fee percent for a window, or the reason there is none.
fn resolve_fee(
    subscription_id: i64,
    package_id: i64,
    fee_structure: Option<&serde_json::Value>,
    spend: Decimal,
) -> std::result::Result<Decimal, NoFeeReason> {
    let Some(table) = fee_structure.filter(|value| !value.is_null()) else {
        return Err(NoFeeReason::NoTierTable);
    };
    if spend <= Decimal::ZERO {
        return Err(NoFeeReason::NoSpend);
    }

    match fee_tier::resolve_from_json(spend, table) {
        Ok(Some(fee_percent)) => Ok(fee_percent),
        Ok(None) => {
            warn!(subscription_id, package_id, spend = %spend, "No fee tier matched spend");
            Err(NoFeeReason::NoMatchingTier)
        }
        Err(e) => {
            warn!(subscription_id, package_id, spend = %spend, error = %e, "Malformed fee tier table");
            Err(NoFeeReason::MalformedTierTable)
        }
    }
}

/// One postpay charge, applied inside a caller-owned transaction.
struct Charge<'a> {
    subscription: &'a subscription::Model,
    wallet_id: i64,
    spend: Decimal,
    fee_percent: Decimal,
    fee: Decimal,
    window_start: NaiveDate,
    window_end: NaiveDate,
    now: DateTime<Utc>,
}

impl Charge<'_> {
    async fn apply(&self, txn: &DatabaseTransaction) -> Result<BillingOutcome> {
        let subscription_id = self.subscription.id;

        let entry = debit_in(
            txn,
            self.wallet_id,
            self.fee,
            TYPE_POSTPAY_FEE,
            Some(format!("subscription:{subscription_id}")),
            format!(
                "Postpay fee {}% on spend {} ({} to {})",
                self.fee_percent, self.spend, self.window_start, self.window_end
            ),
        )
        .await?;

        let log = subscription_transaction::ActiveModel {
            subscription_id: Set(subscription_id),
            wallet_transaction_id: Set(entry.id),
            spend_amount: Set(self.spend),
            fee_percent: Set(self.fee_percent),
            amount: Set(self.fee),
            window_start: Set(self.window_start),
            window_end: Set(self.window_end),
            created_at: Set(self.now),
            ..Default::default()
        }
        .insert(txn)
        .await?;

        advance_billing_cursor(txn, subscription_id, self.now).await?;

        Ok(BillingOutcome::Billed {
            spend: self.spend,
            fee_percent: self.fee_percent,
            fee: self.fee,
            wallet_transaction_id: entry.id,
            subscription_transaction_id: log.id,
        })
    }
}

/// Formats a billing run into a human-readable summary.
#[must_use]
pub fn format_billing_summary(report: &BillingRunReport) -> String {
    use std::fmt::Write;

    let mut summary = format!(
        "Postpay Billing - {} - {} subscriptions\n",
        report.run_at.format("%Y-%m-%d %H:%M UTC"),
        report.outcomes.len()
    );

    let _ = writeln!(
        summary,
        "  Billed: {} (${:.2}) | Waiting: {} | No fee: {} | Insufficient: {} | Locked: {} | Errors: {}\n",
        report.billed,
        report.total_fees,
        report.waiting,
        report.skipped_no_fee,
        report.skipped_insufficient_balance,
        report.deferred_locked,
        report.errored
    );

    for (subscription_id, outcome) in &report.outcomes {
        let line = match outcome {
            BillingOutcome::Waiting { .. } => continue,
            BillingOutcome::Billed {
                spend,
                fee_percent,
                fee,
                ..
            } => format!("Billed ${fee:.2} ({fee_percent}% of ${spend:.2})"),
            BillingOutcome::SkippedNoFee { spend, reason } => {
                format!("No fee on ${spend:.2} ({reason:?})")
            }
            BillingOutcome::SkippedInsufficientBalance { fee, balance } => {
                format!("Deferred ${fee:.2}, balance ${balance:.2}")
            }
            BillingOutcome::DeferredWalletLocked { fee } => {
                format!("Deferred ${fee:.2}, wallet locked")
            }
            BillingOutcome::Errored { message } => format!("Error: {message}"),
        };
        let _ = writeln!(summary, "  #{subscription_id} - {line}");
    }

    summary
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::{reconcile::reconcile_wallet, wallet};
    use crate::entities::{
        SubscriptionTransaction, WalletTransaction, wallet_transaction,
    };
    use crate::test_utils::*;
    use chrono::TimeZone;
    use sea_orm::QueryOrder;
    use serde_json::json;

    fn at(month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, month, day, 2, 0, 0).unwrap()
    }

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    fn tiered_table() -> serde_json::Value {
        json!([
            {"range": "0-500", "fee_percent": "10%"},
            {"range": "500+", "fee_percent": "6%"}
        ])
    }

    fn cycle(db: &DatabaseConnection) -> PostpayBillingCycle {
        PostpayBillingCycle::new(db.clone(), SpendAggregator::from_database(db))
    }

    async fn postpay_fee_entries(
        db: &DatabaseConnection,
        wallet_id: i64,
    ) -> Result<Vec<wallet_transaction::Model>> {
        Ok(WalletTransaction::find()
            .filter(wallet_transaction::Column::WalletId.eq(wallet_id))
            .filter(wallet_transaction::Column::TransactionType.eq(TYPE_POSTPAY_FEE))
            .order_by_asc(wallet_transaction::Column::Id)
            .all(db)
            .await?)
    }

    #[test]
    fn test_compute_fee_rounds_half_away_from_zero() {
        assert_eq!(compute_fee(Decimal::from(700), Decimal::from(6)), Decimal::from(42));
        // 0.125 -> 0.13
        assert_eq!(
            compute_fee(Decimal::new(125, 1), Decimal::from(1)),
            Decimal::new(13, 2)
        );
    }

    #[tokio::test]
    async fn test_end_to_end_postpay_charge() -> Result<()> {
        let db = setup_test_db().await?;
        let (customer, funded) = create_funded_wallet(&db, "Acme", Decimal::from(100)).await?;
        let package = create_test_package(&db, Some(tiered_table())).await?;
        let sub = create_test_subscription(
            &db,
            customer.id,
            package.id,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
        .await?;

        insert_meta_insight(&db, sub.id, "act_1", date(1, 5), Decimal::from(300)).await?;
        insert_meta_insight(&db, sub.id, "act_1", date(1, 20), Decimal::from(150)).await?;
        insert_google_insight(&db, sub.id, "g-1", date(1, 31), Decimal::from(250)).await?;

        let report = cycle(&db).run_at(at(1, 31)).await?;
        assert_eq!(report.billed, 1);
        assert_eq!(report.errored, 0);
        assert!(matches!(
            report.outcome_for(sub.id),
            Some(BillingOutcome::Billed { spend, fee, .. })
                if *spend == Decimal::from(700) && *fee == Decimal::from(42)
        ));

        let reloaded = wallet::get_wallet(&db, funded.id).await?.unwrap();
        assert_eq!(reloaded.balance, Decimal::from(58));

        let cursor = get_subscription(&db, sub.id)
            .await?
            .unwrap()
            .last_postpay_billed_at
            .unwrap();
        assert_eq!(cursor.date_naive(), date(1, 31));

        let entries = postpay_fee_entries(&db, funded.id).await?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, Decimal::from(-42));

        let logs = SubscriptionTransaction::find().all(&db).await?;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].wallet_transaction_id, entries[0].id);
        assert_eq!(logs[0].window_start, date(1, 1));
        assert_eq!(logs[0].window_end, date(1, 31));

        assert!(reconcile_wallet(&db, funded.id).await?.consistent);

        Ok(())
    }

    #[tokio::test]
    async fn test_second_run_same_day_is_noop() -> Result<()> {
        let db = setup_test_db().await?;
        let (customer, funded) = create_funded_wallet(&db, "Acme", Decimal::from(100)).await?;
        let package = create_test_package(&db, Some(tiered_table())).await?;
        let sub = create_test_subscription(&db, customer.id, package.id, at(1, 1)).await?;
        insert_meta_insight(&db, sub.id, "act_1", date(1, 10), Decimal::from(200)).await?;

        let billing = cycle(&db);
        let first = billing.run_at(at(1, 31)).await?;
        assert_eq!(first.billed, 1);
        let cursor_after_first = get_subscription(&db, sub.id).await?.unwrap().last_postpay_billed_at;

        let second = billing
            .run_at(at(1, 31) + chrono::Duration::hours(3))
            .await?;
        assert_eq!(second.billed, 0);
        assert_eq!(
            second.outcome_for(sub.id),
            Some(&BillingOutcome::Waiting { days_elapsed: 0 })
        );

        assert_eq!(postpay_fee_entries(&db, funded.id).await?.len(), 1);
        assert_eq!(SubscriptionTransaction::find().count(&db).await?, 1);
        assert_eq!(
            get_subscription(&db, sub.id).await?.unwrap().last_postpay_billed_at,
            cursor_after_first
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_window_not_elapsed_is_waiting() -> Result<()> {
        let db = setup_test_db().await?;
        let (customer, _) = create_funded_wallet(&db, "Acme", Decimal::from(100)).await?;
        let package = create_test_package(&db, Some(tiered_table())).await?;
        let sub = create_test_subscription(&db, customer.id, package.id, at(1, 1)).await?;

        let report = cycle(&db).run_at(at(1, 30)).await?;
        assert_eq!(
            report.outcome_for(sub.id),
            Some(&BillingOutcome::Waiting { days_elapsed: 29 })
        );
        assert!(get_subscription(&db, sub.id).await?.unwrap().last_postpay_billed_at.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_insufficient_balance_defers_and_continues() -> Result<()> {
        let db = setup_test_db().await?;
        let package = create_test_package(
            &db,
            Some(json!([{"range": "0+", "fee_percent": "10%"}])),
        )
        .await?;

        let (poor, poor_wallet) = create_funded_wallet(&db, "Poor", Decimal::from(40)).await?;
        let poor_sub = create_test_subscription(&db, poor.id, package.id, at(1, 1)).await?;
        insert_meta_insight(&db, poor_sub.id, "act_p", date(1, 15), Decimal::from(500)).await?;

        let (rich, rich_wallet) = create_funded_wallet(&db, "Rich", Decimal::from(100)).await?;
        let rich_sub = create_test_subscription(&db, rich.id, package.id, at(1, 1)).await?;
        insert_meta_insight(&db, rich_sub.id, "act_r", date(1, 15), Decimal::from(200)).await?;

        let report = cycle(&db).run_at(at(1, 31)).await?;

        assert_eq!(
            report.outcome_for(poor_sub.id),
            Some(&BillingOutcome::SkippedInsufficientBalance {
                fee: Decimal::from(50),
                balance: Decimal::from(40),
            })
        );
        assert_eq!(report.skipped_insufficient_balance, 1);
        assert_eq!(report.billed, 1);

        let poor_reloaded = wallet::get_wallet(&db, poor_wallet.id).await?.unwrap();
        assert_eq!(poor_reloaded.balance, Decimal::from(40));
        assert!(postpay_fee_entries(&db, poor_wallet.id).await?.is_empty());
        assert!(get_subscription(&db, poor_sub.id).await?.unwrap().last_postpay_billed_at.is_none());

        let rich_reloaded = wallet::get_wallet(&db, rich_wallet.id).await?.unwrap();
        assert_eq!(rich_reloaded.balance, Decimal::from(80));

        Ok(())
    }

    #[tokio::test]
    async fn test_deferred_window_keeps_growing_until_paid() -> Result<()> {
        let db = setup_test_db().await?;
        let package = create_test_package(
            &db,
            Some(json!([{"range": "0+", "fee_percent": "10%"}])),
        )
        .await?;
        let (customer, funded) = create_funded_wallet(&db, "Acme", Decimal::from(40)).await?;
        let sub = create_test_subscription(&db, customer.id, package.id, at(1, 1)).await?;
        insert_meta_insight(&db, sub.id, "act_1", date(1, 15), Decimal::from(500)).await?;

        let billing = cycle(&db);
        billing.run_at(at(1, 31)).await?;

        insert_meta_insight(&db, sub.id, "act_1", date(2, 3), Decimal::from(100)).await?;
        wallet::credit(
            &db,
            funded.id,
            Decimal::from(60),
            wallet_transaction::TYPE_TOP_UP,
            None,
            "top up".into(),
        )
        .await?;

        let report = billing.run_at(at(2, 5)).await?;
        assert!(matches!(
            report.outcome_for(sub.id),
            Some(BillingOutcome::Billed { spend, fee, .. })
                if *spend == Decimal::from(600) && *fee == Decimal::from(60)
        ));
        assert_eq!(
            wallet::get_wallet(&db, funded.id).await?.unwrap().balance,
            Decimal::from(40)
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_no_tier_table_skips_and_advances_cursor() -> Result<()> {
        let db = setup_test_db().await?;
        let (customer, funded) = create_funded_wallet(&db, "Acme", Decimal::from(100)).await?;
        let package = create_test_package(&db, None).await?;
        let sub = create_test_subscription(&db, customer.id, package.id, at(1, 1)).await?;
        insert_meta_insight(&db, sub.id, "act_1", date(1, 5), Decimal::from(300)).await?;

        let report = cycle(&db).run_at(at(1, 31)).await?;
        assert_eq!(
            report.outcome_for(sub.id),
            Some(&BillingOutcome::SkippedNoFee {
                spend: Decimal::from(300),
                reason: NoFeeReason::NoTierTable,
            })
        );
        assert!(get_subscription(&db, sub.id).await?.unwrap().last_postpay_billed_at.is_some());
        assert!(postpay_fee_entries(&db, funded.id).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_zero_spend_and_unmatched_tier_skip() -> Result<()> {
        let db = setup_test_db().await?;
        let package = create_test_package(
            &db,
            Some(json!([{"range": "1000+", "fee_percent": "5%"}])),
        )
        .await?;
        let (customer, _) = create_funded_wallet(&db, "Acme", Decimal::from(100)).await?;
        let idle = create_test_subscription(&db, customer.id, package.id, at(1, 1)).await?;
        let small = create_test_subscription(&db, customer.id, package.id, at(1, 1)).await?;
        insert_google_insight(&db, small.id, "g-1", date(1, 2), Decimal::from(999)).await?;

        let report = cycle(&db).run_at(at(1, 31)).await?;
        assert!(matches!(
            report.outcome_for(idle.id),
            Some(BillingOutcome::SkippedNoFee { reason: NoFeeReason::NoSpend, .. })
        ));
        assert!(matches!(
            report.outcome_for(small.id),
            Some(BillingOutcome::SkippedNoFee { reason: NoFeeReason::NoMatchingTier, .. })
        ));
        assert_eq!(report.skipped_no_fee, 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_tier_table_is_no_fee() -> Result<()> {
        let db = setup_test_db().await?;
        let package = create_test_package(&db, Some(json!({"oops": true}))).await?;
        let (customer, _) = create_funded_wallet(&db, "Acme", Decimal::from(100)).await?;
        let sub = create_test_subscription(&db, customer.id, package.id, at(1, 1)).await?;
        insert_meta_insight(&db, sub.id, "act_1", date(1, 5), Decimal::from(300)).await?;

        let report = cycle(&db).run_at(at(1, 31)).await?;
        assert!(matches!(
            report.outcome_for(sub.id),
            Some(BillingOutcome::SkippedNoFee { reason: NoFeeReason::MalformedTierTable, .. })
        ));
        assert_eq!(report.errored, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_missing_wallet_errors_and_advances_cursor() -> Result<()> {
        let db = setup_test_db().await?;
        let customer = create_test_customer(&db, "No Wallet").await?;
        let package = create_test_package(&db, Some(tiered_table())).await?;
        let sub = create_test_subscription(&db, customer.id, package.id, at(1, 1)).await?;
        insert_meta_insight(&db, sub.id, "act_1", date(1, 5), Decimal::from(300)).await?;

        let (other, other_wallet) = create_funded_wallet(&db, "Other", Decimal::from(100)).await?;
        let other_sub = create_test_subscription(&db, other.id, package.id, at(1, 1)).await?;
        insert_meta_insight(&db, other_sub.id, "act_2", date(1, 5), Decimal::from(100)).await?;

        let report = cycle(&db).run_at(at(1, 31)).await?;
        assert_eq!(report.errored, 1);
        assert!(matches!(report.outcome_for(sub.id), Some(BillingOutcome::Errored { .. })));
        assert!(get_subscription(&db, sub.id).await?.unwrap().last_postpay_billed_at.is_some());

        assert_eq!(report.billed, 1);
        assert_eq!(
            wallet::get_wallet(&db, other_wallet.id).await?.unwrap().balance,
            Decimal::from(90)
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_locked_wallet_defers_without_advancing() -> Result<()> {
        let db = setup_test_db().await?;
        let (customer, funded) = create_funded_wallet(&db, "Acme", Decimal::from(100)).await?;
        wallet::lock_wallet(&db, funded.id).await?;
        let package = create_test_package(&db, Some(tiered_table())).await?;
        let sub = create_test_subscription(&db, customer.id, package.id, at(1, 1)).await?;
        insert_meta_insight(&db, sub.id, "act_1", date(1, 5), Decimal::from(300)).await?;

        let report = cycle(&db).run_at(at(1, 31)).await?;
        assert_eq!(
            report.outcome_for(sub.id),
            Some(&BillingOutcome::DeferredWalletLocked {
                fee: Decimal::from(30)
            })
        );
        assert_eq!(report.deferred_locked, 1);
        assert!(get_subscription(&db, sub.id).await?.unwrap().last_postpay_billed_at.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_failed_log_write_rolls_back_debit() -> Result<()> {
        let db = setup_test_db().await?;
        let (customer, funded) = create_funded_wallet(&db, "Acme", Decimal::from(100)).await?;
        let package = create_test_package(&db, Some(tiered_table())).await?;
        let sub = create_test_subscription(&db, customer.id, package.id, at(1, 1)).await?;
        insert_meta_insight(&db, sub.id, "act_1", date(1, 5), Decimal::from(300)).await?;

        db.execute_unprepared(
            "ALTER TABLE subscription_transactions RENAME TO subscription_transactions_off",
        )
        .await?;
        let report = cycle(&db).run_at(at(1, 31)).await?;
        db.execute_unprepared(
            "ALTER TABLE subscription_transactions_off RENAME TO subscription_transactions",
        )
        .await?;

        assert_eq!(report.errored, 1);
        assert_eq!(
            wallet::get_wallet(&db, funded.id).await?.unwrap().balance,
            Decimal::from(100)
        );
        assert!(postpay_fee_entries(&db, funded.id).await?.is_empty());
        assert!(reconcile_wallet(&db, funded.id).await?.consistent);

        Ok(())
    }

    #[tokio::test]
    async fn test_format_billing_summary() -> Result<()> {
        let db = setup_test_db().await?;
        let (customer, _) = create_funded_wallet(&db, "Acme", Decimal::from(100)).await?;
        let package = create_test_package(&db, Some(tiered_table())).await?;
        let sub = create_test_subscription(&db, customer.id, package.id, at(1, 1)).await?;
        insert_meta_insight(&db, sub.id, "act_1", date(1, 5), Decimal::from(700)).await?;

        let report = cycle(&db).run_at(at(1, 31)).await?;
        let summary = format_billing_summary(&report);

        assert!(summary.contains("Postpay Billing - 2024-01-31"));
        assert!(summary.contains("Billed: 1 ($42.00)"));
        assert!(summary.contains(&format!("#{} - Billed $42.00", sub.id)));

        Ok(())
    }
}
