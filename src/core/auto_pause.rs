//! Auto-pause of ad accounts running out of balance.
//!
//! Per platform, every account with a reported balance is compared against the pause
//! threshold. A breached account that is still active is paused on the platform, marked
//! paused locally and its owner is told, at most once per day and only if they have a
//! contact channel. Failures are counted per account and never stop the run.

use crate::{
    core::settings::pause_threshold,
    entities::{AdAccount, AdAccountStatus, AdPlatform, Customer, ad_account, customer},
    errors::{Error, Result},
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, prelude::*};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Platform-side pause action.
#[async_trait]
pub trait PlatformPauser: Send + Sync {
    /// Stops delivery on `account`.
    async fn pause(&self, account: &ad_account::Model) -> Result<()>;
}

/// Customer notification dispatcher.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `message` to `customer`.
    async fn notify(&self, customer: &customer::Model, message: &str) -> Result<()>;
}

/// Notifier that only writes the message to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, customer: &customer::Model, message: &str) -> Result<()> {
        info!(
            customer_id = customer.id,
            email = customer.email.as_deref().unwrap_or(""),
            telegram = customer.telegram_chat_id.as_deref().unwrap_or(""),
            message,
            "Notification"
        );
        Ok(())
    }
}

/// Pauser that logs instead of calling the platform.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunPauser;

#[async_trait]
impl PlatformPauser for DryRunPauser {
    async fn pause(&self, account: &ad_account::Model) -> Result<()> {
        info!(
            platform = %account.platform,
            account_id = %account.account_id,
            "Dry run: would pause ad account"
        );
        Ok(())
    }
}

/// Totals of one auto-pause run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoPauseReport {
    /// Platform checked
    pub platform: AdPlatform,
    /// Threshold in effect
    pub threshold: Decimal,
    /// Accounts with a known balance
    pub checked: usize,
    /// Accounts paused
    pub paused: usize,
    /// Customers notified
    pub notified: usize,
    /// Per-account failures
    pub errors: usize,
}

/// Whether an account is at or below `threshold`, or flagged exhausted by the platform.
#[must_use]
pub fn is_breached(account: &ad_account::Model, threshold: Decimal) -> bool {
    account.balance_exhausted || account.balance.is_some_and(|balance| balance <= threshold)
}

/// Pauses accounts whose balance falls to the threshold.
#[derive(Clone)]
pub struct AutoPauseController {
    db: DatabaseConnection,
    pauser: Arc<dyn PlatformPauser>,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for AutoPauseController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoPauseController").finish_non_exhaustive()
    }
}

impl AutoPauseController {
    /// Creates a controller.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        pauser: Arc<dyn PlatformPauser>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            db,
            pauser,
            notifier,
        }
    }

    /// Checks `platform` using the threshold currently configured in settings.
    pub async fn run(&self, platform: AdPlatform, default_threshold: Decimal) -> Result<AutoPauseReport> {
        let threshold = pause_threshold(&self.db, platform, default_threshold).await?;
        self.check_and_auto_pause(platform, threshold, Utc::now().date_naive())
            .await
    }

    /// Checks every account of `platform` against `threshold`.
    ///
    /// `today` drives notification throttling.
    #[instrument(skip(self))]
    pub async fn check_and_auto_pause(
        &self,
        platform: AdPlatform,
        threshold: Decimal,
        today: NaiveDate,
    ) -> Result<AutoPauseReport> {
        let accounts = AdAccount::find()
            .filter(ad_account::Column::Platform.eq(platform))
            .filter(ad_account::Column::Balance.is_not_null())
            .order_by_asc(ad_account::Column::Id)
            .all(&self.db)
            .await?;

        let mut report = AutoPauseReport {
            platform,
            threshold,
            checked: accounts.len(),
            paused: 0,
            notified: 0,
            errors: 0,
        };

        for account in accounts {
            if account.status == AdAccountStatus::Paused || !is_breached(&account, threshold) {
                continue;
            }

            if let Err(e) = self.pause_account(&account).await {
                error!(account_id = %account.account_id, error = %e, "Failed to pause ad account");
                report.errors += 1;
                continue;
            }
            report.paused += 1;

            match self.notify_owner(&account, threshold, today).await {
                Ok(true) => report.notified += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(account_id = %account.account_id, error = %e, "Failed to notify customer");
                    report.errors += 1;
                }
            }
        }

        info!(
            checked = report.checked,
            paused = report.paused,
            notified = report.notified,
            errors = report.errors,
            "Auto-pause run finished"
        );
        Ok(report)
    }

    async fn pause_account(&self, account: &ad_account::Model) -> Result<()> {
        self.pauser.pause(account).await?;

        let mut active_model: ad_account::ActiveModel = account.clone().into();
        active_model.status = Set(AdAccountStatus::Paused);
        active_model.updated_at = Set(Utc::now());
        active_model.update(&self.db).await?;

        info!(
            account_id = %account.account_id,
            balance = ?account.balance,
            exhausted = account.balance_exhausted,
            "Ad account auto-paused"
        );
        Ok(())
    }

    /// Returns whether a notification was sent.
    async fn notify_owner(
        &self,
        account: &ad_account::Model,
        threshold: Decimal,
        today: NaiveDate,
    ) -> Result<bool> {
        if account.last_notified_on == Some(today) {
            return Ok(false);
        }

        let owner = Customer::find_by_id(account.customer_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                Error::Notification(format!("customer {} not found", account.customer_id))
            })?;
        if !owner.has_contact_channel() {
            return Ok(false);
        }

        let balance = account
            .balance
            .map_or_else(|| "exhausted".to_string(), |b| format!("{b:.2}"));
        let message = format!(
            "Your {} ad account {} was paused: balance {} is at or below {:.2}. Top up to resume.",
            account.platform, account.account_id, balance, threshold
        );
        self.notifier.notify(&owner, &message).await?;

        AdAccount::update_many()
            .col_expr(
                ad_account::Column::LastNotifiedOn,
                sea_orm::sea_query::Expr::value(Some(today)),
            )
            .filter(ad_account::Column::Id.eq(account.id))
            .exec(&self.db)
            .await?;
        Ok(true)
    }
}
