#![allow(clippy::result_large_err)]

use adspend_ledger::{
    config::{
        app::load_default_config,
        database::{connect_and_migrate, get_database_url},
    },
    core::{
        auto_pause::{AutoPauseController, DryRunPauser, TracingNotifier},
        billing::{PostpayBillingCycle, format_billing_summary},
        commission::{CommissionCalculator, previous_period},
        reconcile::find_unbalanced_wallets,
        spend::SpendAggregator,
    },
    errors::Result,
};
use chrono::Utc;
use dotenvy::dotenv;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the static configuration
    let app_config = load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Initialize database
    let db = connect_and_migrate(&get_database_url())
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    let aggregator = SpendAggregator::from_database(&db);
    let billing = PostpayBillingCycle::new(db.clone(), aggregator.clone())
        .with_window_days(app_config.billing.window_days);
    let commissions = CommissionCalculator::new(db.clone(), aggregator);
    let auto_pause = AutoPauseController::new(
        db.clone(),
        Arc::new(DryRunPauser),
        Arc::new(TracingNotifier),
    );

    let scheduler = JobScheduler::new().await?;

    // Postpay billing, followed by a ledger consistency check
    let billing_db = db.clone();
    scheduler
        .add(Job::new_async(app_config.billing.schedule.as_str(), move |_uuid, _l| {
            let billing = billing.clone();
            let db = billing_db.clone();
            Box::pin(async move {
                match billing.run().await {
                    Ok(report) => info!("{}", format_billing_summary(&report)),
                    Err(e) => error!(error = %e, "Postpay billing run failed"),
                }
                match find_unbalanced_wallets(&db).await {
                    Ok(unbalanced) if unbalanced.is_empty() => {}
                    Ok(unbalanced) => warn!(count = unbalanced.len(), "Unbalanced wallets found"),
                    Err(e) => error!(error = %e, "Wallet reconciliation failed"),
                }
            })
        })?)
        .await?;
    info!(schedule = %app_config.billing.schedule, "Scheduled: postpay billing");

    // Auto-pause, one pass per configured platform
    let pause_config = app_config.auto_pause.clone();
    scheduler
        .add(Job::new_async(app_config.auto_pause.schedule.as_str(), move |_uuid, _l| {
            let auto_pause = auto_pause.clone();
            let pause_config = pause_config.clone();
            Box::pin(async move {
                for platform in pause_config.platforms {
                    if let Err(e) = auto_pause.run(platform, pause_config.default_threshold).await {
                        error!(platform = %platform, error = %e, "Auto-pause run failed");
                    }
                }
            })
        })?)
        .await?;
    info!(schedule = %app_config.auto_pause.schedule, "Scheduled: auto-pause");

    // Spending commissions for the month that just ended
    scheduler
        .add(Job::new_async(app_config.commission.schedule.as_str(), move |_uuid, _l| {
            let commissions = commissions.clone();
            Box::pin(async move {
                let period = previous_period(Utc::now().date_naive());
                if let Err(e) = commissions.run_spending_commissions(&period).await {
                    error!(period = %period, error = %e, "Spending commission run failed");
                }
            })
        })?)
        .await?;
    info!(schedule = %app_config.commission.schedule, "Scheduled: spending commissions");

    let mut scheduler = scheduler;
    scheduler.start().await?;
    info!("Billing worker started");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    scheduler.shutdown().await?;

    Ok(())
}
