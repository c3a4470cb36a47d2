//! Shared test utilities for the billing crate.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{subscription, wallet},
    entities::{
        self, AdAccountStatus, AdPlatform, CommissionType, PaymentMode,
        wallet_transaction::TYPE_TOP_UP,
    },
    errors::Result,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a test customer.
///
/// # Defaults
/// * `email`: `<name>@example.com` (lowercased, spaces removed)
/// * `telegram_chat_id`: None
pub async fn create_test_customer(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::customer::Model> {
    let email = format!("{}@example.com", name.to_lowercase().replace(' ', ""));
    let customer = entities::customer::ActiveModel {
        name: Set(name.to_string()),
        email: Set(Some(email)),
        telegram_chat_id: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(customer)
}

/// Creates a customer and a wallet funded through the ledger, so a `top_up` entry
/// backs the balance. A zero `balance` leaves the wallet empty.
pub async fn create_funded_wallet(
    db: &DatabaseConnection,
    name: &str,
    balance: Decimal,
) -> Result<(entities::customer::Model, entities::wallet::Model)> {
    let customer = create_test_customer(db, name).await?;
    let created = wallet::get_or_create_wallet(db, customer.id).await?;
    if balance > Decimal::ZERO {
        wallet::credit(
            db,
            created.id,
            balance,
            TYPE_TOP_UP,
            None,
            "Initial top up".to_string(),
        )
        .await?;
    }
    let funded = wallet::get_wallet(db, created.id).await?.unwrap_or(created);
    Ok((customer, funded))
}

/// Creates a service package with the given fee-tier table.
pub async fn create_test_package(
    db: &DatabaseConnection,
    fee_structure: Option<serde_json::Value>,
) -> Result<entities::service_package::Model> {
    subscription::create_service_package(db, "Test Package".to_string(), fee_structure).await
}

/// Creates an active postpay subscription.
///
/// # Defaults
/// * `payment_mode`: postpay
/// * `budget`: 1000
pub async fn create_test_subscription(
    db: &DatabaseConnection,
    customer_id: i64,
    package_id: i64,
    created_at: DateTime<Utc>,
) -> Result<entities::subscription::Model> {
    subscription::create_subscription(
        db,
        customer_id,
        package_id,
        PaymentMode::Postpay,
        Decimal::from(1000),
        created_at,
    )
    .await
}

/// Inserts a Meta daily spend row.
pub async fn insert_meta_insight(
    db: &DatabaseConnection,
    subscription_id: i64,
    account_id: &str,
    date: NaiveDate,
    spend: Decimal,
) -> Result<entities::meta_spend_insight::Model> {
    let row = entities::meta_spend_insight::ActiveModel {
        subscription_id: Set(subscription_id),
        account_id: Set(account_id.to_string()),
        date: Set(date),
        spend: Set(spend),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(row)
}

/// Inserts a Google daily spend row.
pub async fn insert_google_insight(
    db: &DatabaseConnection,
    subscription_id: i64,
    account_id: &str,
    date: NaiveDate,
    spend: Decimal,
) -> Result<entities::google_spend_insight::Model> {
    let row = entities::google_spend_insight::ActiveModel {
        subscription_id: Set(subscription_id),
        account_id: Set(account_id.to_string()),
        date: Set(date),
        spend: Set(spend),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(row)
}

/// Assigns an employee to a customer.
pub async fn assign_employee(
    db: &DatabaseConnection,
    employee_id: i64,
    customer_id: i64,
) -> Result<entities::customer_assignment::Model> {
    let row = entities::customer_assignment::ActiveModel {
        employee_id: Set(employee_id),
        customer_id: Set(customer_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(row)
}

/// Configures a commission rate. `employee_id = None` sets the default for the type.
pub async fn create_commission_rate(
    db: &DatabaseConnection,
    employee_id: Option<i64>,
    commission_type: CommissionType,
    rate: Option<Decimal>,
    tiers: Option<serde_json::Value>,
) -> Result<entities::commission_rate::Model> {
    let row = entities::commission_rate::ActiveModel {
        employee_id: Set(employee_id),
        commission_type: Set(commission_type),
        rate: Set(rate),
        tiers: Set(tiers),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(row)
}

/// Writes a raw unpaid spending commission row, bypassing the calculator.
pub async fn insert_commission_row(
    db: &DatabaseConnection,
    employee_id: i64,
    customer_id: i64,
    period: &str,
) -> Result<entities::commission_transaction::Model> {
    let now = Utc::now();
    let row = entities::commission_transaction::ActiveModel {
        employee_id: Set(employee_id),
        customer_id: Set(customer_id),
        commission_type: Set(CommissionType::Spending),
        reference_id: Set(None),
        base_amount: Set(Decimal::from(1000)),
        commission_rate: Set(Decimal::from(2)),
        commission_amount: Set(Decimal::from(20)),
        period: Set(period.to_string()),
        is_paid: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(row)
}

/// Creates an active ad account.
///
/// # Defaults
/// * `balance_exhausted`: false
/// * `last_notified_on`: None
pub async fn create_test_ad_account(
    db: &DatabaseConnection,
    customer_id: i64,
    platform: AdPlatform,
    account_id: &str,
    balance: Option<Decimal>,
) -> Result<entities::ad_account::Model> {
    let row = entities::ad_account::ActiveModel {
        customer_id: Set(customer_id),
        platform: Set(platform),
        account_id: Set(account_id.to_string()),
        balance: Set(balance),
        balance_exhausted: Set(false),
        status: Set(AdAccountStatus::Active),
        last_notified_on: Set(None),
        updated_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(row)
}
