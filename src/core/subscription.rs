//! Subscription and service package registry.
//!
//! Billing reads fee-tier tables and payment modes through here; its only write is the
//! billing cursor.

use crate::{
    entities::{
        PaymentMode, ServicePackage, Subscription, SubscriptionStatus, service_package,
        subscription,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*, sea_query::Expr};
use tracing::{debug, info};

/// Creates a service package with an optional fee-tier table.
pub async fn create_service_package(
    db: &DatabaseConnection,
    name: String,
    fee_structure: Option<serde_json::Value>,
) -> Result<service_package::Model> {
    let package = service_package::ActiveModel {
        name: Set(name),
        monthly_spending_fee_structure: Set(fee_structure),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(package_id = package.id, name = %package.name, "Created service package");
    Ok(package)
}

/// Gets a service package by id.
pub async fn get_package<C>(db: &C, package_id: i64) -> Result<Option<service_package::Model>>
where
    C: ConnectionTrait,
{
    ServicePackage::find_by_id(package_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates an active subscription.
///
/// `created_at` is explicit because it is the start of the first postpay window.
pub async fn create_subscription(
    db: &DatabaseConnection,
    customer_id: i64,
    package_id: i64,
    payment_mode: PaymentMode,
    budget: Decimal,
    created_at: DateTime<Utc>,
) -> Result<subscription::Model> {
    if get_package(db, package_id).await?.is_none() {
        return Err(Error::PackageNotFound { package_id });
    }

    let created = subscription::ActiveModel {
        customer_id: Set(customer_id),
        service_package_id: Set(package_id),
        payment_mode: Set(payment_mode),
        status: Set(SubscriptionStatus::Active),
        budget: Set(budget),
        last_postpay_billed_at: Set(None),
        created_at: Set(created_at),
        updated_at: Set(created_at),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        subscription_id = created.id,
        customer_id,
        package_id,
        payment_mode = ?payment_mode,
        "Created subscription"
    );
    Ok(created)
}

/// Gets a subscription by id.
pub async fn get_subscription<C>(db: &C, subscription_id: i64) -> Result<Option<subscription::Model>>
where
    C: ConnectionTrait,
{
    Subscription::find_by_id(subscription_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Ids of every active postpay subscription, ascending.
///
/// This is the snapshot a billing run iterates; rows written during the run do not
/// change it.
pub async fn postpay_subscription_ids<C>(db: &C) -> Result<Vec<i64>>
where
    C: ConnectionTrait,
{
    Subscription::find()
        .select_only()
        .column(subscription::Column::Id)
        .filter(subscription::Column::PaymentMode.eq(PaymentMode::Postpay))
        .filter(subscription::Column::Status.eq(SubscriptionStatus::Active))
        .order_by_asc(subscription::Column::Id)
        .into_tuple::<i64>()
        .all(db)
        .await
        .map_err(Into::into)
}

/// All subscriptions of a customer, any mode or status.
pub async fn subscriptions_for_customer<C>(
    db: &C,
    customer_id: i64,
) -> Result<Vec<subscription::Model>>
where
    C: ConnectionTrait,
{
    Subscription::find()
        .filter(subscription::Column::CustomerId.eq(customer_id))
        .order_by_asc(subscription::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Moves the billing cursor of a subscription to `at`.
pub async fn advance_billing_cursor<C>(conn: &C, subscription_id: i64, at: DateTime<Utc>) -> Result<()>
where
    C: ConnectionTrait,
{
    let updated = Subscription::update_many()
        .col_expr(subscription::Column::LastPostpayBilledAt, Expr::value(Some(at)))
        .col_expr(subscription::Column::UpdatedAt, Expr::value(at))
        .filter(subscription::Column::Id.eq(subscription_id))
        .exec(conn)
        .await?;

    if updated.rows_affected == 0 {
        return Err(Error::SubscriptionNotFound { subscription_id });
    }

    debug!(subscription_id, cursor = %at, "Billing cursor advanced");
    Ok(())
}
