//! Database configuration module.
//!
//! Handles database connection and table creation using `SeaORM`. Tables are generated
//! from the entity definitions with `Schema::create_table_from_entity`, so the schema
//! always matches the Rust structs. Creation is idempotent and safe to run on every start.

use crate::entities::{
    AdAccount, CommissionRate, CommissionTransaction, Customer, CustomerAssignment,
    GoogleSpendInsight, MetaSpendInsight, ServicePackage, Setting, Subscription,
    SubscriptionTransaction, Wallet, WalletTransaction, commission_transaction,
    google_spend_insight, meta_spend_insight,
};
use crate::errors::Result;
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema, sea_query::Index,
};

/// Default database location when `DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/adspend_ledger.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns the default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to `url` and makes sure every table exists.
pub async fn connect_and_migrate(url: &str) -> Result<DatabaseConnection> {
    let db = Database::connect(url).await?;
    create_tables(&db).await?;
    Ok(db)
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all tables and indexes if they do not exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    create_table(db, &schema, Customer).await?;
    create_table(db, &schema, Wallet).await?;
    create_table(db, &schema, WalletTransaction).await?;
    create_table(db, &schema, ServicePackage).await?;
    create_table(db, &schema, Subscription).await?;
    create_table(db, &schema, SubscriptionTransaction).await?;
    create_table(db, &schema, MetaSpendInsight).await?;
    create_table(db, &schema, GoogleSpendInsight).await?;
    create_table(db, &schema, CommissionRate).await?;
    create_table(db, &schema, CustomerAssignment).await?;
    create_table(db, &schema, CommissionTransaction).await?;
    create_table(db, &schema, AdAccount).await?;
    create_table(db, &schema, Setting).await?;

    // One commission per employee, customer, type and period.
    let commission_key = Index::create()
        .name("idx_commission_transactions_period_key")
        .table(CommissionTransaction)
        .col(commission_transaction::Column::EmployeeId)
        .col(commission_transaction::Column::CustomerId)
        .col(commission_transaction::Column::CommissionType)
        .col(commission_transaction::Column::Period)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&commission_key)).await?;

    let meta_window = Index::create()
        .name("idx_meta_spend_insights_subscription_date")
        .table(MetaSpendInsight)
        .col(meta_spend_insight::Column::SubscriptionId)
        .col(meta_spend_insight::Column::Date)
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&meta_window)).await?;

    let google_window = Index::create()
        .name("idx_google_spend_insights_subscription_date")
        .table(GoogleSpendInsight)
        .col(google_spend_insight::Column::SubscriptionId)
        .col(google_spend_insight::Column::Date)
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&google_window)).await?;

    Ok(())
}
