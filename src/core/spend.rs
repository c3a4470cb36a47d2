//! Spend aggregation across ad platforms.
//!
//! Each platform persists daily spend rows in its own table. An [`InsightSource`] answers
//! "how much did this subscription spend between two days" for one platform, and the
//! [`SpendAggregator`] adds the sources together. Missing rows count as zero.

use crate::{
    entities::{GoogleSpendInsight, MetaSpendInsight, google_spend_insight, meta_spend_insight},
    errors::Result,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, QuerySelect, prelude::*};
use std::sync::Arc;

/// Decimal places kept from a database `SUM`. SQLite adds `REAL` values, so the raw
/// aggregate can carry float noise far below this scale.
const SUM_SCALE: u32 = 6;

fn settle_sum(total: Option<Decimal>) -> Decimal {
    total.map_or(Decimal::ZERO, |sum| sum.round_dp(SUM_SCALE).normalize())
}

/// Read-only spend query surface for one ad platform.
#[async_trait]
pub trait InsightSource: Send + Sync {
    /// Short platform name used in logs and breakdowns.
    fn name(&self) -> &'static str;

    /// Sums spend for `subscription_id` over `[from, to]`, both days inclusive.
    async fn sum_spend(&self, subscription_id: i64, from: NaiveDate, to: NaiveDate)
    -> Result<Decimal>;
}

/// Meta (Facebook) insight rows.
#[derive(Debug, Clone)]
pub struct MetaInsights {
    db: DatabaseConnection,
}

impl MetaInsights {
    /// Creates a source reading `meta_spend_insights`.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl InsightSource for MetaInsights {
    fn name(&self) -> &'static str {
        "meta"
    }

    async fn sum_spend(
        &self,
        subscription_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Decimal> {
        let total = MetaSpendInsight::find()
            .select_only()
            .column_as(meta_spend_insight::Column::Spend.sum(), "total")
            .filter(meta_spend_insight::Column::SubscriptionId.eq(subscription_id))
            .filter(meta_spend_insight::Column::Date.between(from, to))
            .into_tuple::<Option<Decimal>>()
            .one(&self.db)
            .await?;
        Ok(settle_sum(total.flatten()))
    }
}

/// Google Ads insight rows.
#[derive(Debug, Clone)]
pub struct GoogleInsights {
    db: DatabaseConnection,
}

impl GoogleInsights {
    /// Creates a source reading `google_spend_insights`.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl InsightSource for GoogleInsights {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn sum_spend(
        &self,
        subscription_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Decimal> {
        let total = GoogleSpendInsight::find()
            .select_only()
            .column_as(google_spend_insight::Column::Spend.sum(), "total")
            .filter(google_spend_insight::Column::SubscriptionId.eq(subscription_id))
            .filter(google_spend_insight::Column::Date.between(from, to))
            .into_tuple::<Option<Decimal>>()
            .one(&self.db)
            .await?;
        Ok(settle_sum(total.flatten()))
    }
}

/// Sums spend over every configured platform. Amounts are added as-is; all platforms
/// report in the same currency unit.
#[derive(Clone)]
pub struct SpendAggregator {
    sources: Vec<Arc<dyn InsightSource>>,
}

impl std::fmt::Debug for SpendAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.sources.iter().map(|s| s.name()).collect();
        f.debug_struct("SpendAggregator")
            .field("sources", &names)
            .finish()
    }
}

impl SpendAggregator {
    /// Creates an aggregator over arbitrary sources.
    #[must_use]
    pub fn new(sources: Vec<Arc<dyn InsightSource>>) -> Self {
        Self { sources }
    }

    /// Creates the standard Meta + Google aggregator on one database.
    #[must_use]
    pub fn from_database(db: &DatabaseConnection) -> Self {
        Self::new(vec![
            Arc::new(MetaInsights::new(db.clone())),
            Arc::new(GoogleInsights::new(db.clone())),
        ])
    }

    /// Total spend for a subscription over `[from, to]` inclusive.
    ///
    /// An inverted window (`from > to`) is empty and sums to zero.
    pub async fn total_spend(
        &self,
        subscription_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Decimal> {
        let mut total = Decimal::ZERO;
        for (_, spend) in self.spend_breakdown(subscription_id, from, to).await? {
            total += spend;
        }
        Ok(total)
    }

    /// Per-platform spend for a subscription over `[from, to]` inclusive.
    pub async fn spend_breakdown(
        &self,
        subscription_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<(&'static str, Decimal)>> {
        let mut breakdown = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let spend = if from > to {
                Decimal::ZERO
            } else {
                source.sum_spend(subscription_id, from, to).await?
            };
            breakdown.push((source.name(), spend));
        }
        Ok(breakdown)
    }

    /// Total spend across several subscriptions over `[from, to]` inclusive.
    pub async fn total_spend_for_subscriptions(
        &self,
        subscription_ids: &[i64],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Decimal> {
        let mut total = Decimal::ZERO;
        for id in subscription_ids {
            total += self.total_spend(*id, from, to).await?;
        }
        Ok(total)
    }
}
