//! Employee commissions on customer activity.
//!
//! Commissions are a parallel payout: they are computed from the same spend figures as
//! postpay billing but recorded in `commission_transactions`, never in a wallet.
//!
//! Rates are configured per `(employee, commission type)`, with `employee_id = NULL`
//! rows acting as the default. A rate row has either a flat percentage or a tier table
//! resolved with the same first-match rules as package fees.
//!
//! Each `(employee, customer, type, period)` has at most one row. Recalculating an unpaid
//! period overwrites it; a paid period is rejected.

use crate::{
    core::{fee_tier, spend::SpendAggregator, subscription::subscriptions_for_customer},
    entities::{
        CommissionRate, CommissionTransaction, CommissionType, CustomerAssignment,
        commission_rate, commission_transaction, customer_assignment,
    },
    errors::{Error, Result},
};
use chrono::{Datelike, Months, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use tracing::{debug, error, info, instrument, warn};

/// `YYYY-MM` key of the month containing `date`.
#[must_use]
pub fn period_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Key of the month before the one containing `date`.
#[must_use]
pub fn previous_period(date: NaiveDate) -> String {
    let first = date.with_day(1).unwrap_or(date);
    period_key(first.pred_opt().unwrap_or(first))
}

/// First and last day of a `YYYY-MM` period.
pub fn period_bounds(period: &str) -> Result<(NaiveDate, NaiveDate)> {
    let invalid = || Error::InvalidPeriod {
        period: period.to_string(),
    };

    let (year, month) = period.split_once('-').ok_or_else(invalid)?;
    if year.len() != 4 || month.len() != 2 {
        return Err(invalid());
    }
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;

    let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let end = start
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or_else(invalid)?;
    Ok((start, end))
}

/// Employees assigned to a customer, ascending and without repeats.
pub async fn assigned_employees<C>(db: &C, customer_id: i64) -> Result<Vec<i64>>
where
    C: ConnectionTrait,
{
    CustomerAssignment::find()
        .select_only()
        .column(customer_assignment::Column::EmployeeId)
        .distinct()
        .filter(customer_assignment::Column::CustomerId.eq(customer_id))
        .order_by_asc(customer_assignment::Column::EmployeeId)
        .into_tuple::<i64>()
        .all(db)
        .await
        .map_err(Into::into)
}

/// Rate configuration for an employee, falling back to the type default.
///
/// When several rows match at the same level the most recently added one wins.
pub async fn find_commission_rate<C>(
    db: &C,
    employee_id: i64,
    commission_type: CommissionType,
) -> Result<Option<commission_rate::Model>>
where
    C: ConnectionTrait,
{
    let specific = CommissionRate::find()
        .filter(commission_rate::Column::EmployeeId.eq(employee_id))
        .filter(commission_rate::Column::CommissionType.eq(commission_type))
        .order_by_desc(commission_rate::Column::Id)
        .one(db)
        .await?;
    if specific.is_some() {
        return Ok(specific);
    }

    CommissionRate::find()
        .filter(commission_rate::Column::EmployeeId.is_null())
        .filter(commission_rate::Column::CommissionType.eq(commission_type))
        .order_by_desc(commission_rate::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Percentage that applies to `base_amount` under `rate`.
///
/// A tier table takes precedence over the flat rate. Non-positive rates yield `None`.
pub fn resolve_commission_rate(
    rate: &commission_rate::Model,
    base_amount: Decimal,
) -> Result<Option<Decimal>> {
    match rate.tiers.as_ref().filter(|tiers| !tiers.is_null()) {
        Some(tiers) => fee_tier::resolve_from_json(base_amount, tiers),
        None => Ok(rate.rate.filter(|r| *r > Decimal::ZERO)),
    }
}

/// Commission for `base_amount` at `rate_percent`, rounded to cents.
#[must_use]
pub fn compute_commission(base_amount: Decimal, rate_percent: Decimal) -> Decimal {
    (base_amount * rate_percent / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Totals of a commission run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommissionRunReport {
    /// Period processed
    pub period: String,
    /// Commission rows written or updated
    pub recorded: usize,
    /// Customers with no spend or no applicable rate
    pub skipped: usize,
    /// Customers whose calculation failed
    pub errors: usize,
}

/// Computes and records commissions.
#[derive(Debug, Clone)]
pub struct CommissionCalculator {
    db: DatabaseConnection,
    aggregator: SpendAggregator,
}

impl CommissionCalculator {
    /// Creates a calculator.
    #[must_use]
    pub const fn new(db: DatabaseConnection, aggregator: SpendAggregator) -> Self {
        Self { db, aggregator }
    }

    /// Records the spending commission of every employee assigned to `customer_id`.
    pub async fn calculate_spending_commission(
        &self,
        customer_id: i64,
        period: &str,
        spend_amount: Decimal,
    ) -> Result<Vec<commission_transaction::Model>> {
        self.calculate_commission(customer_id, period, CommissionType::Spending, spend_amount, None)
            .await
    }

    /// Records a commission of `commission_type` for every employee assigned to
    /// `customer_id`.
    ///
    /// Employees with no applicable rate, or whose commission rounds to zero, get no row.
    /// All rows are written in one transaction.
    ///
    /// # Errors
    /// * `InvalidPeriod` if `period` is not `YYYY-MM`
    /// * `InvalidAmount` if `base_amount` is negative
    /// * `NoAssignedEmployee` if nobody is assigned to the customer
    /// * `CommissionAlreadyPaid` if any affected row has been paid out
    pub async fn calculate_commission(
        &self,
        customer_id: i64,
        period: &str,
        commission_type: CommissionType,
        base_amount: Decimal,
        reference_id: Option<String>,
    ) -> Result<Vec<commission_transaction::Model>> {
        period_bounds(period)?;
        if base_amount.is_sign_negative() {
            return Err(Error::InvalidAmount {
                amount: base_amount,
            });
        }

        let employees = assigned_employees(&self.db, customer_id).await?;
        if employees.is_empty() {
            return Err(Error::NoAssignedEmployee { customer_id });
        }

        let txn = self.db.begin().await?;
        let mut recorded = Vec::with_capacity(employees.len());

        for employee_id in employees {
            let Some(rate) = find_commission_rate(&txn, employee_id, commission_type).await? else {
                debug!(employee_id, commission_type = ?commission_type, "No commission rate configured");
                continue;
            };
            let Some(rate_percent) = resolve_commission_rate(&rate, base_amount)? else {
                debug!(employee_id, base_amount = %base_amount, "No commission tier matched");
                continue;
            };
            let amount = compute_commission(base_amount, rate_percent);
            if amount <= Decimal::ZERO {
                continue;
            }

            let existing = CommissionTransaction::find()
                .filter(commission_transaction::Column::EmployeeId.eq(employee_id))
                .filter(commission_transaction::Column::CustomerId.eq(customer_id))
                .filter(commission_transaction::Column::CommissionType.eq(commission_type))
                .filter(commission_transaction::Column::Period.eq(period))
                .one(&txn)
                .await?;

            let now = Utc::now();
            let row = match existing {
                Some(row) if row.is_paid => {
                    txn.rollback().await?;
                    return Err(Error::CommissionAlreadyPaid {
                        commission_id: row.id,
                        period: period.to_string(),
                    });
                }
                Some(row) => {
                    let mut active_model: commission_transaction::ActiveModel = row.into();
                    active_model.base_amount = Set(base_amount);
                    active_model.commission_rate = Set(rate_percent);
                    active_model.commission_amount = Set(amount);
                    active_model.reference_id = Set(reference_id.clone());
                    active_model.updated_at = Set(now);
                    active_model.update(&txn).await?
                }
                None => {
                    commission_transaction::ActiveModel {
                        employee_id: Set(employee_id),
                        customer_id: Set(customer_id),
                        commission_type: Set(commission_type),
                        reference_id: Set(reference_id.clone()),
                        base_amount: Set(base_amount),
                        commission_rate: Set(rate_percent),
                        commission_amount: Set(amount),
                        period: Set(period.to_string()),
                        is_paid: Set(false),
                        created_at: Set(now),
                        updated_at: Set(now),
                        ..Default::default()
                    }
                    .insert(&txn)
                    .await?
                }
            };

            info!(
                employee_id,
                customer_id,
                period,
                commission_type = ?commission_type,
                base_amount = %base_amount,
                rate = %rate_percent,
                amount = %amount,
                "Commission recorded"
            );
            recorded.push(row);
        }

        txn.commit().await?;
        Ok(recorded)
    }

    /// Records spending commissions for every assigned customer over `period`.
    ///
    /// A customer's spend is the sum over all of their subscriptions for the calendar
    /// month. Failures are counted per customer and do not stop the run.
    #[instrument(skip(self))]
    pub async fn run_spending_commissions(&self, period: &str) -> Result<CommissionRunReport> {
        let (start, end) = period_bounds(period)?;

        let customer_ids: Vec<i64> = CustomerAssignment::find()
            .select_only()
            .column(customer_assignment::Column::CustomerId)
            .distinct()
            .order_by_asc(customer_assignment::Column::CustomerId)
            .into_tuple()
            .all(&self.db)
            .await?;

        let mut report = CommissionRunReport {
            period: period.to_string(),
            ..Default::default()
        };

        for customer_id in customer_ids {
            match self.customer_spending_commission(customer_id, period, start, end).await {
                Ok(0) => report.skipped += 1,
                Ok(rows) => report.recorded += rows,
                Err(e) => {
                    error!(customer_id, period, error = %e, "Spending commission failed");
                    report.errors += 1;
                }
            }
        }

        info!(
            period,
            recorded = report.recorded,
            skipped = report.skipped,
            errors = report.errors,
            "Spending commission run finished"
        );
        Ok(report)
    }

    async fn customer_spending_commission(
        &self,
        customer_id: i64,
        period: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<usize> {
        let subscription_ids: Vec<i64> = subscriptions_for_customer(&self.db, customer_id)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();

        let spend = self
            .aggregator
            .total_spend_for_subscriptions(&subscription_ids, start, end)
            .await?;
        if spend <= Decimal::ZERO {
            return Ok(0);
        }

        let rows = self
            .calculate_spending_commission(customer_id, period, spend)
            .await?;
        if rows.is_empty() {
            warn!(customer_id, period, spend = %spend, "Spend recorded but no commission rate applied");
        }
        Ok(rows.len())
    }
}
