//! The per-student monthly fee ledger.
//!
//! Students have at most one [FeePayment] per month and year. Reads always
//! present a full twelve-month [FeeStatement], filling unrecorded months with
//! virtual `Pending` entries that are never written back.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::error::{SchoolError, SchoolResult};
use crate::models::fees::ClassFee;
use crate::util::current_time;

pub const MONTHS: std::ops::RangeInclusive<i32> = 1..=12;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "fee_status")]
pub enum FeeStatus {
    Paid,
    Unpaid,
    Pending,
}

impl FeeStatus {
    /// Leaving a settled status needs an audit note.
    fn is_settled(&self) -> bool {
        matches!(self, FeeStatus::Paid | FeeStatus::Unpaid)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FeePayment {
    pub id: i64,
    #[serde(skip)]
    pub student_id: i64,
    /// 1 through 12
    pub month: i32,
    pub year: i32,
    pub status: FeeStatus,
    /// The amount charged for the month, if it differs from the class fee
    pub amount: Option<i64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub paid_at: Option<OffsetDateTime>,
    /// The audit note left when a settled status was changed
    pub reason: Option<String>,
}

/// A requested change to one month of a student's ledger.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeStatusUpdate {
    pub month: i32,
    pub year: i32,
    pub status: FeeStatus,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub paid_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// The stored fields of one ledger month, before it has an id.
#[derive(Clone, Debug, PartialEq)]
pub struct LedgerEntry {
    pub month: i32,
    pub year: i32,
    pub status: FeeStatus,
    pub amount: Option<i64>,
    pub paid_at: Option<OffsetDateTime>,
    pub reason: Option<String>,
}

impl FeeStatusUpdate {
    /// Works out what the month should look like after this update.
    ///
    /// Moving away from `Paid` or `Unpaid` requires a non-empty reason; moving
    /// away from `Pending` (or creating the month) does not. `Paid` without a
    /// payment time is stamped with `now`, anything else clears the payment
    /// time, and `Pending` clears the reason.
    pub fn apply(
        &self,
        existing: Option<&FeePayment>,
        now: OffsetDateTime,
    ) -> SchoolResult<LedgerEntry> {
        if !MONTHS.contains(&self.month) {
            return Err(SchoolError::BadRequest(format!(
                "month must be between 1 and 12, got {}",
                self.month
            )));
        }
        if self.year < 1 {
            return Err(SchoolError::BadRequest(format!("invalid year {}", self.year)));
        }
        if matches!(self.amount, Some(amount) if amount < 0) {
            return Err(SchoolError::BadRequest(
                "amount must not be negative".to_owned(),
            ));
        }

        let reason = self
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
            .map(str::to_owned);

        if let Some(existing) = existing {
            if existing.status.is_settled() && existing.status != self.status && reason.is_none() {
                return Err(SchoolError::BadRequest(format!(
                    "A reason is required to change a {:?} fee to {:?}",
                    existing.status, self.status
                )));
            }
        }

        let paid_at = match self.status {
            FeeStatus::Paid => Some(self.paid_at.unwrap_or(now)),
            FeeStatus::Unpaid | FeeStatus::Pending => None,
        };
        let reason = match self.status {
            FeeStatus::Pending => None,
            FeeStatus::Paid | FeeStatus::Unpaid => {
                reason.or_else(|| existing.and_then(|existing| existing.reason.clone()))
            }
        };

        Ok(LedgerEntry {
            month: self.month,
            year: self.year,
            status: self.status,
            amount: self
                .amount
                .or_else(|| existing.and_then(|existing| existing.amount)),
            paid_at,
            reason,
        })
    }
}

/// The amount to show for a month: the month's own amount, else the class fee.
pub fn effective_fee_amount(recorded: Option<i64>, class_fee: Option<&ClassFee>) -> Option<i64> {
    recorded.or_else(|| class_fee.map(|fee| fee.amount))
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyFee {
    pub month: i32,
    pub year: i32,
    pub status: FeeStatus,
    pub amount: Option<i64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub paid_at: Option<OffsetDateTime>,
    pub reason: Option<String>,
    /// False for months synthesized because nothing was recorded
    pub recorded: bool,
}

impl MonthlyFee {
    fn virtual_pending(month: i32, year: i32) -> Self {
        Self {
            month,
            year,
            status: FeeStatus::Pending,
            amount: None,
            paid_at: None,
            reason: None,
            recorded: false,
        }
    }
}

impl From<&FeePayment> for MonthlyFee {
    fn from(payment: &FeePayment) -> Self {
        Self {
            month: payment.month,
            year: payment.year,
            status: payment.status,
            amount: payment.amount,
            paid_at: payment.paid_at,
            reason: payment.reason.clone(),
            recorded: true,
        }
    }
}

/// Exactly twelve entries, January first, for the given year.
pub fn monthly_fee_status(payments: &[FeePayment], year: i32) -> Vec<MonthlyFee> {
    MONTHS
        .map(|month| {
            payments
                .iter()
                .find(|payment| payment.year == year && payment.month == month)
                .map(MonthlyFee::from)
                .unwrap_or_else(|| MonthlyFee::virtual_pending(month, year))
        })
        .collect()
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeStatement {
    pub student_id: i64,
    pub year: i32,
    pub class_fee: Option<ClassFee>,
    pub months: Vec<MonthlyFee>,
}

impl FeeStatement {
    /// The twelve-month view with every amount resolved against the class fee.
    pub fn build(
        student_id: i64,
        payments: &[FeePayment],
        year: i32,
        class_fee: Option<ClassFee>,
    ) -> Self {
        let months = monthly_fee_status(payments, year)
            .into_iter()
            .map(|month| MonthlyFee {
                amount: effective_fee_amount(month.amount, class_fee.as_ref()),
                ..month
            })
            .collect();

        Self {
            student_id,
            year,
            class_fee,
            months,
        }
    }

    pub async fn for_student(
        student_id: i64,
        class_name: &str,
        year: i32,
        pool: &PgPool,
    ) -> SchoolResult<Self> {
        let payments = FeePayment::for_student_in_year(student_id, year, pool).await?;
        let class_fee = ClassFee::latest_for_class(class_name, pool).await?;

        Ok(Self::build(student_id, &payments, year, class_fee))
    }
}

const COLUMNS: &str = "id, student_id, month, year, status, amount, paid_at, reason";

impl FeePayment {
    pub async fn for_student(student_id: i64, pool: &PgPool) -> SchoolResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {} FROM fee_payment WHERE student_id = $1 ORDER BY year, month",
            COLUMNS
        ))
        .bind(student_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn for_student_in_year(
        student_id: i64,
        year: i32,
        pool: &PgPool,
    ) -> SchoolResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {} FROM fee_payment WHERE student_id = $1 AND year = $2 ORDER BY month",
            COLUMNS
        ))
        .bind(student_id)
        .bind(year)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// The only way the ledger changes after a month is created.
    pub async fn set_status(
        student_id: i64,
        update: &FeeStatusUpdate,
        pool: &PgPool,
    ) -> SchoolResult<Self> {
        let mut transaction = pool.begin().await?;

        let existing = sqlx::query_as::<_, Self>(&format!(
            "SELECT {} FROM fee_payment
             WHERE student_id = $1 AND month = $2 AND year = $3 FOR UPDATE",
            COLUMNS
        ))
        .bind(student_id)
        .bind(update.month)
        .bind(update.year)
        .fetch_optional(&mut transaction)
        .await?;

        let entry = update.apply(existing.as_ref(), current_time())?;

        let payment = sqlx::query_as::<_, Self>(&format!(
            "INSERT INTO fee_payment (student_id, month, year, status, amount, paid_at, reason)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (student_id, month, year) DO UPDATE SET
                 status = EXCLUDED.status, amount = EXCLUDED.amount,
                 paid_at = EXCLUDED.paid_at, reason = EXCLUDED.reason
             RETURNING {}",
            COLUMNS
        ))
        .bind(student_id)
        .bind(entry.month)
        .bind(entry.year)
        .bind(entry.status)
        .bind(entry.amount)
        .bind(entry.paid_at)
        .bind(&entry.reason)
        .fetch_one(&mut transaction)
        .await?;

        transaction.commit().await?;

        Ok(payment)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    const NOW: OffsetDateTime = datetime!(2025-03-14 10:00 UTC);

    fn update(status: FeeStatus, reason: Option<&str>) -> FeeStatusUpdate {
        FeeStatusUpdate {
            month: 3,
            year: 2025,
            status,
            amount: None,
            paid_at: None,
            reason: reason.map(str::to_owned),
        }
    }

    fn recorded(status: FeeStatus) -> FeePayment {
        FeePayment {
            id: 1,
            student_id: 10,
            month: 3,
            year: 2025,
            status,
            amount: Some(1500),
            paid_at: (status == FeeStatus::Paid).then(|| datetime!(2025-03-01 09:00 UTC)),
            reason: Some("earlier note".to_owned()),
        }
    }

    fn class_fee(amount: i64) -> ClassFee {
        ClassFee {
            id: 1,
            title: "Monthly tuition".to_owned(),
            amount,
            class_name: "10A".to_owned(),
            created_at: NOW,
        }
    }

    #[test]
    fn new_paid_month_is_stamped_without_a_reason() {
        let entry = update(FeeStatus::Paid, None).apply(None, NOW).unwrap();

        assert_eq!(entry.status, FeeStatus::Paid);
        assert_eq!(entry.paid_at, Some(NOW));
        assert_eq!(entry.reason, None);
    }

    #[test]
    fn explicit_payment_time_is_kept() {
        let paid_at = datetime!(2025-03-02 12:30 UTC);
        let mut paid = update(FeeStatus::Paid, None);
        paid.paid_at = Some(paid_at);

        assert_eq!(paid.apply(None, NOW).unwrap().paid_at, Some(paid_at));
    }

    #[test]
    fn leaving_a_settled_status_needs_a_reason() {
        for from in [FeeStatus::Paid, FeeStatus::Unpaid] {
            let existing = recorded(from);
            for to in [FeeStatus::Paid, FeeStatus::Unpaid, FeeStatus::Pending] {
                if to == from {
                    continue;
                }

                assert!(matches!(
                    update(to, None).apply(Some(&existing), NOW),
                    Err(SchoolError::BadRequest(_))
                ));
                assert!(update(to, Some("  ")).apply(Some(&existing), NOW).is_err());
                assert!(update(to, Some("refund")).apply(Some(&existing), NOW).is_ok());
            }
        }
    }

    #[test]
    fn leaving_pending_needs_no_reason() {
        let existing = recorded(FeeStatus::Pending);

        assert!(update(FeeStatus::Paid, None).apply(Some(&existing), NOW).is_ok());
        assert!(update(FeeStatus::Unpaid, None).apply(Some(&existing), NOW).is_ok());
    }

    #[test]
    fn keeping_the_same_status_needs_no_reason() {
        let existing = recorded(FeeStatus::Unpaid);
        let mut same = update(FeeStatus::Unpaid, None);
        same.amount = Some(2000);

        let entry = same.apply(Some(&existing), NOW).unwrap();
        assert_eq!(entry.amount, Some(2000));
        assert_eq!(entry.reason.as_deref(), Some("earlier note"));
    }

    #[test]
    fn paid_to_unpaid_stores_the_reason_and_clears_payment_time() {
        let existing = recorded(FeeStatus::Paid);
        let entry = update(FeeStatus::Unpaid, Some(" cheque bounced "))
            .apply(Some(&existing), NOW)
            .unwrap();

        assert_eq!(entry.paid_at, None);
        assert_eq!(entry.reason.as_deref(), Some("cheque bounced"));
        assert_eq!(entry.amount, Some(1500));
    }

    #[test]
    fn pending_clears_the_reason() {
        let existing = recorded(FeeStatus::Paid);
        let entry = update(FeeStatus::Pending, Some("clerical fix"))
            .apply(Some(&existing), NOW)
            .unwrap();

        assert_eq!(entry.reason, None);
        assert_eq!(entry.paid_at, None);
    }

    #[test]
    fn months_outside_the_year_are_rejected() {
        for month in [0, 13, -1] {
            let mut bad = update(FeeStatus::Paid, None);
            bad.month = month;
            assert!(bad.apply(None, NOW).is_err());
        }
    }

    #[test]
    fn monthly_view_always_has_twelve_entries() {
        assert_eq!(monthly_fee_status(&[], 2025).len(), 12);

        let mut other_year = recorded(FeeStatus::Paid);
        other_year.year = 2024;
        let view = monthly_fee_status(&[recorded(FeeStatus::Paid), other_year], 2025);

        assert_eq!(view.len(), 12);
        assert_eq!(
            view.iter().map(|month| month.month).collect::<Vec<_>>(),
            (1..=12).collect::<Vec<_>>()
        );
        assert!(view[2].recorded);
        assert_eq!(view[2].status, FeeStatus::Paid);
        assert_eq!(view.iter().filter(|month| month.recorded).count(), 1);
        assert!(view
            .iter()
            .filter(|month| !month.recorded)
            .all(|month| month.status == FeeStatus::Pending && month.amount.is_none()));
    }

    #[test]
    fn class_fee_fills_missing_amounts() {
        let fee = class_fee(1200);

        assert_eq!(effective_fee_amount(Some(1500), Some(&fee)), Some(1500));
        assert_eq!(effective_fee_amount(None, Some(&fee)), Some(1200));
        assert_eq!(effective_fee_amount(None, None), None);

        let statement = FeeStatement::build(10, &[recorded(FeeStatus::Paid)], 2025, Some(fee));
        assert_eq!(statement.months[2].amount, Some(1500));
        assert_eq!(statement.months[0].amount, Some(1200));
        assert!(!statement.months[0].recorded);
    }

    #[test]
    fn status_updates_parse_from_json() {
        let update: FeeStatusUpdate = serde_json::from_str(
            r#"{"month": 3, "year": 2025, "status": "Unpaid", "reason": "refund"}"#,
        )
        .unwrap();

        assert_eq!(update.status, FeeStatus::Unpaid);
        assert_eq!(update.paid_at, None);
        assert_eq!(update.reason.as_deref(), Some("refund"));
    }
}
