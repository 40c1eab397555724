use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::error::{SchoolError, SchoolResult};
use crate::util::{optional, required};

/// A fee charged to every student of a class.
///
/// The most recently created fee for a class is that class's default monthly
/// amount, see [effective_fee_amount](crate::models::ledger::effective_fee_amount).
#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ClassFee {
    pub id: i64,
    /// A short name for the fee, like "Monthly tuition"
    pub title: String,
    pub amount: i64,
    pub class_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassFeeForm {
    pub title: Option<String>,
    pub amount: Option<i64>,
    pub class_name: Option<String>,
}

impl ClassFeeForm {
    fn validate_amount(&self) -> SchoolResult<()> {
        match self.amount {
            Some(amount) if amount < 0 => Err(SchoolError::BadRequest(
                "amount must not be negative".to_owned(),
            )),
            _ => Ok(()),
        }
    }
}

const COLUMNS: &str = "id, title, amount, class_name, created_at";

impl ClassFee {
    pub async fn all(class_name: Option<&str>, pool: &PgPool) -> SchoolResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {} FROM class_fee
             WHERE ($1::text IS NULL OR class_name = $1)
             ORDER BY class_name, created_at DESC",
            COLUMNS
        ))
        .bind(class_name)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn latest_for_class(class_name: &str, pool: &PgPool) -> SchoolResult<Option<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {} FROM class_fee WHERE class_name = $1
             ORDER BY created_at DESC, id DESC LIMIT 1",
            COLUMNS
        ))
        .bind(class_name)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn create(form: ClassFeeForm, pool: &PgPool) -> SchoolResult<Self> {
        form.validate_amount()?;
        let title = required("title", form.title.as_deref())?;
        let class_name = required("className", form.class_name.as_deref())?;
        let amount = form
            .amount
            .ok_or_else(|| SchoolError::BadRequest("amount is required".to_owned()))?;

        sqlx::query_as::<_, Self>(&format!(
            "INSERT INTO class_fee (title, amount, class_name) VALUES ($1, $2, $3) RETURNING {}",
            COLUMNS
        ))
        .bind(title)
        .bind(amount)
        .bind(class_name)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn update(id: i64, form: ClassFeeForm, pool: &PgPool) -> SchoolResult<Self> {
        form.validate_amount()?;

        sqlx::query_as::<_, Self>(&format!(
            "UPDATE class_fee SET
                 title = COALESCE($2, title),
                 amount = COALESCE($3, amount),
                 class_name = COALESCE($4, class_name)
             WHERE id = $1 RETURNING {}",
            COLUMNS
        ))
        .bind(id)
        .bind(optional(form.title))
        .bind(form.amount)
        .bind(optional(form.class_name))
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| SchoolError::not_found("Fee"))
    }

    pub async fn delete(id: i64, pool: &PgPool) -> SchoolResult<()> {
        let result = sqlx::query("DELETE FROM class_fee WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            Err(SchoolError::not_found("Fee"))
        } else {
            Ok(())
        }
    }
}
