use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::auth::{hash_password, validate_new_password};
use crate::error::{SchoolError, SchoolResult};

/// An administrator, stored and hashed like every other principal.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub id: i64,
    pub username: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    #[serde(skip)]
    pub pass_hash: String,
}

const COLUMNS: &str = "id, username, created_at, pass_hash";

impl Admin {
    pub async fn with_username_opt(username: &str, pool: &PgPool) -> SchoolResult<Option<Self>> {
        sqlx::query_as::<_, Self>(&format!("SELECT {} FROM admin WHERE username = $1", COLUMNS))
            .bind(username)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Creates the configured admin unless one with that username exists.
    ///
    /// Returns whether a new admin was created.
    pub async fn ensure_seeded(username: &str, password: &str, pool: &PgPool) -> SchoolResult<bool> {
        validate_new_password(password)?;
        let pass_hash = hash_password(password)?;

        let result = sqlx::query(
            "INSERT INTO admin (username, pass_hash) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(username)
        .bind(pass_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_password(username: &str, pass_hash: &str, pool: &PgPool) -> SchoolResult<()> {
        let result = sqlx::query("UPDATE admin SET pass_hash = $1 WHERE username = $2")
            .bind(pass_hash)
            .bind(username)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            Err(SchoolError::not_found("Admin"))
        } else {
            Ok(())
        }
    }
}
