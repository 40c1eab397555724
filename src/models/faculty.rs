use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::auth::{hash_password, validate_new_password};
use crate::error::{SchoolError, SchoolResult};
use crate::util::{optional, required};

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Faculty {
    pub id: i64,
    pub name: String,
    /// The identifier faculty log in with, unique across all faculty
    pub faculty_id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Always "Faculty"
    pub role: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    #[serde(skip)]
    pub pass_hash: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFaculty {
    pub name: Option<String>,
    pub faculty_id: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// A partial update. Only admins may change the login id or password this way.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacultyUpdate {
    pub name: Option<String>,
    pub faculty_id: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

const COLUMNS: &str =
    "id, name, faculty_id, email, phone, address, 'Faculty'::text AS role, created_at, pass_hash";

impl Faculty {
    pub async fn with_id(id: i64, pool: &PgPool) -> SchoolResult<Self> {
        sqlx::query_as::<_, Self>(&format!("SELECT {} FROM faculty WHERE id = $1", COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| SchoolError::not_found("Teacher"))
    }

    pub async fn with_faculty_id_opt(faculty_id: &str, pool: &PgPool) -> SchoolResult<Option<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {} FROM faculty WHERE faculty_id = $1",
            COLUMNS
        ))
        .bind(faculty_id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Resolves a teacher's display name to their id.
    ///
    /// Names are not unique; the earliest created faculty member with the name wins.
    pub async fn id_for_name(name: &str, pool: &PgPool) -> SchoolResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT id FROM faculty WHERE name = $1 ORDER BY id LIMIT 1")
            .bind(name.trim())
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| SchoolError::not_found("Teacher"))
    }

    pub async fn all(pool: &PgPool) -> SchoolResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(&format!("SELECT {} FROM faculty ORDER BY name", COLUMNS))
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn create(new_faculty: NewFaculty, pool: &PgPool) -> SchoolResult<Self> {
        let name = required("name", new_faculty.name.as_deref())?;
        let faculty_id = required("facultyId", new_faculty.faculty_id.as_deref())?;
        let password = required("password", new_faculty.password.as_deref())?;
        validate_new_password(&password)?;
        let pass_hash = hash_password(&password)?;

        sqlx::query_as::<_, Self>(&format!(
            "INSERT INTO faculty (name, faculty_id, pass_hash, email, phone, address)
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            COLUMNS
        ))
        .bind(name)
        .bind(faculty_id)
        .bind(pass_hash)
        .bind(optional(new_faculty.email))
        .bind(optional(new_faculty.phone))
        .bind(optional(new_faculty.address))
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn update(id: i64, update: FacultyUpdate, pool: &PgPool) -> SchoolResult<Self> {
        let pass_hash = match optional(update.password) {
            Some(password) => {
                validate_new_password(&password)?;
                Some(hash_password(&password)?)
            }
            None => None,
        };

        sqlx::query_as::<_, Self>(&format!(
            "UPDATE faculty SET
                 name = COALESCE($2, name),
                 faculty_id = COALESCE($3, faculty_id),
                 pass_hash = COALESCE($4, pass_hash),
                 email = COALESCE($5, email),
                 phone = COALESCE($6, phone),
                 address = COALESCE($7, address)
             WHERE id = $1 RETURNING {}",
            COLUMNS
        ))
        .bind(id)
        .bind(optional(update.name))
        .bind(optional(update.faculty_id))
        .bind(pass_hash)
        .bind(optional(update.email))
        .bind(optional(update.phone))
        .bind(optional(update.address))
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| SchoolError::not_found("Teacher"))
    }

    /// Faculty editing their own profile can change contact details and name only.
    pub async fn update_profile(id: i64, update: FacultyUpdate, pool: &PgPool) -> SchoolResult<Self> {
        Self::update(
            id,
            FacultyUpdate {
                faculty_id: None,
                password: None,
                ..update
            },
            pool,
        )
        .await
    }

    pub async fn set_password(faculty_id: &str, pass_hash: &str, pool: &PgPool) -> SchoolResult<()> {
        let result = sqlx::query("UPDATE faculty SET pass_hash = $1 WHERE faculty_id = $2")
            .bind(pass_hash)
            .bind(faculty_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            Err(SchoolError::not_found("Teacher"))
        } else {
            Ok(())
        }
    }

    pub async fn delete(id: i64, pool: &PgPool) -> SchoolResult<()> {
        let result = sqlx::query("DELETE FROM faculty WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            Err(SchoolError::not_found("Teacher"))
        } else {
            Ok(())
        }
    }
}
