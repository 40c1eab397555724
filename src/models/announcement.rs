use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::error::{SchoolError, SchoolResult};
use crate::util::required;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: i64,
    #[serde(rename = "subject")]
    pub subject_id: i64,
    #[serde(rename = "faculty")]
    pub faculty_id: i64,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub subject_name: String,
    pub faculty_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAnnouncement {
    pub subject_id: i64,
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct AnnouncementUpdate {
    pub content: Option<String>,
}

const SELECT: &str = "SELECT a.id, a.subject_id, a.faculty_id, a.content, a.created_at,
        s.name AS subject_name, f.name AS faculty_name
    FROM announcement a
    JOIN subject s ON s.id = a.subject_id
    JOIN faculty f ON f.id = a.faculty_id";

impl Announcement {
    pub async fn with_id(id: i64, pool: &PgPool) -> SchoolResult<Self> {
        sqlx::query_as::<_, Self>(&format!("{} WHERE a.id = $1", SELECT))
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| SchoolError::not_found("Announcement"))
    }

    pub async fn for_subject(subject_id: i64, pool: &PgPool) -> SchoolResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "{} WHERE a.subject_id = $1 ORDER BY a.created_at DESC",
            SELECT
        ))
        .bind(subject_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn for_faculty(faculty_id: i64, pool: &PgPool) -> SchoolResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "{} WHERE a.faculty_id = $1 ORDER BY a.created_at DESC",
            SELECT
        ))
        .bind(faculty_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Announcements in every subject the student is enrolled in.
    pub async fn for_student(student_id: i64, pool: &PgPool) -> SchoolResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "{} WHERE a.subject_id IN
             (SELECT subject_id FROM student_subject WHERE student_id = $1)
             ORDER BY a.created_at DESC",
            SELECT
        ))
        .bind(student_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// The caller must already have checked that the faculty member teaches the subject.
    pub async fn create(
        subject_id: i64,
        faculty_id: i64,
        content: Option<&str>,
        pool: &PgPool,
    ) -> SchoolResult<Self> {
        let content = required("content", content)?;

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO announcement (subject_id, faculty_id, content)
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(subject_id)
        .bind(faculty_id)
        .bind(content)
        .fetch_one(pool)
        .await?;

        Self::with_id(id, pool).await
    }

    /// Announcements in another faculty member's subject are "not found".
    pub async fn update_owned(
        id: i64,
        faculty_id: i64,
        content: Option<&str>,
        pool: &PgPool,
    ) -> SchoolResult<Self> {
        let content = required("content", content)?;

        let result = sqlx::query(
            "UPDATE announcement SET content = $3
             WHERE id = $1 AND subject_id IN (SELECT id FROM subject WHERE faculty_id = $2)",
        )
        .bind(id)
        .bind(faculty_id)
        .bind(content)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SchoolError::not_found("Announcement"));
        }

        Self::with_id(id, pool).await
    }

    pub async fn delete_owned(id: i64, faculty_id: i64, pool: &PgPool) -> SchoolResult<()> {
        let result = sqlx::query(
            "DELETE FROM announcement
             WHERE id = $1 AND subject_id IN (SELECT id FROM subject WHERE faculty_id = $2)",
        )
        .bind(id)
        .bind(faculty_id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            Err(SchoolError::not_found("Announcement"))
        } else {
            Ok(())
        }
    }
}
