use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::error::{SchoolError, SchoolResult};
use crate::models::announcement::Announcement;
use crate::util::required;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: i64,
    pub name: String,
    /// Unique within the subject's class
    pub code: String,
    pub class_name: String,
    /// The id of the faculty member teaching the subject
    #[serde(rename = "faculty")]
    pub faculty_id: Option<i64>,
    /// Whether the teacher is also the class teacher. Always false without a teacher.
    pub is_class_teacher: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A subject with its announcements, newest first.
#[derive(Serialize)]
pub struct SubjectDetails {
    #[serde(flatten)]
    pub subject: Subject,
    pub announcements: Vec<Announcement>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectForm {
    pub name: Option<String>,
    pub code: Option<String>,
    #[serde(alias = "class")]
    pub class_name: Option<String>,
    /// Resolved to a faculty member by name. Empty unassigns on update.
    pub teacher_name: Option<String>,
    pub is_class_teacher: Option<bool>,
}

/// The teacher assignment requested by a [SubjectForm].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TeacherChange {
    Keep,
    Unassign,
    Assign(i64),
}

const COLUMNS: &str = "id, name, code, class_name, faculty_id, is_class_teacher, created_at";

impl Subject {
    pub async fn with_id(id: i64, pool: &PgPool) -> SchoolResult<Self> {
        sqlx::query_as::<_, Self>(&format!("SELECT {} FROM subject WHERE id = $1", COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| SchoolError::not_found("Subject"))
    }

    pub async fn with_code_in_class(code: &str, class_name: &str, pool: &PgPool) -> SchoolResult<Self> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {} FROM subject WHERE code = $1 AND class_name = $2",
            COLUMNS
        ))
        .bind(code.trim())
        .bind(class_name)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| SchoolError::not_found("Subject"))
    }

    /// Subjects taught by the faculty member; anyone else's subject is "not found".
    pub async fn owned_by(id: i64, faculty_id: i64, pool: &PgPool) -> SchoolResult<Self> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {} FROM subject WHERE id = $1 AND faculty_id = $2",
            COLUMNS
        ))
        .bind(id)
        .bind(faculty_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| SchoolError::not_found("Subject"))
    }

    pub async fn all(class_name: Option<&str>, pool: &PgPool) -> SchoolResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {} FROM subject
             WHERE ($1::text IS NULL OR class_name = $1)
             ORDER BY class_name, code",
            COLUMNS
        ))
        .bind(class_name)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn for_student(student_id: i64, pool: &PgPool) -> SchoolResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {} FROM subject WHERE id IN
             (SELECT subject_id FROM student_subject WHERE student_id = $1)
             ORDER BY code",
            COLUMNS
        ))
        .bind(student_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn for_faculty(faculty_id: i64, pool: &PgPool) -> SchoolResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {} FROM subject WHERE faculty_id = $1 ORDER BY class_name, code",
            COLUMNS
        ))
        .bind(faculty_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn details(self, pool: &PgPool) -> SchoolResult<SubjectDetails> {
        let announcements = Announcement::for_subject(self.id, pool).await?;

        Ok(SubjectDetails {
            subject: self,
            announcements,
        })
    }

    /// Duplicate (code, class) pairs are rejected by the schema.
    pub async fn create(form: &SubjectForm, teacher: TeacherChange, pool: &PgPool) -> SchoolResult<Self> {
        let name = required("name", form.name.as_deref())?;
        let code = required("code", form.code.as_deref())?;
        let class_name = required("className", form.class_name.as_deref())?;
        let faculty_id = match teacher {
            TeacherChange::Assign(faculty_id) => Some(faculty_id),
            TeacherChange::Keep | TeacherChange::Unassign => None,
        };
        let is_class_teacher = faculty_id.is_some() && form.is_class_teacher.unwrap_or(false);

        sqlx::query_as::<_, Self>(&format!(
            "INSERT INTO subject (name, code, class_name, faculty_id, is_class_teacher)
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            COLUMNS
        ))
        .bind(name)
        .bind(code)
        .bind(class_name)
        .bind(faculty_id)
        .bind(is_class_teacher)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn update(
        id: i64,
        form: &SubjectForm,
        teacher: TeacherChange,
        pool: &PgPool,
    ) -> SchoolResult<Self> {
        let existing = Self::with_id(id, pool).await?;
        let keep_or = |value: &Option<String>, current: String| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
                .unwrap_or(current)
        };

        let faculty_id = match teacher {
            TeacherChange::Keep => existing.faculty_id,
            TeacherChange::Unassign => None,
            TeacherChange::Assign(faculty_id) => Some(faculty_id),
        };
        let is_class_teacher =
            faculty_id.is_some() && form.is_class_teacher.unwrap_or(existing.is_class_teacher);

        sqlx::query_as::<_, Self>(&format!(
            "UPDATE subject SET name = $2, code = $3, class_name = $4,
                 faculty_id = $5, is_class_teacher = $6
             WHERE id = $1 RETURNING {}",
            COLUMNS
        ))
        .bind(id)
        .bind(keep_or(&form.name, existing.name))
        .bind(keep_or(&form.code, existing.code))
        .bind(keep_or(&form.class_name, existing.class_name))
        .bind(faculty_id)
        .bind(is_class_teacher)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| SchoolError::not_found("Subject"))
    }

    pub async fn delete(id: i64, pool: &PgPool) -> SchoolResult<()> {
        let result = sqlx::query("DELETE FROM subject WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            Err(SchoolError::not_found("Subject"))
        } else {
            Ok(())
        }
    }
}
