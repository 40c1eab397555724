use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::auth::Principal;
use crate::error::{SchoolError, SchoolResult};
use crate::util::required;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    #[serde(rename = "announcement")]
    pub announcement_id: i64,
    /// Set when a student wrote the comment. Exclusive with `facultyId`.
    pub student_id: Option<i64>,
    /// Set when a faculty member wrote the comment. Exclusive with `studentId`.
    pub faculty_id: Option<i64>,
    pub author_name: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Who wrote a comment, decided by which route created it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CommentAuthor {
    Student(i64),
    Faculty(i64),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub announcement_id: i64,
    pub content: Option<String>,
}

const SELECT: &str = "SELECT c.id, c.announcement_id, c.student_id, c.faculty_id,
        COALESCE(st.name, f.name, '') AS author_name, c.content, c.created_at
    FROM comment c
    LEFT JOIN student st ON st.id = c.student_id
    LEFT JOIN faculty f ON f.id = c.faculty_id";

impl Comment {
    /// Students may delete their own comments. Faculty and admins moderate every comment.
    pub fn can_be_deleted_by(&self, principal: Principal) -> bool {
        match principal {
            Principal::Admin(_) | Principal::Faculty(_) => true,
            Principal::Student(id) => self.student_id == Some(id),
        }
    }

    pub async fn with_id(id: i64, pool: &PgPool) -> SchoolResult<Self> {
        sqlx::query_as::<_, Self>(&format!("{} WHERE c.id = $1", SELECT))
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| SchoolError::not_found("Comment"))
    }

    pub async fn for_announcement(announcement_id: i64, pool: &PgPool) -> SchoolResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "{} WHERE c.announcement_id = $1 ORDER BY c.created_at",
            SELECT
        ))
        .bind(announcement_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn create(
        announcement_id: i64,
        author: CommentAuthor,
        content: Option<&str>,
        pool: &PgPool,
    ) -> SchoolResult<Self> {
        let content = required("content", content)?;
        let (student_id, faculty_id) = match author {
            CommentAuthor::Student(id) => (Some(id), None),
            CommentAuthor::Faculty(id) => (None, Some(id)),
        };

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO comment (announcement_id, student_id, faculty_id, content)
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(announcement_id)
        .bind(student_id)
        .bind(faculty_id)
        .bind(content)
        .fetch_one(pool)
        .await?;

        Self::with_id(id, pool).await
    }

    pub async fn delete_as(id: i64, principal: Principal, pool: &PgPool) -> SchoolResult<()> {
        let comment = Self::with_id(id, pool).await?;
        if !comment.can_be_deleted_by(principal) {
            tracing::warn!(comment = id, ?principal, "refused to delete another student's comment");
            return Err(SchoolError::Forbidden);
        }

        sqlx::query("DELETE FROM comment WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment_by(author: CommentAuthor) -> Comment {
        let (student_id, faculty_id) = match author {
            CommentAuthor::Student(id) => (Some(id), None),
            CommentAuthor::Faculty(id) => (None, Some(id)),
        };

        Comment {
            id: 1,
            announcement_id: 1,
            student_id,
            faculty_id,
            author_name: "Asha".to_owned(),
            content: "When is the test?".to_owned(),
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn students_delete_only_their_own_comments() {
        let comment = comment_by(CommentAuthor::Student(5));

        assert!(comment.can_be_deleted_by(Principal::Student(5)));
        assert!(!comment.can_be_deleted_by(Principal::Student(6)));
    }

    #[test]
    fn faculty_and_admins_moderate_any_comment() {
        let by_student = comment_by(CommentAuthor::Student(5));
        let by_faculty = comment_by(CommentAuthor::Faculty(2));

        for comment in [&by_student, &by_faculty] {
            assert!(comment.can_be_deleted_by(Principal::Faculty(2)));
            assert!(comment.can_be_deleted_by(Principal::Faculty(3)));
            assert!(comment.can_be_deleted_by(Principal::Admin(1)));
        }
        assert!(!by_faculty.can_be_deleted_by(Principal::Student(2)));
    }
}
