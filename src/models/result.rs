use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::error::{SchoolError, SchoolResult};

/// A student's marks in one subject. There is at most one per student and subject.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    pub id: i64,
    pub student_id: i64,
    pub subject_id: i64,
    pub student_name: String,
    pub subject_name: String,
    pub marks_obtained: f64,
    pub total_marks: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultForm {
    pub student_id: i64,
    pub subject_id: i64,
    pub marks_obtained: f64,
    pub total_marks: f64,
}

impl ResultForm {
    pub fn validate(&self) -> SchoolResult<()> {
        if !(self.total_marks > 0.0) {
            return Err(SchoolError::BadRequest(
                "totalMarks must be greater than zero".to_owned(),
            ));
        }
        if !(0.0..=self.total_marks).contains(&self.marks_obtained) {
            return Err(SchoolError::BadRequest(
                "marksObtained must be between 0 and totalMarks".to_owned(),
            ));
        }

        Ok(())
    }
}

const SELECT: &str = "SELECT r.id, r.student_id, r.subject_id,
        st.name AS student_name, s.name AS subject_name,
        r.marks_obtained, r.total_marks, r.updated_at
    FROM result r
    JOIN student st ON st.id = r.student_id
    JOIN subject s ON s.id = r.subject_id";

impl ExamResult {
    pub async fn for_student(student_id: i64, pool: &PgPool) -> SchoolResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "{} WHERE r.student_id = $1 ORDER BY s.code",
            SELECT
        ))
        .bind(student_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn for_subject(subject_id: i64, pool: &PgPool) -> SchoolResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "{} WHERE r.subject_id = $1 ORDER BY st.roll_no",
            SELECT
        ))
        .bind(subject_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Records marks, replacing any earlier marks for the same student and subject.
    pub async fn record(form: &ResultForm, pool: &PgPool) -> SchoolResult<Self> {
        form.validate()?;

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO result (student_id, subject_id, marks_obtained, total_marks)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (student_id, subject_id) DO UPDATE SET
                 marks_obtained = EXCLUDED.marks_obtained,
                 total_marks = EXCLUDED.total_marks,
                 updated_at = now()
             RETURNING id",
        )
        .bind(form.student_id)
        .bind(form.subject_id)
        .bind(form.marks_obtained)
        .bind(form.total_marks)
        .fetch_one(pool)
        .await?;

        sqlx::query_as::<_, Self>(&format!("{} WHERE r.id = $1", SELECT))
            .bind(id)
            .fetch_one(pool)
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(marks_obtained: f64, total_marks: f64) -> ResultForm {
        ResultForm {
            student_id: 1,
            subject_id: 1,
            marks_obtained,
            total_marks,
        }
    }

    #[test]
    fn marks_must_fit_the_total() {
        assert!(form(42.5, 50.0).validate().is_ok());
        assert!(form(0.0, 50.0).validate().is_ok());
        assert!(form(50.0, 50.0).validate().is_ok());
        assert!(form(51.0, 50.0).validate().is_err());
        assert!(form(-1.0, 50.0).validate().is_err());
        assert!(form(10.0, 0.0).validate().is_err());
        assert!(form(f64::NAN, 50.0).validate().is_err());
    }
}
