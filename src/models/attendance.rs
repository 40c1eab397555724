use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::{SchoolError, SchoolResult};
use crate::util::validate_date;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "attendance_status")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub id: i64,
    #[serde(rename = "subject")]
    pub subject_id: i64,
    #[serde(rename = "faculty")]
    pub faculty_id: i64,
    /// `YYYY-MM-DD`
    pub date: String,
    #[serde(rename = "student")]
    pub student_id: i64,
    pub student_name: String,
    pub status: AttendanceStatus,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceMark {
    pub student_id: i64,
    pub status: AttendanceStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSheet {
    pub subject_id: i64,
    pub date: String,
    pub records: Vec<AttendanceMark>,
}

const SELECT: &str = "SELECT a.id, a.subject_id, a.faculty_id, a.date, a.student_id,
        st.name AS student_name, a.status
    FROM attendance a
    JOIN student st ON st.id = a.student_id";

impl Attendance {
    pub async fn for_subject_on(subject_id: i64, date: &str, pool: &PgPool) -> SchoolResult<Vec<Self>> {
        validate_date(date)?;

        sqlx::query_as::<_, Self>(&format!(
            "{} WHERE a.subject_id = $1 AND a.date = $2 ORDER BY st.roll_no",
            SELECT
        ))
        .bind(subject_id)
        .bind(date)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn for_student(
        student_id: i64,
        subject_id: Option<i64>,
        pool: &PgPool,
    ) -> SchoolResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "{} WHERE a.student_id = $1 AND ($2::bigint IS NULL OR a.subject_id = $2)
             ORDER BY a.date DESC",
            SELECT
        ))
        .bind(student_id)
        .bind(subject_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Records a day's attendance for a subject, overwriting earlier marks for that day.
    ///
    /// Every student on the sheet must be enrolled in the subject.
    pub async fn mark(sheet: &AttendanceSheet, faculty_id: i64, pool: &PgPool) -> SchoolResult<Vec<Self>> {
        validate_date(&sheet.date)?;
        if sheet.records.is_empty() {
            return Err(SchoolError::BadRequest(
                "records must not be empty".to_owned(),
            ));
        }

        let mut transaction = pool.begin().await?;
        for mark in &sheet.records {
            let enrolled = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS
                 (SELECT 1 FROM student_subject WHERE student_id = $1 AND subject_id = $2)",
            )
            .bind(mark.student_id)
            .bind(sheet.subject_id)
            .fetch_one(&mut transaction)
            .await?;
            if !enrolled {
                return Err(SchoolError::BadRequest(format!(
                    "Student {} is not enrolled in this subject",
                    mark.student_id
                )));
            }

            sqlx::query(
                "INSERT INTO attendance (subject_id, faculty_id, date, student_id, status)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (subject_id, date, student_id) DO UPDATE SET
                     status = EXCLUDED.status, faculty_id = EXCLUDED.faculty_id",
            )
            .bind(sheet.subject_id)
            .bind(faculty_id)
            .bind(&sheet.date)
            .bind(mark.student_id)
            .bind(mark.status)
            .execute(&mut transaction)
            .await?;
        }
        transaction.commit().await?;

        Self::for_subject_on(sheet.subject_id, &sheet.date, pool).await
    }
}
