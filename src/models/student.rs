use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::auth::{hash_password, validate_new_password};
use crate::error::{SchoolError, SchoolResult};
use crate::models::ledger::FeePayment;
use crate::models::subject::Subject;
use crate::util::{optional, required, string_or_number, validate_mobile_no};

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub father_name: Option<String>,
    pub address: Option<String>,
    /// The class the student belongs to, like "10A"
    #[serde(rename = "class")]
    pub class_name: String,
    /// Unique within the student's class
    pub roll_no: String,
    /// Unique across all students, used to log in with a one-time code
    pub mobile_no: Option<String>,
    /// Students can only log in once an admin approves them
    pub approved: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    #[serde(skip)]
    pub pass_hash: String,
}

/// A student along with their enrollments and fee ledger.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDetails {
    #[serde(flatten)]
    pub student: Student,
    pub subjects: Vec<Subject>,
    pub fee_payments: Vec<FeePayment>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub name: Option<String>,
    pub father_name: Option<String>,
    pub address: Option<String>,
    #[serde(rename = "class", alias = "className")]
    pub class_name: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub roll_no: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub mobile_no: Option<String>,
    pub password: Option<String>,
}

/// A partial update made by an admin. Absent fields are left alone.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentUpdate {
    pub name: Option<String>,
    pub father_name: Option<String>,
    pub address: Option<String>,
    #[serde(rename = "class", alias = "className")]
    pub class_name: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub roll_no: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub mobile_no: Option<String>,
    pub password: Option<String>,
    pub approved: Option<bool>,
}

/// The fields a student may change about themself.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub father_name: Option<String>,
    pub address: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentFilter {
    #[serde(alias = "class")]
    pub class_name: Option<String>,
    pub approved: Option<bool>,
}

const COLUMNS: &str =
    "id, name, father_name, address, class_name, roll_no, mobile_no, approved, created_at, pass_hash";

impl Student {
    pub async fn with_id(id: i64, pool: &PgPool) -> SchoolResult<Self> {
        Self::with_id_opt(id, pool)
            .await?
            .ok_or_else(|| SchoolError::not_found("Student"))
    }

    pub async fn with_id_opt(id: i64, pool: &PgPool) -> SchoolResult<Option<Self>> {
        sqlx::query_as::<_, Self>(&format!("SELECT {} FROM student WHERE id = $1", COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn with_mobile_no_opt(mobile_no: &str, pool: &PgPool) -> SchoolResult<Option<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {} FROM student WHERE mobile_no = $1",
            COLUMNS
        ))
        .bind(mobile_no)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn all(filter: &StudentFilter, pool: &PgPool) -> SchoolResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {} FROM student
             WHERE ($1::text IS NULL OR class_name = $1)
               AND ($2::boolean IS NULL OR approved = $2)
             ORDER BY class_name, roll_no",
            COLUMNS
        ))
        .bind(filter.class_name.as_deref())
        .bind(filter.approved)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Registrations still waiting for an admin, oldest first.
    pub async fn pending(pool: &PgPool) -> SchoolResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {} FROM student WHERE NOT approved ORDER BY created_at",
            COLUMNS
        ))
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn enrolled_in(subject_id: i64, pool: &PgPool) -> SchoolResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {} FROM student WHERE id IN
             (SELECT student_id FROM student_subject WHERE subject_id = $1)
             ORDER BY roll_no",
            COLUMNS
        ))
        .bind(subject_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn details(self, pool: &PgPool) -> SchoolResult<StudentDetails> {
        let subjects = Subject::for_student(self.id, pool).await?;
        let fee_payments = FeePayment::for_student(self.id, pool).await?;

        Ok(StudentDetails {
            student: self,
            subjects,
            fee_payments,
        })
    }

    /// Self-registered students start unapproved; admin-created ones do not.
    pub async fn create(new_student: NewStudent, approved: bool, pool: &PgPool) -> SchoolResult<Self> {
        let name = required("name", new_student.name.as_deref())?;
        let class_name = required("class", new_student.class_name.as_deref())?;
        let roll_no = required("rollNo", new_student.roll_no.as_deref())?;
        let mobile_no = optional(new_student.mobile_no);
        if let Some(mobile_no) = &mobile_no {
            validate_mobile_no(mobile_no)?;
        }
        let password = required("password", new_student.password.as_deref())?;
        validate_new_password(&password)?;
        let pass_hash = hash_password(&password)?;

        sqlx::query_as::<_, Self>(&format!(
            "INSERT INTO student
             (name, father_name, address, class_name, roll_no, mobile_no, pass_hash, approved)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {}",
            COLUMNS
        ))
        .bind(name)
        .bind(optional(new_student.father_name))
        .bind(optional(new_student.address))
        .bind(class_name)
        .bind(roll_no)
        .bind(mobile_no)
        .bind(pass_hash)
        .bind(approved)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn update(id: i64, update: StudentUpdate, pool: &PgPool) -> SchoolResult<Self> {
        let mobile_no = optional(update.mobile_no);
        if let Some(mobile_no) = &mobile_no {
            validate_mobile_no(mobile_no)?;
        }
        let pass_hash = match optional(update.password) {
            Some(password) => {
                validate_new_password(&password)?;
                Some(hash_password(&password)?)
            }
            None => None,
        };

        sqlx::query_as::<_, Self>(&format!(
            "UPDATE student SET
                 name = COALESCE($2, name),
                 father_name = COALESCE($3, father_name),
                 address = COALESCE($4, address),
                 class_name = COALESCE($5, class_name),
                 roll_no = COALESCE($6, roll_no),
                 mobile_no = COALESCE($7, mobile_no),
                 pass_hash = COALESCE($8, pass_hash),
                 approved = COALESCE($9, approved)
             WHERE id = $1 RETURNING {}",
            COLUMNS
        ))
        .bind(id)
        .bind(optional(update.name))
        .bind(optional(update.father_name))
        .bind(optional(update.address))
        .bind(optional(update.class_name))
        .bind(optional(update.roll_no))
        .bind(mobile_no)
        .bind(pass_hash)
        .bind(update.approved)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| SchoolError::not_found("Student"))
    }

    pub async fn update_profile(id: i64, update: ProfileUpdate, pool: &PgPool) -> SchoolResult<Self> {
        sqlx::query_as::<_, Self>(&format!(
            "UPDATE student SET
                 name = COALESCE($2, name),
                 father_name = COALESCE($3, father_name),
                 address = COALESCE($4, address)
             WHERE id = $1 RETURNING {}",
            COLUMNS
        ))
        .bind(id)
        .bind(optional(update.name))
        .bind(optional(update.father_name))
        .bind(optional(update.address))
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| SchoolError::not_found("Student"))
    }

    pub async fn approve(id: i64, pool: &PgPool) -> SchoolResult<Self> {
        sqlx::query_as::<_, Self>(&format!(
            "UPDATE student SET approved = TRUE WHERE id = $1 RETURNING {}",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| SchoolError::not_found("Student"))
    }

    pub async fn set_password(mobile_no: &str, pass_hash: &str, pool: &PgPool) -> SchoolResult<()> {
        let result = sqlx::query("UPDATE student SET pass_hash = $1 WHERE mobile_no = $2")
            .bind(pass_hash)
            .bind(mobile_no)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            Err(SchoolError::not_found("Student"))
        } else {
            Ok(())
        }
    }

    pub async fn delete(id: i64, pool: &PgPool) -> SchoolResult<()> {
        let result = sqlx::query("DELETE FROM student WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            Err(SchoolError::not_found("Student"))
        } else {
            Ok(())
        }
    }

    pub async fn is_enrolled_in(&self, subject_id: i64, pool: &PgPool) -> SchoolResult<bool> {
        let enrolled = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS
             (SELECT 1 FROM student_subject WHERE student_id = $1 AND subject_id = $2)",
        )
        .bind(self.id)
        .bind(subject_id)
        .fetch_one(pool)
        .await?;

        Ok(enrolled)
    }

    /// Enrolls in the subject with the given code in the student's own class.
    pub async fn enroll(&self, subject_code: &str, pool: &PgPool) -> SchoolResult<Subject> {
        let subject = Subject::with_code_in_class(subject_code, &self.class_name, pool).await?;

        let result = sqlx::query(
            "INSERT INTO student_subject (student_id, subject_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(self.id)
        .bind(subject.id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            Err(SchoolError::BadRequest(
                "Already enrolled in this subject".to_owned(),
            ))
        } else {
            Ok(subject)
        }
    }

    pub async fn unenroll(&self, subject_code: &str, pool: &PgPool) -> SchoolResult<Subject> {
        let subject = Subject::with_code_in_class(subject_code, &self.class_name, pool).await?;

        let result =
            sqlx::query("DELETE FROM student_subject WHERE student_id = $1 AND subject_id = $2")
                .bind(self.id)
                .bind(subject.id)
                .execute(pool)
                .await?;

        if result.rows_affected() == 0 {
            Err(SchoolError::BadRequest(
                "Not enrolled in this subject".to_owned(),
            ))
        } else {
            Ok(subject)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_form_accepts_class_and_numeric_fields() {
        let form: NewStudent = serde_json::from_str(
            r#"{
                "name": "Asha",
                "fatherName": "Ravi",
                "address": "12 Hill Road",
                "class": "10A",
                "rollNo": 7,
                "mobileNo": "9876543210",
                "password": "secret1"
            }"#,
        )
        .unwrap();

        assert_eq!(form.class_name.as_deref(), Some("10A"));
        assert_eq!(form.roll_no.as_deref(), Some("7"));
        assert_eq!(form.mobile_no.as_deref(), Some("9876543210"));
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let student = Student {
            id: 1,
            name: "Asha".to_owned(),
            father_name: None,
            address: None,
            class_name: "10A".to_owned(),
            roll_no: "7".to_owned(),
            mobile_no: Some("9876543210".to_owned()),
            approved: false,
            created_at: OffsetDateTime::UNIX_EPOCH,
            pass_hash: "$2b$10$secret".to_owned(),
        };
        let json = serde_json::to_value(&student).unwrap();

        assert!(json.get("passHash").is_none());
        assert_eq!(json["class"], "10A");
        assert_eq!(json["approved"], false);
    }
}
