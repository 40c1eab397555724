//! Error handling for the API.
//!
//! Prefer adding a variant to [SchoolError] over forcing a failure into a
//! generic `BadRequest` or `Server` error. Document the status code and JSON
//! body of any new variant.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use sqlx::postgres::PgDatabaseError;

/// The error enum for all error handling across the API.
///
/// Every error body has the shape
///
/// ```json
/// {
///     "message": <human readable message>,
///     "statusCode": <status code>
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum SchoolError {
    /// \[400\] The request was malformed or failed validation.
    #[error("{0}")]
    BadRequest(String),
    /// \[400\] The one-time code was missing, wrong or expired.
    #[error("Invalid or missing OTP")]
    InvalidOtp,
    /// \[401\] The identifier or the password was wrong. Which one is not revealed.
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// \[401\] No bearer token, or the token failed verification.
    #[error("{0}")]
    Unauthorized(&'static str),
    /// \[403\] The student registered but an admin has not approved them yet.
    #[error("Account pending admin approval")]
    NotApproved,
    /// \[403\] The principal's role is not allowed to do this.
    #[error("Access forbidden")]
    Forbidden,
    /// \[404\] The named resource does not exist (or is not visible to the caller).
    #[error("{0}")]
    NotFound(String),
    /// \[409\] A uniqueness constraint was violated.
    #[error("{0}")]
    Conflict(String),
    /// \[500\] The database failed.
    #[error("database error")]
    Database(#[source] sqlx::Error),
    /// \[500\] A file operation failed.
    #[error("file error")]
    Io(#[from] std::io::Error),
    /// \[500\] Anything else that went wrong on our side.
    #[error("server error")]
    Server(String),
}

/// The return type for all endpoints.
pub type SchoolResult<T> = Result<T, SchoolError>;

impl SchoolError {
    pub fn not_found(what: &str) -> Self {
        SchoolError::NotFound(format!("{} not found", what))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SchoolError::BadRequest(_) | SchoolError::InvalidOtp => StatusCode::BAD_REQUEST,
            SchoolError::InvalidCredentials | SchoolError::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            SchoolError::NotApproved | SchoolError::Forbidden => StatusCode::FORBIDDEN,
            SchoolError::NotFound(_) => StatusCode::NOT_FOUND,
            SchoolError::Conflict(_) => StatusCode::CONFLICT,
            SchoolError::Database(_) | SchoolError::Io(_) | SchoolError::Server(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn as_json(&self) -> Value {
        json!({
            "message": self.to_string(),
            "statusCode": self.status().as_u16(),
        })
    }
}

impl IntoResponse for SchoolError {
    fn into_response(self) -> Response {
        match &self {
            SchoolError::Database(error) => tracing::error!(%error, "database error"),
            SchoolError::Io(error) => tracing::error!(%error, "file error"),
            SchoolError::Server(error) => tracing::error!(%error, "server error"),
            _ => {}
        }

        (self.status(), Json(self.as_json())).into_response()
    }
}

impl From<sqlx::Error> for SchoolError {
    fn from(error: sqlx::Error) -> Self {
        let constraint = error
            .as_database_error()
            .and_then(|db_error| db_error.try_downcast_ref::<PgDatabaseError>())
            .filter(|pg_error| pg_error.code() == UNIQUE_VIOLATION)
            .map(|pg_error| pg_error.constraint().unwrap_or_default().to_owned());

        match constraint {
            Some(constraint) => SchoolError::Conflict(conflict_message(&constraint).to_owned()),
            None => SchoolError::Database(error),
        }
    }
}

const UNIQUE_VIOLATION: &str = "23505";

fn conflict_message(constraint: &str) -> &'static str {
    match constraint {
        "admin_username_key" => "An admin with that username already exists",
        "student_class_roll_key" => "Roll number already exists in this class",
        "student_mobile_no_key" => "Mobile number already registered",
        "faculty_faculty_id_key" => "Faculty ID already exists",
        "subject_code_class_key" => "Subject code already exists for this class",
        "student_subject_pkey" => "Already enrolled in this subject",
        _ => "Duplicate value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_bodies_carry_message_and_status() {
        let body = SchoolError::not_found("Teacher").as_json();
        assert_eq!(body["message"], "Teacher not found");
        assert_eq!(body["statusCode"], 404);

        let body = SchoolError::InvalidOtp.as_json();
        assert_eq!(body["statusCode"], 400);
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let error = SchoolError::Server("connection reset by peer at 10.0.0.3".to_owned());
        assert_eq!(error.as_json()["message"], "server error");
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unique_constraints_have_readable_messages() {
        assert_eq!(
            conflict_message("subject_code_class_key"),
            "Subject code already exists for this class"
        );
        assert_eq!(conflict_message("something_else"), "Duplicate value");
    }

    #[test]
    fn missing_rows_stay_database_errors() {
        let error = SchoolError::from(sqlx::Error::RowNotFound);
        assert!(matches!(error, SchoolError::Database(_)));
    }
}
