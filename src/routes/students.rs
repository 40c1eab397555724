//! Self-service for students: profile, enrollment, and their own records.

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::StudentUser;
use crate::error::{SchoolError, SchoolResult};
use crate::extract::{Json, Query};
use crate::models::announcement::Announcement;
use crate::models::attendance::Attendance;
use crate::models::comment::{Comment, CommentAuthor, NewComment};
use crate::models::ledger::FeeStatement;
use crate::models::result::ExamResult;
use crate::models::student::{ProfileUpdate, Student};
use crate::models::subject::Subject;
use crate::state::AppState;
use crate::util::{current_year, required};

use super::YearQuery;

pub fn routes() -> Router {
    Router::new()
        .route("/profile", get(profile).put(update_profile))
        .route("/subjects", get(subjects))
        .route("/subjects/available", get(available_subjects))
        .route("/enroll", post(enroll))
        .route("/unenroll", post(unenroll))
        .route("/announcements", get(announcements))
        .route("/comments", post(new_comment))
        .route("/attendance", get(attendance))
        .route("/results", get(results))
        .route("/fees", get(fees))
}

async fn profile(
    StudentUser(id): StudentUser,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Student>> {
    Ok(Json(Student::with_id(id, &state.pool).await?))
}

async fn update_profile(
    StudentUser(id): StudentUser,
    Extension(state): Extension<AppState>,
    Json(update): Json<ProfileUpdate>,
) -> SchoolResult<Json<Student>> {
    Ok(Json(Student::update_profile(id, update, &state.pool).await?))
}

async fn subjects(
    StudentUser(id): StudentUser,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Vec<Subject>>> {
    Ok(Json(Subject::for_student(id, &state.pool).await?))
}

/// Subjects of the student's class they have not enrolled in yet.
async fn available_subjects(
    StudentUser(id): StudentUser,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Vec<Subject>>> {
    let student = Student::with_id(id, &state.pool).await?;
    let enrolled: Vec<i64> = Subject::for_student(id, &state.pool)
        .await?
        .into_iter()
        .map(|subject| subject.id)
        .collect();

    let available = Subject::all(Some(student.class_name.as_str()), &state.pool)
        .await?
        .into_iter()
        .filter(|subject| !enrolled.contains(&subject.id))
        .collect();

    Ok(Json(available))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRequest {
    pub subject_code: Option<String>,
}

async fn enroll(
    StudentUser(id): StudentUser,
    Extension(state): Extension<AppState>,
    Json(request): Json<EnrollmentRequest>,
) -> SchoolResult<Json<Value>> {
    let code = required("subjectCode", request.subject_code.as_deref())?;
    let student = Student::with_id(id, &state.pool).await?;
    let subject = student.enroll(&code, &state.pool).await?;
    tracing::info!(student = id, subject = subject.id, "enrolled");

    Ok(Json(json!({
        "message": "Enrolled successfully",
        "subject": subject,
    })))
}

async fn unenroll(
    StudentUser(id): StudentUser,
    Extension(state): Extension<AppState>,
    Json(request): Json<EnrollmentRequest>,
) -> SchoolResult<Json<Value>> {
    let code = required("subjectCode", request.subject_code.as_deref())?;
    let student = Student::with_id(id, &state.pool).await?;
    let subject = student.unenroll(&code, &state.pool).await?;
    tracing::info!(student = id, subject = subject.id, "unenrolled");

    Ok(Json(json!({
        "message": "Unenrolled successfully",
        "subject": subject,
    })))
}

async fn announcements(
    StudentUser(id): StudentUser,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Vec<Announcement>>> {
    Ok(Json(Announcement::for_student(id, &state.pool).await?))
}

/// Students may only comment on announcements in subjects they take.
async fn new_comment(
    StudentUser(id): StudentUser,
    Extension(state): Extension<AppState>,
    Json(new_comment): Json<NewComment>,
) -> SchoolResult<(StatusCode, Json<Comment>)> {
    let announcement = Announcement::with_id(new_comment.announcement_id, &state.pool).await?;
    let student = Student::with_id(id, &state.pool).await?;
    if !student.is_enrolled_in(announcement.subject_id, &state.pool).await? {
        return Err(SchoolError::not_found("Announcement"));
    }

    let comment = Comment::create(
        announcement.id,
        CommentAuthor::Student(id),
        new_comment.content.as_deref(),
        &state.pool,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceFilter {
    pub subject_id: Option<i64>,
}

async fn attendance(
    StudentUser(id): StudentUser,
    Query(filter): Query<AttendanceFilter>,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Vec<Attendance>>> {
    Ok(Json(
        Attendance::for_student(id, filter.subject_id, &state.pool).await?,
    ))
}

async fn results(
    StudentUser(id): StudentUser,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Vec<ExamResult>>> {
    Ok(Json(ExamResult::for_student(id, &state.pool).await?))
}

async fn fees(
    StudentUser(id): StudentUser,
    Query(query): Query<YearQuery>,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<FeeStatement>> {
    let student = Student::with_id(id, &state.pool).await?;
    let year = query.year.unwrap_or_else(current_year);

    Ok(Json(
        FeeStatement::for_student(student.id, &student.class_name, year, &state.pool).await?,
    ))
}
