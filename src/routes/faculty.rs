//! Self-service for faculty, limited to the subjects they teach.
//!
//! Another teacher's subject or announcement is reported as not found rather
//! than forbidden.

use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Extension, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::FacultyUser;
use crate::error::{SchoolError, SchoolResult};
use crate::extract::{Json, Path, Query};
use crate::models::announcement::{Announcement, AnnouncementUpdate, NewAnnouncement};
use crate::models::attendance::{Attendance, AttendanceSheet};
use crate::models::comment::{Comment, CommentAuthor, NewComment};
use crate::models::faculty::{Faculty, FacultyUpdate};
use crate::models::result::{ExamResult, ResultForm};
use crate::models::student::Student;
use crate::models::subject::Subject;
use crate::state::AppState;

use super::message;

pub fn routes() -> Router {
    Router::new()
        .route("/profile", get(profile).put(update_profile))
        .route("/subjects", get(subjects))
        .route("/subjects/:id/students", get(subject_students))
        .route("/subjects/:id/results", get(subject_results))
        .route("/announcements", get(announcements).post(new_announcement))
        .route(
            "/announcements/:id",
            put(update_announcement).delete(delete_announcement),
        )
        .route("/comments", post(new_comment))
        .route("/attendance", get(attendance).post(mark_attendance))
        .route("/results", post(record_result))
}

async fn profile(
    FacultyUser(id): FacultyUser,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Faculty>> {
    Ok(Json(Faculty::with_id(id, &state.pool).await?))
}

async fn update_profile(
    FacultyUser(id): FacultyUser,
    Extension(state): Extension<AppState>,
    Json(update): Json<FacultyUpdate>,
) -> SchoolResult<Json<Faculty>> {
    Ok(Json(Faculty::update_profile(id, update, &state.pool).await?))
}

async fn subjects(
    FacultyUser(id): FacultyUser,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Vec<Subject>>> {
    Ok(Json(Subject::for_faculty(id, &state.pool).await?))
}

async fn subject_students(
    FacultyUser(faculty_id): FacultyUser,
    Path(id): Path<i64>,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Vec<Student>>> {
    let subject = Subject::owned_by(id, faculty_id, &state.pool).await?;

    Ok(Json(Student::enrolled_in(subject.id, &state.pool).await?))
}

async fn subject_results(
    FacultyUser(faculty_id): FacultyUser,
    Path(id): Path<i64>,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Vec<ExamResult>>> {
    let subject = Subject::owned_by(id, faculty_id, &state.pool).await?;

    Ok(Json(ExamResult::for_subject(subject.id, &state.pool).await?))
}

async fn announcements(
    FacultyUser(id): FacultyUser,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Vec<Announcement>>> {
    Ok(Json(Announcement::for_faculty(id, &state.pool).await?))
}

async fn new_announcement(
    FacultyUser(faculty_id): FacultyUser,
    Extension(state): Extension<AppState>,
    Json(new_announcement): Json<NewAnnouncement>,
) -> SchoolResult<(StatusCode, Json<Announcement>)> {
    let subject = Subject::owned_by(new_announcement.subject_id, faculty_id, &state.pool).await?;
    let announcement = Announcement::create(
        subject.id,
        faculty_id,
        new_announcement.content.as_deref(),
        &state.pool,
    )
    .await?;
    tracing::info!(faculty = faculty_id, subject = subject.id, "posted announcement");

    Ok((StatusCode::CREATED, Json(announcement)))
}

async fn update_announcement(
    FacultyUser(faculty_id): FacultyUser,
    Path(id): Path<i64>,
    Extension(state): Extension<AppState>,
    Json(update): Json<AnnouncementUpdate>,
) -> SchoolResult<Json<Announcement>> {
    Ok(Json(
        Announcement::update_owned(id, faculty_id, update.content.as_deref(), &state.pool).await?,
    ))
}

async fn delete_announcement(
    FacultyUser(faculty_id): FacultyUser,
    Path(id): Path<i64>,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Value>> {
    Announcement::delete_owned(id, faculty_id, &state.pool).await?;

    Ok(message("Announcement deleted successfully"))
}

async fn new_comment(
    FacultyUser(faculty_id): FacultyUser,
    Extension(state): Extension<AppState>,
    Json(new_comment): Json<NewComment>,
) -> SchoolResult<(StatusCode, Json<Comment>)> {
    let announcement = Announcement::with_id(new_comment.announcement_id, &state.pool).await?;
    let comment = Comment::create(
        announcement.id,
        CommentAuthor::Faculty(faculty_id),
        new_comment.content.as_deref(),
        &state.pool,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceQuery {
    pub subject_id: i64,
    pub date: String,
}

async fn attendance(
    FacultyUser(faculty_id): FacultyUser,
    Query(query): Query<AttendanceQuery>,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Vec<Attendance>>> {
    let subject = Subject::owned_by(query.subject_id, faculty_id, &state.pool).await?;

    Ok(Json(
        Attendance::for_subject_on(subject.id, &query.date, &state.pool).await?,
    ))
}

async fn mark_attendance(
    FacultyUser(faculty_id): FacultyUser,
    Extension(state): Extension<AppState>,
    Json(sheet): Json<AttendanceSheet>,
) -> SchoolResult<Json<Vec<Attendance>>> {
    Subject::owned_by(sheet.subject_id, faculty_id, &state.pool).await?;
    let marked = Attendance::mark(&sheet, faculty_id, &state.pool).await?;
    tracing::info!(
        faculty = faculty_id,
        subject = sheet.subject_id,
        date = %sheet.date,
        students = marked.len(),
        "marked attendance"
    );

    Ok(Json(marked))
}

async fn record_result(
    FacultyUser(faculty_id): FacultyUser,
    Extension(state): Extension<AppState>,
    Json(form): Json<ResultForm>,
) -> SchoolResult<Json<ExamResult>> {
    let subject = Subject::owned_by(form.subject_id, faculty_id, &state.pool).await?;
    let student = Student::with_id(form.student_id, &state.pool).await?;
    if !student.is_enrolled_in(subject.id, &state.pool).await? {
        return Err(SchoolError::BadRequest(
            "Student is not enrolled in this subject".to_owned(),
        ));
    }

    Ok(Json(ExamResult::record(&form, &state.pool).await?))
}
