use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Extension, Router};
use serde_json::Value;
use sqlx::PgPool;

use crate::auth::{AdminUser, Principal, StaffUser};
use crate::error::SchoolResult;
use crate::extract::{Json, Path, Query};
use crate::models::faculty::Faculty;
use crate::models::student::Student;
use crate::models::subject::{Subject, SubjectDetails, SubjectForm, TeacherChange};
use crate::state::AppState;

use super::{message, ClassQuery};

/// Readable by anyone logged in, mounted at `/api/subjects`.
pub fn routes() -> Router {
    Router::new()
        .route("/", get(subjects))
        .route("/:id", get(subject))
        .route("/:id/students", get(subject_students))
}

/// Mounted under `/api/admin`.
pub fn admin_routes() -> Router {
    Router::new()
        .route("/subjects", get(admin_subjects).post(new_subject))
        .route("/subjects/:id", put(update_subject).delete(delete_subject))
}

async fn subjects(
    _principal: Principal,
    Query(query): Query<ClassQuery>,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Vec<Subject>>> {
    Ok(Json(Subject::all(query.class_name.as_deref(), &state.pool).await?))
}

async fn subject(
    _principal: Principal,
    Path(id): Path<i64>,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<SubjectDetails>> {
    let subject = Subject::with_id(id, &state.pool).await?;

    Ok(Json(subject.details(&state.pool).await?))
}

/// Admins see any subject's roster, faculty only their own subjects'.
async fn subject_students(
    StaffUser(staff): StaffUser,
    Path(id): Path<i64>,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Vec<Student>>> {
    let subject = match staff {
        Principal::Faculty(faculty_id) => Subject::owned_by(id, faculty_id, &state.pool).await?,
        _ => Subject::with_id(id, &state.pool).await?,
    };

    Ok(Json(Student::enrolled_in(subject.id, &state.pool).await?))
}

async fn admin_subjects(
    _admin: AdminUser,
    Query(query): Query<ClassQuery>,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Vec<Subject>>> {
    Ok(Json(Subject::all(query.class_name.as_deref(), &state.pool).await?))
}

/// Resolves `teacherName` to a faculty member. A blank name unassigns the teacher.
async fn teacher_change(form: &SubjectForm, pool: &PgPool) -> SchoolResult<TeacherChange> {
    match form.teacher_name.as_deref().map(str::trim) {
        None => Ok(TeacherChange::Keep),
        Some("") => Ok(TeacherChange::Unassign),
        Some(name) => Faculty::id_for_name(name, pool)
            .await
            .map(TeacherChange::Assign),
    }
}

async fn new_subject(
    AdminUser(admin): AdminUser,
    Extension(state): Extension<AppState>,
    Json(form): Json<SubjectForm>,
) -> SchoolResult<(StatusCode, Json<Subject>)> {
    let teacher = teacher_change(&form, &state.pool).await?;
    let subject = Subject::create(&form, teacher, &state.pool).await?;
    tracing::info!(admin, subject = subject.id, code = %subject.code, "created subject");

    Ok((StatusCode::CREATED, Json(subject)))
}

async fn update_subject(
    _admin: AdminUser,
    Path(id): Path<i64>,
    Extension(state): Extension<AppState>,
    Json(form): Json<SubjectForm>,
) -> SchoolResult<Json<Subject>> {
    let teacher = teacher_change(&form, &state.pool).await?;

    Ok(Json(Subject::update(id, &form, teacher, &state.pool).await?))
}

async fn delete_subject(
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Value>> {
    Subject::delete(id, &state.pool).await?;
    tracing::info!(admin, subject = id, "deleted subject");

    Ok(message("Subject deleted successfully"))
}
