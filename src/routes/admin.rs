//! Admin management of students and teachers.
//!
//! Subjects, fees and banners are administered from their own modules and
//! merged in here.

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Router};
use serde_json::Value;

use crate::auth::AdminUser;
use crate::error::SchoolResult;
use crate::extract::{Json, Path, Query};
use crate::models::faculty::{Faculty, FacultyUpdate, NewFaculty};
use crate::models::student::{NewStudent, Student, StudentDetails, StudentFilter, StudentUpdate};
use crate::state::AppState;

use super::{banners, fees, message, subjects};

pub fn routes() -> Router {
    Router::new()
        .route("/students", get(students).post(new_student))
        .route("/pending-students", get(pending_students))
        .route(
            "/students/:id",
            get(student).put(update_student).delete(delete_student),
        )
        .route("/students/approve/:id", post(approve_student))
        .route("/students/:id/approve", post(approve_student))
        .route("/students/:id/disapprove", post(disapprove_student))
        .route("/teachers", get(teachers).post(new_teacher))
        .route(
            "/teachers/:id",
            get(teacher).put(update_teacher).delete(delete_teacher),
        )
        .merge(subjects::admin_routes())
        .merge(fees::admin_routes())
        .merge(banners::admin_routes())
}

async fn students(
    _admin: AdminUser,
    Query(filter): Query<StudentFilter>,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Vec<Student>>> {
    Ok(Json(Student::all(&filter, &state.pool).await?))
}

async fn pending_students(
    _admin: AdminUser,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Vec<Student>>> {
    Ok(Json(Student::pending(&state.pool).await?))
}

async fn student(
    _admin: AdminUser,
    Path(id): Path<i64>,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<StudentDetails>> {
    let student = Student::with_id(id, &state.pool).await?;

    Ok(Json(student.details(&state.pool).await?))
}

/// Students added by an admin are approved straight away.
async fn new_student(
    AdminUser(admin): AdminUser,
    Extension(state): Extension<AppState>,
    Json(new_student): Json<NewStudent>,
) -> SchoolResult<(StatusCode, Json<Student>)> {
    let student = Student::create(new_student, true, &state.pool).await?;
    tracing::info!(admin, student = student.id, "admin created student");

    Ok((StatusCode::CREATED, Json(student)))
}

async fn update_student(
    _admin: AdminUser,
    Path(id): Path<i64>,
    Extension(state): Extension<AppState>,
    Json(update): Json<StudentUpdate>,
) -> SchoolResult<Json<Student>> {
    Ok(Json(Student::update(id, update, &state.pool).await?))
}

async fn delete_student(
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Value>> {
    Student::delete(id, &state.pool).await?;
    tracing::info!(admin, student = id, "deleted student");

    Ok(message("Student deleted successfully"))
}

async fn approve_student(
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Student>> {
    let student = Student::approve(id, &state.pool).await?;
    tracing::info!(admin, student = id, "approved student");

    Ok(Json(student))
}

/// Rejecting a registration removes it, so the number can register again.
async fn disapprove_student(
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Value>> {
    Student::delete(id, &state.pool).await?;
    tracing::info!(admin, student = id, "rejected student registration");

    Ok(message("Student registration rejected"))
}

async fn teachers(
    _admin: AdminUser,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Vec<Faculty>>> {
    Ok(Json(Faculty::all(&state.pool).await?))
}

async fn teacher(
    _admin: AdminUser,
    Path(id): Path<i64>,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Faculty>> {
    Ok(Json(Faculty::with_id(id, &state.pool).await?))
}

async fn new_teacher(
    AdminUser(admin): AdminUser,
    Extension(state): Extension<AppState>,
    Json(new_faculty): Json<NewFaculty>,
) -> SchoolResult<(StatusCode, Json<Faculty>)> {
    let faculty = Faculty::create(new_faculty, &state.pool).await?;
    tracing::info!(admin, faculty = faculty.id, "created teacher");

    Ok((StatusCode::CREATED, Json(faculty)))
}

async fn update_teacher(
    _admin: AdminUser,
    Path(id): Path<i64>,
    Extension(state): Extension<AppState>,
    Json(update): Json<FacultyUpdate>,
) -> SchoolResult<Json<Faculty>> {
    Ok(Json(Faculty::update(id, update, &state.pool).await?))
}

async fn delete_teacher(
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Value>> {
    Faculty::delete(id, &state.pool).await?;
    tracing::info!(admin, faculty = id, "deleted teacher");

    Ok(message("Teacher deleted successfully"))
}
