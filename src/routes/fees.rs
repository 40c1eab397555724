//! The class fee schedule and each student's monthly fee ledger.

use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Extension, Router};
use serde_json::Value;

use crate::auth::AdminUser;
use crate::error::SchoolResult;
use crate::extract::{Json, Path, Query};
use crate::models::fees::{ClassFee, ClassFeeForm};
use crate::models::ledger::{FeePayment, FeeStatement, FeeStatusUpdate};
use crate::models::student::Student;
use crate::state::AppState;
use crate::util::current_year;

use super::{message, ClassQuery, YearQuery};

/// Mounted under `/api/admin`.
pub fn admin_routes() -> Router {
    Router::new()
        .route("/fees", get(class_fees).post(new_class_fee))
        .route("/fees/:id", put(update_class_fee).delete(delete_class_fee))
        .route(
            "/students/:id/fee-status",
            get(student_fee_status).put(set_student_fee_status),
        )
}

async fn class_fees(
    _admin: AdminUser,
    Query(query): Query<ClassQuery>,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Vec<ClassFee>>> {
    Ok(Json(ClassFee::all(query.class_name.as_deref(), &state.pool).await?))
}

async fn new_class_fee(
    AdminUser(admin): AdminUser,
    Extension(state): Extension<AppState>,
    Json(form): Json<ClassFeeForm>,
) -> SchoolResult<(StatusCode, Json<ClassFee>)> {
    let fee = ClassFee::create(form, &state.pool).await?;
    tracing::info!(admin, fee = fee.id, class = %fee.class_name, amount = fee.amount, "created class fee");

    Ok((StatusCode::CREATED, Json(fee)))
}

async fn update_class_fee(
    _admin: AdminUser,
    Path(id): Path<i64>,
    Extension(state): Extension<AppState>,
    Json(form): Json<ClassFeeForm>,
) -> SchoolResult<Json<ClassFee>> {
    Ok(Json(ClassFee::update(id, form, &state.pool).await?))
}

async fn delete_class_fee(
    _admin: AdminUser,
    Path(id): Path<i64>,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Value>> {
    ClassFee::delete(id, &state.pool).await?;

    Ok(message("Fee deleted successfully"))
}

async fn student_fee_status(
    _admin: AdminUser,
    Path(id): Path<i64>,
    Query(query): Query<YearQuery>,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<FeeStatement>> {
    let student = Student::with_id(id, &state.pool).await?;
    let year = query.year.unwrap_or_else(current_year);

    Ok(Json(
        FeeStatement::for_student(student.id, &student.class_name, year, &state.pool).await?,
    ))
}

async fn set_student_fee_status(
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Extension(state): Extension<AppState>,
    Json(update): Json<FeeStatusUpdate>,
) -> SchoolResult<Json<FeePayment>> {
    let student = Student::with_id(id, &state.pool).await?;
    let payment = FeePayment::set_status(student.id, &update, &state.pool).await?;
    tracing::info!(
        admin,
        student = student.id,
        month = payment.month,
        year = payment.year,
        status = ?payment.status,
        "updated fee status"
    );

    Ok(Json(payment))
}
