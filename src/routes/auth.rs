//! Logging in, self-registration and password changes.

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Extension, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{hash_password, validate_new_password, verify_password, Principal, Role};
use crate::error::{SchoolError, SchoolResult};
use crate::extract::Json;
use crate::models::admin::Admin;
use crate::models::faculty::Faculty;
use crate::models::student::{NewStudent, Student};
use crate::state::AppState;
use crate::util::{required, string_or_number, validate_mobile_no};

pub fn routes() -> Router {
    Router::new()
        .route("/send-otp", post(send_otp))
        .route("/resend-otp", post(send_otp))
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/change-password", post(change_password))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpRequest {
    #[serde(default, deserialize_with = "string_or_number")]
    pub mobile_no: Option<String>,
}

/// Issues a one-time code for the number and echoes it back.
///
/// There is no SMS gateway, so the response is the only delivery channel.
async fn send_otp(
    Extension(state): Extension<AppState>,
    Json(request): Json<OtpRequest>,
) -> SchoolResult<Json<Value>> {
    let mobile_no = required("mobileNo", request.mobile_no.as_deref())?;
    validate_mobile_no(&mobile_no)?;

    let otp = state.otp.issue(&mobile_no);
    tracing::debug!(%mobile_no, %otp, "issued one-time code");

    Ok(Json(json!({
        "message": "OTP sent successfully",
        "otp": otp,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub role: Role,
    pub username: Option<String>,
    pub faculty_id: Option<String>,
    pub password: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub mobile_no: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub otp: Option<String>,
}

async fn login(
    Extension(state): Extension<AppState>,
    Json(request): Json<LoginRequest>,
) -> SchoolResult<Json<Value>> {
    let (principal, user) = match request.role {
        Role::Admin => login_admin(&request, &state).await?,
        Role::Faculty => login_faculty(&request, &state).await?,
        Role::Student => login_student(&request, &state).await?,
    };
    let token = state.tokens.issue(principal)?;
    tracing::info!(?principal, "logged in");

    Ok(Json(json!({ "token": token, "user": user })))
}

fn password_matches(given: Option<&str>, pass_hash: &str) -> bool {
    given.map_or(false, |password| verify_password(password, pass_hash))
}

async fn login_admin(request: &LoginRequest, state: &AppState) -> SchoolResult<(Principal, Value)> {
    let username = request.username.as_deref().map(str::trim).unwrap_or_default();
    let admin = Admin::with_username_opt(username, &state.pool)
        .await?
        .filter(|admin| password_matches(request.password.as_deref(), &admin.pass_hash))
        .ok_or_else(|| {
            tracing::warn!(username, "failed admin login");
            SchoolError::InvalidCredentials
        })?;

    let user = json!({
        "id": admin.id,
        "role": Role::Admin,
        "name": admin.username,
        "username": admin.username,
    });

    Ok((Principal::Admin(admin.id), user))
}

async fn login_faculty(request: &LoginRequest, state: &AppState) -> SchoolResult<(Principal, Value)> {
    let faculty_id = request.faculty_id.as_deref().map(str::trim).unwrap_or_default();
    let faculty = Faculty::with_faculty_id_opt(faculty_id, &state.pool)
        .await?
        .filter(|faculty| password_matches(request.password.as_deref(), &faculty.pass_hash))
        .ok_or_else(|| {
            tracing::warn!(faculty_id, "failed faculty login");
            SchoolError::InvalidCredentials
        })?;

    let principal = Principal::Faculty(faculty.id);
    let user = serde_json::to_value(&faculty)
        .map_err(|err| SchoolError::Server(format!("Failed to serialize faculty: {}", err)))?;

    Ok((principal, user))
}

async fn login_student(request: &LoginRequest, state: &AppState) -> SchoolResult<(Principal, Value)> {
    let mobile_no = required("mobileNo", request.mobile_no.as_deref())?;
    state.otp.consume(&mobile_no, request.otp.as_deref())?;

    let student = Student::with_mobile_no_opt(&mobile_no, &state.pool)
        .await?
        .ok_or_else(|| {
            tracing::warn!(%mobile_no, "login for unknown student");
            SchoolError::InvalidCredentials
        })?;
    if !student.approved {
        return Err(SchoolError::NotApproved);
    }

    let user = json!({
        "id": student.id,
        "role": Role::Student,
        "name": student.name,
        "class": student.class_name,
        "rollNo": student.roll_no,
        "mobileNo": student.mobile_no,
        "fatherName": student.father_name,
        "address": student.address,
    });

    Ok((Principal::Student(student.id), user))
}

#[derive(Deserialize)]
pub struct Registration {
    #[serde(flatten)]
    pub student: NewStudent,
    #[serde(default, deserialize_with = "string_or_number")]
    pub otp: Option<String>,
}

/// Self-registration. The student cannot log in until an admin approves them.
async fn register(
    Extension(state): Extension<AppState>,
    Json(registration): Json<Registration>,
) -> SchoolResult<(StatusCode, Json<Value>)> {
    let mobile_no = required("mobileNo", registration.student.mobile_no.as_deref())?;
    validate_mobile_no(&mobile_no)?;
    let otp = registration.otp.as_deref();
    state.otp.verify(&mobile_no, otp)?;

    let student = Student::create(registration.student, false, &state.pool).await?;
    // A concurrent registration for the same number has already failed on the unique mobile.
    state.otp.consume(&mobile_no, otp).ok();
    tracing::info!(student = student.id, class = %student.class_name, "student registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Registration successful. Awaiting admin approval.",
            "student": student,
        })),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub role: Role,
    /// The admin's username, the faculty member's `facultyId`, or the student's mobile number
    #[serde(alias = "username", alias = "facultyId", alias = "mobileNo")]
    #[serde(default, deserialize_with = "string_or_number")]
    pub identifier: Option<String>,
    pub new_password: Option<String>,
}

async fn change_password(
    principal: Principal,
    Extension(state): Extension<AppState>,
    Json(change): Json<PasswordChange>,
) -> SchoolResult<Json<Value>> {
    let identifier = required("identifier", change.identifier.as_deref())?;
    let new_password = required("newPassword", change.new_password.as_deref())?;
    validate_new_password(&new_password)?;

    ensure_may_change_password(principal, change.role, &identifier, &state).await?;

    let pass_hash = hash_password(&new_password)?;
    match change.role {
        Role::Admin => Admin::set_password(&identifier, &pass_hash, &state.pool).await?,
        Role::Faculty => Faculty::set_password(&identifier, &pass_hash, &state.pool).await?,
        Role::Student => Student::set_password(&identifier, &pass_hash, &state.pool).await?,
    }
    tracing::info!(?principal, role = %change.role, "password changed");

    Ok(super::message("Password changed successfully"))
}

/// Admins may change anyone's password, everyone else only their own.
async fn ensure_may_change_password(
    principal: Principal,
    role: Role,
    identifier: &str,
    state: &AppState,
) -> SchoolResult<()> {
    let own_account = match (principal, role) {
        (Principal::Admin(_), _) => return Ok(()),
        (Principal::Faculty(id), Role::Faculty) => {
            Faculty::with_id(id, &state.pool).await?.faculty_id == identifier
        }
        (Principal::Student(id), Role::Student) => {
            Student::with_id(id, &state.pool).await?.mobile_no.as_deref() == Some(identifier)
        }
        _ => false,
    };

    if own_account {
        Ok(())
    } else {
        tracing::warn!(?principal, %role, "refused to change another account's password");
        Err(SchoolError::Forbidden)
    }
}
