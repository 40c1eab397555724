//! Authentication and authorization.
//!
//! A request's bearer token is decoded once into a [Principal]. Endpoints
//! declare who may call them by extracting one of the role-scoped wrappers
//! ([AdminUser], [FacultyUser], [StudentUser], [StaffUser]) or the bare
//! [Principal] when any logged-in caller will do.

use std::fmt;

use async_trait::async_trait;
use axum::extract::{Extension, FromRequest, RequestParts, TypedHeader};
use axum::headers::authorization::Bearer;
use axum::headers::Authorization;
use serde::{Deserialize, Serialize};

use crate::error::{SchoolError, SchoolResult};
use crate::state::AppState;

pub mod otp;
pub mod token;

const HASH_COST: u32 = 10;
pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Role {
    Admin,
    Faculty,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Faculty => "Faculty",
            Role::Student => "Student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        [Role::Admin, Role::Faculty, Role::Student]
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| format!("unknown role {}", name))
    }
}

/// The authenticated actor behind a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Principal {
    Admin(i64),
    Faculty(i64),
    Student(i64),
}

impl Principal {
    pub fn new(role: Role, id: i64) -> Self {
        match role {
            Role::Admin => Principal::Admin(id),
            Role::Faculty => Principal::Faculty(id),
            Role::Student => Principal::Student(id),
        }
    }

    pub fn id(&self) -> i64 {
        match *self {
            Principal::Admin(id) | Principal::Faculty(id) | Principal::Student(id) => id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Principal::Admin(_) => Role::Admin,
            Principal::Faculty(_) => Role::Faculty,
            Principal::Student(_) => Role::Student,
        }
    }

    pub fn ensure_one_of(&self, allowed: &[Role]) -> SchoolResult<()> {
        if allowed.contains(&self.role()) {
            Ok(())
        } else {
            tracing::debug!(principal = ?self, ?allowed, "role not allowed");
            Err(SchoolError::Forbidden)
        }
    }
}

#[async_trait]
impl<B> FromRequest<B> for Principal
where
    B: Send,
{
    type Rejection = SchoolError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request(req)
                .await
                .map_err(|_err| SchoolError::Unauthorized("Missing or malformed bearer token"))?;
        let Extension(state) = Extension::<AppState>::from_request(req)
            .await
            .map_err(|err| SchoolError::Server(format!("Application state missing: {}", err)))?;

        state
            .tokens
            .verify(bearer.token())
            .map(|claims| claims.principal())
    }
}

macro_rules! role_extractor {
    ($(#[$doc:meta])* $name:ident => $role:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug)]
        pub struct $name(pub i64);

        #[async_trait]
        impl<B> FromRequest<B> for $name
        where
            B: Send,
        {
            type Rejection = SchoolError;

            async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
                match Principal::from_request(req).await? {
                    Principal::$role(id) => Ok($name(id)),
                    other => other
                        .ensure_one_of(&[Role::$role])
                        .map(|()| $name(other.id())),
                }
            }
        }
    };
}

role_extractor!(
    /// An authenticated admin, holding the admin's id.
    AdminUser => Admin
);
role_extractor!(
    /// An authenticated faculty member, holding their database id.
    FacultyUser => Faculty
);
role_extractor!(
    /// An authenticated student, holding their database id.
    StudentUser => Student
);

/// An admin or a faculty member.
#[derive(Clone, Copy, Debug)]
pub struct StaffUser(pub Principal);

#[async_trait]
impl<B> FromRequest<B> for StaffUser
where
    B: Send,
{
    type Rejection = SchoolError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request(req).await?;
        principal.ensure_one_of(&[Role::Admin, Role::Faculty])?;

        Ok(StaffUser(principal))
    }
}

pub fn hash_password(password: &str) -> SchoolResult<String> {
    bcrypt::hash(password, HASH_COST)
        .map_err(|err| SchoolError::Server(format!("Failed to hash password: {}", err)))
}

/// A hash that fails to parse counts as a mismatch.
pub fn verify_password(password: &str, pass_hash: &str) -> bool {
    bcrypt::verify(password, pass_hash).unwrap_or(false)
}

pub fn validate_new_password(password: &str) -> SchoolResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        Err(SchoolError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!(Role::try_from("admin".to_owned()), Ok(Role::Admin));
        assert_eq!(Role::try_from("FACULTY".to_owned()), Ok(Role::Faculty));
        assert_eq!(Role::try_from(" Student ".to_owned()), Ok(Role::Student));
        assert!(Role::try_from("janitor".to_owned()).is_err());

        let role: Role = serde_json::from_str("\"sTuDeNt\"").unwrap();
        assert_eq!(role, Role::Student);
        assert_eq!(serde_json::to_string(&Role::Faculty).unwrap(), "\"Faculty\"");
    }

    #[test]
    fn allow_lists_gate_roles() {
        let faculty = Principal::Faculty(4);
        assert!(faculty.ensure_one_of(&[Role::Admin, Role::Faculty]).is_ok());
        assert!(matches!(
            faculty.ensure_one_of(&[Role::Admin]),
            Err(SchoolError::Forbidden)
        ));
        assert_eq!(Principal::new(Role::Student, 9), Principal::Student(9));
    }

    #[test]
    fn passwords_round_trip_through_bcrypt() {
        let hash = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
        assert!(!verify_password("hunter22", "not-a-bcrypt-hash"));
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(validate_new_password("12345").is_err());
        assert!(validate_new_password("123456").is_ok());
    }
}
