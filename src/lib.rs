//! The backend for a school's students, faculty and administrators.
//!
//! The API is a set of JSON endpoints served by [axum], documented in
//! [routes]. Persistent data lives in PostgreSQL and is accessed through the
//! [models]. Requests are authenticated with bearer tokens, see [auth].

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod file;
pub mod models;
pub mod routes;
pub mod state;
pub mod util;
