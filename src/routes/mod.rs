//! All routes for the API.
//!
//! Every endpoint lives under `/api`, grouped by who may call it:
//!
//! - `/api/auth/*` is open, apart from changing a password
//! - `/api/admin/*` requires an admin token
//! - `/api/faculty/*` requires a faculty token
//! - `/api/students/*` requires a student token
//! - `/api/subjects/*` and the comment routes accept any valid token
//! - `/api/banners` is public
//!
//! Uploaded banner images are served from `/uploads`.

pub mod admin;
pub mod auth;
pub mod banners;
pub mod comments;
pub mod faculty;
pub mod fees;
pub mod students;
pub mod subjects;

use axum::handler::Handler;
use axum::http::{StatusCode, Uri};
use axum::routing::{get, get_service};
use axum::{Extension, Router};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::error::SchoolError;
use crate::extract::Json;
use crate::state::AppState;

/// Builds the whole application around the shared state.
pub fn app(state: AppState) -> Router {
    let uploads = get_service(ServeDir::new(state.upload_dir.as_path())).handle_error(
        |error: std::io::Error| async move {
            tracing::error!(%error, "failed to serve upload");
            (StatusCode::INTERNAL_SERVER_ERROR, "server error")
        },
    );
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/auth", auth::routes())
        .nest("/api/admin", admin::routes())
        .nest("/api/faculty", faculty::routes())
        .nest("/api/students", students::routes())
        .nest("/api/subjects", subjects::routes())
        .merge(comments::routes())
        .route("/api/banners", get(banners::active_banners))
        .nest("/uploads", uploads)
        .fallback(route_not_found.into_service())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(Extension(state))
}

async fn route_not_found(uri: Uri) -> SchoolError {
    SchoolError::NotFound(format!("No route for {}", uri.path()))
}

/// The `?year=` query accepted by the fee views.
#[derive(Deserialize)]
pub struct YearQuery {
    pub year: Option<i32>,
}

/// The `?className=` query accepted by several listings.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassQuery {
    #[serde(alias = "class")]
    pub class_name: Option<String>,
}

/// A bare `{message}` acknowledgement.
pub fn message(text: &str) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": text }))
}
