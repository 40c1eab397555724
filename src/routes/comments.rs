use axum::routing::{delete, get};
use axum::{Extension, Router};
use serde_json::Value;

use crate::auth::Principal;
use crate::error::SchoolResult;
use crate::extract::{Json, Path};
use crate::models::announcement::Announcement;
use crate::models::comment::Comment;
use crate::state::AppState;

use super::message;

pub fn routes() -> Router {
    Router::new()
        .route("/api/announcements/:id/comments", get(comments))
        .route("/api/comments/:id", delete(delete_comment))
}

async fn comments(
    _principal: Principal,
    Path(id): Path<i64>,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Vec<Comment>>> {
    let announcement = Announcement::with_id(id, &state.pool).await?;

    Ok(Json(Comment::for_announcement(announcement.id, &state.pool).await?))
}

async fn delete_comment(
    principal: Principal,
    Path(id): Path<i64>,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Value>> {
    Comment::delete_as(id, principal, &state.pool).await?;

    Ok(message("Comment deleted successfully"))
}
