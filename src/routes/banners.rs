//! Homepage banners, uploaded as multipart forms.

use axum::extract::Multipart;
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Extension, Router};
use serde_json::Value;

use crate::auth::AdminUser;
use crate::error::{SchoolError, SchoolResult};
use crate::extract::{Json, Path};
use crate::file::BannerImage;
use crate::models::banner::{Banner, BannerFields};
use crate::state::AppState;

use super::message;

/// Mounted under `/api/admin`.
pub fn admin_routes() -> Router {
    Router::new()
        .route("/banners", get(banners).post(new_banner))
        .route("/banners/:id", put(update_banner).delete(delete_banner))
}

/// A banner form before its image has been written to disk.
#[derive(Default)]
struct BannerUpload {
    fields: BannerFields,
    image: Option<BannerImage>,
}

impl BannerUpload {
    async fn from_multipart(mut multipart: Multipart) -> SchoolResult<Self> {
        let mut upload = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let name = field.name().unwrap_or_default().to_owned();
            if name == "image" {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let content = field.bytes().await.map_err(bad_multipart)?;
                if !content.is_empty() {
                    upload.image = Some(BannerImage {
                        file_name,
                        content: content.to_vec(),
                    });
                }
                continue;
            }

            let value = field.text().await.map_err(bad_multipart)?;
            match name.as_str() {
                "title" => upload.fields.title = non_empty(value),
                "description" => upload.fields.description = non_empty(value),
                "isActive" => upload.fields.is_active = Some(parse_flag(&value)?),
                _ => tracing::debug!(field = %name, "ignoring unknown banner field"),
            }
        }

        Ok(upload)
    }
}

fn bad_multipart(error: axum::extract::multipart::MultipartError) -> SchoolError {
    SchoolError::BadRequest(format!("Invalid multipart form: {}", error))
}

fn non_empty(value: String) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_owned())
}

fn parse_flag(value: &str) -> SchoolResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        other => Err(SchoolError::BadRequest(format!(
            "isActive must be true or false, got {:?}",
            other
        ))),
    }
}

pub async fn active_banners(Extension(state): Extension<AppState>) -> SchoolResult<Json<Vec<Banner>>> {
    Ok(Json(Banner::active(&state.pool).await?))
}

async fn banners(
    _admin: AdminUser,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Vec<Banner>>> {
    Ok(Json(Banner::all(&state.pool).await?))
}

async fn new_banner(
    _admin: AdminUser,
    Extension(state): Extension<AppState>,
    multipart: Multipart,
) -> SchoolResult<(StatusCode, Json<Banner>)> {
    let BannerUpload { mut fields, image } = BannerUpload::from_multipart(multipart).await?;
    if fields.title.is_none() {
        return Err(SchoolError::BadRequest("title is required".to_owned()));
    }
    let image = image.ok_or_else(|| SchoolError::BadRequest("image is required".to_owned()))?;

    let image_url = image.save(&state.upload_dir).await?;
    fields.image_url = Some(image_url.clone());

    match Banner::create(fields, &state.pool).await {
        Ok(banner) => {
            tracing::info!(banner = banner.id, "created banner");
            Ok((StatusCode::CREATED, Json(banner)))
        }
        Err(error) => {
            BannerImage::remove(&state.upload_dir, &image_url).await;
            Err(error)
        }
    }
}

/// A new image replaces the old one, which is then removed from disk.
async fn update_banner(
    _admin: AdminUser,
    Path(id): Path<i64>,
    Extension(state): Extension<AppState>,
    multipart: Multipart,
) -> SchoolResult<Json<Banner>> {
    let BannerUpload { mut fields, image } = BannerUpload::from_multipart(multipart).await?;
    let existing = Banner::with_id(id, &state.pool).await?;

    let new_image_url = match image {
        Some(image) => Some(image.save(&state.upload_dir).await?),
        None => None,
    };
    fields.image_url = new_image_url.clone();

    let banner = match Banner::update(id, fields, &state.pool).await {
        Ok(banner) => banner,
        Err(error) => {
            if let Some(url) = &new_image_url {
                BannerImage::remove(&state.upload_dir, url).await;
            }
            return Err(error);
        }
    };

    if new_image_url.is_some() && existing.image_url != banner.image_url {
        BannerImage::remove(&state.upload_dir, &existing.image_url).await;
    }

    Ok(Json(banner))
}

async fn delete_banner(
    _admin: AdminUser,
    Path(id): Path<i64>,
    Extension(state): Extension<AppState>,
) -> SchoolResult<Json<Value>> {
    let banner = Banner::delete(id, &state.pool).await?;
    BannerImage::remove(&state.upload_dir, &banner.image_url).await;
    tracing::info!(banner = id, "deleted banner");

    Ok(message("Banner deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_flags_parse_loosely() {
        assert!(parse_flag("true").unwrap());
        assert!(parse_flag(" TRUE ").unwrap());
        assert!(parse_flag("1").unwrap());
        assert!(!parse_flag("false").unwrap());
        assert!(!parse_flag("0").unwrap());
        assert!(parse_flag("maybe").is_err());
    }

    #[test]
    fn blank_text_fields_are_absent() {
        assert_eq!(non_empty("  ".to_owned()), None);
        assert_eq!(non_empty(" Sports day ".to_owned()), Some("Sports day".to_owned()));
    }
}
