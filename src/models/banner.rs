use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::error::{SchoolError, SchoolResult};

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    /// Relative URL of the image, under `/uploads/banners/`
    pub image_url: String,
    /// Only active banners are shown publicly
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Banner fields gathered from a multipart form, already validated.
#[derive(Debug, Default)]
pub struct BannerFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub image_url: Option<String>,
}

const COLUMNS: &str = "id, title, description, image_url, is_active, created_at, updated_at";

impl Banner {
    pub async fn with_id(id: i64, pool: &PgPool) -> SchoolResult<Self> {
        sqlx::query_as::<_, Self>(&format!("SELECT {} FROM banner WHERE id = $1", COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| SchoolError::not_found("Banner"))
    }

    pub async fn all(pool: &PgPool) -> SchoolResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {} FROM banner ORDER BY created_at DESC",
            COLUMNS
        ))
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn active(pool: &PgPool) -> SchoolResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {} FROM banner WHERE is_active ORDER BY created_at DESC",
            COLUMNS
        ))
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn create(fields: BannerFields, pool: &PgPool) -> SchoolResult<Self> {
        let title = fields
            .title
            .ok_or_else(|| SchoolError::BadRequest("title is required".to_owned()))?;
        let image_url = fields
            .image_url
            .ok_or_else(|| SchoolError::BadRequest("image is required".to_owned()))?;

        sqlx::query_as::<_, Self>(&format!(
            "INSERT INTO banner (title, description, image_url, is_active)
             VALUES ($1, $2, $3, $4) RETURNING {}",
            COLUMNS
        ))
        .bind(title)
        .bind(fields.description)
        .bind(image_url)
        .bind(fields.is_active.unwrap_or(true))
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn update(id: i64, fields: BannerFields, pool: &PgPool) -> SchoolResult<Self> {
        sqlx::query_as::<_, Self>(&format!(
            "UPDATE banner SET
                 title = COALESCE($2, title),
                 description = COALESCE($3, description),
                 image_url = COALESCE($4, image_url),
                 is_active = COALESCE($5, is_active),
                 updated_at = now()
             WHERE id = $1 RETURNING {}",
            COLUMNS
        ))
        .bind(id)
        .bind(fields.title)
        .bind(fields.description)
        .bind(fields.image_url)
        .bind(fields.is_active)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| SchoolError::not_found("Banner"))
    }

    pub async fn delete(id: i64, pool: &PgPool) -> SchoolResult<Self> {
        sqlx::query_as::<_, Self>(&format!("DELETE FROM banner WHERE id = $1 RETURNING {}", COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| SchoolError::not_found("Banner"))
    }
}
