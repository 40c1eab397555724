//! Banner image files, for saving uploads and cleaning up replaced images.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{SchoolError, SchoolResult};

pub struct BannerImage {
    pub file_name: String,
    pub content: Vec<u8>,
}

impl BannerImage {
    const DIRECTORY: &'static str = "banners";
    const URL_PREFIX: &'static str = "/uploads/banners/";
    const EXTENSIONS: [&'static str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

    fn extension(file_name: &str) -> SchoolResult<String> {
        Path::new(file_name)
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase)
            .filter(|extension| Self::EXTENSIONS.contains(&extension.as_str()))
            .ok_or_else(|| {
                SchoolError::BadRequest(format!(
                    "image must be one of: {}",
                    Self::EXTENSIONS.join(", ")
                ))
            })
    }

    /// Where a stored banner URL lives on disk, if it is one of ours.
    fn path_for_url(upload_dir: &Path, image_url: &str) -> Option<PathBuf> {
        let file_name = image_url.strip_prefix(Self::URL_PREFIX)?;
        let file_name = Path::new(file_name).file_name()?;

        Some(upload_dir.join(Self::DIRECTORY).join(file_name))
    }

    /// Writes the image under a fresh name and returns the URL it is served from.
    pub async fn save(&self, upload_dir: &Path) -> SchoolResult<String> {
        if self.content.is_empty() {
            return Err(SchoolError::BadRequest("image is empty".to_owned()));
        }
        let extension = Self::extension(&self.file_name)?;
        let directory = upload_dir.join(Self::DIRECTORY);
        tokio::fs::create_dir_all(&directory).await?;

        let stored_name = format!("{}.{}", Uuid::new_v4(), extension);
        tokio::fs::write(directory.join(&stored_name), &self.content).await?;

        Ok(format!("{}{}", Self::URL_PREFIX, stored_name))
    }

    /// Removes a previously saved image. Failures are logged, not returned.
    pub async fn remove(upload_dir: &Path, image_url: &str) {
        let Some(path) = Self::path_for_url(upload_dir, image_url) else {
            tracing::warn!(image_url, "not removing banner image outside the upload directory");
            return;
        };

        if let Err(error) = tokio::fs::remove_file(&path).await {
            tracing::warn!(%error, path = %path.display(), "failed to remove old banner image");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_images_are_accepted() {
        assert_eq!(BannerImage::extension("sports-day.PNG").unwrap(), "png");
        assert_eq!(BannerImage::extension("photo.jpeg").unwrap(), "jpeg");
        assert!(BannerImage::extension("notes.pdf").is_err());
        assert!(BannerImage::extension("no-extension").is_err());
    }

    #[test]
    fn urls_map_back_into_the_upload_directory() {
        let dir = Path::new("uploads");

        assert_eq!(
            BannerImage::path_for_url(dir, "/uploads/banners/abc.png"),
            Some(PathBuf::from("uploads/banners/abc.png"))
        );
        assert_eq!(
            BannerImage::path_for_url(dir, "/uploads/banners/../../etc/passwd"),
            Some(PathBuf::from("uploads/banners/passwd"))
        );
        assert_eq!(BannerImage::path_for_url(dir, "https://example.com/a.png"), None);
    }

    #[tokio::test]
    async fn saved_images_can_be_removed() {
        let dir = std::env::temp_dir().join(format!("schoolhouse-test-{}", Uuid::new_v4()));
        let image = BannerImage {
            file_name: "banner.png".to_owned(),
            content: vec![0x89, b'P', b'N', b'G'],
        };

        let url = image.save(&dir).await.unwrap();
        let path = BannerImage::path_for_url(&dir, &url).unwrap();
        assert!(path.exists());

        BannerImage::remove(&dir, &url).await;
        assert!(!path.exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
