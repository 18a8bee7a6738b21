//! Media storage on S3-compatible object storage
//!
//! Handles upload, delete, and URL generation for video files, thumbnails,
//! avatars, and cover images. Files are served via a public CDN domain.

use aws_sdk_s3::Client as S3Client;

use crate::config::StorageConfig;
use crate::error::AppError;
use crate::metrics::MEDIA_UPLOADS_TOTAL;

/// Media storage service
///
/// Uploads media to an S3-compatible bucket and returns public URLs.
pub struct MediaStorage {
    client: S3Client,
    bucket: String,
    /// Public URL base, e.g. "https://media.example.com"
    public_url: String,
}

impl MediaStorage {
    /// Create a new media storage client from configuration.
    pub fn new(config: &StorageConfig) -> Self {
        use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "vidnest-media",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("auto"))
            .endpoint_url(&config.endpoint)
            .credentials_provider(credentials)
            .build();

        Self {
            client: S3Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            public_url: config.public_url.trim_end_matches('/').to_string(),
        }
    }

    /// Upload a file and return its public URL.
    ///
    /// # Arguments
    /// * `key` - Object key (path) for the file
    /// * `data` - File contents
    /// * `content_type` - MIME type
    pub async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, AppError> {
        use aws_sdk_s3::primitives::ByteStream;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .cache_control("public, max-age=31536000") // 1 year
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("upload failed: {}", e)))?;

        Ok(self.get_public_url(key))
    }

    /// Upload a video file under the videos/ prefix.
    ///
    /// # Returns
    /// Public URL of the uploaded file
    pub async fn upload_video(
        &self,
        id: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, AppError> {
        let ext = match content_type {
            "video/mp4" => "mp4",
            "video/webm" => "webm",
            "video/quicktime" => "mov",
            _ => "bin",
        };

        let key = format!("videos/{}.{}", id, ext);
        let url = self.upload(&key, data, content_type).await?;
        MEDIA_UPLOADS_TOTAL.with_label_values(&["video"]).inc();
        Ok(url)
    }

    /// Upload a thumbnail image under the thumbnails/ prefix.
    pub async fn upload_thumbnail(
        &self,
        id: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, AppError> {
        let key = format!("thumbnails/{}.{}", id, image_extension(content_type));
        let url = self.upload(&key, data, content_type).await?;
        MEDIA_UPLOADS_TOTAL.with_label_values(&["thumbnail"]).inc();
        Ok(url)
    }

    /// Upload an avatar image under the avatars/ prefix.
    pub async fn upload_avatar(
        &self,
        id: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, AppError> {
        let key = format!("avatars/{}.{}", id, image_extension(content_type));
        let url = self.upload(&key, data, content_type).await?;
        MEDIA_UPLOADS_TOTAL.with_label_values(&["avatar"]).inc();
        Ok(url)
    }

    /// Upload a channel cover image under the covers/ prefix.
    pub async fn upload_cover(
        &self,
        id: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, AppError> {
        let key = format!("covers/{}.{}", id, image_extension(content_type));
        let url = self.upload(&key, data, content_type).await?;
        MEDIA_UPLOADS_TOTAL.with_label_values(&["cover"]).inc();
        Ok(url)
    }

    /// Delete an object given its public URL.
    ///
    /// URLs outside our public domain are ignored; replacing an image that
    /// was never uploaded must not fail the request.
    pub async fn delete_by_url(&self, url: &str) -> Result<(), AppError> {
        let prefix = format!("{}/", self.public_url);
        let Some(key) = url.strip_prefix(&prefix) else {
            tracing::warn!(url = %url, "skipping delete of non-managed media URL");
            return Ok(());
        };

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("delete failed: {}", e)))?;

        Ok(())
    }

    /// Public URL for an object key.
    pub fn get_public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }
}

fn image_extension(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_extensions() {
        assert_eq!(image_extension("image/png"), "png");
        assert_eq!(image_extension("image/jpeg"), "jpg");
        assert_eq!(image_extension("application/octet-stream"), "bin");
    }
}
