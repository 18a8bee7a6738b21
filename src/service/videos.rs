//! Video service
//!
//! Publishing, playback bookkeeping, and teardown. Coordinates the database
//! with media storage so handlers never touch either directly for writes.

use std::sync::Arc;

use crate::data::{Database, EntityId, Video};
use crate::error::AppError;
use crate::storage::MediaStorage;

pub const MAX_VIDEO_UPLOAD_BYTES: usize = 200 * 1024 * 1024;
pub const MAX_IMAGE_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// An uploaded file part, already buffered.
pub struct UploadedFile {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Video service
pub struct VideoService {
    db: Arc<Database>,
    storage: Arc<MediaStorage>,
}

impl VideoService {
    pub fn new(db: Arc<Database>, storage: Arc<MediaStorage>) -> Self {
        Self { db, storage }
    }

    /// Publish a new video: upload media and thumbnail, then persist.
    ///
    /// # Errors
    /// `Validation` on empty title or oversized files; `Storage` when an
    /// upload fails. A failed insert after the uploads leaves the objects
    /// orphaned; they are unreferenced and harmless.
    pub async fn publish(
        &self,
        owner_id: &str,
        title: &str,
        description: &str,
        duration_seconds: f64,
        media: UploadedFile,
        thumbnail: UploadedFile,
    ) -> Result<Video, AppError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("video title is required".to_string()));
        }
        if media.data.is_empty() {
            return Err(AppError::Validation("video file is required".to_string()));
        }
        if media.data.len() > MAX_VIDEO_UPLOAD_BYTES {
            return Err(AppError::Validation("video file is too large".to_string()));
        }
        if thumbnail.data.is_empty() {
            return Err(AppError::Validation("thumbnail is required".to_string()));
        }
        if thumbnail.data.len() > MAX_IMAGE_UPLOAD_BYTES {
            return Err(AppError::Validation("thumbnail is too large".to_string()));
        }

        let id = EntityId::new().0;
        let media_url = self
            .storage
            .upload_video(&id, media.data, &media.content_type)
            .await?;
        let thumbnail_url = self
            .storage
            .upload_thumbnail(&id, thumbnail.data, &thumbnail.content_type)
            .await?;

        let now = chrono::Utc::now();
        let video = Video {
            id,
            owner_id: owner_id.to_string(),
            title: title.to_string(),
            description: description.trim().to_string(),
            media_url,
            thumbnail_url,
            duration_seconds,
            view_count: 0,
            is_published: true,
            created_at: now,
            updated_at: now,
        };
        self.db.insert_video(&video).await?;

        tracing::info!(video_id = %video.id, owner_id = %owner_id, "video published");

        Ok(video)
    }

    /// Fetch a video for playback, counting the view and recording watch
    /// history for an authenticated viewer.
    ///
    /// Unpublished videos are `NotFound` for everyone but their owner.
    pub async fn watch(
        &self,
        video_id: &str,
        viewer_id: Option<&str>,
    ) -> Result<Video, AppError> {
        let mut video = self.db.get_video(video_id).await?.ok_or(AppError::NotFound)?;

        if !video.is_published && viewer_id != Some(video.owner_id.as_str()) {
            return Err(AppError::NotFound);
        }

        video.view_count = self.db.increment_view_count(video_id).await?;

        if let Some(viewer) = viewer_id {
            self.db.record_watch(viewer, video_id).await?;
        }

        Ok(video)
    }

    /// Update title, description, and optionally the thumbnail.
    ///
    /// A replaced thumbnail is deleted from storage after the database
    /// commit; a failed delete only logs.
    pub async fn update_metadata(
        &self,
        video_id: &str,
        title: &str,
        description: &str,
        thumbnail: Option<UploadedFile>,
    ) -> Result<Video, AppError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("video title is required".to_string()));
        }

        let thumbnail_url = match thumbnail {
            Some(file) => {
                if file.data.len() > MAX_IMAGE_UPLOAD_BYTES {
                    return Err(AppError::Validation("thumbnail is too large".to_string()));
                }
                Some(
                    self.storage
                        .upload_thumbnail(video_id, file.data, &file.content_type)
                        .await?,
                )
            }
            None => None,
        };

        let previous = self
            .db
            .update_video_metadata(video_id, title, description.trim(), thumbnail_url.as_deref())
            .await?;

        if let Some(old_url) = previous {
            if Some(old_url.as_str()) != thumbnail_url.as_deref() {
                if let Err(e) = self.storage.delete_by_url(&old_url).await {
                    tracing::warn!(url = %old_url, error = %e, "stale thumbnail not deleted");
                }
            }
        }

        self.db.get_video(video_id).await?.ok_or(AppError::NotFound)
    }

    /// Delete a video with everything scoped to it, then its media files.
    ///
    /// The database cascade commits first; storage deletes are best-effort.
    pub async fn delete(&self, video: &Video) -> Result<(), AppError> {
        self.db.delete_video_cascade(&video.id).await?;

        for url in [&video.media_url, &video.thumbnail_url] {
            if let Err(e) = self.storage.delete_by_url(url).await {
                tracing::warn!(url = %url, error = %e, "media not deleted");
            }
        }

        tracing::info!(video_id = %video.id, "video deleted");

        Ok(())
    }
}
