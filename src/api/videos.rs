//! Video endpoints
//!
//! Publishing, listing, playback, metadata updates, publish toggling, and
//! deletion. Mutations are owner-only.

use axum::{
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use super::dto::VideoDto;
use super::pagination::{ApiResponse, Page, PageParams};
use crate::AppState;
use crate::auth::{CurrentUser, MaybeUser};
use crate::data::Video;
use crate::error::AppError;
use crate::service::{UploadedFile, VideoService};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListVideosParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Text filter on title and description
    pub query: Option<String>,
    /// Restrict to one channel
    pub user_id: Option<String>,
}

struct PublishUpload {
    title: String,
    description: String,
    duration_seconds: f64,
    media: Option<UploadedFile>,
    thumbnail: Option<UploadedFile>,
}

async fn read_publish_upload(multipart: &mut Multipart) -> Result<PublishUpload, AppError> {
    let mut upload = PublishUpload {
        title: String::new(),
        description: String::new(),
        duration_seconds: 0.0,
        media: None,
        thumbnail: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => upload.title = read_text(field).await?,
            "description" => upload.description = read_text(field).await?,
            "durationSeconds" => {
                let raw = read_text(field).await?;
                upload.duration_seconds = raw.trim().parse().map_err(|_| {
                    AppError::Validation("durationSeconds must be a number".to_string())
                })?;
            }
            "video" => upload.media = Some(read_file(field).await?),
            "thumbnail" => upload.thumbnail = Some(read_file(field).await?),
            _ => {}
        }
    }

    Ok(upload)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("invalid field: {}", e)))
}

async fn read_file(field: axum::extract::multipart::Field<'_>) -> Result<UploadedFile, AppError> {
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::Validation(format!("upload failed: {}", e)))?
        .to_vec();
    Ok(UploadedFile { data, content_type })
}

/// Load a video and require the requester to own it.
async fn owned_video(state: &AppState, video_id: &str, user_id: &str) -> Result<Video, AppError> {
    let video = state
        .db
        .get_video(video_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if video.owner_id != user_id {
        return Err(AppError::Forbidden);
    }
    Ok(video)
}

/// POST /api/v1/videos
pub async fn publish(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let upload = read_publish_upload(&mut multipart).await?;

    let media = upload
        .media
        .ok_or_else(|| AppError::Validation("missing \"video\" field".to_string()))?;
    let thumbnail = upload
        .thumbnail
        .ok_or_else(|| AppError::Validation("missing \"thumbnail\" field".to_string()))?;

    let service = VideoService::new(state.db.clone(), state.storage.clone());
    let video = service
        .publish(
            &user.id,
            &upload.title,
            &upload.description,
            upload.duration_seconds,
            media,
            thumbnail,
        )
        .await?;

    Ok(ApiResponse::created(
        VideoDto::from(&video),
        "video published",
    ))
}

/// GET /api/v1/videos
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListVideosParams>,
) -> Result<impl IntoResponse, AppError> {
    let (page, limit, offset) = PageParams {
        page: params.page,
        limit: params.limit,
    }
    .clamp();
    let query = params.query.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let owner = params.user_id.as_deref();

    let videos = state
        .db
        .list_published_videos(query, owner, limit, offset)
        .await?;
    let total = state.db.count_published_videos(query, owner).await?;

    let items: Vec<VideoDto> = videos.iter().map(VideoDto::from).collect();
    Ok(ApiResponse::ok(Page::new(items, total, page, limit), "videos"))
}

/// GET /api/v1/videos/:id
///
/// Counts the view; records watch history when the requester is logged in.
pub async fn watch(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let service = VideoService::new(state.db.clone(), state.storage.clone());
    let video = service
        .watch(&video_id, viewer.as_ref().map(|u| u.id.as_str()))
        .await?;

    Ok(ApiResponse::ok(VideoDto::from(&video), "video"))
}

/// PATCH /api/v1/videos/:id
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(video_id): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let existing = owned_video(&state, &video_id, &user.id).await?;

    let upload = read_publish_upload(&mut multipart).await?;
    let title = if upload.title.trim().is_empty() {
        existing.title.clone()
    } else {
        upload.title
    };
    let description = if upload.description.trim().is_empty() {
        existing.description.clone()
    } else {
        upload.description
    };

    let service = VideoService::new(state.db.clone(), state.storage.clone());
    let video = service
        .update_metadata(&video_id, &title, &description, upload.thumbnail)
        .await?;

    Ok(ApiResponse::ok(VideoDto::from(&video), "video updated"))
}

/// PATCH /api/v1/videos/:id/toggle-publish
pub async fn toggle_publish(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    owned_video(&state, &video_id, &user.id).await?;

    let published = state.db.toggle_video_published(&video_id).await?;

    Ok(ApiResponse::ok(
        serde_json::json!({ "isPublished": published }),
        "publish state toggled",
    ))
}

/// DELETE /api/v1/videos/:id
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let video = owned_video(&state, &video_id, &user.id).await?;

    let service = VideoService::new(state.db.clone(), state.storage.clone());
    service.delete(&video).await?;

    Ok(ApiResponse::ok((), "video deleted"))
}
