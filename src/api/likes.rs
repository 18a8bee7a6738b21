//! Like endpoints
//!
//! One toggle route per target kind plus the requester's liked-video list.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Serialize;

use super::dto::VideoDto;
use super::pagination::{ApiResponse, Page, PageParams};
use crate::AppState;
use crate::auth::CurrentUser;
use crate::data::LikeTargetKind;
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResult {
    pub liked: bool,
    pub like_count: i64,
}

async fn ensure_target_exists(
    state: &AppState,
    kind: LikeTargetKind,
    target_id: &str,
) -> Result<(), AppError> {
    let exists = match kind {
        LikeTargetKind::Video => state.db.get_video(target_id).await?.is_some(),
        LikeTargetKind::Comment => state.db.get_comment(target_id).await?.is_some(),
        LikeTargetKind::Tweet => state.db.get_tweet(target_id).await?.is_some(),
    };
    if !exists {
        return Err(AppError::NotFound);
    }
    Ok(())
}

async fn toggle(
    state: &AppState,
    user_id: &str,
    kind: LikeTargetKind,
    target_id: &str,
) -> Result<ToggleResult, AppError> {
    ensure_target_exists(state, kind, target_id).await?;

    let liked = state.db.toggle_like(user_id, kind, target_id).await?;
    let like_count = state.db.count_likes(kind, target_id).await?;

    Ok(ToggleResult { liked, like_count })
}

/// POST /api/v1/likes/toggle/v/:id
pub async fn toggle_video(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let result = toggle(&state, &user.id, LikeTargetKind::Video, &video_id).await?;
    Ok(ApiResponse::ok(result, "like toggled"))
}

/// POST /api/v1/likes/toggle/c/:id
pub async fn toggle_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(comment_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let result = toggle(&state, &user.id, LikeTargetKind::Comment, &comment_id).await?;
    Ok(ApiResponse::ok(result, "like toggled"))
}

/// POST /api/v1/likes/toggle/t/:id
pub async fn toggle_tweet(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(tweet_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let result = toggle(&state, &user.id, LikeTargetKind::Tweet, &tweet_id).await?;
    Ok(ApiResponse::ok(result, "like toggled"))
}

/// GET /api/v1/likes/videos
///
/// Published videos the requester has liked, most recently liked first.
pub async fn liked_videos(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let (page, limit, offset) = params.clamp();

    let videos = state.db.list_liked_videos(&user.id, limit, offset).await?;
    let total = state.db.count_liked_videos(&user.id).await?;

    let items: Vec<VideoDto> = videos.iter().map(VideoDto::from).collect();
    Ok(ApiResponse::ok(
        Page::new(items, total, page, limit),
        "liked videos",
    ))
}
