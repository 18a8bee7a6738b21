//! Channel dashboard endpoints
//!
//! Aggregate statistics and the owner's full video list, unpublished
//! entries included.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
};

use super::dto::VideoDto;
use super::pagination::{ApiResponse, Page, PageParams};
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;

/// GET /api/v1/dashboard/stats
pub async fn stats(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let stats = state.db.channel_stats(&user.id).await?;
    Ok(ApiResponse::ok(stats, "channel stats"))
}

/// GET /api/v1/dashboard/videos
pub async fn videos(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let (page, limit, offset) = params.clamp();

    let videos = state
        .db
        .list_videos_by_owner(&user.id, true, limit, offset)
        .await?;
    let total = state.db.count_videos_by_owner(&user.id, true).await?;

    let items: Vec<VideoDto> = videos.iter().map(VideoDto::from).collect();
    Ok(ApiResponse::ok(
        Page::new(items, total, page, limit),
        "channel videos",
    ))
}
