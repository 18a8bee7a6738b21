//! External provider proxy endpoints
//!
//! Thin handlers over the provider client; caching and reshaping live in
//! the provider module.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use super::pagination::ApiResponse;
use crate::AppState;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub query: String,
    pub page_token: Option<String>,
}

/// GET /api/v1/youtube/search
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let query = params.query.trim();
    if query.is_empty() {
        return Err(AppError::Validation("query is required".to_string()));
    }

    let page = state
        .youtube
        .search(query, params.page_token.as_deref())
        .await?;

    Ok(ApiResponse::ok(page, "search results"))
}

/// GET /api/v1/youtube/videos/:id
pub async fn video_details(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let details = state.youtube.video_details(&video_id).await?;
    Ok(ApiResponse::ok(details, "video details"))
}
