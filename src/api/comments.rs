//! Comment endpoints
//!
//! Posting, editing within the window, deletion, and the hybrid feed that
//! mixes local comments with provider comments for external identifiers.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use super::dto::CommentDto;
use super::pagination::{ApiResponse, PageParams};
use crate::AppState;
use crate::auth::{CurrentUser, MaybeUser};
use crate::data::Comment;
use crate::error::AppError;
use crate::service::CommentService;

/// Comments are editable for this long after creation.
const EDIT_WINDOW_MINUTES: i64 = 15;

fn ensure_within_edit_window(created_at: DateTime<Utc>) -> Result<(), AppError> {
    if Utc::now() - created_at > Duration::minutes(EDIT_WINDOW_MINUTES) {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CommentBody {
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentFeedParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Opaque provider page token for the external side
    pub page_token: Option<String>,
}

async fn owned_comment(
    state: &AppState,
    comment_id: &str,
    user_id: &str,
) -> Result<Comment, AppError> {
    let comment = state
        .db
        .get_comment(comment_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if comment.owner_id != user_id {
        return Err(AppError::Forbidden);
    }
    Ok(comment)
}

/// GET /api/v1/comments/:videoId
///
/// `videoId` is either an internal id or an external provider id; the shape
/// of the identifier decides which sides of the feed are fetched.
pub async fn feed(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(video_id): Path<String>,
    Query(params): Query<CommentFeedParams>,
) -> Result<impl IntoResponse, AppError> {
    let (_, limit, offset) = PageParams {
        page: params.page,
        limit: params.limit,
    }
    .clamp();

    let service = CommentService::new(state.db.clone(), state.youtube.clone());
    let feed = service
        .feed(
            &video_id,
            viewer.as_ref().map(|u| u.id.as_str()),
            limit,
            offset,
            params.page_token.as_deref(),
        )
        .await?;

    Ok(ApiResponse::ok(feed, "comments"))
}

/// POST /api/v1/comments/:videoId
pub async fn post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(video_id): Path<String>,
    axum::Json(body): axum::Json<CommentBody>,
) -> Result<impl IntoResponse, AppError> {
    let service = CommentService::new(state.db.clone(), state.youtube.clone());
    let comment = service.post(&user.id, &video_id, &body.content).await?;

    Ok(ApiResponse::created(
        CommentDto::from(&comment),
        "comment posted",
    ))
}

/// PATCH /api/v1/comments/:id
///
/// Owner-only, and only within the edit window.
pub async fn edit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(comment_id): Path<String>,
    axum::Json(body): axum::Json<CommentBody>,
) -> Result<impl IntoResponse, AppError> {
    let comment = owned_comment(&state, &comment_id, &user.id).await?;
    ensure_within_edit_window(comment.created_at)?;

    let content = body.content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("comment content is required".to_string()));
    }

    state.db.update_comment_content(&comment_id, content).await?;

    let updated = state
        .db
        .get_comment(&comment_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::ok(CommentDto::from(&updated), "comment updated"))
}

/// DELETE /api/v1/comments/:id
///
/// Owner or admin. Likes on the comment go with it.
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(comment_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let comment = state
        .db
        .get_comment(&comment_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if comment.owner_id != user.id && !user.is_admin() {
        return Err(AppError::Forbidden);
    }

    state.db.delete_comment(&comment_id).await?;

    Ok(ApiResponse::ok((), "comment deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_window() {
        assert!(ensure_within_edit_window(Utc::now()).is_ok());
        assert!(ensure_within_edit_window(Utc::now() - Duration::minutes(14)).is_ok());
        assert!(ensure_within_edit_window(Utc::now() - Duration::minutes(16)).is_err());
    }
}
