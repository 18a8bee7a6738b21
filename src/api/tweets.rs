//! Tweet endpoints
//!
//! Global and personalized feeds, per-user listings, replies, and the usual
//! owner-only mutations.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use super::dto::{TweetDto, TweetViewDto};
use super::pagination::{ApiResponse, Page, PageParams};
use crate::AppState;
use crate::auth::{CurrentUser, MaybeUser};
use crate::data::{Tweet, TweetFeedFilter, TweetView};
use crate::error::AppError;
use crate::service::TweetService;

/// Tweets are editable for this long after creation.
const EDIT_WINDOW_MINUTES: i64 = 15;

fn ensure_within_edit_window(created_at: DateTime<Utc>) -> Result<(), AppError> {
    if Utc::now() - created_at > Duration::minutes(EDIT_WINDOW_MINUTES) {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct TweetBody {
    pub content: String,
}

async fn owned_tweet(state: &AppState, tweet_id: &str, user_id: &str) -> Result<Tweet, AppError> {
    let tweet = state
        .db
        .get_tweet(tweet_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if tweet.owner_id != user_id {
        return Err(AppError::Forbidden);
    }
    Ok(tweet)
}

fn feed_page(views: &[TweetView], total: i64, page: i64, limit: i64) -> Page<TweetViewDto> {
    let items: Vec<TweetViewDto> = views.iter().map(TweetViewDto::from).collect();
    Page::new(items, total, page, limit)
}

/// POST /api/v1/tweets
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    axum::Json(body): axum::Json<TweetBody>,
) -> Result<impl IntoResponse, AppError> {
    let service = TweetService::new(state.db.clone());
    let tweet = service.create(&user.id, &body.content).await?;

    Ok(ApiResponse::created(TweetDto::from(&tweet), "tweet posted"))
}

/// POST /api/v1/tweets/:id/replies
pub async fn reply(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(tweet_id): Path<String>,
    axum::Json(body): axum::Json<TweetBody>,
) -> Result<impl IntoResponse, AppError> {
    let service = TweetService::new(state.db.clone());
    let tweet = service.reply(&user.id, &tweet_id, &body.content).await?;

    Ok(ApiResponse::created(TweetDto::from(&tweet), "reply posted"))
}

/// GET /api/v1/tweets
///
/// Global feed: top-level tweets, newest first, guest-visible.
pub async fn global_feed(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let (page, limit, offset) = params.clamp();

    let service = TweetService::new(state.db.clone());
    let (views, total) = service
        .feed_page(
            &TweetFeedFilter::Global,
            viewer.as_ref().map(|u| u.id.as_str()),
            limit,
            offset,
        )
        .await?;

    Ok(ApiResponse::ok(feed_page(&views, total, page, limit), "tweets"))
}

/// GET /api/v1/tweets/feed
///
/// Personalized feed: own tweets plus subscribed channels.
pub async fn personalized_feed(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let (page, limit, offset) = params.clamp();

    let service = TweetService::new(state.db.clone());
    let filter = TweetFeedFilter::Personalized {
        user_id: user.id.clone(),
    };
    let (views, total) = service
        .feed_page(&filter, Some(&user.id), limit, offset)
        .await?;

    Ok(ApiResponse::ok(feed_page(&views, total, page, limit), "feed"))
}

/// GET /api/v1/tweets/user/:userId
pub async fn by_user(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(user_id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let (page, limit, offset) = params.clamp();

    let service = TweetService::new(state.db.clone());
    let filter = TweetFeedFilter::ByOwner { owner_id: user_id };
    let (views, total) = service
        .feed_page(&filter, viewer.as_ref().map(|u| u.id.as_str()), limit, offset)
        .await?;

    Ok(ApiResponse::ok(feed_page(&views, total, page, limit), "tweets"))
}

/// GET /api/v1/tweets/:id
pub async fn get(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(tweet_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let service = TweetService::new(state.db.clone());
    let view = service
        .view(&tweet_id, viewer.as_ref().map(|u| u.id.as_str()))
        .await?;

    Ok(ApiResponse::ok(TweetViewDto::from(&view), "tweet"))
}

/// GET /api/v1/tweets/:id/replies
pub async fn replies(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(tweet_id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let (page, limit, offset) = params.clamp();

    // 404 for replies of a tweet that does not exist
    state
        .db
        .get_tweet(&tweet_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let service = TweetService::new(state.db.clone());
    let filter = TweetFeedFilter::RepliesTo { tweet_id };
    let (views, total) = service
        .feed_page(&filter, viewer.as_ref().map(|u| u.id.as_str()), limit, offset)
        .await?;

    Ok(ApiResponse::ok(feed_page(&views, total, page, limit), "replies"))
}

/// PATCH /api/v1/tweets/:id
///
/// Owner-only, and only within the edit window.
pub async fn edit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(tweet_id): Path<String>,
    axum::Json(body): axum::Json<TweetBody>,
) -> Result<impl IntoResponse, AppError> {
    let tweet = owned_tweet(&state, &tweet_id, &user.id).await?;
    ensure_within_edit_window(tweet.created_at)?;

    let service = TweetService::new(state.db.clone());
    service.edit(&tweet_id, &body.content).await?;

    let updated = state
        .db
        .get_tweet(&tweet_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::ok(TweetDto::from(&updated), "tweet updated"))
}

/// DELETE /api/v1/tweets/:id
///
/// Replies and likes stay behind.
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(tweet_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    owned_tweet(&state, &tweet_id, &user.id).await?;

    let service = TweetService::new(state.db.clone());
    service.delete(&tweet_id).await?;

    Ok(ApiResponse::ok((), "tweet deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_window() {
        assert!(ensure_within_edit_window(Utc::now()).is_ok());
        assert!(ensure_within_edit_window(Utc::now() - Duration::minutes(16)).is_err());
    }
}
