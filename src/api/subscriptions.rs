//! Subscription endpoints

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Serialize;

use super::dto::UserDto;
use super::pagination::{ApiResponse, Page, PageParams};
use crate::AppState;
use crate::auth::CurrentUser;
use crate::data::User;
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResult {
    pub subscribed: bool,
    pub subscriber_count: i64,
}

/// A listed channel annotated with its subscriber count.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelListItem {
    #[serde(flatten)]
    pub user: UserDto,
    pub subscriber_count: i64,
}

async fn annotate(state: &AppState, users: &[User]) -> Result<Vec<ChannelListItem>, AppError> {
    let mut items = Vec::with_capacity(users.len());
    for user in users {
        items.push(ChannelListItem {
            user: UserDto::from(user),
            subscriber_count: state.db.count_subscribers(&user.id).await?,
        });
    }
    Ok(items)
}

/// POST /api/v1/subscriptions/toggle/:channelId
pub async fn toggle(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(channel_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if channel_id == user.id {
        return Err(AppError::Validation(
            "cannot subscribe to your own channel".to_string(),
        ));
    }
    state
        .db
        .get_user(&channel_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let subscribed = state.db.toggle_subscription(&user.id, &channel_id).await?;
    let subscriber_count = state.db.count_subscribers(&channel_id).await?;

    Ok(ApiResponse::ok(
        ToggleResult {
            subscribed,
            subscriber_count,
        },
        "subscription toggled",
    ))
}

/// GET /api/v1/subscriptions/channels
///
/// Channels the requester subscribes to.
pub async fn subscribed_channels(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let (page, limit, offset) = params.clamp();

    let channels = state
        .db
        .list_subscribed_channels(&user.id, limit, offset)
        .await?;
    let total = state.db.count_subscribed_channels(&user.id).await?;

    let items = annotate(&state, &channels).await?;
    Ok(ApiResponse::ok(
        Page::new(items, total, page, limit),
        "subscribed channels",
    ))
}

/// GET /api/v1/subscriptions/subscribers
///
/// Users subscribed to the requester's channel.
pub async fn subscribers(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let (page, limit, offset) = params.clamp();

    let users = state.db.list_subscribers(&user.id, limit, offset).await?;
    let total = state.db.count_subscribers(&user.id).await?;

    let items = annotate(&state, &users).await?;
    Ok(ApiResponse::ok(
        Page::new(items, total, page, limit),
        "subscribers",
    ))
}
