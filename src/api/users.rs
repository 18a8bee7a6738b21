//! User and account endpoints
//!
//! Registration, login/logout, token refresh, profile management, avatar and
//! cover uploads, watch history, channel profiles, and account deletion.

use axum::{
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};

use super::dto::{AccountDto, ChannelDto, UserDto, VideoDto};
use super::pagination::{ApiResponse, Page, PageParams};
use crate::AppState;
use crate::auth::{
    ACCESS_TOKEN_COOKIE, CurrentUser, MaybeUser, REFRESH_TOKEN_COOKIE, TokenPair,
    hash_password, issue_token_pair, verify_password, verify_refresh_token,
};
use crate::data::{EntityId, User};
use crate::error::AppError;

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_USERNAME_LENGTH: usize = 30;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub about: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Token pair plus account, returned by login and refresh.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDto {
    pub user: AccountDto,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

fn validate_username(username: &str) -> Result<String, AppError> {
    let username = username.trim().to_lowercase();
    if username.len() < 3 || username.len() > MAX_USERNAME_LENGTH {
        return Err(AppError::Validation(format!(
            "username must be between 3 and {} characters",
            MAX_USERNAME_LENGTH
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AppError::Validation(
            "username may only contain letters, digits, '_' and '-'".to_string(),
        ));
    }
    Ok(username)
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

fn auth_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn set_auth_cookies(jar: CookieJar, pair: &TokenPair) -> CookieJar {
    jar.add(auth_cookie(ACCESS_TOKEN_COOKIE, pair.access_token.clone()))
        .add(auth_cookie(REFRESH_TOKEN_COOKIE, pair.refresh_token.clone()))
}

fn clear_auth_cookies(jar: CookieJar) -> CookieJar {
    jar.remove(auth_cookie(ACCESS_TOKEN_COOKIE, String::new()))
        .remove(auth_cookie(REFRESH_TOKEN_COOKIE, String::new()))
}

/// POST /api/v1/users/register
pub async fn register(
    State(state): State<AppState>,
    axum::Json(request): axum::Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let username = validate_username(&request.username)?;
    validate_password(&request.password)?;

    let email = request.email.trim().to_lowercase();
    if !email.contains('@') || email.len() < 3 {
        return Err(AppError::Validation("a valid email is required".to_string()));
    }
    let full_name = request.full_name.trim();
    if full_name.is_empty() {
        return Err(AppError::Validation("full name is required".to_string()));
    }

    let now = chrono::Utc::now();
    let user = User {
        id: EntityId::new().0,
        username,
        email,
        full_name: full_name.to_string(),
        password_hash: hash_password(&request.password)?,
        avatar_url: None,
        cover_image_url: None,
        about: None,
        role: "user".to_string(),
        refresh_token: None,
        created_at: now,
        updated_at: now,
    };
    state.db.insert_user(&user).await?;

    tracing::info!(user_id = %user.id, username = %user.username, "user registered");

    Ok(ApiResponse::created(
        AccountDto::from(&user),
        "user registered",
    ))
}

/// POST /api/v1/users/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    axum::Json(request): axum::Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .db
        .get_user_by_login(request.identifier.trim())
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !verify_password(&request.password, &user.password_hash)? {
        return Err(AppError::Unauthorized);
    }

    let pair = issue_token_pair(&user, &state.config.auth)?;
    state
        .db
        .set_refresh_token(&user.id, Some(&pair.refresh_token))
        .await?;

    tracing::info!(user_id = %user.id, "login");

    let jar = set_auth_cookies(jar, &pair);
    let session = SessionDto {
        user: AccountDto::from(&user),
        tokens: pair,
    };
    Ok((jar, ApiResponse::ok(session, "logged in")))
}

/// POST /api/v1/users/refresh-token
///
/// Accepts the refresh token from the body or the cookie; it must match the
/// persisted value, then the pair is rotated.
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Option<axum::Json<RefreshRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let presented = request
        .and_then(|r| r.0.refresh_token)
        .or_else(|| jar.get(REFRESH_TOKEN_COOKIE).map(|c| c.value().to_string()))
        .ok_or(AppError::Unauthorized)?;

    let claims = verify_refresh_token(&presented, &state.config.auth)?;
    let user = state
        .db
        .get_user(&claims.sub)
        .await?
        .ok_or(AppError::Unauthorized)?;

    // A rotated-away or logged-out token must not refresh.
    if user.refresh_token.as_deref() != Some(presented.as_str()) {
        return Err(AppError::Unauthorized);
    }

    let pair = issue_token_pair(&user, &state.config.auth)?;
    state
        .db
        .set_refresh_token(&user.id, Some(&pair.refresh_token))
        .await?;

    let jar = set_auth_cookies(jar, &pair);
    let session = SessionDto {
        user: AccountDto::from(&user),
        tokens: pair,
    };
    Ok((jar, ApiResponse::ok(session, "token refreshed")))
}

/// POST /api/v1/users/logout
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    state.db.set_refresh_token(&user.id, None).await?;

    let jar = clear_auth_cookies(jar);
    Ok((jar, ApiResponse::ok((), "logged out")))
}

/// GET /api/v1/users/me
pub async fn me(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    ApiResponse::ok(AccountDto::from(&user), "current account")
}

/// PATCH /api/v1/users/me
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    axum::Json(request): axum::Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let full_name = match &request.full_name {
        Some(name) => {
            let name = name.trim();
            if name.is_empty() {
                return Err(AppError::Validation("full name cannot be empty".to_string()));
            }
            name.to_string()
        }
        None => user.full_name.clone(),
    };
    let email = match &request.email {
        Some(email) => {
            let email = email.trim().to_lowercase();
            if !email.contains('@') || email.len() < 3 {
                return Err(AppError::Validation("a valid email is required".to_string()));
            }
            email
        }
        None => user.email.clone(),
    };
    let about = request.about.clone().or(user.about.clone());

    state
        .db
        .update_user_profile(&user.id, &full_name, &email, about.as_deref())
        .await?;

    let updated = state.db.get_user(&user.id).await?.ok_or(AppError::NotFound)?;
    Ok(ApiResponse::ok(AccountDto::from(&updated), "profile updated"))
}

/// POST /api/v1/users/change-password
///
/// Outstanding access tokens stay valid until they expire.
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    axum::Json(request): axum::Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !verify_password(&request.old_password, &user.password_hash)? {
        return Err(AppError::Unauthorized);
    }
    validate_password(&request.new_password)?;

    let hash = hash_password(&request.new_password)?;
    state.db.set_password_hash(&user.id, &hash).await?;

    Ok(ApiResponse::ok((), "password changed"))
}

async fn read_image_field(multipart: &mut Multipart) -> Result<(Vec<u8>, String), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(AppError::Validation("an image file is required".to_string()));
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("upload failed: {}", e)))?
            .to_vec();
        if data.is_empty() {
            return Err(AppError::Validation("image file is empty".to_string()));
        }
        return Ok((data, content_type));
    }

    Err(AppError::Validation("missing \"image\" field".to_string()))
}

/// PATCH /api/v1/users/me/avatar
pub async fn update_avatar(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (data, content_type) = read_image_field(&mut multipart).await?;

    let url = state
        .storage
        .upload_avatar(&user.id, data, &content_type)
        .await?;
    let previous = state.db.set_avatar_url(&user.id, &url).await?;

    if let Some(old_url) = previous {
        if old_url != url {
            if let Err(e) = state.storage.delete_by_url(&old_url).await {
                tracing::warn!(url = %old_url, error = %e, "stale avatar not deleted");
            }
        }
    }

    let updated = state.db.get_user(&user.id).await?.ok_or(AppError::NotFound)?;
    Ok(ApiResponse::ok(AccountDto::from(&updated), "avatar updated"))
}

/// PATCH /api/v1/users/me/cover
pub async fn update_cover(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (data, content_type) = read_image_field(&mut multipart).await?;

    let url = state
        .storage
        .upload_cover(&user.id, data, &content_type)
        .await?;
    let previous = state.db.set_cover_image_url(&user.id, &url).await?;

    if let Some(old_url) = previous {
        if old_url != url {
            if let Err(e) = state.storage.delete_by_url(&old_url).await {
                tracing::warn!(url = %old_url, error = %e, "stale cover image not deleted");
            }
        }
    }

    let updated = state.db.get_user(&user.id).await?.ok_or(AppError::NotFound)?;
    Ok(ApiResponse::ok(
        AccountDto::from(&updated),
        "cover image updated",
    ))
}

/// GET /api/v1/users/history
pub async fn watch_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let (page, limit, offset) = params.clamp();

    let videos = state.db.list_watch_history(&user.id, limit, offset).await?;
    let total = state.db.count_watch_history(&user.id).await?;

    let items: Vec<VideoDto> = videos.iter().map(VideoDto::from).collect();
    Ok(ApiResponse::ok(
        Page::new(items, total, page, limit),
        "watch history",
    ))
}

/// DELETE /api/v1/users/me
///
/// Removes the account and everything it owns in one transaction, then the
/// media files behind it. Storage deletes are best-effort and never block
/// the account deletion.
pub async fn delete_account(
    State(state): State<AppState>,
    jar: CookieJar,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    // Gather media URLs before the cascade drops the rows that hold them
    let mut media_urls = state.db.list_owned_media_urls(&user.id).await?;
    media_urls.extend(user.avatar_url.clone());
    media_urls.extend(user.cover_image_url.clone());

    state.db.delete_user_cascade(&user.id).await?;

    for url in &media_urls {
        if let Err(e) = state.storage.delete_by_url(url).await {
            tracing::warn!(url = %url, error = %e, "media not deleted");
        }
    }

    tracing::info!(user_id = %user.id, "account deleted");

    let jar = clear_auth_cookies(jar);
    Ok((jar, ApiResponse::ok((), "account deleted")))
}

/// GET /api/v1/users/c/:username
///
/// Public channel profile with relationship annotations for an optional
/// requester.
pub async fn channel_profile(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let channel = state
        .db
        .get_user_by_username(&username)
        .await?
        .ok_or(AppError::NotFound)?;

    let subscriber_count = state.db.count_subscribers(&channel.id).await?;
    let subscribed_to_count = state.db.count_subscribed_channels(&channel.id).await?;
    let is_subscribed = match &viewer {
        Some(viewer) => state.db.is_subscribed(&viewer.id, &channel.id).await?,
        None => false,
    };

    let dto = ChannelDto {
        user: UserDto::from(&channel),
        subscriber_count,
        subscribed_to_count,
        is_subscribed,
    };
    Ok(ApiResponse::ok(dto, "channel profile"))
}
