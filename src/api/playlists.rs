//! Playlist endpoints

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use super::dto::{PlaylistDto, PlaylistWithVideosDto, VideoDto};
use super::pagination::{ApiResponse, Page, PageParams};
use crate::AppState;
use crate::auth::CurrentUser;
use crate::data::{EntityId, Playlist};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CreatePlaylistRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePlaylistRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

async fn owned_playlist(
    state: &AppState,
    playlist_id: &str,
    user_id: &str,
) -> Result<Playlist, AppError> {
    let playlist = state
        .db
        .get_playlist(playlist_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if playlist.owner_id != user_id {
        return Err(AppError::Forbidden);
    }
    Ok(playlist)
}

/// POST /api/v1/playlists
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    axum::Json(request): axum::Json<CreatePlaylistRequest>,
) -> Result<impl IntoResponse, AppError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("playlist name is required".to_string()));
    }

    let now = chrono::Utc::now();
    let playlist = Playlist {
        id: EntityId::new().0,
        owner_id: user.id.clone(),
        name: name.to_string(),
        description: request.description.trim().to_string(),
        created_at: now,
        updated_at: now,
    };
    state.db.insert_playlist(&playlist).await?;

    Ok(ApiResponse::created(
        PlaylistDto::from(&playlist),
        "playlist created",
    ))
}

/// GET /api/v1/playlists/user/:userId
pub async fn list_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let (page, limit, offset) = params.clamp();

    let playlists = state
        .db
        .list_playlists_by_owner(&user_id, limit, offset)
        .await?;
    let total = state.db.count_playlists_by_owner(&user_id).await?;

    let items: Vec<PlaylistDto> = playlists.iter().map(PlaylistDto::from).collect();
    Ok(ApiResponse::ok(
        Page::new(items, total, page, limit),
        "playlists",
    ))
}

/// GET /api/v1/playlists/:id
///
/// The playlist with its videos in insertion order.
pub async fn get(
    State(state): State<AppState>,
    Path(playlist_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let playlist = state
        .db
        .get_playlist(&playlist_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let videos = state.db.list_playlist_videos(&playlist_id).await?;

    let dto = PlaylistWithVideosDto {
        playlist: PlaylistDto::from(&playlist),
        videos: videos.iter().map(VideoDto::from).collect(),
    };
    Ok(ApiResponse::ok(dto, "playlist"))
}

/// PATCH /api/v1/playlists/:id
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(playlist_id): Path<String>,
    axum::Json(request): axum::Json<UpdatePlaylistRequest>,
) -> Result<impl IntoResponse, AppError> {
    let playlist = owned_playlist(&state, &playlist_id, &user.id).await?;

    let name = match &request.name {
        Some(name) => {
            let name = name.trim();
            if name.is_empty() {
                return Err(AppError::Validation(
                    "playlist name cannot be empty".to_string(),
                ));
            }
            name.to_string()
        }
        None => playlist.name.clone(),
    };
    let description = request
        .description
        .as_deref()
        .map(str::trim)
        .map(ToOwned::to_owned)
        .unwrap_or(playlist.description.clone());

    state
        .db
        .update_playlist(&playlist_id, &name, &description)
        .await?;

    let updated = state
        .db
        .get_playlist(&playlist_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::ok(
        PlaylistDto::from(&updated),
        "playlist updated",
    ))
}

/// DELETE /api/v1/playlists/:id
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(playlist_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    owned_playlist(&state, &playlist_id, &user.id).await?;

    state.db.delete_playlist(&playlist_id).await?;

    Ok(ApiResponse::ok((), "playlist deleted"))
}

/// POST /api/v1/playlists/:id/videos/:videoId
///
/// Duplicate adds are a no-op, reported in the response.
pub async fn add_video(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((playlist_id, video_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    owned_playlist(&state, &playlist_id, &user.id).await?;
    state
        .db
        .get_video(&video_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let added = state.db.add_video_to_playlist(&playlist_id, &video_id).await?;

    Ok(ApiResponse::ok(
        serde_json::json!({ "added": added }),
        if added { "video added" } else { "video already in playlist" },
    ))
}

/// DELETE /api/v1/playlists/:id/videos/:videoId
pub async fn remove_video(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((playlist_id, video_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    owned_playlist(&state, &playlist_id, &user.id).await?;

    let removed = state
        .db
        .remove_video_from_playlist(&playlist_id, &video_id)
        .await?;
    if !removed {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::ok((), "video removed"))
}
