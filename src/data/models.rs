//! Data models
//!
//! Rust structs representing database entities.
//! All models use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Create from existing string
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    /// Whether a string is a well-formed internal identifier.
    ///
    /// Anything that does not parse as a ULID is treated as an
    /// external-provider video id by the comment routing logic.
    pub fn is_well_formed(s: &str) -> bool {
        ulid::Ulid::from_string(s).is_ok()
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// User
// =============================================================================

/// A registered account / channel
///
/// Usernames are stored lowercase; uniqueness of username and email is
/// enforced at the storage layer. `refresh_token` holds the single active
/// refresh token, so a new login invalidates other sessions.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    /// Argon2 hash, never the raw password
    pub password_hash: String,
    pub avatar_url: Option<String>,
    pub cover_image_url: Option<String>,
    pub about: Option<String>,
    /// "user" or "admin"
    pub role: String,
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

// =============================================================================
// Video
// =============================================================================

/// An uploaded video
///
/// Media and thumbnail files live on the media host; this record holds
/// their public URLs and playback metadata.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Video {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub media_url: String,
    pub thumbnail_url: String,
    pub duration_seconds: f64,
    /// Monotonic; incremented on each fetch-by-id
    pub view_count: i64,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Comment
// =============================================================================

/// What a comment is attached to.
///
/// Exactly one target per comment, enforced by a CHECK constraint
/// rather than by convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum CommentTarget {
    /// A video persisted by this system
    Internal(String),
    /// A raw external-provider video identifier
    External(String),
}

impl CommentTarget {
    /// Route an identifier: ULID-shaped ids are internal, the rest external.
    pub fn from_identifier(id: &str) -> Self {
        if EntityId::is_well_formed(id) {
            Self::Internal(id.to_string())
        } else {
            Self::External(id.to_string())
        }
    }
}

/// A comment on an internal or external video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub owner_id: String,
    pub target: CommentTarget,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for Comment {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let video_id: Option<String> = row.try_get("video_id")?;
        let external_video_id: Option<String> = row.try_get("external_video_id")?;

        let target = match (video_id, external_video_id) {
            (Some(id), None) => CommentTarget::Internal(id),
            (None, Some(id)) => CommentTarget::External(id),
            _ => {
                return Err(sqlx::Error::ColumnDecode {
                    index: "video_id".to_string(),
                    source: "comment must target exactly one of video_id / external_video_id"
                        .into(),
                });
            }
        };

        Ok(Self {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            target,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

// =============================================================================
// Like
// =============================================================================

/// Discriminator for the like target, validated on every write and read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LikeTargetKind {
    Video,
    Comment,
    Tweet,
}

impl LikeTargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Comment => "comment",
            Self::Tweet => "tweet",
        }
    }
}

/// Like relationship; existence = liked, toggle-off hard-deletes.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Like {
    pub id: String,
    pub user_id: String,
    pub target_kind: LikeTargetKind,
    pub target_id: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Subscription
// =============================================================================

/// Subscriber -> channel relationship; existence = subscribed.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: String,
    pub subscriber_id: String,
    pub channel_id: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Playlist
// =============================================================================

/// A named, ordered collection of videos
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Playlist {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Tweet
// =============================================================================

/// A short-form post, optionally replying to a parent tweet
///
/// Deleting a parent does not cascade to its replies or likes.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tweet {
    pub id: String,
    pub owner_id: String,
    pub content: String,
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Watch history
// =============================================================================

/// One watch-history row; capped per user, newest first, de-duplicated.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WatchHistoryEntry {
    pub user_id: String,
    pub video_id: String,
    pub watched_at: DateTime<Utc>,
}

// =============================================================================
// Provider response cache
// =============================================================================

/// Cached YouTube Data API response keyed by request signature.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiCacheEntry {
    pub cache_key: String,
    /// Serialized JSON payload
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Aggregated views
// =============================================================================

/// A comment joined with its author and like statistics.
///
/// `liked_by_me` is always false when no requester is present.
#[derive(Debug, Clone)]
pub struct CommentWithMeta {
    pub comment: Comment,
    pub author_username: String,
    pub author_avatar_url: Option<String>,
    pub like_count: i64,
    pub liked_by_me: bool,
}

/// A tweet joined with its author, like/reply counts, and the
/// requester's like state.
#[derive(Debug, Clone)]
pub struct TweetView {
    pub tweet: Tweet,
    pub author_username: String,
    pub author_avatar_url: Option<String>,
    pub like_count: i64,
    pub reply_count: i64,
    pub liked_by_me: bool,
}

/// Channel dashboard aggregates.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub total_videos: i64,
    pub total_views: i64,
    pub total_subscribers: i64,
    pub total_likes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_shape_routes_targets() {
        let internal = EntityId::new().0;
        assert!(matches!(
            CommentTarget::from_identifier(&internal),
            CommentTarget::Internal(_)
        ));
        // Typical provider id: 11 chars, not a ULID
        assert!(matches!(
            CommentTarget::from_identifier("dQw4w9WgXcQ"),
            CommentTarget::External(_)
        ));
        assert!(matches!(
            CommentTarget::from_identifier(""),
            CommentTarget::External(_)
        ));
    }
}
