//! Wire DTOs
//!
//! camelCase shapes sent to clients, converted from data models. The
//! password hash and refresh token never leave this boundary.

use serde::Serialize;

use crate::data::{
    Comment, CommentTarget, Playlist, Tweet, TweetView, User, Video,
};

/// Public view of a user / channel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub cover_image_url: Option<String>,
    pub about: Option<String>,
    pub created_at: String,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            avatar_url: user.avatar_url.clone(),
            cover_image_url: user.cover_image_url.clone(),
            about: user.about.clone(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// The owner's own view; adds email and role.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDto {
    #[serde(flatten)]
    pub user: UserDto,
    pub email: String,
    pub role: String,
}

impl From<&User> for AccountDto {
    fn from(user: &User) -> Self {
        Self {
            user: UserDto::from(user),
            email: user.email.clone(),
            role: user.role.clone(),
        }
    }
}

/// A channel profile with relationship annotations for the requester.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDto {
    #[serde(flatten)]
    pub user: UserDto,
    pub subscriber_count: i64,
    pub subscribed_to_count: i64,
    pub is_subscribed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDto {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub media_url: String,
    pub thumbnail_url: String,
    pub duration_seconds: f64,
    pub view_count: i64,
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Video> for VideoDto {
    fn from(video: &Video) -> Self {
        Self {
            id: video.id.clone(),
            owner_id: video.owner_id.clone(),
            title: video.title.clone(),
            description: video.description.clone(),
            media_url: video.media_url.clone(),
            thumbnail_url: video.thumbnail_url.clone(),
            duration_seconds: video.duration_seconds,
            view_count: video.view_count,
            is_published: video.is_published,
            created_at: video.created_at.to_rfc3339(),
            updated_at: video.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDto {
    pub id: String,
    pub owner_id: String,
    pub target: CommentTarget,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Comment> for CommentDto {
    fn from(comment: &Comment) -> Self {
        Self {
            id: comment.id.clone(),
            owner_id: comment.owner_id.clone(),
            target: comment.target.clone(),
            content: comment.content.clone(),
            created_at: comment.created_at.to_rfc3339(),
            updated_at: comment.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistDto {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Playlist> for PlaylistDto {
    fn from(playlist: &Playlist) -> Self {
        Self {
            id: playlist.id.clone(),
            owner_id: playlist.owner_id.clone(),
            name: playlist.name.clone(),
            description: playlist.description.clone(),
            created_at: playlist.created_at.to_rfc3339(),
            updated_at: playlist.updated_at.to_rfc3339(),
        }
    }
}

/// A playlist together with its videos in insertion order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistWithVideosDto {
    #[serde(flatten)]
    pub playlist: PlaylistDto,
    pub videos: Vec<VideoDto>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetDto {
    pub id: String,
    pub owner_id: String,
    pub content: String,
    pub parent_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Tweet> for TweetDto {
    fn from(tweet: &Tweet) -> Self {
        Self {
            id: tweet.id.clone(),
            owner_id: tweet.owner_id.clone(),
            content: tweet.content.clone(),
            parent_id: tweet.parent_id.clone(),
            created_at: tweet.created_at.to_rfc3339(),
            updated_at: tweet.updated_at.to_rfc3339(),
        }
    }
}

/// A tweet annotated for display in a feed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetViewDto {
    #[serde(flatten)]
    pub tweet: TweetDto,
    pub author: String,
    pub author_avatar_url: Option<String>,
    pub like_count: i64,
    pub reply_count: i64,
    pub liked_by_me: bool,
}

impl From<&TweetView> for TweetViewDto {
    fn from(view: &TweetView) -> Self {
        Self {
            tweet: TweetDto::from(&view.tweet),
            author: view.author_username.clone(),
            author_avatar_url: view.author_avatar_url.clone(),
            like_count: view.like_count,
            reply_count: view.reply_count,
            liked_by_me: view.liked_by_me,
        }
    }
}
