//! SQLite database operations
//!
//! All database access goes through this module.

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, QueryBuilder, Row, Sqlite, SqlitePool};
use std::path::Path;

use super::models::*;
use crate::error::AppError;

/// Watch history rows kept per user, newest first.
pub const WATCH_HISTORY_CAP: i64 = 50;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

fn map_insert_conflict(error: sqlx::Error, message: &str) -> AppError {
    if is_unique_violation(&error) {
        AppError::Conflict(message.to_string())
    } else {
        AppError::Database(error)
    }
}

fn comment_target_columns(target: &CommentTarget) -> (Option<&str>, Option<&str>) {
    match target {
        CommentTarget::Internal(id) => (Some(id.as_str()), None),
        CommentTarget::External(id) => (None, Some(id.as_str())),
    }
}

fn comment_with_meta_from_row(row: &SqliteRow) -> Result<CommentWithMeta, sqlx::Error> {
    use sqlx::FromRow;

    Ok(CommentWithMeta {
        comment: Comment::from_row(row)?,
        author_username: row.try_get("author_username")?,
        author_avatar_url: row.try_get("author_avatar_url")?,
        like_count: row.try_get("like_count")?,
        liked_by_me: row.try_get::<i64, _>("liked_by_me")? != 0,
    })
}

fn tweet_view_from_row(row: &SqliteRow) -> Result<TweetView, sqlx::Error> {
    Ok(TweetView {
        tweet: Tweet {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            content: row.try_get("content")?,
            parent_id: row.try_get("parent_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        },
        author_username: row.try_get("author_username")?,
        author_avatar_url: row.try_get("author_avatar_url")?,
        like_count: row.try_get("like_count")?,
        reply_count: row.try_get("reply_count")?,
        liked_by_me: row.try_get::<i64, _>("liked_by_me")? != 0,
    })
}

/// Filter for the shared tweet feed query.
#[derive(Debug, Clone)]
pub enum TweetFeedFilter {
    /// All top-level tweets, newest first
    Global,
    /// Top-level tweets by the user or any channel they subscribe to
    Personalized { user_id: String },
    /// All tweets by one owner
    ByOwner { owner_id: String },
    /// Replies to one tweet
    RepliesTo { tweet_id: String },
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a new user
    ///
    /// # Errors
    /// `Conflict` when the username or email is already taken
    /// (case-insensitive for usernames, which are stored lowercase).
    pub async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, email, full_name, password_hash,
                avatar_url, cover_image_url, about, role, refresh_token,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .bind(&user.avatar_url)
        .bind(&user.cover_image_url)
        .bind(&user.about)
        .bind(&user.role)
        .bind(&user.refresh_token)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_conflict(e, "username or email already in use"))?;

        Ok(())
    }

    /// Get user by ID
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Get user by username (case-insensitive; usernames are stored lowercase)
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Get user by username or email, for login
    pub async fn get_user_by_login(&self, identifier: &str) -> Result<Option<User>, AppError> {
        // Usernames and emails are both stored lowercased
        let identifier = identifier.to_lowercase();
        let user =
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ? OR email = ?")
                .bind(&identifier)
                .bind(&identifier)
                .fetch_optional(&self.pool)
                .await?;

        Ok(user)
    }

    /// Replace the persisted refresh token; `None` clears it (logout).
    pub async fn set_refresh_token(
        &self,
        user_id: &str,
        refresh_token: Option<&str>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE users SET refresh_token = ?, updated_at = ? WHERE id = ?")
            .bind(refresh_token)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Update profile fields
    pub async fn update_user_profile(
        &self,
        user_id: &str,
        full_name: &str,
        email: &str,
        about: Option<&str>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET full_name = ?, email = ?, about = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(full_name)
        .bind(email)
        .bind(about)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_conflict(e, "email already in use"))?;

        Ok(result.rows_affected() == 1)
    }

    /// Replace the stored password hash
    pub async fn set_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Replace the avatar URL, returning the previous one for media cleanup.
    pub async fn set_avatar_url(
        &self,
        user_id: &str,
        avatar_url: &str,
    ) -> Result<Option<String>, AppError> {
        self.swap_image_url(user_id, "avatar_url", avatar_url).await
    }

    /// Replace the cover image URL, returning the previous one for media cleanup.
    pub async fn set_cover_image_url(
        &self,
        user_id: &str,
        cover_image_url: &str,
    ) -> Result<Option<String>, AppError> {
        self.swap_image_url(user_id, "cover_image_url", cover_image_url)
            .await
    }

    async fn swap_image_url(
        &self,
        user_id: &str,
        column: &str,
        url: &str,
    ) -> Result<Option<String>, AppError> {
        // column is a compile-time constant from the two callers above
        let previous: Option<String> =
            sqlx::query_scalar(&format!("SELECT {column} FROM users WHERE id = ?"))
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?
                .flatten();

        sqlx::query(&format!(
            "UPDATE users SET {column} = ?, updated_at = ? WHERE id = ?"
        ))
        .bind(url)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(previous)
    }

    /// Delete an account and everything it owns.
    ///
    /// Cascade scope (recorded in DESIGN.md): the user's videos with the full
    /// video cascade, their comments and tweets together with likes on those,
    /// their own likes, subscriptions in both directions, playlists, and
    /// watch history. Runs in one transaction.
    pub async fn delete_user_cascade(&self, user_id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        // Videos owned by the user, with the same cascade as single-video delete
        sqlx::query(
            r#"
            DELETE FROM likes WHERE target_kind = 'comment' AND target_id IN (
                SELECT c.id FROM comments c
                JOIN videos v ON v.id = c.video_id
                WHERE v.owner_id = ?
            )
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "DELETE FROM comments WHERE video_id IN (SELECT id FROM videos WHERE owner_id = ?)",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            r#"
            DELETE FROM likes WHERE target_kind = 'video'
                AND target_id IN (SELECT id FROM videos WHERE owner_id = ?)
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "DELETE FROM playlist_videos WHERE video_id IN (SELECT id FROM videos WHERE owner_id = ?)",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "DELETE FROM watch_history WHERE video_id IN (SELECT id FROM videos WHERE owner_id = ?)",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM videos WHERE owner_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        // Comments and tweets authored elsewhere, plus likes on them
        sqlx::query(
            r#"
            DELETE FROM likes WHERE target_kind = 'comment'
                AND target_id IN (SELECT id FROM comments WHERE owner_id = ?)
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM comments WHERE owner_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            DELETE FROM likes WHERE target_kind = 'tweet'
                AND target_id IN (SELECT id FROM tweets WHERE owner_id = ?)
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM tweets WHERE owner_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        // Relationships and owned collections
        sqlx::query("DELETE FROM likes WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = ? OR channel_id = ?")
            .bind(user_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "DELETE FROM playlist_videos WHERE playlist_id IN (SELECT id FROM playlists WHERE owner_id = ?)",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM playlists WHERE owner_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM watch_history WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    // =========================================================================
    // Videos
    // =========================================================================

    /// Insert a new video
    pub async fn insert_video(&self, video: &Video) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO videos (
                id, owner_id, title, description, media_url, thumbnail_url,
                duration_seconds, view_count, is_published, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&video.id)
        .bind(&video.owner_id)
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.media_url)
        .bind(&video.thumbnail_url)
        .bind(video.duration_seconds)
        .bind(video.view_count)
        .bind(video.is_published)
        .bind(video.created_at)
        .bind(video.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get video by ID
    pub async fn get_video(&self, id: &str) -> Result<Option<Video>, AppError> {
        let video = sqlx::query_as::<_, Video>("SELECT * FROM videos WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(video)
    }

    /// List published videos, newest first, with optional text and owner filters.
    pub async fn list_published_videos(
        &self,
        text_filter: Option<&str>,
        owner_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Video>, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM videos WHERE is_published = 1");
        Self::push_video_filters(&mut builder, text_filter, owner_id);
        builder.push(" ORDER BY created_at DESC LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let videos = builder
            .build_query_as::<Video>()
            .fetch_all(&self.pool)
            .await?;

        Ok(videos)
    }

    /// Count published videos matching the same filters as the listing.
    pub async fn count_published_videos(
        &self,
        text_filter: Option<&str>,
        owner_id: Option<&str>,
    ) -> Result<i64, AppError> {
        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM videos WHERE is_published = 1");
        Self::push_video_filters(&mut builder, text_filter, owner_id);

        let count: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(count)
    }

    fn push_video_filters(
        builder: &mut QueryBuilder<'_, Sqlite>,
        text_filter: Option<&str>,
        owner_id: Option<&str>,
    ) {
        if let Some(text) = text_filter {
            let pattern = format!("%{}%", text.replace('%', "\\%").replace('_', "\\_"));
            builder.push(" AND (title LIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" ESCAPE '\\' OR description LIKE ");
            builder.push_bind(pattern);
            builder.push(" ESCAPE '\\')");
        }
        if let Some(owner) = owner_id {
            builder.push(" AND owner_id = ");
            builder.push_bind(owner.to_string());
        }
    }

    /// List one owner's videos, optionally including unpublished entries.
    pub async fn list_videos_by_owner(
        &self,
        owner_id: &str,
        include_unpublished: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Video>, AppError> {
        let videos = sqlx::query_as::<_, Video>(
            r#"
            SELECT * FROM videos
            WHERE owner_id = ? AND (is_published = 1 OR ? = 1)
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(owner_id)
        .bind(include_unpublished)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(videos)
    }

    /// Every media and thumbnail URL referenced by one owner's videos.
    ///
    /// Gathered before an account cascade so storage can be cleaned up after
    /// the rows are gone.
    pub async fn list_owned_media_urls(&self, owner_id: &str) -> Result<Vec<String>, AppError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT media_url, thumbnail_url FROM videos WHERE owner_id = ?")
                .bind(owner_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .flat_map(|(media_url, thumbnail_url)| [media_url, thumbnail_url])
            .collect())
    }

    /// Count one owner's videos.
    pub async fn count_videos_by_owner(
        &self,
        owner_id: &str,
        include_unpublished: bool,
    ) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM videos WHERE owner_id = ? AND (is_published = 1 OR ? = 1)",
        )
        .bind(owner_id)
        .bind(include_unpublished)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Update title/description and optionally the thumbnail URL.
    ///
    /// # Returns
    /// The previous thumbnail URL when it was replaced, for media cleanup.
    pub async fn update_video_metadata(
        &self,
        video_id: &str,
        title: &str,
        description: &str,
        thumbnail_url: Option<&str>,
    ) -> Result<Option<String>, AppError> {
        let previous: Option<String> = match thumbnail_url {
            Some(url) => {
                let previous =
                    sqlx::query_scalar("SELECT thumbnail_url FROM videos WHERE id = ?")
                        .bind(video_id)
                        .fetch_optional(&self.pool)
                        .await?;
                sqlx::query(
                    r#"
                    UPDATE videos
                    SET title = ?, description = ?, thumbnail_url = ?, updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(title)
                .bind(description)
                .bind(url)
                .bind(Utc::now())
                .bind(video_id)
                .execute(&self.pool)
                .await?;
                previous
            }
            None => {
                sqlx::query(
                    "UPDATE videos SET title = ?, description = ?, updated_at = ? WHERE id = ?",
                )
                .bind(title)
                .bind(description)
                .bind(Utc::now())
                .bind(video_id)
                .execute(&self.pool)
                .await?;
                None
            }
        };

        Ok(previous)
    }

    /// Flip the published flag, returning the new state.
    pub async fn toggle_video_published(&self, video_id: &str) -> Result<bool, AppError> {
        let published: i64 = sqlx::query_scalar(
            r#"
            UPDATE videos
            SET is_published = 1 - is_published, updated_at = ?
            WHERE id = ?
            RETURNING is_published
            "#,
        )
        .bind(Utc::now())
        .bind(video_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(published != 0)
    }

    /// Increment the view counter (atomic single-document update).
    pub async fn increment_view_count(&self, video_id: &str) -> Result<i64, AppError> {
        let views: i64 = sqlx::query_scalar(
            "UPDATE videos SET view_count = view_count + 1 WHERE id = ? RETURNING view_count",
        )
        .bind(video_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(views)
    }

    /// Delete a video and everything scoped to it in one transaction:
    /// comments (and likes on them), likes, playlist memberships,
    /// watch-history rows.
    pub async fn delete_video_cascade(&self, video_id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM likes WHERE target_kind = 'comment'
                AND target_id IN (SELECT id FROM comments WHERE video_id = ?)
            "#,
        )
        .bind(video_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM comments WHERE video_id = ?")
            .bind(video_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM likes WHERE target_kind = 'video' AND target_id = ?")
            .bind(video_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM playlist_videos WHERE video_id = ?")
            .bind(video_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM watch_history WHERE video_id = ?")
            .bind(video_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM videos WHERE id = ?")
            .bind(video_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// Insert a new comment
    pub async fn insert_comment(&self, comment: &Comment) -> Result<(), AppError> {
        let (video_id, external_video_id) = comment_target_columns(&comment.target);

        sqlx::query(
            r#"
            INSERT INTO comments (
                id, owner_id, video_id, external_video_id, content, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&comment.id)
        .bind(&comment.owner_id)
        .bind(video_id)
        .bind(external_video_id)
        .bind(&comment.content)
        .bind(comment.created_at)
        .bind(comment.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get comment by ID
    pub async fn get_comment(&self, id: &str) -> Result<Option<Comment>, AppError> {
        let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(comment)
    }

    /// Replace comment content
    pub async fn update_comment_content(
        &self,
        comment_id: &str,
        content: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE comments SET content = ?, updated_at = ? WHERE id = ?")
            .bind(content)
            .bind(Utc::now())
            .bind(comment_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete a comment and likes on it.
    pub async fn delete_comment(&self, comment_id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM likes WHERE target_kind = 'comment' AND target_id = ?")
            .bind(comment_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(comment_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// List comments for one target, newest first, annotated with the author
    /// and like statistics. `viewer_id = None` means guest: `liked_by_me`
    /// is always false.
    pub async fn list_comments_with_meta(
        &self,
        target: &CommentTarget,
        viewer_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CommentWithMeta>, AppError> {
        let (video_id, external_video_id) = comment_target_columns(target);

        let rows = sqlx::query(
            r#"
            SELECT c.*,
                   u.username AS author_username,
                   u.avatar_url AS author_avatar_url,
                   (SELECT COUNT(*) FROM likes l
                     WHERE l.target_kind = 'comment' AND l.target_id = c.id) AS like_count,
                   EXISTS(SELECT 1 FROM likes l
                     WHERE l.target_kind = 'comment' AND l.target_id = c.id
                       AND l.user_id = ?) AS liked_by_me
            FROM comments c
            JOIN users u ON u.id = c.owner_id
            WHERE (? IS NOT NULL AND c.video_id = ?)
               OR (? IS NOT NULL AND c.external_video_id = ?)
            ORDER BY c.created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(viewer_id.unwrap_or(""))
        .bind(video_id)
        .bind(video_id)
        .bind(external_video_id)
        .bind(external_video_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let comments = rows
            .iter()
            .map(comment_with_meta_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(comments)
    }

    /// Exact count of internal comments for one target.
    pub async fn count_comments(&self, target: &CommentTarget) -> Result<i64, AppError> {
        let (video_id, external_video_id) = comment_target_columns(target);

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM comments
            WHERE (? IS NOT NULL AND video_id = ?)
               OR (? IS NOT NULL AND external_video_id = ?)
            "#,
        )
        .bind(video_id)
        .bind(video_id)
        .bind(external_video_id)
        .bind(external_video_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    // =========================================================================
    // Likes
    // =========================================================================

    /// Toggle a like.
    ///
    /// Insert-if-absent, else delete. The `(user, kind, target)` uniqueness
    /// constraint makes concurrent duplicate toggles self-correcting.
    ///
    /// # Returns
    /// `true` when the target is now liked, `false` when un-liked.
    pub async fn toggle_like(
        &self,
        user_id: &str,
        kind: LikeTargetKind,
        target_id: &str,
    ) -> Result<bool, AppError> {
        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO likes (id, user_id, target_kind, target_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(EntityId::new().0)
        .bind(user_id)
        .bind(kind)
        .bind(target_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 1 {
            return Ok(true);
        }

        sqlx::query("DELETE FROM likes WHERE user_id = ? AND target_kind = ? AND target_id = ?")
            .bind(user_id)
            .bind(kind)
            .bind(target_id)
            .execute(&self.pool)
            .await?;

        Ok(false)
    }

    /// Count likes on one target
    pub async fn count_likes(
        &self,
        kind: LikeTargetKind,
        target_id: &str,
    ) -> Result<i64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE target_kind = ? AND target_id = ?")
                .bind(kind)
                .bind(target_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Whether a user has liked one target
    pub async fn has_liked(
        &self,
        user_id: &str,
        kind: LikeTargetKind,
        target_id: &str,
    ) -> Result<bool, AppError> {
        let exists: i64 = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM likes WHERE user_id = ? AND target_kind = ? AND target_id = ?
            )
            "#,
        )
        .bind(user_id)
        .bind(kind)
        .bind(target_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists != 0)
    }

    /// Published videos the user has liked, most recently liked first.
    pub async fn list_liked_videos(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Video>, AppError> {
        let videos = sqlx::query_as::<_, Video>(
            r#"
            SELECT v.* FROM videos v
            JOIN likes l ON l.target_kind = 'video' AND l.target_id = v.id
            WHERE l.user_id = ? AND v.is_published = 1
            ORDER BY l.created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(videos)
    }

    /// Count published videos the user has liked.
    pub async fn count_liked_videos(&self, user_id: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM videos v
            JOIN likes l ON l.target_kind = 'video' AND l.target_id = v.id
            WHERE l.user_id = ? AND v.is_published = 1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Toggle a subscription; same insert-or-delete pattern as likes.
    ///
    /// # Returns
    /// `true` when now subscribed.
    pub async fn toggle_subscription(
        &self,
        subscriber_id: &str,
        channel_id: &str,
    ) -> Result<bool, AppError> {
        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO subscriptions (id, subscriber_id, channel_id, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(EntityId::new().0)
        .bind(subscriber_id)
        .bind(channel_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 1 {
            return Ok(true);
        }

        sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = ? AND channel_id = ?")
            .bind(subscriber_id)
            .bind(channel_id)
            .execute(&self.pool)
            .await?;

        Ok(false)
    }

    /// Whether a user subscribes to a channel
    pub async fn is_subscribed(
        &self,
        subscriber_id: &str,
        channel_id: &str,
    ) -> Result<bool, AppError> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM subscriptions WHERE subscriber_id = ? AND channel_id = ?)",
        )
        .bind(subscriber_id)
        .bind(channel_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists != 0)
    }

    /// Number of subscribers of a channel
    pub async fn count_subscribers(&self, channel_id: &str) -> Result<i64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE channel_id = ?")
                .bind(channel_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Number of channels a user subscribes to
    pub async fn count_subscribed_channels(&self, subscriber_id: &str) -> Result<i64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE subscriber_id = ?")
                .bind(subscriber_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Channels the user subscribes to, most recent first.
    pub async fn list_subscribed_channels(
        &self,
        subscriber_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            JOIN subscriptions s ON s.channel_id = u.id
            WHERE s.subscriber_id = ?
            ORDER BY s.created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(subscriber_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Subscribers of a channel, most recent first.
    pub async fn list_subscribers(
        &self,
        channel_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            JOIN subscriptions s ON s.subscriber_id = u.id
            WHERE s.channel_id = ?
            ORDER BY s.created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(channel_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    // =========================================================================
    // Playlists
    // =========================================================================

    /// Insert a new playlist
    pub async fn insert_playlist(&self, playlist: &Playlist) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO playlists (id, owner_id, name, description, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&playlist.id)
        .bind(&playlist.owner_id)
        .bind(&playlist.name)
        .bind(&playlist.description)
        .bind(playlist.created_at)
        .bind(playlist.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get playlist by ID
    pub async fn get_playlist(&self, id: &str) -> Result<Option<Playlist>, AppError> {
        let playlist = sqlx::query_as::<_, Playlist>("SELECT * FROM playlists WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(playlist)
    }

    /// Rename / re-describe a playlist
    pub async fn update_playlist(
        &self,
        playlist_id: &str,
        name: &str,
        description: &str,
    ) -> Result<bool, AppError> {
        let result =
            sqlx::query("UPDATE playlists SET name = ?, description = ?, updated_at = ? WHERE id = ?")
                .bind(name)
                .bind(description)
                .bind(Utc::now())
                .bind(playlist_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete a playlist and its memberships.
    pub async fn delete_playlist(&self, playlist_id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM playlist_videos WHERE playlist_id = ?")
            .bind(playlist_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM playlists WHERE id = ?")
            .bind(playlist_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// One user's playlists, newest first.
    pub async fn list_playlists_by_owner(
        &self,
        owner_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Playlist>, AppError> {
        let playlists = sqlx::query_as::<_, Playlist>(
            "SELECT * FROM playlists WHERE owner_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(playlists)
    }

    /// Count one user's playlists.
    pub async fn count_playlists_by_owner(&self, owner_id: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM playlists WHERE owner_id = ?")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Append a video to a playlist; duplicate adds are no-ops.
    ///
    /// # Returns
    /// `true` when the video was added, `false` when it was already present.
    pub async fn add_video_to_playlist(
        &self,
        playlist_id: &str,
        video_id: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO playlist_videos (playlist_id, video_id, position, added_at)
            VALUES (
                ?, ?,
                COALESCE((SELECT MAX(position) + 1 FROM playlist_videos WHERE playlist_id = ?), 0),
                ?
            )
            "#,
        )
        .bind(playlist_id)
        .bind(video_id)
        .bind(playlist_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Remove a video from a playlist.
    pub async fn remove_video_from_playlist(
        &self,
        playlist_id: &str,
        video_id: &str,
    ) -> Result<bool, AppError> {
        let result =
            sqlx::query("DELETE FROM playlist_videos WHERE playlist_id = ? AND video_id = ?")
                .bind(playlist_id)
                .bind(video_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Videos of a playlist in insertion order.
    pub async fn list_playlist_videos(&self, playlist_id: &str) -> Result<Vec<Video>, AppError> {
        let videos = sqlx::query_as::<_, Video>(
            r#"
            SELECT v.* FROM videos v
            JOIN playlist_videos pv ON pv.video_id = v.id
            WHERE pv.playlist_id = ?
            ORDER BY pv.position ASC
            "#,
        )
        .bind(playlist_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(videos)
    }

    // =========================================================================
    // Tweets
    // =========================================================================

    /// Insert a new tweet
    pub async fn insert_tweet(&self, tweet: &Tweet) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO tweets (id, owner_id, content, parent_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&tweet.id)
        .bind(&tweet.owner_id)
        .bind(&tweet.content)
        .bind(&tweet.parent_id)
        .bind(tweet.created_at)
        .bind(tweet.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get tweet by ID
    pub async fn get_tweet(&self, id: &str) -> Result<Option<Tweet>, AppError> {
        let tweet = sqlx::query_as::<_, Tweet>("SELECT * FROM tweets WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(tweet)
    }

    /// Replace tweet content
    pub async fn update_tweet_content(
        &self,
        tweet_id: &str,
        content: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE tweets SET content = ?, updated_at = ? WHERE id = ?")
            .bind(content)
            .bind(Utc::now())
            .bind(tweet_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete a tweet. Replies and likes are intentionally left in place.
    pub async fn delete_tweet(&self, tweet_id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM tweets WHERE id = ?")
            .bind(tweet_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Shared tweet feed query: one filter, optional requester, annotated
    /// with author, like count, reply count and `liked_by_me`.
    pub async fn list_tweet_views(
        &self,
        filter: &TweetFeedFilter,
        viewer_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TweetView>, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT t.*,
                   u.username AS author_username,
                   u.avatar_url AS author_avatar_url,
                   (SELECT COUNT(*) FROM likes l
                     WHERE l.target_kind = 'tweet' AND l.target_id = t.id) AS like_count,
                   (SELECT COUNT(*) FROM tweets r WHERE r.parent_id = t.id) AS reply_count,
                   EXISTS(SELECT 1 FROM likes l
                     WHERE l.target_kind = 'tweet' AND l.target_id = t.id
                       AND l.user_id = "#,
        );
        builder.push_bind(viewer_id.unwrap_or("").to_string());
        builder.push(") AS liked_by_me FROM tweets t JOIN users u ON u.id = t.owner_id WHERE ");
        Self::push_tweet_filter(&mut builder, filter);
        builder.push(" ORDER BY t.created_at DESC LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let rows = builder.build().fetch_all(&self.pool).await?;

        let views = rows
            .iter()
            .map(tweet_view_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(views)
    }

    /// Count tweets matching the same filter as the feed query.
    pub async fn count_tweets(&self, filter: &TweetFeedFilter) -> Result<i64, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM tweets t WHERE ");
        Self::push_tweet_filter(&mut builder, filter);

        let count: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(count)
    }

    fn push_tweet_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &TweetFeedFilter) {
        match filter {
            TweetFeedFilter::Global => {
                builder.push("t.parent_id IS NULL");
            }
            TweetFeedFilter::Personalized { user_id } => {
                builder.push("t.parent_id IS NULL AND (t.owner_id = ");
                builder.push_bind(user_id.clone());
                builder.push(
                    " OR t.owner_id IN (SELECT channel_id FROM subscriptions WHERE subscriber_id = ",
                );
                builder.push_bind(user_id.clone());
                builder.push("))");
            }
            TweetFeedFilter::ByOwner { owner_id } => {
                builder.push("t.owner_id = ");
                builder.push_bind(owner_id.clone());
            }
            TweetFeedFilter::RepliesTo { tweet_id } => {
                builder.push("t.parent_id = ");
                builder.push_bind(tweet_id.clone());
            }
        }
    }

    /// One tweet with its statistics, or None.
    pub async fn get_tweet_view(
        &self,
        tweet_id: &str,
        viewer_id: Option<&str>,
    ) -> Result<Option<TweetView>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT t.*,
                   u.username AS author_username,
                   u.avatar_url AS author_avatar_url,
                   (SELECT COUNT(*) FROM likes l
                     WHERE l.target_kind = 'tweet' AND l.target_id = t.id) AS like_count,
                   (SELECT COUNT(*) FROM tweets r WHERE r.parent_id = t.id) AS reply_count,
                   EXISTS(SELECT 1 FROM likes l
                     WHERE l.target_kind = 'tweet' AND l.target_id = t.id
                       AND l.user_id = ?) AS liked_by_me
            FROM tweets t
            JOIN users u ON u.id = t.owner_id
            WHERE t.id = ?
            "#,
        )
        .bind(viewer_id.unwrap_or(""))
        .bind(tweet_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(tweet_view_from_row).transpose().map_err(Into::into)
    }

    // =========================================================================
    // Watch history
    // =========================================================================

    /// Record a view in the watch history.
    ///
    /// De-duplicates on re-view (the entry moves to the front) and trims
    /// the history to [`WATCH_HISTORY_CAP`] rows, inside one transaction.
    pub async fn record_watch(&self, user_id: &str, video_id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO watch_history (user_id, video_id, watched_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id, video_id) DO UPDATE SET watched_at = excluded.watched_at
            "#,
        )
        .bind(user_id)
        .bind(video_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM watch_history
            WHERE user_id = ? AND video_id NOT IN (
                SELECT video_id FROM watch_history
                WHERE user_id = ?
                ORDER BY watched_at DESC
                LIMIT ?
            )
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(WATCH_HISTORY_CAP)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Watched videos, most recent first.
    pub async fn list_watch_history(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Video>, AppError> {
        let videos = sqlx::query_as::<_, Video>(
            r#"
            SELECT v.* FROM videos v
            JOIN watch_history h ON h.video_id = v.id
            WHERE h.user_id = ?
            ORDER BY h.watched_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(videos)
    }

    /// Size of one user's watch history.
    pub async fn count_watch_history(&self, user_id: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM watch_history WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Dashboard
    // =========================================================================

    /// Aggregate channel statistics for one owner.
    pub async fn channel_stats(&self, owner_id: &str) -> Result<ChannelStats, AppError> {
        let (total_videos, total_views): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(view_count), 0) FROM videos WHERE owner_id = ?",
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        let total_subscribers = self.count_subscribers(owner_id).await?;

        let total_likes: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM likes l
            JOIN videos v ON l.target_kind = 'video' AND l.target_id = v.id
            WHERE v.owner_id = ?
            "#,
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(ChannelStats {
            total_videos,
            total_views,
            total_subscribers,
            total_likes,
        })
    }

    // =========================================================================
    // Provider response cache
    // =========================================================================

    /// Look up a cached provider response.
    ///
    /// Rows older than `ttl_seconds` are invisible; expiry lives here,
    /// not in callers.
    pub async fn get_cached_response(
        &self,
        cache_key: &str,
        ttl_seconds: i64,
    ) -> Result<Option<serde_json::Value>, AppError> {
        let cutoff: DateTime<Utc> = Utc::now() - Duration::seconds(ttl_seconds);

        let payload: Option<String> = sqlx::query_scalar(
            "SELECT payload FROM api_cache WHERE cache_key = ? AND created_at > ?",
        )
        .bind(cache_key)
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await?;

        use crate::metrics::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL};
        if payload.is_some() {
            CACHE_HITS_TOTAL.with_label_values(&["api_cache"]).inc();
        } else {
            CACHE_MISSES_TOTAL.with_label_values(&["api_cache"]).inc();
        }

        match payload {
            Some(raw) => {
                let value = serde_json::from_str(&raw)
                    .map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt cache entry: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Upsert a provider response and purge expired rows opportunistically.
    pub async fn put_cached_response(
        &self,
        cache_key: &str,
        payload: &serde_json::Value,
        ttl_seconds: i64,
    ) -> Result<(), AppError> {
        let raw = serde_json::to_string(payload)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("cache payload: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO api_cache (cache_key, payload, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(cache_key) DO UPDATE
                SET payload = excluded.payload, created_at = excluded.created_at
            "#,
        )
        .bind(cache_key)
        .bind(&raw)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let cutoff: DateTime<Utc> = Utc::now() - Duration::seconds(ttl_seconds);
        sqlx::query("DELETE FROM api_cache WHERE created_at <= ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
