//! Comment service
//!
//! Owns the hybrid comment feed: local comments always, provider comments
//! layered on top when the identifier is external-shaped.

use std::sync::Arc;

use serde::Serialize;

use crate::data::{Comment, CommentTarget, CommentWithMeta, Database, EntityId};
use crate::error::AppError;
use crate::provider::{ExternalCommentPage, YouTubeClient};

const MAX_COMMENT_LENGTH: usize = 2000;

/// One comment document in the feed, internal or external.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDoc {
    pub id: String,
    /// Owner id for internal comments; external authors have no account here
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    pub author: String,
    pub author_avatar_url: Option<String>,
    pub content: String,
    pub created_at: String,
    pub like_count: i64,
    pub liked_by_me: bool,
    pub source: CommentSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentSource {
    Internal,
    External,
}

/// The combined feed for one video identifier.
///
/// `total_comments` mixes an exact local count with a provider estimate, so
/// it is only loosely comparable against the item list. `has_next_page`
/// covers the local side; `next_page_token` covers the provider side. The
/// two signals advance independently.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentFeed {
    pub comments: Vec<CommentDoc>,
    pub total_comments: i64,
    pub has_next_page: bool,
    pub next_page_token: Option<String>,
    pub comments_disabled: bool,
}

/// Whether more local comments exist past the fetched page.
fn local_page_has_more(offset: i64, fetched: usize, total: i64) -> bool {
    offset + (fetched as i64) < total
}

fn internal_doc(meta: CommentWithMeta) -> CommentDoc {
    CommentDoc {
        id: meta.comment.id,
        owner_id: Some(meta.comment.owner_id),
        author: meta.author_username,
        author_avatar_url: meta.author_avatar_url,
        content: meta.comment.content,
        created_at: meta.comment.created_at.to_rfc3339(),
        like_count: meta.like_count,
        liked_by_me: meta.liked_by_me,
        source: CommentSource::Internal,
    }
}

/// Merge the local page with an optional provider page.
///
/// Internal documents always come first. A `None` provider page means the
/// identifier was internal or the provider call degraded.
fn merge_feed(
    internal: Vec<CommentWithMeta>,
    internal_total: i64,
    internal_has_next: bool,
    external: Option<ExternalCommentPage>,
) -> CommentFeed {
    let mut comments: Vec<CommentDoc> = internal.into_iter().map(internal_doc).collect();

    let (external_total, next_page_token, comments_disabled) = match external {
        Some(page) => {
            let total = page.total_results;
            let token = page.next_page_token;
            let disabled = page.disabled;
            comments.extend(page.items.into_iter().map(|c| CommentDoc {
                id: c.id,
                owner_id: None,
                author: c.author,
                author_avatar_url: Some(c.author_avatar_url),
                content: c.content,
                created_at: c.published_at,
                like_count: c.like_count,
                liked_by_me: false,
                source: CommentSource::External,
            }));
            (total, token, disabled)
        }
        None => (0, None, false),
    };

    CommentFeed {
        comments,
        total_comments: internal_total + external_total,
        has_next_page: internal_has_next,
        next_page_token,
        comments_disabled,
    }
}

/// Comment service
pub struct CommentService {
    db: Arc<Database>,
    youtube: YouTubeClient,
}

impl CommentService {
    pub fn new(db: Arc<Database>, youtube: YouTubeClient) -> Self {
        Self { db, youtube }
    }

    /// Post a comment against an internal video or an external provider id.
    ///
    /// # Errors
    /// `NotFound` when an internal target does not exist or is not visible
    /// to the author; `Validation` for empty or oversized content.
    pub async fn post(
        &self,
        author_id: &str,
        identifier: &str,
        content: &str,
    ) -> Result<Comment, AppError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("comment content is required".to_string()));
        }
        if content.chars().count() > MAX_COMMENT_LENGTH {
            return Err(AppError::Validation(format!(
                "comment content exceeds {} characters",
                MAX_COMMENT_LENGTH
            )));
        }

        let target = CommentTarget::from_identifier(identifier);

        if let CommentTarget::Internal(video_id) = &target {
            let video = self.db.get_video(video_id).await?.ok_or(AppError::NotFound)?;
            if !video.is_published && video.owner_id != author_id {
                return Err(AppError::NotFound);
            }
        }

        let now = chrono::Utc::now();
        let comment = Comment {
            id: EntityId::new().0,
            owner_id: author_id.to_string(),
            target,
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.db.insert_comment(&comment).await?;

        Ok(comment)
    }

    /// The hybrid feed for one identifier.
    ///
    /// Local comments are always fetched. For external-shaped identifiers
    /// the provider page is fetched too; a provider failure other than
    /// disabled comments logs and degrades to local-only.
    pub async fn feed(
        &self,
        identifier: &str,
        viewer_id: Option<&str>,
        limit: i64,
        offset: i64,
        page_token: Option<&str>,
    ) -> Result<CommentFeed, AppError> {
        let target = CommentTarget::from_identifier(identifier);

        if let CommentTarget::Internal(video_id) = &target {
            self.db.get_video(video_id).await?.ok_or(AppError::NotFound)?;
        }

        let internal = self
            .db
            .list_comments_with_meta(&target, viewer_id, limit, offset)
            .await?;
        let internal_total = self.db.count_comments(&target).await?;
        let internal_has_next = local_page_has_more(offset, internal.len(), internal_total);

        let external = match &target {
            CommentTarget::Internal(_) => None,
            CommentTarget::External(external_id) => {
                match self.youtube.comments(external_id, page_token).await {
                    Ok(page) => Some(page),
                    Err(e) => {
                        tracing::warn!(
                            video_id = %external_id,
                            error = %e,
                            "provider comments unavailable, serving local only"
                        );
                        None
                    }
                }
            }
        };

        Ok(merge_feed(internal, internal_total, internal_has_next, external))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ExternalComment;
    use chrono::Utc;

    fn internal_meta(id: &str, content: &str) -> CommentWithMeta {
        CommentWithMeta {
            comment: Comment {
                id: id.to_string(),
                owner_id: "owner".to_string(),
                target: CommentTarget::Internal("video".to_string()),
                content: content.to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            author_username: "alice".to_string(),
            author_avatar_url: None,
            like_count: 3,
            liked_by_me: true,
        }
    }

    fn external_comment(id: &str) -> ExternalComment {
        ExternalComment {
            id: id.to_string(),
            author: "Stranger".to_string(),
            author_avatar_url: "https://example.com/a.jpg".to_string(),
            content: "from afar".to_string(),
            published_at: "2024-01-01T00:00:00Z".to_string(),
            like_count: 7,
            reply_count: 0,
        }
    }

    #[test]
    fn local_page_boundaries() {
        assert!(local_page_has_more(0, 10, 11));
        assert!(!local_page_has_more(0, 10, 10));
        assert!(!local_page_has_more(10, 0, 10));
        assert!(local_page_has_more(10, 5, 16));
    }

    #[test]
    fn empty_feed_shape() {
        let feed = merge_feed(vec![], 0, false, None);
        assert!(feed.comments.is_empty());
        assert_eq!(feed.total_comments, 0);
        assert!(!feed.has_next_page);
        assert!(!feed.comments_disabled);
        assert!(feed.next_page_token.is_none());
    }

    #[test]
    fn internal_docs_come_first() {
        let page = ExternalCommentPage {
            items: vec![external_comment("ext-1")],
            next_page_token: Some("tok".to_string()),
            total_results: 100,
            disabled: false,
        };
        let feed = merge_feed(vec![internal_meta("int-1", "hello")], 1, false, Some(page));

        assert_eq!(feed.comments.len(), 2);
        assert_eq!(feed.comments[0].id, "int-1");
        assert_eq!(feed.comments[0].source, CommentSource::Internal);
        assert_eq!(feed.comments[1].id, "ext-1");
        assert_eq!(feed.comments[1].source, CommentSource::External);
        assert!(!feed.comments[1].liked_by_me);
        // Exact local count plus provider estimate
        assert_eq!(feed.total_comments, 101);
        assert_eq!(feed.next_page_token.as_deref(), Some("tok"));
    }

    #[test]
    fn disabled_provider_keeps_internal_side() {
        let feed = merge_feed(
            vec![internal_meta("int-1", "still here")],
            1,
            false,
            Some(ExternalCommentPage::disabled()),
        );
        assert!(feed.comments_disabled);
        assert_eq!(feed.comments.len(), 1);
        assert_eq!(feed.total_comments, 1);
    }

    #[test]
    fn pagination_signals_are_independent() {
        let page = ExternalCommentPage {
            items: vec![],
            next_page_token: Some("more".to_string()),
            total_results: 0,
            disabled: false,
        };
        // Local side exhausted, provider side not
        let feed = merge_feed(vec![], 5, false, Some(page));
        assert!(!feed.has_next_page);
        assert_eq!(feed.next_page_token.as_deref(), Some("more"));
    }
}
