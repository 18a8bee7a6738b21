//! Tweet service
//!
//! Short-form posts and their feeds. Validation lives here so the handlers
//! stay thin.

use std::sync::Arc;

use crate::data::{Database, EntityId, Tweet, TweetFeedFilter, TweetView};
use crate::error::AppError;

const MAX_TWEET_LENGTH: usize = 280;

/// Tweet service
pub struct TweetService {
    db: Arc<Database>,
}

impl TweetService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn validate_content(content: &str) -> Result<&str, AppError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("tweet content is required".to_string()));
        }
        if content.chars().count() > MAX_TWEET_LENGTH {
            return Err(AppError::Validation(format!(
                "tweet content exceeds {} characters",
                MAX_TWEET_LENGTH
            )));
        }
        Ok(content)
    }

    /// Create a top-level tweet.
    pub async fn create(&self, owner_id: &str, content: &str) -> Result<Tweet, AppError> {
        let content = Self::validate_content(content)?;

        let now = chrono::Utc::now();
        let tweet = Tweet {
            id: EntityId::new().0,
            owner_id: owner_id.to_string(),
            content: content.to_string(),
            parent_id: None,
            created_at: now,
            updated_at: now,
        };
        self.db.insert_tweet(&tweet).await?;

        Ok(tweet)
    }

    /// Reply to an existing tweet.
    ///
    /// # Errors
    /// `NotFound` when the parent does not exist; `Validation` when the
    /// author replies to their own tweet.
    pub async fn reply(
        &self,
        owner_id: &str,
        parent_id: &str,
        content: &str,
    ) -> Result<Tweet, AppError> {
        let content = Self::validate_content(content)?;

        let parent = self.db.get_tweet(parent_id).await?.ok_or(AppError::NotFound)?;
        if parent.owner_id == owner_id {
            return Err(AppError::Validation(
                "cannot reply to your own tweet".to_string(),
            ));
        }

        let now = chrono::Utc::now();
        let tweet = Tweet {
            id: EntityId::new().0,
            owner_id: owner_id.to_string(),
            content: content.to_string(),
            parent_id: Some(parent.id),
            created_at: now,
            updated_at: now,
        };
        self.db.insert_tweet(&tweet).await?;

        Ok(tweet)
    }

    /// Update tweet content; ownership and edit-window checks are the
    /// caller's responsibility.
    pub async fn edit(&self, tweet_id: &str, content: &str) -> Result<(), AppError> {
        let content = Self::validate_content(content)?;

        if !self.db.update_tweet_content(tweet_id, content).await? {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /// Delete a tweet. Replies and likes are left in place.
    pub async fn delete(&self, tweet_id: &str) -> Result<(), AppError> {
        self.db.delete_tweet(tweet_id).await
    }

    pub async fn get(&self, tweet_id: &str) -> Result<Option<Tweet>, AppError> {
        self.db.get_tweet(tweet_id).await
    }

    /// One annotated tweet for display.
    pub async fn view(
        &self,
        tweet_id: &str,
        viewer_id: Option<&str>,
    ) -> Result<TweetView, AppError> {
        self.db
            .get_tweet_view(tweet_id, viewer_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// A page of the feed plus the total for the same filter.
    pub async fn feed_page(
        &self,
        filter: &TweetFeedFilter,
        viewer_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TweetView>, i64), AppError> {
        let items = self
            .db
            .list_tweet_views(filter, viewer_id, limit, offset)
            .await?;
        let total = self.db.count_tweets(filter).await?;
        Ok((items, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_validation() {
        assert!(TweetService::validate_content("  ").is_err());
        assert!(TweetService::validate_content("hello").is_ok());
        // Trimmed before use
        assert_eq!(TweetService::validate_content("  hi  ").unwrap(), "hi");

        let at_cap = "x".repeat(280);
        assert!(TweetService::validate_content(&at_cap).is_ok());
        let over_cap = "x".repeat(281);
        assert!(TweetService::validate_content(&over_cap).is_err());
    }

    #[test]
    fn cap_counts_characters_not_bytes() {
        // 280 multi-byte characters are within the cap
        let content = "ü".repeat(280);
        assert!(TweetService::validate_content(&content).is_ok());
    }
}
