//! YouTube Data API v3 proxy
//!
//! Reshapes provider responses into local summary shapes and caches them in
//! the database. Cache reads always precede network calls; cache writes are
//! fire-and-forget so a slow write never delays a response.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::YoutubeConfig;
use crate::data::Database;
use crate::error::AppError;
use crate::metrics::PROVIDER_REQUESTS_TOTAL;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const SEARCH_PAGE_SIZE: u32 = 12;
const COMMENTS_PAGE_SIZE: u32 = 20;

/// An external video reshaped to the local summary shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalVideo {
    pub id: String,
    pub title: String,
    pub description: String,
    pub channel_id: String,
    pub channel_title: String,
    pub thumbnail_url: String,
    pub published_at: String,
    pub duration_seconds: f64,
    pub view_count: i64,
    pub like_count: i64,
}

/// A page of external search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSearchPage {
    pub items: Vec<ExternalVideo>,
    pub next_page_token: Option<String>,
    /// Provider-reported estimate, not an exact count
    pub total_results: i64,
}

/// Full detail for one external video including channel statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalVideoDetails {
    #[serde(flatten)]
    pub video: ExternalVideo,
    pub channel_avatar_url: Option<String>,
    pub channel_subscriber_count: i64,
}

/// One external top-level comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalComment {
    pub id: String,
    pub author: String,
    pub author_avatar_url: String,
    pub content: String,
    pub published_at: String,
    pub like_count: i64,
    pub reply_count: i64,
}

/// A page of external comments.
///
/// `disabled` distinguishes "this video forbids comments" from an empty page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalCommentPage {
    pub items: Vec<ExternalComment>,
    pub next_page_token: Option<String>,
    /// Provider-reported estimate, not an exact count
    pub total_results: i64,
    pub disabled: bool,
}

impl ExternalCommentPage {
    pub fn disabled() -> Self {
        Self {
            items: Vec::new(),
            next_page_token: None,
            total_results: 0,
            disabled: true,
        }
    }
}

/// Client for the YouTube Data API with a database-backed response cache.
#[derive(Clone)]
pub struct YouTubeClient {
    http: reqwest::Client,
    db: Database,
    api_key: Option<String>,
    cache_ttl_seconds: i64,
}

impl YouTubeClient {
    /// Build a client from configuration.
    ///
    /// A missing API key is allowed here; only actual provider calls fail.
    pub fn new(config: &YoutubeConfig, db: Database) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            db,
            api_key: config.api_key.clone(),
            cache_ttl_seconds: config.cache_ttl_seconds,
        })
    }

    fn api_key(&self) -> Result<&str, AppError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("youtube.api_key is not configured".to_string()))
    }

    /// Look up the cache, falling back to `fetch` and caching its result.
    async fn cached<T, F>(&self, cache_key: &str, fetch: F) -> Result<T, AppError>
    where
        T: Serialize + serde::de::DeserializeOwned,
        F: std::future::Future<Output = Result<T, AppError>>,
    {
        if let Some(hit) = self
            .db
            .get_cached_response(cache_key, self.cache_ttl_seconds)
            .await?
        {
            if let Ok(value) = serde_json::from_value::<T>(hit) {
                tracing::debug!(cache_key = %cache_key, "provider cache hit");
                return Ok(value);
            }
            // Shape drift after a deploy; treat as a miss.
            tracing::warn!(cache_key = %cache_key, "discarding unreadable cache entry");
        }

        let fresh = fetch.await?;

        if let Ok(payload) = serde_json::to_value(&fresh) {
            let db = self.db.clone();
            let key = cache_key.to_string();
            let ttl = self.cache_ttl_seconds;
            tokio::spawn(async move {
                if let Err(e) = db.put_cached_response(&key, &payload, ttl).await {
                    tracing::warn!(cache_key = %key, error = %e, "cache write failed");
                }
            });
        }

        Ok(fresh)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        operation: &'static str,
        url: &str,
    ) -> Result<T, AppError> {
        let response = self.http.get(url).send().await.map_err(|e| {
            PROVIDER_REQUESTS_TOTAL
                .with_label_values(&[operation, "error"])
                .inc();
            AppError::HttpClient(e)
        })?;

        if !response.status().is_success() {
            PROVIDER_REQUESTS_TOTAL
                .with_label_values(&[operation, "error"])
                .inc();
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if body.contains("commentsDisabled") {
                return Err(AppError::Validation("commentsDisabled".to_string()));
            }

            tracing::warn!(operation = operation, status = %status, "provider request failed");
            return Err(AppError::Upstream(format!(
                "provider returned {} for {}",
                status, operation
            )));
        }

        PROVIDER_REQUESTS_TOTAL
            .with_label_values(&[operation, "ok"])
            .inc();

        Ok(response.json().await?)
    }

    /// Search videos, reshaped and cached under `search:<query>:<token>`.
    pub async fn search(
        &self,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<ExternalSearchPage, AppError> {
        let cache_key = format!("search:{}:{}", query, page_token.unwrap_or(""));
        self.cached(&cache_key, self.search_uncached(query, page_token))
            .await
    }

    async fn search_uncached(
        &self,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<ExternalSearchPage, AppError> {
        let key = self.api_key()?;

        #[derive(Deserialize)]
        struct SearchResponse {
            items: Vec<SearchItem>,
            #[serde(rename = "nextPageToken")]
            next_page_token: Option<String>,
            #[serde(rename = "pageInfo")]
            page_info: PageInfo,
        }

        #[derive(Deserialize)]
        struct PageInfo {
            #[serde(rename = "totalResults", default)]
            total_results: i64,
        }

        #[derive(Deserialize)]
        struct SearchItem {
            id: SearchItemId,
        }

        #[derive(Deserialize)]
        struct SearchItemId {
            #[serde(rename = "videoId", default)]
            video_id: Option<String>,
        }

        let mut url = format!(
            "{}/search?part=snippet&type=video&maxResults={}&q={}&key={}",
            API_BASE,
            SEARCH_PAGE_SIZE,
            urlencoding::encode(query),
            key
        );
        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", token));
        }

        let data: SearchResponse = self.get_json("search", &url).await?;

        let ids: Vec<String> = data
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .collect();

        // Search snippets lack statistics and duration; fetch details in one
        // batched videos call.
        let items = if ids.is_empty() {
            Vec::new()
        } else {
            self.fetch_video_batch(&ids).await?
        };

        Ok(ExternalSearchPage {
            items,
            next_page_token: data.next_page_token,
            total_results: data.page_info.total_results,
        })
    }

    async fn fetch_video_batch(&self, ids: &[String]) -> Result<Vec<ExternalVideo>, AppError> {
        let key = self.api_key()?;

        let url = format!(
            "{}/videos?part=snippet,statistics,contentDetails&id={}&key={}",
            API_BASE,
            ids.join(","),
            key
        );

        let data: VideosResponse = self.get_json("videos", &url).await?;

        Ok(data.items.into_iter().map(reshape_video).collect())
    }

    /// Full detail for one video, cached under `video:<id>`.
    pub async fn video_details(&self, video_id: &str) -> Result<ExternalVideoDetails, AppError> {
        let cache_key = format!("video:{}", video_id);
        self.cached(&cache_key, self.video_details_uncached(video_id))
            .await
    }

    async fn video_details_uncached(
        &self,
        video_id: &str,
    ) -> Result<ExternalVideoDetails, AppError> {
        let key = self.api_key()?;

        let url = format!(
            "{}/videos?part=snippet,statistics,contentDetails&id={}&key={}",
            API_BASE, video_id, key
        );
        let data: VideosResponse = self.get_json("videos", &url).await?;
        let video = data
            .items
            .into_iter()
            .next()
            .map(reshape_video)
            .ok_or(AppError::NotFound)?;

        #[derive(Deserialize)]
        struct ChannelsResponse {
            #[serde(default)]
            items: Vec<ChannelItem>,
        }

        #[derive(Deserialize)]
        struct ChannelItem {
            snippet: ChannelSnippet,
            statistics: ChannelStatistics,
        }

        #[derive(Deserialize)]
        struct ChannelSnippet {
            thumbnails: Thumbnails,
        }

        #[derive(Deserialize)]
        struct ChannelStatistics {
            #[serde(rename = "subscriberCount", default)]
            subscriber_count: String,
        }

        let url = format!(
            "{}/channels?part=snippet,statistics&id={}&key={}",
            API_BASE, video.channel_id, key
        );
        let channels: ChannelsResponse = self.get_json("channels", &url).await?;
        let channel = channels.items.into_iter().next();

        let (channel_avatar_url, channel_subscriber_count) = match channel {
            Some(c) => (
                c.snippet.thumbnails.best(),
                c.statistics.subscriber_count.parse().unwrap_or(0),
            ),
            None => (None, 0),
        };

        Ok(ExternalVideoDetails {
            video,
            channel_avatar_url,
            channel_subscriber_count,
        })
    }

    /// Top-level comments for a video; not cached, comments move too fast.
    ///
    /// A provider "commentsDisabled" rejection is a successful response with
    /// `disabled = true`, not an error.
    pub async fn comments(
        &self,
        video_id: &str,
        page_token: Option<&str>,
    ) -> Result<ExternalCommentPage, AppError> {
        let key = self.api_key()?;

        #[derive(Deserialize)]
        struct ThreadsResponse {
            #[serde(default)]
            items: Vec<Thread>,
            #[serde(rename = "nextPageToken")]
            next_page_token: Option<String>,
            #[serde(rename = "pageInfo")]
            page_info: ThreadsPageInfo,
        }

        #[derive(Deserialize)]
        struct ThreadsPageInfo {
            #[serde(rename = "totalResults", default)]
            total_results: i64,
        }

        #[derive(Deserialize)]
        struct Thread {
            id: String,
            snippet: ThreadSnippet,
        }

        #[derive(Deserialize)]
        struct ThreadSnippet {
            #[serde(rename = "topLevelComment")]
            top_level_comment: TopLevelComment,
            #[serde(rename = "totalReplyCount", default)]
            total_reply_count: i64,
        }

        #[derive(Deserialize)]
        struct TopLevelComment {
            snippet: CommentSnippet,
        }

        #[derive(Deserialize)]
        struct CommentSnippet {
            #[serde(rename = "authorDisplayName")]
            author_display_name: String,
            #[serde(rename = "authorProfileImageUrl", default)]
            author_profile_image_url: String,
            #[serde(rename = "textDisplay", default)]
            text_display: String,
            #[serde(rename = "publishedAt")]
            published_at: String,
            #[serde(rename = "likeCount", default)]
            like_count: i64,
        }

        let mut url = format!(
            "{}/commentThreads?part=snippet&videoId={}&maxResults={}&textFormat=plainText&key={}",
            API_BASE, video_id, COMMENTS_PAGE_SIZE, key
        );
        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", token));
        }

        let data: ThreadsResponse = match self.get_json::<ThreadsResponse>("comments", &url).await {
            Ok(data) => data,
            Err(AppError::Validation(reason)) if reason == "commentsDisabled" => {
                return Ok(ExternalCommentPage::disabled());
            }
            Err(e) => return Err(e),
        };

        let items = data
            .items
            .into_iter()
            .map(|thread| {
                let snippet = thread.snippet.top_level_comment.snippet;
                ExternalComment {
                    id: thread.id,
                    author: snippet.author_display_name,
                    author_avatar_url: snippet.author_profile_image_url,
                    content: snippet.text_display,
                    published_at: snippet.published_at,
                    like_count: snippet.like_count,
                    reply_count: thread.snippet.total_reply_count,
                }
            })
            .collect();

        Ok(ExternalCommentPage {
            items,
            next_page_token: data.next_page_token,
            total_results: data.page_info.total_results,
            disabled: false,
        })
    }
}

// =============================================================================
// Shared provider response shapes
// =============================================================================

#[derive(Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Deserialize)]
struct VideoItem {
    id: String,
    snippet: VideoSnippet,
    statistics: VideoStatistics,
    #[serde(rename = "contentDetails")]
    content_details: ContentDetails,
}

#[derive(Deserialize)]
struct VideoSnippet {
    title: String,
    description: String,
    #[serde(rename = "channelId")]
    channel_id: String,
    #[serde(rename = "channelTitle")]
    channel_title: String,
    #[serde(rename = "publishedAt")]
    published_at: String,
    thumbnails: Thumbnails,
}

#[derive(Deserialize)]
struct VideoStatistics {
    // Statistics come back as strings from the provider
    #[serde(rename = "viewCount", default)]
    view_count: String,
    #[serde(rename = "likeCount", default)]
    like_count: String,
}

#[derive(Deserialize)]
struct ContentDetails {
    duration: String,
}

#[derive(Deserialize, Default)]
struct Thumbnails {
    #[serde(default)]
    high: Option<Thumbnail>,
    #[serde(default)]
    medium: Option<Thumbnail>,
    #[serde(default)]
    default: Option<Thumbnail>,
}

#[derive(Deserialize)]
struct Thumbnail {
    url: String,
}

impl Thumbnails {
    fn best(self) -> Option<String> {
        self.high
            .or(self.medium)
            .or(self.default)
            .map(|t| t.url)
    }
}

fn reshape_video(item: VideoItem) -> ExternalVideo {
    let thumbnail_url = item
        .snippet
        .thumbnails
        .best()
        .unwrap_or_else(|| format!("https://img.youtube.com/vi/{}/hqdefault.jpg", item.id));

    ExternalVideo {
        id: item.id,
        title: item.snippet.title,
        description: item.snippet.description,
        channel_id: item.snippet.channel_id,
        channel_title: item.snippet.channel_title,
        thumbnail_url,
        published_at: item.snippet.published_at,
        duration_seconds: parse_iso_duration(&item.content_details.duration),
        view_count: item.statistics.view_count.parse().unwrap_or(0),
        like_count: item.statistics.like_count.parse().unwrap_or(0),
    }
}

/// Parse an ISO 8601 duration like "PT1H2M3S" into seconds.
fn parse_iso_duration(duration: &str) -> f64 {
    let mut seconds = 0u64;
    let mut num = String::new();

    for c in duration.chars() {
        if c.is_ascii_digit() {
            num.push(c);
        } else {
            let n: u64 = num.parse().unwrap_or(0);
            num.clear();

            match c {
                'H' => seconds += n * 3600,
                'M' => seconds += n * 60,
                'S' => seconds += n,
                _ => {}
            }
        }
    }

    seconds as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_duration_parsing() {
        assert_eq!(parse_iso_duration("PT1H2M3S"), 3723.0);
        assert_eq!(parse_iso_duration("PT15M"), 900.0);
        assert_eq!(parse_iso_duration("PT42S"), 42.0);
        assert_eq!(parse_iso_duration("P0D"), 0.0);
        assert_eq!(parse_iso_duration(""), 0.0);
    }

    #[test]
    fn thumbnail_preference_order() {
        let thumbs = Thumbnails {
            high: Some(Thumbnail {
                url: "high".to_string(),
            }),
            medium: Some(Thumbnail {
                url: "medium".to_string(),
            }),
            default: None,
        };
        assert_eq!(thumbs.best().as_deref(), Some("high"));

        let thumbs = Thumbnails {
            high: None,
            medium: None,
            default: Some(Thumbnail {
                url: "default".to_string(),
            }),
        };
        assert_eq!(thumbs.best().as_deref(), Some("default"));
    }

    #[test]
    fn disabled_page_shape() {
        let page = ExternalCommentPage::disabled();
        assert!(page.disabled);
        assert!(page.items.is_empty());
        assert!(page.next_page_token.is_none());
    }
}
