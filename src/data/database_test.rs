//! Database tests

use super::*;
use chrono::Utc;
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::connect(&db_path).await.unwrap();
    (db, temp_dir)
}

fn test_user(username: &str) -> User {
    User {
        id: EntityId::new().0,
        username: username.to_lowercase(),
        email: format!("{}@example.com", username.to_lowercase()),
        full_name: format!("{} Example", username),
        password_hash: "argon2-hash".to_string(),
        avatar_url: None,
        cover_image_url: None,
        about: None,
        role: "user".to_string(),
        refresh_token: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn test_video(owner: &User, title: &str) -> Video {
    Video {
        id: EntityId::new().0,
        owner_id: owner.id.clone(),
        title: title.to_string(),
        description: "A test video".to_string(),
        media_url: "https://media.example.com/videos/test.mp4".to_string(),
        thumbnail_url: "https://media.example.com/thumbnails/test.webp".to_string(),
        duration_seconds: 42.5,
        view_count: 0,
        is_published: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn test_comment(owner: &User, target: CommentTarget, content: &str) -> Comment {
    Comment {
        id: EntityId::new().0,
        owner_id: owner.id.clone(),
        target,
        content: content.to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn test_tweet(owner: &User, content: &str, parent_id: Option<String>) -> Tweet {
    Tweet {
        id: EntityId::new().0,
        owner_id: owner.id.clone(),
        content: content.to_string(),
        parent_id,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_database_connection() {
    let (_db, _temp_dir) = create_test_db().await;
    // Connection successful if we get here without panicking
}

#[tokio::test]
async fn test_user_insert_and_lookup() {
    let (db, _temp_dir) = create_test_db().await;

    let user = test_user("alice");
    db.insert_user(&user).await.unwrap();

    let by_id = db.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(by_id.username, "alice");

    // Lookup is case-insensitive
    let by_name = db.get_user_by_username("ALICE").await.unwrap();
    assert!(by_name.is_some());

    let by_login = db.get_user_by_login("alice@example.com").await.unwrap();
    assert!(by_login.is_some());
}

#[tokio::test]
async fn test_login_lookup_by_mixed_case_email() {
    let (db, _temp_dir) = create_test_db().await;

    db.insert_user(&test_user("alice")).await.unwrap();

    // Emails are stored lowercased; login must accept any casing
    let by_login = db.get_user_by_login("Alice@Example.com").await.unwrap();
    assert!(by_login.is_some());
    assert_eq!(by_login.unwrap().username, "alice");
}

#[tokio::test]
async fn test_username_conflict_is_case_insensitive() {
    let (db, _temp_dir) = create_test_db().await;

    db.insert_user(&test_user("alice")).await.unwrap();

    // Same username, different casing, normalized before insert
    let mut dup = test_user("Alice");
    dup.email = "other@example.com".to_string();

    let error = db.insert_user(&dup).await.expect_err("duplicate username");
    assert!(matches!(error, crate::error::AppError::Conflict(_)));
}

#[tokio::test]
async fn test_refresh_token_roundtrip() {
    let (db, _temp_dir) = create_test_db().await;

    let user = test_user("alice");
    db.insert_user(&user).await.unwrap();

    assert!(db.set_refresh_token(&user.id, Some("token-1")).await.unwrap());
    let stored = db.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(stored.refresh_token.as_deref(), Some("token-1"));

    // Logout clears it
    assert!(db.set_refresh_token(&user.id, None).await.unwrap());
    let stored = db.get_user(&user.id).await.unwrap().unwrap();
    assert!(stored.refresh_token.is_none());
}

#[tokio::test]
async fn test_video_crud_and_views() {
    let (db, _temp_dir) = create_test_db().await;

    let owner = test_user("alice");
    db.insert_user(&owner).await.unwrap();
    let video = test_video(&owner, "First upload");
    db.insert_video(&video).await.unwrap();

    let fetched = db.get_video(&video.id).await.unwrap().unwrap();
    assert_eq!(fetched.title, "First upload");
    assert_eq!(fetched.view_count, 0);

    assert_eq!(db.increment_view_count(&video.id).await.unwrap(), 1);
    assert_eq!(db.increment_view_count(&video.id).await.unwrap(), 2);

    // Unpublish and check listing visibility
    assert!(!db.toggle_video_published(&video.id).await.unwrap());
    let listed = db.list_published_videos(None, None, 10, 0).await.unwrap();
    assert!(listed.is_empty());
    assert!(db.toggle_video_published(&video.id).await.unwrap());
    let listed = db.list_published_videos(None, None, 10, 0).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_video_text_filter() {
    let (db, _temp_dir) = create_test_db().await;

    let owner = test_user("alice");
    db.insert_user(&owner).await.unwrap();
    db.insert_video(&test_video(&owner, "Cooking pasta")).await.unwrap();
    db.insert_video(&test_video(&owner, "Rust tutorial")).await.unwrap();

    let hits = db
        .list_published_videos(Some("pasta"), None, 10, 0)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Cooking pasta");
    assert_eq!(
        db.count_published_videos(Some("pasta"), None).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_listing_page_beyond_end_is_empty() {
    let (db, _temp_dir) = create_test_db().await;

    let owner = test_user("alice");
    db.insert_user(&owner).await.unwrap();
    db.insert_video(&test_video(&owner, "Only video")).await.unwrap();

    // Page far past the end: empty list, not an error
    let videos = db.list_published_videos(None, None, 10, 100).await.unwrap();
    assert!(videos.is_empty());
}

#[tokio::test]
async fn test_toggle_like_idempotent_pair() {
    let (db, _temp_dir) = create_test_db().await;

    let user = test_user("alice");
    db.insert_user(&user).await.unwrap();
    let video = test_video(&user, "Liked video");
    db.insert_video(&video).await.unwrap();

    assert_eq!(db.count_likes(LikeTargetKind::Video, &video.id).await.unwrap(), 0);

    // On
    assert!(db.toggle_like(&user.id, LikeTargetKind::Video, &video.id).await.unwrap());
    assert_eq!(db.count_likes(LikeTargetKind::Video, &video.id).await.unwrap(), 1);
    assert!(db.has_liked(&user.id, LikeTargetKind::Video, &video.id).await.unwrap());

    // Off: back to the original state
    assert!(!db.toggle_like(&user.id, LikeTargetKind::Video, &video.id).await.unwrap());
    assert_eq!(db.count_likes(LikeTargetKind::Video, &video.id).await.unwrap(), 0);
    assert!(!db.has_liked(&user.id, LikeTargetKind::Video, &video.id).await.unwrap());
}

#[tokio::test]
async fn test_toggle_subscription_pair() {
    let (db, _temp_dir) = create_test_db().await;

    let viewer = test_user("viewer");
    let channel = test_user("channel");
    db.insert_user(&viewer).await.unwrap();
    db.insert_user(&channel).await.unwrap();

    assert!(db.toggle_subscription(&viewer.id, &channel.id).await.unwrap());
    assert!(db.is_subscribed(&viewer.id, &channel.id).await.unwrap());
    assert_eq!(db.count_subscribers(&channel.id).await.unwrap(), 1);

    assert!(!db.toggle_subscription(&viewer.id, &channel.id).await.unwrap());
    assert!(!db.is_subscribed(&viewer.id, &channel.id).await.unwrap());
    assert_eq!(db.count_subscribers(&channel.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_comment_targets_and_meta() {
    let (db, _temp_dir) = create_test_db().await;

    let owner = test_user("alice");
    let viewer = test_user("bob");
    db.insert_user(&owner).await.unwrap();
    db.insert_user(&viewer).await.unwrap();
    let video = test_video(&owner, "Commented video");
    db.insert_video(&video).await.unwrap();

    let internal = test_comment(
        &owner,
        CommentTarget::Internal(video.id.clone()),
        "internal comment",
    );
    db.insert_comment(&internal).await.unwrap();

    let external = test_comment(
        &owner,
        CommentTarget::External("dQw4w9WgXcQ".to_string()),
        "external comment",
    );
    db.insert_comment(&external).await.unwrap();

    // Scoping: internal target sees only its own comment
    let internal_target = CommentTarget::Internal(video.id.clone());
    assert_eq!(db.count_comments(&internal_target).await.unwrap(), 1);
    let external_target = CommentTarget::External("dQw4w9WgXcQ".to_string());
    assert_eq!(db.count_comments(&external_target).await.unwrap(), 1);

    // Like metadata, guest vs. liker
    db.toggle_like(&viewer.id, LikeTargetKind::Comment, &internal.id)
        .await
        .unwrap();

    let as_guest = db
        .list_comments_with_meta(&internal_target, None, 10, 0)
        .await
        .unwrap();
    assert_eq!(as_guest.len(), 1);
    assert_eq!(as_guest[0].like_count, 1);
    assert!(!as_guest[0].liked_by_me);
    assert_eq!(as_guest[0].author_username, "alice");

    let as_viewer = db
        .list_comments_with_meta(&internal_target, Some(&viewer.id), 10, 0)
        .await
        .unwrap();
    assert!(as_viewer[0].liked_by_me);
}

#[tokio::test]
async fn test_video_delete_cascade() {
    let (db, _temp_dir) = create_test_db().await;

    let owner = test_user("alice");
    let viewer = test_user("bob");
    db.insert_user(&owner).await.unwrap();
    db.insert_user(&viewer).await.unwrap();
    let video = test_video(&owner, "Doomed video");
    db.insert_video(&video).await.unwrap();

    let comment = test_comment(
        &viewer,
        CommentTarget::Internal(video.id.clone()),
        "soon gone",
    );
    db.insert_comment(&comment).await.unwrap();
    db.toggle_like(&viewer.id, LikeTargetKind::Video, &video.id).await.unwrap();
    db.toggle_like(&owner.id, LikeTargetKind::Comment, &comment.id).await.unwrap();
    db.record_watch(&viewer.id, &video.id).await.unwrap();

    let playlist = Playlist {
        id: EntityId::new().0,
        owner_id: viewer.id.clone(),
        name: "Favourites".to_string(),
        description: String::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    db.insert_playlist(&playlist).await.unwrap();
    db.add_video_to_playlist(&playlist.id, &video.id).await.unwrap();

    db.delete_video_cascade(&video.id).await.unwrap();

    assert!(db.get_video(&video.id).await.unwrap().is_none());
    let target = CommentTarget::Internal(video.id.clone());
    assert_eq!(db.count_comments(&target).await.unwrap(), 0);
    assert_eq!(db.count_likes(LikeTargetKind::Video, &video.id).await.unwrap(), 0);
    assert_eq!(db.count_likes(LikeTargetKind::Comment, &comment.id).await.unwrap(), 0);
    assert!(db.list_playlist_videos(&playlist.id).await.unwrap().is_empty());
    assert_eq!(db.count_watch_history(&viewer.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_watch_history_dedupe_and_order() {
    let (db, _temp_dir) = create_test_db().await;

    let user = test_user("alice");
    db.insert_user(&user).await.unwrap();
    let first = test_video(&user, "First");
    let second = test_video(&user, "Second");
    db.insert_video(&first).await.unwrap();
    db.insert_video(&second).await.unwrap();

    db.record_watch(&user.id, &first.id).await.unwrap();
    db.record_watch(&user.id, &second.id).await.unwrap();
    // Re-view moves the entry to the front instead of duplicating it
    db.record_watch(&user.id, &first.id).await.unwrap();

    assert_eq!(db.count_watch_history(&user.id).await.unwrap(), 2);
    let history = db.list_watch_history(&user.id, 10, 0).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, first.id);
    assert_eq!(history[1].id, second.id);
}

#[tokio::test]
async fn test_playlist_duplicate_add_is_noop() {
    let (db, _temp_dir) = create_test_db().await;

    let user = test_user("alice");
    db.insert_user(&user).await.unwrap();
    let video = test_video(&user, "In playlist");
    db.insert_video(&video).await.unwrap();

    let playlist = Playlist {
        id: EntityId::new().0,
        owner_id: user.id.clone(),
        name: "Watch later".to_string(),
        description: String::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    db.insert_playlist(&playlist).await.unwrap();

    assert!(db.add_video_to_playlist(&playlist.id, &video.id).await.unwrap());
    assert!(!db.add_video_to_playlist(&playlist.id, &video.id).await.unwrap());
    assert_eq!(db.list_playlist_videos(&playlist.id).await.unwrap().len(), 1);

    assert!(db.remove_video_from_playlist(&playlist.id, &video.id).await.unwrap());
    assert!(db.list_playlist_videos(&playlist.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_tweet_feed_filters_and_stats() {
    let (db, _temp_dir) = create_test_db().await;

    let alice = test_user("alice");
    let bob = test_user("bob");
    let carol = test_user("carol");
    db.insert_user(&alice).await.unwrap();
    db.insert_user(&bob).await.unwrap();
    db.insert_user(&carol).await.unwrap();

    let from_bob = test_tweet(&bob, "hello from bob", None);
    let from_carol = test_tweet(&carol, "hello from carol", None);
    db.insert_tweet(&from_bob).await.unwrap();
    db.insert_tweet(&from_carol).await.unwrap();
    let reply = test_tweet(&alice, "replying to bob", Some(from_bob.id.clone()));
    db.insert_tweet(&reply).await.unwrap();

    db.toggle_like(&alice.id, LikeTargetKind::Tweet, &from_bob.id).await.unwrap();
    // Alice subscribes to bob only
    db.toggle_subscription(&alice.id, &bob.id).await.unwrap();

    // Global feed: top-level tweets only
    let global = db
        .list_tweet_views(&TweetFeedFilter::Global, Some(&alice.id), 10, 0)
        .await
        .unwrap();
    assert_eq!(global.len(), 2);
    let bob_view = global.iter().find(|t| t.tweet.id == from_bob.id).unwrap();
    assert_eq!(bob_view.like_count, 1);
    assert_eq!(bob_view.reply_count, 1);
    assert!(bob_view.liked_by_me);
    assert_eq!(bob_view.author_username, "bob");

    // Guest requester: liked_by_me is false, never an error
    let as_guest = db
        .list_tweet_views(&TweetFeedFilter::Global, None, 10, 0)
        .await
        .unwrap();
    assert!(as_guest.iter().all(|t| !t.liked_by_me));

    // Personalized: alice's own tweets plus bob's, not carol's
    let personalized = db
        .list_tweet_views(
            &TweetFeedFilter::Personalized {
                user_id: alice.id.clone(),
            },
            Some(&alice.id),
            10,
            0,
        )
        .await
        .unwrap();
    assert_eq!(personalized.len(), 1);
    assert_eq!(personalized[0].tweet.id, from_bob.id);

    // Replies
    let replies = db
        .list_tweet_views(
            &TweetFeedFilter::RepliesTo {
                tweet_id: from_bob.id.clone(),
            },
            None,
            10,
            0,
        )
        .await
        .unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].tweet.id, reply.id);
}

#[tokio::test]
async fn test_tweet_delete_leaves_replies() {
    let (db, _temp_dir) = create_test_db().await;

    let alice = test_user("alice");
    db.insert_user(&alice).await.unwrap();

    let parent = test_tweet(&alice, "parent", None);
    db.insert_tweet(&parent).await.unwrap();
    let reply = test_tweet(&alice, "child", Some(parent.id.clone()));
    db.insert_tweet(&reply).await.unwrap();
    db.toggle_like(&alice.id, LikeTargetKind::Tweet, &parent.id).await.unwrap();

    db.delete_tweet(&parent.id).await.unwrap();

    // Known gap, kept deliberately: replies and likes survive the parent
    assert!(db.get_tweet(&reply.id).await.unwrap().is_some());
    assert_eq!(db.count_likes(LikeTargetKind::Tweet, &parent.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_delete_user_cascade() {
    let (db, _temp_dir) = create_test_db().await;

    let alice = test_user("alice");
    let bob = test_user("bob");
    db.insert_user(&alice).await.unwrap();
    db.insert_user(&bob).await.unwrap();

    let video = test_video(&alice, "Alice video");
    db.insert_video(&video).await.unwrap();
    let tweet = test_tweet(&alice, "alice tweet", None);
    db.insert_tweet(&tweet).await.unwrap();
    let comment = test_comment(
        &alice,
        CommentTarget::External("dQw4w9WgXcQ".to_string()),
        "alice comment",
    );
    db.insert_comment(&comment).await.unwrap();
    db.toggle_subscription(&bob.id, &alice.id).await.unwrap();
    db.toggle_like(&bob.id, LikeTargetKind::Tweet, &tweet.id).await.unwrap();
    db.record_watch(&alice.id, &video.id).await.unwrap();

    db.delete_user_cascade(&alice.id).await.unwrap();

    assert!(db.get_user(&alice.id).await.unwrap().is_none());
    assert!(db.get_video(&video.id).await.unwrap().is_none());
    assert!(db.get_tweet(&tweet.id).await.unwrap().is_none());
    assert!(db.get_comment(&comment.id).await.unwrap().is_none());
    assert_eq!(db.count_subscribers(&alice.id).await.unwrap(), 0);
    assert_eq!(db.count_likes(LikeTargetKind::Tweet, &tweet.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_owned_media_urls_cover_all_videos() {
    let (db, _temp_dir) = create_test_db().await;

    let alice = test_user("alice");
    let bob = test_user("bob");
    db.insert_user(&alice).await.unwrap();
    db.insert_user(&bob).await.unwrap();

    let mut published = test_video(&alice, "Published");
    published.media_url = "https://media.example.com/videos/a.mp4".to_string();
    published.thumbnail_url = "https://media.example.com/thumbnails/a.webp".to_string();
    db.insert_video(&published).await.unwrap();

    // Unpublished videos still occupy storage
    let mut draft = test_video(&alice, "Draft");
    draft.media_url = "https://media.example.com/videos/b.mp4".to_string();
    draft.thumbnail_url = "https://media.example.com/thumbnails/b.webp".to_string();
    draft.is_published = false;
    db.insert_video(&draft).await.unwrap();

    db.insert_video(&test_video(&bob, "Someone else's")).await.unwrap();

    let urls = db.list_owned_media_urls(&alice.id).await.unwrap();
    assert_eq!(urls.len(), 4);
    assert!(urls.contains(&"https://media.example.com/videos/a.mp4".to_string()));
    assert!(urls.contains(&"https://media.example.com/thumbnails/a.webp".to_string()));
    assert!(urls.contains(&"https://media.example.com/videos/b.mp4".to_string()));
    assert!(urls.contains(&"https://media.example.com/thumbnails/b.webp".to_string()));
}

#[tokio::test]
async fn test_watch_history_cap_evicts_oldest() {
    let (db, _temp_dir) = create_test_db().await;

    let user = test_user("alice");
    db.insert_user(&user).await.unwrap();

    let mut video_ids = Vec::new();
    for i in 0..(WATCH_HISTORY_CAP + 3) {
        let video = test_video(&user, &format!("Video {}", i));
        db.insert_video(&video).await.unwrap();
        db.record_watch(&user.id, &video.id).await.unwrap();
        video_ids.push(video.id);
    }

    assert_eq!(db.count_watch_history(&user.id).await.unwrap(), WATCH_HISTORY_CAP);

    let history = db
        .list_watch_history(&user.id, WATCH_HISTORY_CAP, 0)
        .await
        .unwrap();
    assert_eq!(history.len() as i64, WATCH_HISTORY_CAP);

    // Newest first; the earliest three watches were evicted
    assert_eq!(history[0].id, *video_ids.last().unwrap());
    let kept: Vec<&String> = history.iter().map(|v| &v.id).collect();
    assert!(!kept.contains(&&video_ids[0]));
    assert!(!kept.contains(&&video_ids[1]));
    assert!(!kept.contains(&&video_ids[2]));
}

#[tokio::test]
async fn test_channel_stats() {
    let (db, _temp_dir) = create_test_db().await;

    let alice = test_user("alice");
    let bob = test_user("bob");
    db.insert_user(&alice).await.unwrap();
    db.insert_user(&bob).await.unwrap();

    let video = test_video(&alice, "Stats video");
    db.insert_video(&video).await.unwrap();
    db.increment_view_count(&video.id).await.unwrap();
    db.increment_view_count(&video.id).await.unwrap();
    db.toggle_like(&bob.id, LikeTargetKind::Video, &video.id).await.unwrap();
    db.toggle_subscription(&bob.id, &alice.id).await.unwrap();

    let stats = db.channel_stats(&alice.id).await.unwrap();
    assert_eq!(stats.total_videos, 1);
    assert_eq!(stats.total_views, 2);
    assert_eq!(stats.total_subscribers, 1);
    assert_eq!(stats.total_likes, 1);
}

#[tokio::test]
async fn test_api_cache_ttl() {
    let (db, _temp_dir) = create_test_db().await;

    let payload = serde_json::json!({"items": [1, 2, 3]});
    db.put_cached_response("search:rust:", &payload, 3600).await.unwrap();

    let hit = db.get_cached_response("search:rust:", 3600).await.unwrap();
    assert_eq!(hit, Some(payload.clone()));

    // Expired entries are invisible to reads
    let miss = db.get_cached_response("search:rust:", 0).await.unwrap();
    assert!(miss.is_none());

    // Unknown key
    let miss = db.get_cached_response("video:unknown", 3600).await.unwrap();
    assert!(miss.is_none());

    // Upsert replaces the payload
    let newer = serde_json::json!({"items": []});
    db.put_cached_response("search:rust:", &newer, 3600).await.unwrap();
    let hit = db.get_cached_response("search:rust:", 3600).await.unwrap();
    assert_eq!(hit, Some(newer));
}
