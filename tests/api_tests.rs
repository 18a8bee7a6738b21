// tests/api_tests.rs

use std::path::PathBuf;

use tempfile::TempDir;
use vidnest::config::{
    AppConfig, AuthConfig, DatabaseConfig, LoggingConfig, ServerConfig, StorageConfig,
    YoutubeConfig,
};
use vidnest::{AppState, build_router};

fn test_config(db_path: PathBuf) -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origin: String::new(),
        },
        database: DatabaseConfig { path: db_path },
        storage: StorageConfig {
            bucket: "test-media".to_string(),
            public_url: "https://media.test.invalid".to_string(),
            endpoint: "https://storage.test.invalid".to_string(),
            access_key_id: "test".to_string(),
            secret_access_key: "test".to_string(),
        },
        auth: AuthConfig {
            access_token_secret: "integration-test-access-secret-0123456789".to_string(),
            access_token_ttl_seconds: 600,
            refresh_token_secret: "integration-test-refresh-secret-0123456789".to_string(),
            refresh_token_ttl_seconds: 86_400,
        },
        // No API key: provider endpoints fail, everything else works
        youtube: YoutubeConfig {
            api_key: None,
            cache_ttl_seconds: 3600,
            request_timeout_seconds: 2,
        },
        logging: LoggingConfig {
            level: "error".to_string(),
            format: "pretty".to_string(),
        },
    }
}

/// Spawn the app on a random port. Returns the base URL and the temp dir
/// holding the database (kept alive for the test's duration).
async fn spawn_app() -> (String, TempDir) {
    spawn_app_with(|_| {}).await
}

/// Spawn with test defaults adjusted by `customize`.
async fn spawn_app_with(customize: impl FnOnce(&mut AppConfig)) -> (String, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let mut config = test_config(temp_dir.path().join("test.db"));
    customize(&mut config);

    let state = AppState::new(config).await.expect("app state");
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, temp_dir)
}

async fn register(client: &reqwest::Client, address: &str, username: &str) -> serde_json::Value {
    let response = client
        .post(format!("{}/api/v1/users/register", address))
        .json(&serde_json::json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "fullName": format!("{} Example", username),
            "password": "password123",
        }))
        .send()
        .await
        .expect("register request");
    assert_eq!(response.status().as_u16(), 201);
    response.json().await.expect("register body")
}

/// Register and log in, returning the access token.
async fn register_and_login(client: &reqwest::Client, address: &str, username: &str) -> String {
    register(client, address, username).await;

    let response = client
        .post(format!("{}/api/v1/users/login", address))
        .json(&serde_json::json!({
            "identifier": username,
            "password": "password123",
        }))
        .send()
        .await
        .expect("login request");
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.expect("login body");
    assert_eq!(body["success"], true);
    body["data"]["accessToken"]
        .as_str()
        .expect("access token")
        .to_string()
}

#[tokio::test]
async fn health_check_works() {
    let (address, _guard) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/health", address))
        .send()
        .await
        .expect("request");

    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn register_login_and_me() {
    let (address, _guard) = spawn_app().await;
    let client = reqwest::Client::new();

    let token = register_and_login(&client, &address, "alice").await;

    let response = client
        .get(format!("{}/api/v1/users/me", address))
        .bearer_auth(&token)
        .send()
        .await
        .expect("me request");
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"]["username"], "alice");
    assert_eq!(body["data"]["email"], "alice@example.com");
    // Sensitive fields never leave the server
    assert!(body["data"].get("passwordHash").is_none());
    assert!(body["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn me_requires_authentication() {
    let (address, _guard) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/v1/users/me", address))
        .send()
        .await
        .expect("request");

    assert_eq!(response.status().as_u16(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn duplicate_username_is_conflict_case_insensitive() {
    let (address, _guard) = spawn_app().await;
    let client = reqwest::Client::new();

    register(&client, &address, "bob").await;

    let response = client
        .post(format!("{}/api/v1/users/register", address))
        .json(&serde_json::json!({
            "username": "BOB",
            "email": "other@example.com",
            "fullName": "Other Bob",
            "password": "password123",
        }))
        .send()
        .await
        .expect("request");

    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn register_validation_fails() {
    let (address, _guard) = spawn_app().await;
    let client = reqwest::Client::new();

    // Username too short
    let response = client
        .post(format!("{}/api/v1/users/register", address))
        .json(&serde_json::json!({
            "username": "yo",
            "email": "yo@example.com",
            "fullName": "Yo",
            "password": "password123",
        }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 400);

    // Password too short
    let response = client
        .post(format!("{}/api/v1/users/register", address))
        .json(&serde_json::json!({
            "username": "carol",
            "email": "carol@example.com",
            "fullName": "Carol",
            "password": "short",
        }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn tweet_flow_with_like_toggle() {
    let (address, _guard) = spawn_app().await;
    let client = reqwest::Client::new();

    let token = register_and_login(&client, &address, "dave").await;

    // Post a tweet
    let response = client
        .post(format!("{}/api/v1/tweets", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "content": "first post" }))
        .send()
        .await
        .expect("tweet request");
    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    let tweet_id = body["data"]["id"].as_str().unwrap().to_string();

    // Toggle like on
    let response = client
        .post(format!("{}/api/v1/likes/toggle/t/{}", address, tweet_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("like request");
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"]["liked"], true);
    assert_eq!(body["data"]["likeCount"], 1);

    // Toggle like off: back to the original state
    let response = client
        .post(format!("{}/api/v1/likes/toggle/t/{}", address, tweet_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("unlike request");
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"]["liked"], false);
    assert_eq!(body["data"]["likeCount"], 0);

    // Global feed shows the tweet to guests, pagination envelope intact
    let response = client
        .get(format!("{}/api/v1/tweets", address))
        .send()
        .await
        .expect("feed request");
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"]["totalItems"], 1);
    assert_eq!(body["data"]["currentPage"], 1);
    assert_eq!(body["data"]["hasNextPage"], false);
    assert_eq!(body["data"]["items"][0]["content"], "first post");
    assert_eq!(body["data"]["items"][0]["likedByMe"], false);
}

#[tokio::test]
async fn tweet_cap_and_self_reply_rejected() {
    let (address, _guard) = spawn_app().await;
    let client = reqwest::Client::new();

    let token = register_and_login(&client, &address, "erin").await;

    // Over the length cap
    let response = client
        .post(format!("{}/api/v1/tweets", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "content": "x".repeat(281) }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 400);

    // Self-reply rejected
    let response = client
        .post(format!("{}/api/v1/tweets", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "content": "parent" }))
        .send()
        .await
        .expect("request");
    let body: serde_json::Value = response.json().await.unwrap();
    let tweet_id = body["data"]["id"].as_str().unwrap().to_string();

    let response = client
        .post(format!("{}/api/v1/tweets/{}/replies", address, tweet_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "content": "replying to myself" }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn non_owner_mutation_is_forbidden() {
    let (address, _guard) = spawn_app().await;
    let client = reqwest::Client::new();

    let owner_token = register_and_login(&client, &address, "frank").await;
    let other_token = register_and_login(&client, &address, "grace").await;

    let response = client
        .post(format!("{}/api/v1/tweets", address))
        .bearer_auth(&owner_token)
        .json(&serde_json::json!({ "content": "mine" }))
        .send()
        .await
        .expect("request");
    let body: serde_json::Value = response.json().await.unwrap();
    let tweet_id = body["data"]["id"].as_str().unwrap().to_string();

    let response = client
        .delete(format!("{}/api/v1/tweets/{}", address, tweet_id))
        .bearer_auth(&other_token)
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn subscription_toggle_and_self_subscribe() {
    let (address, _guard) = spawn_app().await;
    let client = reqwest::Client::new();

    let viewer_token = register_and_login(&client, &address, "heidi").await;
    register(&client, &address, "ivan").await;

    // Fetch the channel id via the public profile
    let response = client
        .get(format!("{}/api/v1/users/c/ivan", address))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    let channel_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["subscriberCount"], 0);
    assert_eq!(body["data"]["isSubscribed"], false);

    // Subscribe
    let response = client
        .post(format!("{}/api/v1/subscriptions/toggle/{}", address, channel_id))
        .bearer_auth(&viewer_token)
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"]["subscribed"], true);
    assert_eq!(body["data"]["subscriberCount"], 1);

    // Profile now reflects the relationship for the viewer
    let response = client
        .get(format!("{}/api/v1/users/c/ivan", address))
        .bearer_auth(&viewer_token)
        .send()
        .await
        .expect("request");
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"]["isSubscribed"], true);

    // Self-subscription is a validation error
    let response = client
        .get(format!("{}/api/v1/users/c/heidi", address))
        .send()
        .await
        .expect("request");
    let body: serde_json::Value = response.json().await.unwrap();
    let own_id = body["data"]["id"].as_str().unwrap().to_string();

    let response = client
        .post(format!("{}/api/v1/subscriptions/toggle/{}", address, own_id))
        .bearer_auth(&viewer_token)
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn refresh_token_rotation() {
    let (address, _guard) = spawn_app().await;
    let client = reqwest::Client::new();

    register(&client, &address, "judy").await;
    let response = client
        .post(format!("{}/api/v1/users/login", address))
        .json(&serde_json::json!({
            "identifier": "judy",
            "password": "password123",
        }))
        .send()
        .await
        .expect("login");
    let body: serde_json::Value = response.json().await.unwrap();
    let refresh = body["data"]["refreshToken"].as_str().unwrap().to_string();

    // Rotate
    let response = client
        .post(format!("{}/api/v1/users/refresh-token", address))
        .json(&serde_json::json!({ "refreshToken": refresh }))
        .send()
        .await
        .expect("refresh");
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    let rotated = body["data"]["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(rotated, refresh);

    // The old token was rotated away and must not refresh again
    let response = client
        .post(format!("{}/api/v1/users/refresh-token", address))
        .json(&serde_json::json!({ "refreshToken": refresh }))
        .send()
        .await
        .expect("refresh");
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn comments_on_external_identifier_degrade_gracefully() {
    let (address, _guard) = spawn_app().await;
    let client = reqwest::Client::new();

    let token = register_and_login(&client, &address, "karen").await;

    // External-shaped identifier: not a ULID
    let response = client
        .post(format!("{}/api/v1/comments/dQw4w9WgXcQ", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "content": "local take" }))
        .send()
        .await
        .expect("post comment");
    assert_eq!(response.status().as_u16(), 201);

    // No provider key configured: the feed still serves local comments
    let response = client
        .get(format!("{}/api/v1/comments/dQw4w9WgXcQ", address))
        .send()
        .await
        .expect("feed");
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"]["totalComments"], 1);
    assert_eq!(body["data"]["commentsDisabled"], false);
    assert_eq!(body["data"]["comments"][0]["content"], "local take");
    assert_eq!(body["data"]["comments"][0]["source"], "internal");
}

#[tokio::test]
async fn provider_endpoints_fail_without_key() {
    let (address, _guard) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/v1/youtube/search?query=rust", address))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn page_past_the_end_is_empty() {
    let (address, _guard) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/v1/videos?page=99&limit=10", address))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 0);
    assert_eq!(body["data"]["hasNextPage"], false);
}

#[tokio::test]
async fn account_deletion_removes_the_account() {
    let (address, _guard) = spawn_app().await;
    let client = reqwest::Client::new();

    let token = register_and_login(&client, &address, "mallory").await;

    let response = client
        .delete(format!("{}/api/v1/users/me", address))
        .bearer_auth(&token)
        .send()
        .await
        .expect("delete request");
    assert_eq!(response.status().as_u16(), 200);

    // The token belongs to a row that no longer exists
    let response = client
        .get(format!("{}/api/v1/users/me", address))
        .bearer_auth(&token)
        .send()
        .await
        .expect("me request");
    assert_eq!(response.status().as_u16(), 401);

    // And the credentials no longer log in
    let response = client
        .post(format!("{}/api/v1/users/login", address))
        .json(&serde_json::json!({
            "identifier": "mallory",
            "password": "password123",
        }))
        .send()
        .await
        .expect("login request");
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn configured_origin_gets_credentialed_cors() {
    let (address, _guard) = spawn_app_with(|config| {
        config.server.cors_origin = "https://app.example.com".to_string();
    })
    .await;
    let client = reqwest::Client::new();

    // Browser preflight for a cookie-authenticated cross-origin request
    let response = client
        .request(
            reqwest::Method::OPTIONS,
            format!("{}/api/v1/videos", address),
        )
        .header("Origin", "https://app.example.com")
        .header("Access-Control-Request-Method", "GET")
        .send()
        .await
        .expect("preflight request");
    assert_eq!(response.status().as_u16(), 200);

    let headers = response.headers();
    assert_eq!(
        headers
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("https://app.example.com")
    );
    assert_eq!(
        headers
            .get("access-control-allow-credentials")
            .and_then(|v| v.to_str().ok()),
        Some("true")
    );
}

#[tokio::test]
async fn metrics_endpoint_serves_prometheus_text() {
    vidnest::metrics::init_metrics();

    let (address, _guard) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/metrics", address))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 200);
}
