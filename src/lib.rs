//! VidNest - a video sharing backend
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                       │
//! │  - Users/auth, videos, comments, likes, subscriptions       │
//! │  - Playlists, tweets, dashboard, provider proxy             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                           │
//! │  - Business logic, hybrid comment aggregation               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                             │
//! │  - SQLite (sqlx), provider response cache                   │
//! │  - S3-compatible media storage                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Business logic layer
//! - `provider`: YouTube Data API client with caching
//! - `data`: Database layer
//! - `storage`: S3-compatible media storage
//! - `auth`: JWT authentication and password hashing
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod provider;
pub mod service;
pub mod storage;

use std::sync::Arc;

/// Request body ceiling; must admit a full video upload.
const MAX_REQUEST_BODY_BYTES: usize = 250 * 1024 * 1024;

/// Application state shared across all handlers
///
/// Cloned per request; everything inside is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Media storage (S3-compatible)
    pub storage: Arc<storage::MediaStorage>,

    /// External provider client with response cache
    pub youtube: provider::YouTubeClient,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite and run migrations
    /// 2. Initialize media storage
    /// 3. Build the provider client
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = data::Database::connect(&config.database.path).await?;
        tracing::info!("Database connected");

        let storage = storage::MediaStorage::new(&config.storage);
        tracing::info!("Media storage initialized");

        let youtube = provider::YouTubeClient::new(&config.youtube, db.clone())?;
        if config.youtube.api_key.is_none() {
            tracing::warn!("youtube.api_key not set; provider endpoints will fail");
        }

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db: Arc::new(db),
            storage: Arc::new(storage),
            youtube,
        })
    }
}

/// Build the Axum router with all routes.
///
/// Shared by the binary and integration tests to keep route composition
/// consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use axum::extract::DefaultBodyLimit;
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api/v1", api::api_router())
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_http_metrics))
        .layer(cors_layer)
        .with_state(state)
        .merge(api::metrics_router())
}

async fn track_http_metrics(
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    metrics::HTTP_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), &path, response.status().as_str()])
        .inc();

    response
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::{HeaderValue, Method, header};
    use tower_http::cors::{Any, CorsLayer};

    let origin = server.cors_origin.trim();
    if origin.is_empty() {
        return CorsLayer::permissive();
    }

    match HeaderValue::from_str(origin) {
        // Credentials allowed so the http-only auth cookies ride cross-origin
        // requests; wildcards cannot combine with credentials, so methods and
        // headers are explicit.
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %origin,
                "Failed to parse CORS origin; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
