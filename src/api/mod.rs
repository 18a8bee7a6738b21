//! API layer
//!
//! HTTP handlers for:
//! - Users and auth
//! - Videos, comments, likes, subscriptions, playlists
//! - Tweets and feeds
//! - Channel dashboard
//! - External provider proxy
//! - Metrics (Prometheus)

mod comments;
mod dashboard;
mod dto;
mod likes;
pub mod metrics;
mod pagination;
mod playlists;
mod subscriptions;
mod tweets;
mod users;
mod videos;
mod youtube;

pub use dto::*;
pub use metrics::metrics_router;
pub use pagination::{ApiResponse, Page, PageParams};

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::AppState;

/// Create the `/api/v1` router.
pub fn api_router() -> Router<AppState> {
    let users = Router::new()
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route("/logout", post(users::logout))
        .route("/refresh-token", post(users::refresh_token))
        .route(
            "/me",
            get(users::me)
                .patch(users::update_profile)
                .delete(users::delete_account),
        )
        .route("/me/avatar", patch(users::update_avatar))
        .route("/me/cover", patch(users::update_cover))
        .route("/change-password", post(users::change_password))
        .route("/history", get(users::watch_history))
        .route("/c/:username", get(users::channel_profile));

    let videos = Router::new()
        .route("/", post(videos::publish).get(videos::list))
        .route(
            "/:id",
            get(videos::watch)
                .patch(videos::update)
                .delete(videos::delete),
        )
        .route("/:id/toggle-publish", patch(videos::toggle_publish));

    // One parameterized segment: the GET/POST id is a video identifier,
    // the PATCH/DELETE id is a comment id.
    let comments = Router::new().route(
        "/:id",
        get(comments::feed)
            .post(comments::post)
            .patch(comments::edit)
            .delete(comments::delete),
    );

    let likes = Router::new()
        .route("/toggle/v/:id", post(likes::toggle_video))
        .route("/toggle/c/:id", post(likes::toggle_comment))
        .route("/toggle/t/:id", post(likes::toggle_tweet))
        .route("/videos", get(likes::liked_videos));

    let subscriptions = Router::new()
        .route("/toggle/:channelId", post(subscriptions::toggle))
        .route("/channels", get(subscriptions::subscribed_channels))
        .route("/subscribers", get(subscriptions::subscribers));

    let playlists = Router::new()
        .route("/", post(playlists::create))
        .route("/user/:userId", get(playlists::list_by_user))
        .route(
            "/:id",
            get(playlists::get)
                .patch(playlists::update)
                .delete(playlists::delete),
        )
        .route(
            "/:id/videos/:videoId",
            post(playlists::add_video).delete(playlists::remove_video),
        );

    let tweets = Router::new()
        .route("/", post(tweets::create).get(tweets::global_feed))
        .route("/feed", get(tweets::personalized_feed))
        .route("/user/:userId", get(tweets::by_user))
        .route(
            "/:id",
            get(tweets::get).patch(tweets::edit).delete(tweets::delete),
        )
        .route("/:id/replies", get(tweets::replies).post(tweets::reply));

    let dashboard = Router::new()
        .route("/stats", get(dashboard::stats))
        .route("/videos", get(dashboard::videos));

    let youtube = Router::new()
        .route("/search", get(youtube::search))
        .route("/videos/:id", get(youtube::video_details));

    Router::new()
        .nest("/users", users)
        .nest("/videos", videos)
        .nest("/comments", comments)
        .nest("/likes", likes)
        .nest("/subscriptions", subscriptions)
        .nest("/playlists", playlists)
        .nest("/tweets", tweets)
        .nest("/dashboard", dashboard)
        .nest("/youtube", youtube)
}
