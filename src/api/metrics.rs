//! Prometheus exposition endpoint
//!
//! Serves every counter registered in [`crate::metrics`] — HTTP traffic,
//! errors by kind, provider cache hits and misses, outbound provider calls,
//! and media uploads — as Prometheus text. Mounted at `/metrics`, outside
//! the `/api/v1` nest and its middleware.

use axum::{
    Router,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{Encoder, TextEncoder};

use crate::metrics::REGISTRY;

async fn serve_metrics() -> Response {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();

    match encoder.encode_to_string(&families) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "metrics encoding failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

/// Create the metrics router exposing `/metrics`.
pub fn metrics_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/metrics", get(serve_metrics))
}
