//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("vidnest_http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("vidnest_errors_total", "Total number of application errors"),
        &["kind"]
    ).expect("metric can be created");

    // Provider cache metrics
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("vidnest_cache_hits_total", "Total number of cache hits"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("vidnest_cache_misses_total", "Total number of cache misses"),
        &["cache_name"]
    ).expect("metric can be created");

    // Provider proxy metrics
    pub static ref PROVIDER_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("vidnest_provider_requests_total", "Total number of YouTube Data API requests"),
        &["operation", "status"]
    ).expect("metric can be created");

    // Media storage metrics
    pub static ref MEDIA_UPLOADS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("vidnest_media_uploads_total", "Total number of media uploads"),
        &["kind"]
    ).expect("metric can be created");
}

/// Register all metrics with the global registry.
///
/// Must be called once at startup before serving requests.
/// Registration failures indicate duplicate registration, which is a bug.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("HTTP_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(CACHE_HITS_TOTAL.clone()))
        .expect("CACHE_HITS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(CACHE_MISSES_TOTAL.clone()))
        .expect("CACHE_MISSES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(PROVIDER_REQUESTS_TOTAL.clone()))
        .expect("PROVIDER_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(MEDIA_UPLOADS_TOTAL.clone()))
        .expect("MEDIA_UPLOADS_TOTAL can be registered");
}
