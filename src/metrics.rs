//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("playshelf_http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).expect("metric can be created");
    pub static ref HTTP_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "playshelf_http_request_duration_seconds",
            "HTTP request duration in seconds"
        ).buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "endpoint"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("playshelf_errors_total", "Total number of errors by type"),
        &["error_type"]
    ).expect("metric can be created");

    // External catalog metrics
    pub static ref CATALOG_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("playshelf_catalog_requests_total", "Total number of catalog API requests"),
        &["endpoint", "status"]
    ).expect("metric can be created");
    pub static ref CATALOG_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "playshelf_catalog_request_duration_seconds",
            "Catalog API request duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["endpoint"]
    ).expect("metric can be created");
    pub static ref CATALOG_TOKEN_REFRESHES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("playshelf_catalog_token_refreshes_total", "Total number of catalog OAuth token refreshes"),
        &["status"]
    ).expect("metric can be created");
}

/// Register all metrics with the global registry.
///
/// Must be called once at startup before any metric is used.
pub fn init_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()),
        Box::new(ERRORS_TOTAL.clone()),
        Box::new(CATALOG_REQUESTS_TOTAL.clone()),
        Box::new(CATALOG_REQUEST_DURATION_SECONDS.clone()),
        Box::new(CATALOG_TOKEN_REFRESHES_TOTAL.clone()),
    ];

    for collector in collectors {
        if let Err(e) = REGISTRY.register(collector) {
            // Re-registration happens in tests where init runs more than once.
            tracing::debug!(error = %e, "Metric already registered");
        }
    }
}
