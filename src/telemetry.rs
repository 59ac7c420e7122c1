//! Tracing initialization and the metrics endpoint
//!
//! Both daemons expose the process-global prometheus registry over
//! `/metrics` in text exposition format.

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, TextEncoder};

/// Initialize the global tracing subscriber. `RUST_LOG` wins over the
/// configured default level.
pub fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

/// Router serving the prometheus registry on `/metrics`.
pub fn metrics_router() -> Router {
    Router::new().route("/metrics", get(serve_metrics))
}

async fn serve_metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::error!(error = %e, "failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new()).into_response();
    }

    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        buffer,
    )
        .into_response()
}
