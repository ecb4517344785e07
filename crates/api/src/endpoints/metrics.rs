//! Metrics endpoints.

use axum::{
    Json, Router,
    http::header,
    response::IntoResponse,
    routing::get,
};
use pollchain_common::metrics::{MetricsSnapshot, get_metrics};

use crate::middleware::AppState;

/// Create the metrics router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_metrics_json))
        .route("/prometheus", get(get_metrics_prometheus))
}

async fn get_metrics_json() -> Json<MetricsSnapshot> {
    Json(get_metrics().snapshot())
}

async fn get_metrics_prometheus() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        get_metrics().to_prometheus(),
    )
}
