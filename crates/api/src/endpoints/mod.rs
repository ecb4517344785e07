//! API endpoints.

mod health;
mod metrics;
mod poll;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/poll/v1", poll::router())
        .nest("/metrics", metrics::router())
        .merge(health::router())
}
