//! Heartbeat endpoint.

use axum::{Router, extract::State, response::IntoResponse, routing::post};
use pollchain_common::AppResult;

use crate::{middleware::AppState, response::no_content};

/// Create the heartbeat router.
pub fn router() -> Router<AppState> {
    Router::new().route("/heartbeat", post(heartbeat))
}

/// 204 when the store answers a ping within the health deadline.
async fn heartbeat(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    state.poll_service.health_check().await?;
    Ok(no_content())
}
