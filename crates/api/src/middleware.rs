//! API middleware.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use pollchain_common::{Timer, get_metrics};
use pollchain_core::PollService;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub poll_service: PollService,
}

/// Count requests, status classes and latency.
pub async fn metrics_middleware(req: Request<Body>, next: Next) -> Response {
    let metrics = get_metrics();
    let timer = Timer::start();
    metrics.start_request();

    let response = next.run(req).await;

    metrics.end_request();
    metrics.record_http_request(response.status().as_u16(), timer.elapsed());
    response
}
