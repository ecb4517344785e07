//! HTTP API layer for pollchain.
//!
//! - **Endpoints**: poll creation, voting, deletion, views, heartbeat, metrics
//! - **Middleware**: shared [`middleware::AppState`] and request metrics
//!
//! Built on Axum 0.8.

pub mod endpoints;
pub mod middleware;
pub mod response;

pub use endpoints::router;
