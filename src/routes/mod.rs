//! Route definitions for the card service.
//!
//! ## Routes
//!
//! - `GET /health` - Health check (JSON)
//! - `GET /images/{file}` - Rendered preview images
//! - every other `GET` - Post card for crawlers, redirect for everyone else

mod images;
mod post;

use axum::{Json, Router};
use axum::routing::get;
use serde::Serialize;

use crate::state::AppState;

/// Build the complete card service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/images/{*file}", get(images::serve_image))
        // The catch-all is GET-only like the routed paths; other methods
        // get 405 instead of a card or redirect.
        .fallback_service(get(post::post_or_redirect).with_state(state.clone()))
        .with_state(state)
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

/// Public health check endpoint.
///
/// Returns basic service health for load balancer probes.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "post2card",
        version: env!("CARGO_PKG_VERSION"),
    })
}
