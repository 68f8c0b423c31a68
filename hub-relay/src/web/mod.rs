//! Web server module for the GitHub webhook endpoint.
//!
//! A single endpoint verifies the signature of each delivery and relays the
//! raw body to RabbitMQ. Validation failures become 4xx, queue failures 5xx,
//! and a panic anywhere in a handler a bare 500.

pub mod handlers;
pub mod signature;

use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::error;

pub use handlers::{github_webhook, health, AppState, HealthResponse, WebhookError};
pub use signature::{canonicalize_headers, inspect, validate, AllegedDigest, Rejection};

/// Path GitHub deliveries are posted to.
pub const WEBHOOK_PATH: &str = "/webhooks/github";

/// Build the application router around fully initialized state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(WEBHOOK_PATH, any(github_webhook))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response {
    error!("webhook_handler_panicked");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}
