//! Webhook endpoint handlers.
//!
//! The webhook handler only:
//! 1. Verifies the signature
//! 2. Relays the raw body to the queue
//! 3. Answers with a bare status code
//!
//! Responses never carry a body, so a refused sender learns nothing beyond
//! the status.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::queue::{OutboundMessage, QueueSink};
use crate::relay::{Relay, RelayError, RequestContext};
use crate::secret::ProcessSecret;
use crate::web::signature::{inspect, Rejection};

const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Shared application state.
///
/// Built once after bootstrap and only read by handlers.
#[derive(Clone)]
pub struct AppState {
    pub secret: Arc<ProcessSecret>,
    pub relay: Relay,
    pub relay_timeout: Duration,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(secret: ProcessSecret, sink: Arc<dyn QueueSink>) -> Self {
        Self {
            secret: Arc::new(secret),
            relay: Relay::new(sink),
            relay_timeout: DEFAULT_RELAY_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_relay_timeout(mut self, relay_timeout: Duration) -> Self {
        self.relay_timeout = relay_timeout;
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// GitHub Webhook
// =============================================================================

/// Failure of one webhook request, rendered as a bare status code.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("request body unreadable or larger than {0} bytes")]
    BodyUnreadable(usize),

    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::Rejected(r) => r.status_code(),
            WebhookError::BodyUnreadable(_) => StatusCode::PAYLOAD_TOO_LARGE,
            WebhookError::Relay(e) => e.status_code(),
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), reason = %self, "webhook_failed");
        } else {
            warn!(status = status.as_u16(), reason = %self, "webhook_rejected");
        }
        status.into_response()
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// GitHub webhook endpoint.
///
/// Routed for every method so that a wrong verb is answered with 405 by the
/// validator. Headers are checked before the body is read.
pub async fn github_webhook(
    State(state): State<AppState>,
    request: Request,
) -> Result<StatusCode, WebhookError> {
    let ctx = RequestContext::with_timeout(state.relay_timeout);
    let (parts, body) = request.into_parts();

    let delivery_id = header_string(&parts.headers, "x-github-delivery");
    let event = header_string(&parts.headers, "x-github-event");

    info!(
        method = %parts.method,
        delivery_id = ?delivery_id,
        event = ?event,
        "webhook_received"
    );

    let alleged = inspect(&parts.method, &parts.headers)?;

    let body = axum::body::to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|_| WebhookError::BodyUnreadable(state.max_body_bytes))?;

    alleged.verify(&state.secret, &body)?;

    let body_length = body.len();
    let message = OutboundMessage::new(body)
        .with_delivery_id(delivery_id)
        .with_event(event);

    state.relay.dispatch(&message, &ctx).await?;

    info!(
        delivery_id = ?message.delivery_id,
        body_length = body_length,
        "webhook_enqueued"
    );

    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            WebhookError::from(Rejection::SignatureMismatch).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            WebhookError::BodyUnreadable(10).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            WebhookError::from(RelayError::Timeout).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            WebhookError::from(RelayError::Upstream(anyhow::anyhow!("down"))).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_error_response_has_no_body_detail() {
        let response = WebhookError::from(Rejection::SignatureMismatch).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get("content-type").is_none());
    }

    #[tokio::test]
    async fn test_health() {
        let Json(response) = health().await;
        assert_eq!(response.status, "ok");
    }
}
