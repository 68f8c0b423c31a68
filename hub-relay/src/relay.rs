//! Relay of verified webhook bodies to the queue.
//!
//! Each submission is bounded by the deadline of the request that carried
//! it. Running out of time is reported apart from every other failure so the
//! HTTP layer can answer 504 instead of 502. Nothing is retried here; the
//! webhook sender owns redelivery.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, warn};

use crate::queue::{OutboundMessage, QueueSink};

/// Deadline carried by one inbound request.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    deadline: Instant,
}

impl RequestContext {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self { deadline }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("queue submission exceeded its deadline")]
    Timeout,

    #[error("queue submission failed: {0:#}")]
    Upstream(anyhow::Error),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            RelayError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Forwards messages to a [`QueueSink`] under a request deadline.
#[derive(Clone)]
pub struct Relay {
    sink: Arc<dyn QueueSink>,
}

impl Relay {
    pub fn new(sink: Arc<dyn QueueSink>) -> Self {
        Self { sink }
    }

    pub async fn dispatch(
        &self,
        message: &OutboundMessage,
        ctx: &RequestContext,
    ) -> Result<(), RelayError> {
        if Instant::now() >= ctx.deadline() {
            warn!(body_length = message.body.len(), "relay_deadline_already_passed");
            return Err(RelayError::Timeout);
        }

        match tokio::time::timeout_at(ctx.deadline(), self.sink.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!(error = %e, delivery_id = ?message.delivery_id, "relay_failed");
                Err(RelayError::Upstream(e))
            }
            Err(_) => {
                warn!(delivery_id = ?message.delivery_id, "relay_timeout");
                Err(RelayError::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        bodies: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl QueueSink for Recording {
        async fn send(&self, message: &OutboundMessage) -> anyhow::Result<()> {
            self.bodies.lock().await.push(message.body.to_vec());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl QueueSink for Failing {
        async fn send(&self, _message: &OutboundMessage) -> anyhow::Result<()> {
            Err(anyhow!("connection refused"))
        }
    }

    struct Slow;

    #[async_trait]
    impl QueueSink for Slow {
        async fn send(&self, _message: &OutboundMessage) -> anyhow::Result<()> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    fn message() -> OutboundMessage {
        OutboundMessage::new(r#"{"a":1}"#.into())
    }

    #[tokio::test]
    async fn test_dispatch_forwards_body_unchanged() {
        let sink = Arc::new(Recording::default());
        let relay = Relay::new(sink.clone());

        relay
            .dispatch(&message(), &RequestContext::with_timeout(Duration::from_secs(5)))
            .await
            .unwrap();

        assert_eq!(*sink.bodies.lock().await, vec![br#"{"a":1}"#.to_vec()]);
    }

    #[tokio::test]
    async fn test_sink_failure_is_bad_gateway() {
        let relay = Relay::new(Arc::new(Failing));

        let err = relay
            .dispatch(&message(), &RequestContext::with_timeout(Duration::from_secs(5)))
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Upstream(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_slow_sink_is_gateway_timeout() {
        let relay = Relay::new(Arc::new(Slow));

        let err = relay
            .dispatch(&message(), &RequestContext::with_timeout(Duration::from_millis(20)))
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Timeout));
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_expired_deadline_skips_sink() {
        let sink = Arc::new(Recording::default());
        let relay = Relay::new(sink.clone());
        let ctx = RequestContext::with_deadline(Instant::now() - Duration::from_millis(1));

        let err = relay.dispatch(&message(), &ctx).await.unwrap_err();

        assert!(matches!(err, RelayError::Timeout));
        assert!(sink.bodies.lock().await.is_empty());
    }
}
