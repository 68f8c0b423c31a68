//! Queue module for RabbitMQ operations.
//!
//! This module provides:
//! - The queue target parsed from the `QUEUE_URL` locator
//! - The outbound message carrying a verified webhook body
//! - The [`QueueSink`] seam and its AMQP [`Publisher`]
//!
//! ## Flow
//!
//! ```text
//! Verified webhook → Relay → QueueSink (Publisher) → github_webhooks queue
//! ```

pub mod publisher;
pub mod types;

use async_trait::async_trait;

pub use publisher::Publisher;
pub use types::{OutboundMessage, QueueTarget, QueueTargetError, DEFAULT_QUEUE};

/// Destination for verified webhook bodies.
#[async_trait]
pub trait QueueSink: Send + Sync {
    /// Submit one message. Deadlines are enforced by the caller.
    async fn send(&self, message: &OutboundMessage) -> anyhow::Result<()>;
}
