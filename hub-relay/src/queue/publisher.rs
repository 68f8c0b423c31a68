//! Async RabbitMQ publisher for verified webhook bodies.
//!
//! One connection and channel are shared by every request handler. A channel
//! that has gone away is replaced on the next publish.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use lapin::{
    options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions},
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::types::{OutboundMessage, QueueTarget};
use super::QueueSink;

/// Async RabbitMQ publisher with connection management.
#[derive(Clone)]
pub struct Publisher {
    inner: Arc<PublisherInner>,
}

struct PublisherInner {
    target: QueueTarget,
    connection: RwLock<Option<Connection>>,
    channel: RwLock<Option<Channel>>,
}

impl Publisher {
    /// Create a publisher for the given target. Connects lazily.
    pub fn new(target: QueueTarget) -> Self {
        Self {
            inner: Arc::new(PublisherInner {
                target,
                connection: RwLock::new(None),
                channel: RwLock::new(None),
            }),
        }
    }

    pub fn target(&self) -> &QueueTarget {
        &self.inner.target
    }

    /// Ensure we have a valid connection and channel.
    async fn ensure_connected(&self) -> Result<Channel> {
        {
            let channel = self.inner.channel.read().await;
            if let Some(ch) = channel.as_ref() {
                if ch.status().connected() {
                    return Ok(ch.clone());
                }
            }
        }

        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        // Double-check after acquiring write lock
        if let Some(ch) = channel.as_ref() {
            if ch.status().connected() {
                return Ok(ch.clone());
            }
        }

        info!(endpoint = %self.inner.target.endpoint(), "rabbitmq_publisher_connecting");

        let conn = Connection::connect(
            &self.inner.target.connection_url,
            ConnectionProperties::default(),
        )
        .await
        .context("Failed to connect to RabbitMQ")?;

        let ch = conn
            .create_channel()
            .await
            .context("Failed to create channel")?;

        ch.confirm_select(ConfirmSelectOptions::default())
            .await
            .context("Failed to enable publisher confirms")?;

        ch.queue_declare(
            &self.inner.target.queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .context("Failed to declare queue")?;

        info!(queue = %self.inner.target.queue, "rabbitmq_queue_declared");

        *connection = Some(conn);
        *channel = Some(ch.clone());

        Ok(ch)
    }

    /// Publish a webhook body to the target queue and wait for the broker ack.
    pub async fn publish(&self, message: &OutboundMessage) -> Result<()> {
        let channel = self.ensure_connected().await?;

        let mut properties = BasicProperties::default()
            .with_delivery_mode(2) // Persistent
            .with_content_type("application/json".into());
        if let Some(id) = &message.delivery_id {
            properties = properties.with_message_id(id.as_str().into());
        }
        if let Some(event) = &message.event {
            properties = properties.with_kind(event.as_str().into());
        }

        let confirmation = channel
            .basic_publish(
                "",
                &self.inner.target.queue,
                BasicPublishOptions::default(),
                &message.body,
                properties,
            )
            .await
            .context("Failed to publish webhook")?
            .await
            .context("Failed to confirm publish")?;

        if confirmation.is_nack() {
            bail!("Broker rejected webhook message");
        }

        info!(
            queue = %self.inner.target.queue,
            delivery_id = ?message.delivery_id,
            body_length = message.body.len(),
            "rabbitmq_webhook_published"
        );

        Ok(())
    }

    /// Close the connection gracefully.
    pub async fn close(&self) {
        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        if let Some(ch) = channel.take() {
            if let Err(e) = ch.close(200, "Normal shutdown").await {
                warn!(error = %e, "rabbitmq_channel_close_error");
            }
        }

        if let Some(conn) = connection.take() {
            if let Err(e) = conn.close(200, "Normal shutdown").await {
                warn!(error = %e, "rabbitmq_connection_close_error");
            }
        }

        info!("rabbitmq_publisher_closed");
    }
}

#[async_trait]
impl QueueSink for Publisher {
    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        self.publish(message).await
    }
}
