//! Queue target and message types.

use std::fmt;
use std::str::FromStr;

use axum::body::Bytes;
use thiserror::Error;
use url::Url;

/// Queue name used when the locator carries no `queue` parameter.
pub const DEFAULT_QUEUE: &str = "github_webhooks";

const QUEUE_PARAM: &str = "queue";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueTargetError {
    #[error("invalid queue locator: {0}")]
    Invalid(#[from] url::ParseError),

    #[error("unsupported queue scheme `{0}`, expected amqp or amqps")]
    UnsupportedScheme(String),

    #[error("queue locator has no host")]
    MissingHost,
}

/// Destination queue resolved from the `QUEUE_URL` locator.
///
/// The locator is an AMQP URI whose optional `queue` query parameter names
/// the queue; the parameter is stripped from the connection URI.
#[derive(Clone, PartialEq, Eq)]
pub struct QueueTarget {
    /// URI handed to the AMQP client
    pub connection_url: String,
    /// Queue the messages are routed to through the default exchange
    pub queue: String,
}

impl QueueTarget {
    pub fn parse(locator: &str) -> Result<Self, QueueTargetError> {
        let mut url = Url::parse(locator.trim())?;

        if url.scheme() != "amqp" && url.scheme() != "amqps" {
            return Err(QueueTargetError::UnsupportedScheme(url.scheme().to_string()));
        }
        if url.host_str().map(str::is_empty).unwrap_or(true) {
            return Err(QueueTargetError::MissingHost);
        }

        let (queue_params, others): (Vec<_>, Vec<_>) = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .partition(|(k, _)| k == QUEUE_PARAM);

        let queue = queue_params
            .into_iter()
            .map(|(_, v)| v)
            .rev()
            .find(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_QUEUE.to_string());

        url.set_query(None);
        if !others.is_empty() {
            url.query_pairs_mut().extend_pairs(others);
        }

        Ok(Self {
            connection_url: url.to_string(),
            queue,
        })
    }

    /// Host and port, without credentials, for logs.
    pub fn endpoint(&self) -> String {
        Url::parse(&self.connection_url)
            .ok()
            .and_then(|u| {
                u.host_str()
                    .map(|h| format!("{}:{}", h, u.port().unwrap_or(5672)))
            })
            .unwrap_or_default()
    }
}

impl FromStr for QueueTarget {
    type Err = QueueTargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for QueueTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueTarget")
            .field("endpoint", &self.endpoint())
            .field("queue", &self.queue)
            .finish()
    }
}

/// A verified webhook body on its way to the queue.
///
/// The body is the exact request body; delivery metadata only travels as
/// message properties.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub body: Bytes,
    /// `X-GitHub-Delivery`, published as the AMQP message id
    pub delivery_id: Option<String>,
    /// `X-GitHub-Event`, published as the AMQP message type
    pub event: Option<String>,
}

impl OutboundMessage {
    pub fn new(body: Bytes) -> Self {
        Self {
            body,
            delivery_id: None,
            event: None,
        }
    }

    pub fn with_delivery_id(mut self, delivery_id: Option<String>) -> Self {
        self.delivery_id = delivery_id;
        self
    }

    pub fn with_event(mut self, event: Option<String>) -> Self {
        self.event = event;
        self
    }
}
