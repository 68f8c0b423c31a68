//! Hub Relay - verified GitHub webhook relay.
//!
//! Receives GitHub webhook deliveries, checks their `X-Hub-Signature`
//! against a secret decrypted once at startup, and hands the untouched body
//! to RabbitMQ for asynchronous processing.
//!
//! ## Architecture
//!
//! ```text
//! startup:  Config → bootstrap (base64 → Decryptor) → ProcessSecret + QueueTarget
//! request:  POST /webhooks/github → signature check → Relay → Publisher → queue
//! ```

pub mod config;
pub mod queue;
pub mod relay;
pub mod secret;
pub mod web;

// Re-export commonly used types
pub use config::{Config, ConfigError, KeyService};
pub use queue::{OutboundMessage, Publisher, QueueSink, QueueTarget};
pub use relay::{Relay, RelayError, RequestContext};
pub use secret::{bootstrap, decryptor_for, BootstrapError, Decryptor, ProcessSecret};
pub use web::{router, AppState};
