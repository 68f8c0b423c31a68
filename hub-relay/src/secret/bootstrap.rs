//! One-shot startup initialization.
//!
//! Runs before the listener is bound. Any error here must stop the process;
//! there is no path that re-runs it.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;
use tracing::info;

use super::{DecryptError, Decryptor, HttpKeyService, LocalKeyring, ProcessSecret};
use crate::config::{Config, KeyService};
use crate::queue::{QueueTarget, QueueTargetError};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("GITHUB_SECRET environment variable base64-decoding: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("GITHUB_SECRET environment variable decryption: {0}")]
    Decrypt(#[from] DecryptError),

    #[error("GITHUB_SECRET environment variable decryption timed out after {0:?}")]
    DecryptTimeout(Duration),

    #[error("GITHUB_SECRET environment variable decrypted to an empty secret")]
    EmptySecret,

    #[error("QUEUE_URL environment variable: {0}")]
    QueueTarget(#[from] QueueTargetError),
}

/// Build the key-management capability named by the configuration.
pub fn decryptor_for(config: &Config) -> Result<Box<dyn Decryptor>, BootstrapError> {
    let decryptor: Box<dyn Decryptor> = match &config.key_service {
        KeyService::Http { endpoint } => {
            Box::new(HttpKeyService::new(endpoint.clone(), config.kms_timeout)?)
        }
        KeyService::Local { master_key } => Box::new(LocalKeyring::from_base64(master_key)?),
    };
    Ok(decryptor)
}

/// Decrypt the webhook secret and resolve the queue target.
pub async fn bootstrap(
    config: &Config,
    decryptor: &dyn Decryptor,
) -> Result<(ProcessSecret, QueueTarget), BootstrapError> {
    let target = QueueTarget::parse(&config.queue_url)?;

    let ciphertext = STANDARD.decode(config.github_secret.trim())?;

    let plaintext = tokio::time::timeout(config.kms_timeout, decryptor.decrypt(&ciphertext))
        .await
        .map_err(|_| BootstrapError::DecryptTimeout(config.kms_timeout))??;

    let secret = ProcessSecret::new(plaintext).ok_or(BootstrapError::EmptySecret)?;

    info!(
        queue = %target.queue,
        ciphertext_length = ciphertext.len(),
        "bootstrap_complete"
    );

    Ok((secret, target))
}
