//! Webhook secret bootstrap.
//!
//! The shared signing secret arrives envelope-encrypted in configuration.
//! At startup it is decoded, opened through a key-management capability and
//! published once as a [`ProcessSecret`] that request handlers only read.
//!
//! ```text
//! GITHUB_SECRET (base64) → Decryptor → ProcessSecret
//! ```

pub mod bootstrap;
pub mod key_service;
pub mod keyring;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use zeroize::Zeroizing;

pub use bootstrap::{bootstrap, decryptor_for, BootstrapError};
pub use key_service::HttpKeyService;
pub use keyring::LocalKeyring;

/// Errors raised while opening an encrypted secret.
#[derive(Debug, Error)]
pub enum DecryptError {
    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    #[error("ciphertext failed authentication")]
    Rejected,

    #[error("invalid master key: {0}")]
    InvalidKey(String),

    #[error("key service unavailable: {0}")]
    Unavailable(String),

    #[error("key service answered with status {0}")]
    Status(u16),
}

/// A key-management capability able to open an encrypted blob.
#[async_trait]
pub trait Decryptor: Send + Sync {
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, DecryptError>;
}

/// The decrypted webhook signing key.
///
/// Never empty. The bytes are wiped when the last clone is dropped.
#[derive(Clone)]
pub struct ProcessSecret(Zeroizing<Vec<u8>>);

impl ProcessSecret {
    /// Wrap decrypted bytes, refusing an empty key.
    pub fn new(bytes: Vec<u8>) -> Option<Self> {
        if bytes.is_empty() {
            return None;
        }
        Some(Self(Zeroizing::new(bytes)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ProcessSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProcessSecret(<redacted>)")
    }
}
