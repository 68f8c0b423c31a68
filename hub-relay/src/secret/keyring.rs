//! Local envelope keyring.
//!
//! Blobs are `nonce (24 bytes) || XChaCha20-Poly1305 ciphertext + tag`,
//! sealed under a 32-byte master key held in the environment.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};

use super::{DecryptError, Decryptor};

const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;

/// Opens secrets sealed with a locally held master key.
pub struct LocalKeyring {
    cipher: XChaCha20Poly1305,
}

impl LocalKeyring {
    pub fn new(master_key: &[u8]) -> Result<Self, DecryptError> {
        let cipher = XChaCha20Poly1305::new_from_slice(master_key).map_err(|_| {
            DecryptError::InvalidKey(format!(
                "expected 32 bytes, got {}",
                master_key.len()
            ))
        })?;
        Ok(Self { cipher })
    }

    /// Build a keyring from the base64 `KMS_MASTER_KEY` value.
    pub fn from_base64(encoded: &str) -> Result<Self, DecryptError> {
        let key = zeroize::Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|e| DecryptError::InvalidKey(e.to_string()))?,
        );
        Self::new(&key)
    }

    /// Seal a plaintext into a blob this keyring can open.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, DecryptError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|e| DecryptError::Malformed(e.to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    fn open(&self, blob: &[u8]) -> Result<Vec<u8>, DecryptError> {
        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(DecryptError::Malformed(format!(
                "blob is {} bytes, shorter than nonce and tag",
                blob.len()
            )));
        }

        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        self.cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| DecryptError::Rejected)
    }
}

#[async_trait]
impl Decryptor for LocalKeyring {
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, DecryptError> {
        self.open(ciphertext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyring(byte: u8) -> LocalKeyring {
        LocalKeyring::new(&[byte; 32]).unwrap()
    }

    #[tokio::test]
    async fn test_sealed_secret_opens() {
        let keyring = keyring(7);
        let blob = keyring.seal(b"s3cr3t").unwrap();

        assert_eq!(blob.len(), NONCE_LEN + 6 + TAG_LEN);
        assert_eq!(keyring.decrypt(&blob).await.unwrap(), b"s3cr3t");
    }

    #[tokio::test]
    async fn test_tampered_blob_rejected() {
        let keyring = keyring(7);
        let mut blob = keyring.seal(b"s3cr3t").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;

        assert!(matches!(
            keyring.decrypt(&blob).await,
            Err(DecryptError::Rejected)
        ));
    }

    #[tokio::test]
    async fn test_wrong_master_key_rejected() {
        let blob = keyring(7).seal(b"s3cr3t").unwrap();

        assert!(matches!(
            keyring(8).decrypt(&blob).await,
            Err(DecryptError::Rejected)
        ));
    }

    #[tokio::test]
    async fn test_truncated_blob_is_malformed() {
        assert!(matches!(
            keyring(7).decrypt(&[0u8; 30]).await,
            Err(DecryptError::Malformed(_))
        ));
    }

    #[test]
    fn test_master_key_length_checked() {
        assert!(matches!(
            LocalKeyring::new(&[1u8; 16]),
            Err(DecryptError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_master_key_from_base64() {
        let encoded = STANDARD.encode([9u8; 32]);
        assert!(LocalKeyring::from_base64(&encoded).is_ok());
        assert!(LocalKeyring::from_base64("not base64!").is_err());
    }
}
