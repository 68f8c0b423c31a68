//! HTTP key service client.
//!
//! Sends `{"ciphertext": "<base64>"}` to the configured endpoint and expects
//! `{"plaintext": "<base64>"}` back.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{DecryptError, Decryptor};

#[derive(Serialize)]
struct DecryptRequest {
    ciphertext: String,
}

#[derive(Deserialize)]
struct DecryptResponse {
    plaintext: String,
}

/// Decrypts through a remote key-management endpoint.
#[derive(Clone)]
pub struct HttpKeyService {
    client: Client,
    endpoint: String,
}

impl HttpKeyService {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, DecryptError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DecryptError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Decryptor for HttpKeyService {
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, DecryptError> {
        info!(
            endpoint = %self.endpoint,
            ciphertext_length = ciphertext.len(),
            "key_service_decrypt_start"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&DecryptRequest {
                ciphertext: STANDARD.encode(ciphertext),
            })
            .send()
            .await
            .map_err(|e| DecryptError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "key_service_decrypt_refused");
            return Err(DecryptError::Status(status.as_u16()));
        }

        let body: DecryptResponse = response
            .json()
            .await
            .map_err(|e| DecryptError::Malformed(e.to_string()))?;

        STANDARD
            .decode(body.plaintext)
            .map_err(|e| DecryptError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    /// Start a fake key service that reverses the ciphertext bytes.
    async fn spawn_fake(status: StatusCode) -> String {
        let app = Router::new().route(
            "/decrypt",
            post(move |Json(req): Json<Value>| async move {
                let blob = STANDARD
                    .decode(req["ciphertext"].as_str().unwrap_or_default())
                    .unwrap_or_default();
                let plain: Vec<u8> = blob.into_iter().rev().collect();
                (status, Json(json!({ "plaintext": STANDARD.encode(plain) })))
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}/decrypt", addr)
    }

    #[tokio::test]
    async fn test_decrypt_through_service() {
        let endpoint = spawn_fake(StatusCode::OK).await;
        let service = HttpKeyService::new(endpoint, Duration::from_secs(5)).unwrap();

        let plain = service.decrypt(b"t3rc3s").await.unwrap();
        assert_eq!(plain, b"s3cr3t");
    }

    #[tokio::test]
    async fn test_refusal_status_is_error() {
        let endpoint = spawn_fake(StatusCode::FORBIDDEN).await;
        let service = HttpKeyService::new(endpoint, Duration::from_secs(5)).unwrap();

        assert!(matches!(
            service.decrypt(b"blob").await,
            Err(DecryptError::Status(403))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let service =
            HttpKeyService::new(format!("http://{}/decrypt", addr), Duration::from_secs(5))
                .unwrap();

        assert!(matches!(
            service.decrypt(b"blob").await,
            Err(DecryptError::Unavailable(_))
        ));
    }
}
