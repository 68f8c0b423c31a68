//! GitHub webhook signature verification.
//!
//! GitHub signs the raw request body with HMAC-SHA1 and sends the digest as
//! `X-Hub-Signature: sha1=<hex>`. SHA-1 is what the sender speaks, so it
//! stays SHA-1 here.
//! Reference: https://docs.github.com/en/webhooks/using-webhooks/validating-webhook-deliveries
//!
//! Checks run in a fixed order and the first failure decides the status:
//! method, content type, signature header, digest.

use axum::http::{
    header::CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use thiserror::Error;
use tracing::{debug, warn};

use crate::secret::ProcessSecret;

type HmacSha1 = Hmac<Sha1>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature";
pub const SIGNATURE_PREFIX: &str = "sha1=";
pub const JSON_MEDIA_TYPE: &str = "application/json";

/// Why a webhook request was refused.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("content type is not application/json")]
    UnsupportedMediaType,

    #[error("signature header missing or without sha1= prefix")]
    MissingSignature,

    #[error("signature digest is not valid hex")]
    InvalidDigest,

    #[error("signature does not match body")]
    SignatureMismatch,
}

impl Rejection {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Rejection::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Rejection::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Rejection::MissingSignature | Rejection::InvalidDigest => StatusCode::BAD_REQUEST,
            Rejection::SignatureMismatch => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Digest claimed by the sender, decoded from the signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllegedDigest(Vec<u8>);

impl AllegedDigest {
    /// Recompute HMAC-SHA1 over the raw body and compare in constant time.
    pub fn verify(&self, secret: &ProcessSecret, body: &[u8]) -> Result<(), Rejection> {
        let mut mac = match HmacSha1::new_from_slice(secret.as_bytes()) {
            Ok(m) => m,
            Err(_) => {
                warn!("webhook_signature_invalid_key");
                return Err(Rejection::SignatureMismatch);
            }
        };
        mac.update(body);

        // verify_slice compares in constant time and rejects length mismatches
        mac.verify_slice(&self.0)
            .map_err(|_| Rejection::SignatureMismatch)
    }
}

/// Run every check that only needs the method and headers.
pub fn inspect(method: &Method, headers: &HeaderMap) -> Result<AllegedDigest, Rejection> {
    if *method != Method::POST {
        return Err(Rejection::MethodNotAllowed);
    }

    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    if content_type != Some(JSON_MEDIA_TYPE) {
        return Err(Rejection::UnsupportedMediaType);
    }

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let hex_digest = signature
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or(Rejection::MissingSignature)?;
    let digest = hex::decode(hex_digest).map_err(|_| Rejection::InvalidDigest)?;

    Ok(AllegedDigest(digest))
}

/// Validate a whole webhook request against the process secret.
pub fn validate(
    method: &Method,
    headers: &HeaderMap,
    body: &[u8],
    secret: &ProcessSecret,
) -> Result<(), Rejection> {
    inspect(method, headers)?.verify(secret, body)
}

/// Build a case-insensitive header map from raw name/value pairs.
///
/// A later pair replaces an earlier one with the same name. Pairs that are
/// not valid HTTP headers are dropped.
pub fn canonicalize_headers<'a, I>(pairs: I) -> HeaderMap
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => debug!(header = name, "header_dropped"),
        }
    }
    headers
}
