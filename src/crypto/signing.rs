// HMAC-SHA256 HTTP request signatures

use crate::errors::{PecanError, Result};
use crate::http::HttpRequest;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use ring::hmac;
use sha2::{Digest, Sha256};

const ALGORITHM: &str = "hmac-sha256";

/// Signs requests with an application key id and shared secret
#[derive(Clone)]
pub struct RequestSigner {
    key_id: String,
    key: hmac::Key,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl RequestSigner {
    pub fn new(key_id: impl Into<String>, secret: &[u8]) -> Self {
        Self {
            key_id: key_id.into(),
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
        }
    }

    /// Create a signer from a base64 encoded secret
    pub fn from_base64(key_id: impl Into<String>, secret: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(secret.trim())
            .map_err(|_| PecanError::InvalidSecret)?;
        Ok(Self::new(key_id, &bytes))
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Add `Date`, `Digest` (when there is a body) and `Authorization` headers
    pub fn sign(&self, request: &mut HttpRequest, now: DateTime<Utc>) {
        let date = match request.header("date") {
            Some(existing) => existing.to_string(),
            None => {
                let formatted = http_date(now);
                request.set_header("Date", formatted.clone());
                formatted
            }
        };

        let mut headers = String::from("(request-target) date");
        let mut summary = format!(
            "(request-target): {} {}\ndate: {}",
            request.method.as_str().to_lowercase(),
            request.path_and_query(),
            date
        );

        if let Some(body) = &request.body {
            let digest = format!("sha-256={}", STANDARD.encode(Sha256::digest(body)));
            summary.push_str("\ndigest: ");
            summary.push_str(&digest);
            headers.push_str(" digest");
            request.set_header("Digest", digest);
        }

        let tag = hmac::sign(&self.key, summary.as_bytes());
        let signature = STANDARD.encode(tag.as_ref());

        let authorization = format!(
            "Signature keyId=\"{}\",algorithm=\"{}\",headers=\"{}\",signature=\"{}\"",
            urlencoding::encode(&self.key_id),
            ALGORITHM,
            headers,
            signature
        );
        request.set_header("Authorization", authorization);
    }
}

/// RFC 1123 date as used in HTTP headers
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
