use crate::grant::types::ServiceError;
use thiserror::Error;

/// Library-wide error type
#[derive(Debug, Error)]
pub enum PecanError {
    // Transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // Payload errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Errors reported by the grant API
    #[error("Service error ({status}): {}", error.title)]
    Service { status: u16, error: ServiceError },

    // Navigation errors
    #[error("Link '{0}' is not available on this resource")]
    MissingLink(String),

    // Credential errors
    #[error("Expecting a base-64 encoded secret")]
    InvalidSecret,

    #[error("No matching artifact version found: {0}")]
    ArtifactNotFound(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PecanError {
    /// Build a service error for a response that carried no usable payload
    pub(crate) fn unexpected(status: u16, title: &str, detail: impl Into<String>) -> Self {
        PecanError::Service {
            status,
            error: ServiceError::new("evaluation.3000", title, detail),
        }
    }

    /// HTTP status for errors reported by the grant API
    pub fn status(&self) -> Option<u16> {
        match self {
            PecanError::Service { status, .. } => Some(*status),
            PecanError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, PecanError>;
