//! Error types for the Songsmith client

use songsmith_core::dto::ErrorBody;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when using the Songsmith client
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
        /// Error category reported by the server, e.g. `backend`
        kind: Option<String>,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Writing a downloaded file failed
    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
            kind: None,
        }
    }

    /// Create an API error from a raw response body
    ///
    /// JSON error bodies are unwrapped; anything else is kept verbatim.
    pub fn from_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => Self::ApiError {
                status,
                message: parsed.error,
                kind: parsed.kind,
            },
            Err(_) => Self::api_error(status, body.trim()),
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status: 404, .. })
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 400 && *status < 500)
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 500)
    }

    /// Error category reported by the server, if any
    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::ApiError { kind, .. } => kind.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_body() {
        let err = ClientError::from_body(500, r#"{"error":"timeout","kind":"backend"}"#);
        assert!(err.is_server_error());
        assert_eq!(err.kind(), Some("backend"));
        assert_eq!(err.to_string(), "API error (status 500): timeout");
    }

    #[test]
    fn test_from_plain_body() {
        let err = ClientError::from_body(404, "Not Found\n");
        assert!(err.is_not_found());
        assert!(err.is_client_error());
        assert_eq!(err.kind(), None);
        assert_eq!(err.to_string(), "API error (status 404): Not Found");
    }
}
