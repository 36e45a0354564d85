//! Classification of remote failures.

use serde_json::{json, Value};
use thiserror::Error;

use crate::features::sync::ErrorType;

/// A failed exchange with the backend.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RemoteError {
    /// No HTTP response was received (DNS, refused connection, reset).
    #[error("Network error: {0}")]
    Network(String),

    /// The request deadline expired, or the server answered 408.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The server answered 5xx or 429.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The server rejected the request with a 4xx.
    #[error("Rejected ({status}): {message}")]
    Validation {
        status: u16,
        message: String,
        details: Option<Value>,
    },

    /// The operation could not be turned into a request at all.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The server answered 2xx with a body we cannot use.
    #[error("Unexpected response: {0}")]
    Protocol(String),
}

impl RemoteError {
    /// Classify a non-success HTTP status.
    #[must_use]
    pub fn from_status(status: u16, body: Option<Value>) -> Self {
        let message = body
            .as_ref()
            .and_then(extract_message)
            .unwrap_or_else(|| default_reason(status).to_string());

        match status {
            408 => Self::Timeout(message),
            429 | 500..=599 => Self::Server { status, message },
            _ => Self::Validation {
                status,
                message,
                details: body,
            },
        }
    }

    /// The error category recorded on the operation.
    #[must_use]
    pub const fn kind(&self) -> ErrorType {
        match self {
            Self::Network(_) => ErrorType::Network,
            Self::Timeout(_) => ErrorType::Timeout,
            Self::Server { .. } | Self::Protocol(_) => ErrorType::Server,
            Self::Validation { .. } | Self::InvalidRequest(_) => ErrorType::Validation,
        }
    }

    /// Whether another attempt could succeed without changing the request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Structured details for the published sync state.
    #[must_use]
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::Validation {
                status, details, ..
            } => Some(json!({ "status": status, "body": details })),
            Self::Server { status, .. } => Some(json!({ "status": status })),
            Self::Network(_) | Self::Timeout(_) | Self::InvalidRequest(_) | Self::Protocol(_) => {
                None
            }
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16(), None)
        } else if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

fn extract_message(body: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .find_map(|key| body.get(key).and_then(Value::as_str))
        .map(ToString::to_string)
}

fn default_reason(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown status")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(RemoteError::from_status(408, None).kind(), ErrorType::Timeout);
        assert_eq!(RemoteError::from_status(429, None).kind(), ErrorType::Server);
        assert_eq!(RemoteError::from_status(500, None).kind(), ErrorType::Server);
        assert_eq!(RemoteError::from_status(503, None).kind(), ErrorType::Server);
        assert_eq!(RemoteError::from_status(400, None).kind(), ErrorType::Validation);
        assert_eq!(RemoteError::from_status(404, None).kind(), ErrorType::Validation);
        assert_eq!(RemoteError::from_status(422, None).kind(), ErrorType::Validation);
    }

    #[test]
    fn test_retryable() {
        assert!(RemoteError::Network("refused".to_string()).is_retryable());
        assert!(RemoteError::Timeout("15s".to_string()).is_retryable());
        assert!(RemoteError::from_status(502, None).is_retryable());
        assert!(!RemoteError::from_status(400, None).is_retryable());
        assert!(!RemoteError::InvalidRequest("no target".to_string()).is_retryable());
    }

    #[test]
    fn test_message_from_body() {
        let err = RemoteError::from_status(400, Some(json!({"message": "name is required"})));
        assert_eq!(err.to_string(), "Rejected (400): name is required");

        let err = RemoteError::from_status(500, Some(json!({"error": "boom"})));
        assert_eq!(err.to_string(), "Server error (500): boom");

        let err = RemoteError::from_status(503, None);
        assert_eq!(err.to_string(), "Server error (503): Service Unavailable");
    }

    #[test]
    fn test_validation_details_keep_body() {
        let body = json!({"message": "bad", "fields": {"amount": "negative"}});
        let err = RemoteError::from_status(422, Some(body.clone()));

        assert_eq!(err.details(), Some(json!({"status": 422, "body": body})));
        assert!(RemoteError::Network("x".to_string()).details().is_none());
    }
}
