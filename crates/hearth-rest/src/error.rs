//! REST error types

use serde::Deserialize;

use hearth_core::DomainError;

/// Errors returned to REST callers.
///
/// Rate limits never surface here; 429 responses are retried inside the queue.
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request failed with status {status}: {message}")]
    Status {
        status: u16,
        /// Service-specific error code from the JSON body
        code: Option<u64>,
        message: String,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(&'static str),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Request queue closed")]
    QueueClosed,
}

/// Result type alias for REST operations
pub type RestResult<T> = Result<T, RestError>;

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<u64>,
    #[serde(default)]
    message: Option<String>,
}

impl RestError {
    /// Build a status error from a non-success response body
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let parsed: Option<ErrorBody> = serde_json::from_slice(body).ok();
        let (code, message) = match parsed {
            Some(ErrorBody { code, message }) => (
                code,
                message.unwrap_or_else(|| String::from_utf8_lossy(body).into_owned()),
            ),
            None => (None, String::from_utf8_lossy(body).into_owned()),
        };
        Self::Status {
            status,
            code,
            message,
        }
    }

    /// HTTP status of the failed call, if the server answered
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// The credentials were rejected
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_parses_json_body() {
        let err = RestError::from_status(403, br#"{"code":50013,"message":"Missing Permissions"}"#);
        match err {
            RestError::Status {
                status,
                code,
                ref message,
            } => {
                assert_eq!(status, 403);
                assert_eq!(code, Some(50013));
                assert_eq!(message, "Missing Permissions");
            }
            _ => panic!("expected status error"),
        }
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_status_error_keeps_plain_body() {
        let err = RestError::from_status(502, b"bad gateway");
        assert_eq!(err.status(), Some(502));
        assert!(err.to_string().contains("bad gateway"));
        assert!(RestError::from_status(401, b"{}").is_unauthorized());
    }
}
