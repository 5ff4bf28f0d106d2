use reqwest::StatusCode;
use serde::Deserialize;

/// Errors surfaced by the client.
///
/// The variants mirror the server's error codes so callers can branch on
/// them without inspecting status codes.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Credentials were rejected even after one refresh.
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any other non-2xx response.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The request never produced a response (connect, timeout, I/O).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A 2xx response whose body did not match the expected shape.
    #[error("Unexpected response body: {0}")]
    Decode(String),
}

impl ClientError {
    /// Whether retrying the same request later may succeed: network
    /// failures, request timeouts, throttling, and 5xx responses.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transport(e) => !e.is_builder() && !e.is_decode(),
            ClientError::Server { status, .. } => {
                *status >= 500
                    || *status == StatusCode::REQUEST_TIMEOUT.as_u16()
                    || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
            }
            _ => false,
        }
    }

    /// Build an error from a non-2xx status and its raw body.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .map(|b| b.error)
            .unwrap_or_else(|_| body.trim().to_string());

        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ClientError::Validation(message)
            }
            StatusCode::UNAUTHORIZED => ClientError::Auth(message),
            StatusCode::FORBIDDEN => ClientError::Forbidden(message),
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            StatusCode::CONFLICT => ClientError::Conflict(message),
            other => ClientError::Server {
                status: other.as_u16(),
                message,
            },
        }
    }
}

/// The server's `{ "error": ..., "code": ... }` body.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}
