//! Client error types.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenience alias for client results.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced to callers of [`crate::ApiClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Login was rejected. Carries the server's message (e.g. "Account deactivated").
    #[error("{0}")]
    InvalidCredentials(String),

    /// Non-success response from the API.
    #[error("{status}: {message}")]
    Api { status: StatusCode, message: String },

    /// Connection, timeout or decoding failure.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
}

impl ClientError {
    /// HTTP status, when the error came from an API response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::InvalidCredentials(_) => Some(StatusCode::UNAUTHORIZED),
            ClientError::Transport(e) => e.status(),
            _ => None,
        }
    }

    /// True for a `401` surfaced after the refresh flow gave up.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}
