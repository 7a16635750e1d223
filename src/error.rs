//! Error types for the Reddit client
//!
//! Every fallible operation in the crate returns [`RedditClientError`]. Only two
//! failure classes are recovered without caller involvement: transient server
//! errors on idempotent requests and stale-token races. Everything else carries
//! enough context (status, endpoint, attempt count) for the caller to decide.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using our RedditClientError type
pub type Result<T> = std::result::Result<T, RedditClientError>;

#[derive(Error, Debug)]
pub enum RedditClientError {
    /// The HTTP stack failed before a response was received
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    /// The local rate-limit window is exhausted and queueing is disabled
    #[error("Reddit rate limit exceeded; the window resets in {}s", wait.as_secs_f64().ceil())]
    RateLimitExceeded { wait: Duration },

    /// A retryable status survived every allowed attempt (or the method was not idempotent)
    #[error("Transient server error {status} from {endpoint} after {attempts} attempt(s)")]
    TransientServerError {
        status: u16,
        endpoint: String,
        attempts: u32,
    },

    /// The token endpoint rejected our credentials
    #[error("Authentication failed: {error}{}", description.as_deref().map(|d| format!(" ({})", d)).unwrap_or_default())]
    AuthenticationError {
        error: String,
        description: Option<String>,
    },

    /// The supplied credential combination cannot produce a token
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Malformed response from {endpoint}: {message}")]
    MalformedResponse { endpoint: String, message: String },

    /// Any other non-success status
    #[error("Reddit API error {status} from {endpoint}: {body}")]
    ApiError {
        status: u16,
        endpoint: String,
        body: String,
    },

    /// The `json.errors` array of a form endpoint was not empty
    #[error("Reddit returned errors from {endpoint}: {}", errors.join("; "))]
    RedditErrors {
        endpoint: String,
        errors: Vec<String>,
    },

    #[error("Invalid method call: {0}")]
    InvalidMethodCall(String),
}

impl RedditClientError {
    pub(crate) fn malformed(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        RedditClientError::MalformedResponse {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    pub(crate) fn auth_failed(error: impl Into<String>, description: Option<String>) -> Self {
        RedditClientError::AuthenticationError {
            error: error.into(),
            description,
        }
    }

    /// Whether this error belongs to the retryable class
    pub fn is_transient(&self) -> bool {
        matches!(self, RedditClientError::TransientServerError { .. })
    }

    /// HTTP status attached to the error, if there was a response
    pub fn status(&self) -> Option<u16> {
        match self {
            RedditClientError::TransientServerError { status, .. }
            | RedditClientError::ApiError { status, .. } => Some(*status),
            RedditClientError::RequestError(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
