use std::time::Duration;
use thiserror::Error;

/// Errors returned by the Miniflux client.
///
/// `Timeout` and `Cancelled` are kept apart from `RequestFailed` so callers can
/// tell "the server said no" from "the server never answered".
#[derive(Debug, Error)]
pub enum MinifluxError {
    /// The server answered with a non-2xx status code
    #[error("Miniflux request failed: HTTP status {status}")]
    RequestFailed { status: u16 },
    /// The response body was not the JSON shape we expected
    #[error("Failed to decode Miniflux response: {0}")]
    DecodeFailed(#[from] serde_json::Error),
    /// The request exceeded its deadline
    #[error("Miniflux request timed out after {0:?}")]
    Timeout(Duration),
    /// The caller cancelled the request before it completed
    #[error("Miniflux request cancelled")]
    Cancelled,
    /// Transport-level failure (DNS, connection, TLS, ...)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Response body exceeded the size cap
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
}

impl MinifluxError {
    /// Returns true if the failure is transient and a later attempt may succeed.
    ///
    /// The client itself never retries; this is for callers that do.
    pub fn is_retryable(&self) -> bool {
        match self {
            MinifluxError::Timeout(_) | MinifluxError::Network(_) => true,
            MinifluxError::RequestFailed { status } => *status >= 500 || *status == 429,
            MinifluxError::DecodeFailed(_)
            | MinifluxError::Cancelled
            | MinifluxError::ResponseTooLarge(_) => false,
        }
    }

    /// HTTP status for `RequestFailed`, `None` otherwise.
    pub fn status(&self) -> Option<u16> {
        match self {
            MinifluxError::RequestFailed { status } => Some(*status),
            _ => None,
        }
    }
}
