use thiserror::Error;

/// Errors from a single delivery attempt.
///
/// Every variant counts as a failed attempt for retry and circuit-breaker
/// purposes; none of them stops the sender.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Destination URL could not be parsed or is not http(s)
    #[error("Invalid delivery URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// No response within the request timeout
    #[error("Delivery to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    /// Endpoint answered with a non-2xx status
    #[error("Endpoint {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Connection, TLS or protocol failure
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(String),
}

impl DeliveryError {
    pub fn invalid_url(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// HTTP status of a rejected delivery, if the endpoint answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
