//! Error types for the data layer.
//!
//! - [`FetchError`] - failures raised by the request cache and the API built on it
//!
//! Stale query results are not errors; see [`crate::core::Completion`].

/// Network/fetch-related errors for HTTP requests.
///
/// `Clone` because a single failed request is reported to every caller
/// that joined it while it was in flight.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    /// Transport failure (offline, DNS, CORS, ...)
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP response outside the 2xx range
    #[error("Response not OK: HTTP {status} for {url}")]
    ResponseNotOk { status: u16, url: String },

    /// Body could not be decoded into the expected structure
    #[error("Parse error: {0}")]
    Parse(String),

    /// Base URL or query could not be turned into a request URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::ResponseNotOk { status, .. } => *status >= 500,
            Self::Parse(_) | Self::InvalidUrl(_) => false,
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<url::ParseError> for FetchError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}
