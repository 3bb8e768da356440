//! Error taxonomy shared by every source adapter.
//!
//! Adapters never swallow transport or authentication failures: they surface
//! here unchanged and the caller decides whether to retry. Missing optional
//! fields are not errors at all; they resolve to `None` in
//! [`AnimeRecord`](crate::models::AnimeRecord).

use thiserror::Error;

/// Result alias used by the adapters and the session manager.
pub type Result<T> = std::result::Result<T, ResolveError>;

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The upstream answered with a non-success HTTP status.
    #[error("HTTP {status} from {url}")]
    Transport { url: String, status: u16 },

    /// The request never produced a response (DNS, TLS, connection reset).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Token exchange or forum login did not succeed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The source had nothing left after its own filtering.
    #[error("not found: {0}")]
    NotFound(String),

    /// A structural assumption about the document shape did not hold.
    #[error("unexpected document shape: {0}")]
    ParseInconsistency(String),

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

impl ResolveError {
    /// Short, stable label for user-facing reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::Transport { .. } | ResolveError::Http(_) => "transport",
            ResolveError::AuthenticationFailed(_) => "authentication_failed",
            ResolveError::NotFound(_) => "not_found",
            ResolveError::ParseInconsistency(_) => "parse_inconsistency",
            ResolveError::InvalidHeader(_) => "invalid_header",
        }
    }

    pub(crate) fn parse(msg: impl Into<String>) -> Self {
        ResolveError::ParseInconsistency(msg.into())
    }
}

impl From<serde_json::Error> for ResolveError {
    fn from(e: serde_json::Error) -> Self {
        ResolveError::ParseInconsistency(format!("malformed JSON: {}", e))
    }
}
