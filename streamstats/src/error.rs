//! Error types shared across the workspace.

use thiserror::Error;

/// Failure while fetching a page from a [`crate::StreamSource`].
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API request failed: {status} {reason}")]
    Status { status: u16, reason: String },
    #[error("response did not match the stream schema: {0}")]
    Decode(#[from] serde_json::Error),
    /// Raised by in-memory sources; carries a free-form reason.
    #[error("{0}")]
    Source(String),
}

/// Rejected query parameters at the proxy boundary.
///
/// The `Display` text is returned verbatim as the `error` field of the 400
/// response body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Limit must be between 1 and 1000")]
    InvalidLimit,
    #[error("Offset must be non-negative")]
    InvalidOffset,
    /// Not an integer, or past the largest supported offset.
    #[error("Offset must be a whole number no greater than 4294967295")]
    MalformedOffset,
    #[error("Unsupported sort_by '{0}'")]
    InvalidSortKey(String),
    #[error("Unsupported sort_order '{0}' (expected ASC or DESC)")]
    InvalidSortOrder(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
