//! Client Error Types

use thiserror::Error;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Delivery failure reported by a [`Transport`](crate::Transport)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Worth retrying: connection refused, timeout, non-success HTTP status
    #[error("Transient transport error: {0}")]
    Transient(String),

    /// Never retried: malformed request, TLS setup, client construction
    #[error("Permanent transport error: {0}")]
    Permanent(String),
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Transient(_))
    }
}

/// PRTG client errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// Unknown API target or missing target arguments
    #[error("Bad target: {0}")]
    BadTarget(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Payload that is not the XML the target returns
    #[error("Unknown response: {0}")]
    UnknownResponse(String),

    #[error("Cache error: {0}")]
    Cache(#[from] prtg_cache::CacheError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::Config(format!("invalid endpoint URL: {}", err))
    }
}

impl From<common::CommonError> for ClientError {
    fn from(err: common::CommonError) -> Self {
        ClientError::Config(err.to_string())
    }
}
