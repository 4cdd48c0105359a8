//! Model Error Types

use thiserror::Error;

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Entity model errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// Kind name or content-type tag not recognised
    #[error("Unknown entity kind: {0}")]
    UnknownKind(String),
}
