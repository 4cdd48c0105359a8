use thiserror::Error;

/// Basic library error type
#[derive(Debug, Error)]
pub enum CommonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Logging could not be installed
    #[error("Logging error: {0}")]
    Logging(String),
}

/// Error result type
pub type Result<T> = std::result::Result<T, CommonError>;

impl From<figment::Error> for CommonError {
    fn from(err: figment::Error) -> Self {
        CommonError::Config(err.to_string())
    }
}
