//! Rule Engine Error Types

use thiserror::Error;

/// Result type for rule operations
pub type Result<T> = std::result::Result<T, RuleError>;

/// Template parsing / rendering errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// `{` without a closing `}`
    #[error("Unterminated placeholder at offset {0}")]
    Unterminated(usize),

    /// Single `}` outside a placeholder
    #[error("Unmatched '}}' at offset {0}")]
    UnmatchedBrace(usize),

    /// Placeholder that is not `entity.<field>` or `parent.<field>`
    #[error("Invalid placeholder: {{{0}}}")]
    InvalidPlaceholder(String),

    #[error("No value for placeholder {0}")]
    MissingValue(String),

    /// Extraction target does not occur in the template
    #[error("Template does not contain {0}")]
    MissingTarget(String),

    #[error("Pattern build error: {0}")]
    Pattern(String),
}

/// Rule engine errors
#[derive(Debug, Error)]
pub enum RuleError {
    /// Rule configuration rejected at construction
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Matched attribute or template field absent on the entity
    #[error("Attribute '{attribute}' missing on {entity}")]
    MissingAttribute { attribute: String, entity: String },

    /// Rollback template does not fit the current value
    #[error("Value '{value}' does not match rollback template '{template}'")]
    IrreversibleFormat { template: String, value: String },

    /// Repeated rollback target captured different values
    #[error("Inconsistent captures {captures:?} for rollback template '{template}'")]
    InconsistentCapture {
        template: String,
        captures: Vec<String>,
    },

    /// Rule file decoding error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for RuleError {
    fn from(err: serde_json::Error) -> Self {
        RuleError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for RuleError {
    fn from(err: serde_yaml::Error) -> Self {
        RuleError::SerializationError(err.to_string())
    }
}
