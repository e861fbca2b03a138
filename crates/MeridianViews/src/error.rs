//! Error handling for view evaluation and row output.

use thiserror::Error;

pub type ViewResultOf<T> = Result<T, ViewError>;

/// Errors identify which clause failed, so a caller processing many views
/// can isolate and report per-view failures without aborting the batch.
#[derive(Debug, Error)]
pub enum ViewError {
    /// ViewDefinition structure validation failed (missing `resource`,
    /// unnamed column, ...).
    #[error("Invalid ViewDefinition: {0}")]
    InvalidDefinition(String),

    /// A `where` clause evaluated to something other than a single boolean.
    #[error("WHERE clause did not evaluate to a boolean: {path}")]
    NonBooleanWhere { path: String },

    /// A non-collection column's path produced more than one value.
    #[error("Multiple values found but not expected for column {column}")]
    MultipleValuesForColumn { column: String },

    /// A path expression failed to parse or evaluate; names the offending
    /// path.
    #[error("Error evaluating '{path}': {message}")]
    Expression { path: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),
}

impl ViewError {
    pub fn expression(path: &str, error: impl std::fmt::Display) -> ViewError {
        ViewError::Expression {
            path: path.to_string(),
            message: error.to_string(),
        }
    }
}
