//! Error types for SQL lineage extraction.

use thiserror::Error;

/// Errors that can occur during SQL lineage extraction
#[derive(Debug, Error)]
pub enum ExtractError {
    /// SQL the parser cannot interpret at all. Always names the offending
    /// fragment so the caller can see what was rejected.
    #[error("SQL parse error: {message} (in: {fragment})")]
    ParseError { message: String, fragment: String },

    #[error("Unsupported statement: {0}")]
    UnsupportedStatement(String),

    #[error("Expected a single statement, found {0}")]
    MultipleStatements(usize),

    #[error("Empty SQL statement")]
    EmptyStatement,

    #[error("Unknown SQL dialect: {0}")]
    UnknownDialect(String),
}

/// Result type for extraction operations
pub type Result<T> = std::result::Result<T, ExtractError>;
