//! Errors raised while reading grid input.

use thiserror::Error;

/// Grid input errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    /// The label is empty or has no rank part.
    #[error("malformed cell label '{0}'")]
    MalformedLabel(String),

    /// The file (column) is not a letter A-Z.
    #[error("invalid file '{0}', expected A-Z")]
    InvalidFile(char),

    /// The rank (row) is not an integer in 1..=99.
    #[error("invalid rank '{0}', expected 1-99")]
    InvalidRank(String),

    /// A cover zone names neither cells nor a rectangle.
    #[error("cover zone has no cells")]
    EmptyZone,
}

/// Result alias for grid operations.
pub type Result<T> = std::result::Result<T, GridError>;
