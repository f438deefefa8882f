//! Error types for identifier parsing.

use thiserror::Error;

/// Errors that can occur when parsing ids and derived names.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty.
    #[error("name cannot be empty")]
    Empty,

    /// The derived name does not contain the image marker.
    #[error("name missing 'img' marker: {0}")]
    MissingMarker(String),

    /// The id segment is not a decimal integer.
    #[error("invalid image id: '{value}'")]
    InvalidId { value: String },

    /// The uid segment is not a decimal integer.
    #[error("invalid uid: '{value}'")]
    InvalidUid { value: String },
}

impl IdError {
    /// Returns true if the input had no marker at all, i.e. it is not a
    /// derived name and should be reported as-is.
    pub fn is_foreign_name(&self) -> bool {
        matches!(self, IdError::Empty | IdError::MissingMarker(_))
    }
}
