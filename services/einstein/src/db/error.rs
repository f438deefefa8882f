//! Metadata store error types.

use thiserror::Error;

/// Metadata store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to open the database.
    #[error("failed to open metadata store at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Failed to execute a query.
    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// A uniqueness constraint rejected the write.
    #[error("{0}")]
    Conflict(String),

    /// The addressed project row does not exist.
    #[error("project {0} not found")]
    ProjectNotFound(String),

    /// The addressed image row does not exist.
    #[error("image {0} not found")]
    ImageNotFound(String),

    /// The write would violate a referential constraint.
    #[error("invalid write: {0}")]
    Invalid(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Returns the extended SQLite constraint code carried by `e`, if any.
pub(crate) fn constraint_code(e: &rusqlite::Error) -> Option<i32> {
    match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Some(err.extended_code)
        }
        _ => None,
    }
}
