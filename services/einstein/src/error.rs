//! Error taxonomy for orchestrator operations.
//!
//! Every collaborator has its own error enum; they all convert into
//! [`BmiError`], which is the only error an operation reports. The status
//! code of each variant is fixed here and nowhere else.

use thiserror::Error;

use crate::db::StoreError;
use crate::hil::IsolationError;
use crate::iscsi::ExposureError;
use crate::storage::StorageError;

/// Errors surfaced by orchestrator operations.
#[derive(Debug, Error)]
pub enum BmiError {
    #[error("Project {0} does not exist")]
    ProjectNotFound(String),

    #[error("Image {0} does not exist")]
    ImageNotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Local policy rejected the operation.
    #[error("Authorization failed")]
    AuthorizationFailed,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error(transparent)]
    Isolation(#[from] IsolationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Exposure(#[from] ExposureError),

    #[error("Registration failed for {node}: {reason}")]
    Registration { node: String, reason: String },

    #[error("DHCP lookup failed: {0}")]
    Dhcp(String),

    #[error("Database error: {0}")]
    Database(StoreError),

    #[error("{message}")]
    Unknown { status: u16, message: String },
}

impl BmiError {
    /// Status code reported in the response envelope.
    pub fn status_code(&self) -> u16 {
        match self {
            BmiError::ProjectNotFound(_) | BmiError::ImageNotFound(_) => 404,
            BmiError::Conflict(_) => 409,
            BmiError::AuthorizationFailed => 403,
            BmiError::InvalidCredentials(_) => 401,
            BmiError::Isolation(e) => e.status_code(),
            BmiError::Storage(e) => e.status_code(),
            BmiError::Exposure(e) => e.status_code(),
            BmiError::Registration { .. } | BmiError::Dhcp(_) | BmiError::Database(_) => 500,
            BmiError::Unknown { status, .. } => *status,
        }
    }

    /// Whether the message embeds a derived storage name that should be
    /// rewritten to the image name before it reaches the caller.
    pub fn needs_name_translation(&self) -> bool {
        match self {
            BmiError::Storage(e) => e.translate_name,
            _ => false,
        }
    }

    /// Machine-readable reason code, used in logs.
    pub fn reason_code(&self) -> &'static str {
        match self {
            BmiError::ProjectNotFound(_) => "project_not_found",
            BmiError::ImageNotFound(_) => "image_not_found",
            BmiError::Conflict(_) => "conflict",
            BmiError::AuthorizationFailed => "authorization_failed",
            BmiError::InvalidCredentials(_) => "invalid_credentials",
            BmiError::Isolation(_) => "isolation_error",
            BmiError::Storage(_) => "storage_error",
            BmiError::Exposure(_) => "exposure_error",
            BmiError::Registration { .. } => "registration_failed",
            BmiError::Dhcp(_) => "dhcp_error",
            BmiError::Database(_) => "database_error",
            BmiError::Unknown { .. } => "unknown",
        }
    }
}

impl From<StoreError> for BmiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(message) => BmiError::Conflict(message),
            StoreError::ProjectNotFound(name) => BmiError::ProjectNotFound(name),
            StoreError::ImageNotFound(name) => BmiError::ImageNotFound(name),
            other => BmiError::Database(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageErrorKind;
    use rstest::rstest;

    #[rstest]
    #[case(BmiError::ProjectNotFound("p".into()), 404)]
    #[case(BmiError::ImageNotFound("i".into()), 404)]
    #[case(BmiError::Conflict("dup".into()), 409)]
    #[case(BmiError::AuthorizationFailed, 403)]
    #[case(BmiError::InvalidCredentials("bad".into()), 401)]
    #[case(BmiError::Isolation(IsolationError::AuthenticationFailed), 401)]
    #[case(BmiError::Isolation(IsolationError::AuthorizationFailed), 403)]
    #[case(BmiError::Isolation(IsolationError::NicNotFound { node: "n".into(), nic: "eth1".into() }), 404)]
    #[case(BmiError::Storage(StorageError::new("4img1", StorageErrorKind::NotFound)), 404)]
    #[case(BmiError::Storage(StorageError::new("4img1", StorageErrorKind::Exists)), 409)]
    #[case(BmiError::Dhcp("none".into()), 500)]
    #[case(BmiError::Unknown { status: 502, message: "bad gateway".into() }, 502)]
    fn test_status_codes(#[case] err: BmiError, #[case] expected: u16) {
        assert_eq!(err.status_code(), expected);
    }

    #[test]
    fn test_translation_flag_follows_construction() {
        let derived = BmiError::from(StorageError::new("4img1", StorageErrorKind::NotFound));
        assert!(derived.needs_name_translation());

        let external = BmiError::from(StorageError::external("centos", StorageErrorKind::NotFound));
        assert!(!external.needs_name_translation());

        assert!(!BmiError::ImageNotFound("4img1".into()).needs_name_translation());
    }

    #[test]
    fn test_store_conflict_maps_to_conflict() {
        let err = BmiError::from(StoreError::Conflict("Image disk1 already exists".into()));
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.to_string(), "Image disk1 already exists");
    }

    #[test]
    fn test_store_missing_rows_map_to_not_found() {
        let err = BmiError::from(StoreError::ImageNotFound("disk1".into()));
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.to_string(), "Image disk1 does not exist");

        let err = BmiError::from(StoreError::ProjectNotFound("tenantC".into()));
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.to_string(), "Project tenantC does not exist");

        let err = BmiError::from(StoreError::Invalid("dangling parent".into()));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_nic_message() {
        let err = BmiError::from(IsolationError::NicNotFound {
            node: "node7".into(),
            nic: "eth1".into(),
        });
        assert_eq!(err.to_string(), "Nic does not exist");
    }
}
