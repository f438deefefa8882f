//! iSCSI exposure layer.
//!
//! Maps a storage image to a network block-device target of the same name.
//! The target table has no notion of tenants; per-project views are built
//! by the orchestrator from the names.

mod tgt;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use tgt::{parse_target_show, TgtConfig, TgtExposure};

/// Errors from target management.
#[derive(Debug, Error)]
pub enum ExposureError {
    #[error("iSCSI target {0} already exists")]
    TargetExists(String),

    #[error("iSCSI target {0} does not exist")]
    TargetNotFound(String),

    #[error("iSCSI command failed for {target}: {reason}")]
    CommandFailed { target: String, reason: String },

    #[error("iSCSI configuration I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ExposureError {
    pub fn status_code(&self) -> u16 {
        match self {
            ExposureError::TargetExists(_) => 409,
            ExposureError::TargetNotFound(_) => 404,
            ExposureError::CommandFailed { .. } | ExposureError::Io(_) => 500,
        }
    }
}

/// What a target currently serves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetInfo {
    /// Target id assigned by the daemon, if it is live.
    pub tid: Option<u32>,
    /// `pool/image` backing the target's data LUN.
    pub backing_store: Option<String>,
}

/// Exposure layer interface.
pub trait ExposureLayer: Send {
    /// Expose the storage image `name` as target `name`.
    fn add_target(&self, name: &str) -> Result<(), ExposureError>;

    fn remove_target(&self, name: &str) -> Result<(), ExposureError>;

    /// Every target currently known, keyed by target name.
    fn list_targets(&self) -> Result<BTreeMap<String, TargetInfo>, ExposureError>;

    /// Rebuild the live target table from persisted configuration.
    fn persist_targets(&self) -> Result<(), ExposureError>;
}
