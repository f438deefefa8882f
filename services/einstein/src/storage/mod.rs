//! Copy-on-write block storage.
//!
//! The orchestrator only needs a handful of RBD primitives:
//! - clone a protected snapshot into a new image
//! - snapshot, protect and unprotect
//! - flatten a clone so it no longer depends on its parent
//! - remove images and snapshots

mod rbd;

use thiserror::Error;

pub use rbd::{classify_stderr, RbdConfig, RbdStorage};

/// What went wrong with a storage object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageErrorKind {
    NotFound,
    Exists,
    Busy,
    Failed(String),
}

/// A storage failure against one named storage object.
///
/// The message always starts with the storage name so it can be rewritten
/// to the image name when `translate_name` is set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} {}", .image, describe(.kind))]
pub struct StorageError {
    pub image: String,
    pub kind: StorageErrorKind,
    pub translate_name: bool,
}

fn describe(kind: &StorageErrorKind) -> String {
    match kind {
        StorageErrorKind::NotFound => "Not Found".to_string(),
        StorageErrorKind::Exists => "already exists".to_string(),
        StorageErrorKind::Busy => "is busy".to_string(),
        StorageErrorKind::Failed(reason) => format!("failed: {reason}"),
    }
}

impl StorageError {
    /// Error against a BMI-derived storage name.
    pub fn new(image: impl Into<String>, kind: StorageErrorKind) -> Self {
        Self {
            image: image.into(),
            kind,
            translate_name: true,
        }
    }

    /// Error against a storage object whose name was chosen outside BMI.
    pub fn external(image: impl Into<String>, kind: StorageErrorKind) -> Self {
        Self {
            translate_name: false,
            ..Self::new(image, kind)
        }
    }

    /// Clears `translate_name` when `image` is not a derived name.
    pub fn for_name(image: impl Into<String>, kind: StorageErrorKind) -> Self {
        let image = image.into();
        if bmi_id::StorageName::parse(&image).is_ok() {
            Self::new(image, kind)
        } else {
            Self::external(image, kind)
        }
    }

    pub fn status_code(&self) -> u16 {
        match self.kind {
            StorageErrorKind::NotFound => 404,
            StorageErrorKind::Exists => 409,
            StorageErrorKind::Busy | StorageErrorKind::Failed(_) => 500,
        }
    }
}

/// Storage backend interface.
pub trait StorageBackend: Send {
    /// Clone `src@snapshot` into a new image `dst`.
    fn clone_image(&self, src: &str, snapshot: &str, dst: &str) -> Result<(), StorageError>;

    /// Create snapshot `img@label`.
    fn snapshot(&self, img: &str, label: &str) -> Result<(), StorageError>;

    fn protect_snapshot(&self, img: &str, label: &str) -> Result<(), StorageError>;

    fn unprotect_snapshot(&self, img: &str, label: &str) -> Result<(), StorageError>;

    fn remove_snapshot(&self, img: &str, label: &str) -> Result<(), StorageError>;

    /// Remove an image.
    fn remove(&self, img: &str) -> Result<(), StorageError>;

    /// Detach a clone from its parent snapshot.
    fn flatten(&self, img: &str) -> Result<(), StorageError>;

    /// Release any cluster handles held by this backend.
    fn tear_down(&mut self) {}
}
