//! Metadata store.
//!
//! Persists projects and image rows:
//! - projects: the root of a tenant's image namespace
//! - images: a forest of golden images, snapshots and disks
//!
//! The store is the single source of truth; the orchestrator re-reads what
//! it needs on every call. `(project, image name)` uniqueness is enforced
//! here and is the only concurrency-control primitive in the system.

mod error;
mod sqlite;
mod store;

pub use error::StoreError;
pub use sqlite::SqliteStore;
pub use store::{DiskSummary, ImageRecord, ImageSummary, MetadataStore, NewImage, ProjectRecord};
