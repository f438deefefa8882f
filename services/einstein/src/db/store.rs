//! Metadata store contract and record types.

use bmi_id::{ImageId, ProjectId};
use serde::{Deserialize, Serialize};

use super::StoreError;

/// A project row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub name: String,
}

/// An image row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: ImageId,
    pub name: String,
    pub project_id: ProjectId,
    pub parent_id: Option<ImageId>,
    pub is_snapshot: bool,
    pub public: bool,
}

/// A disk (clone) with the name of the image it was cloned from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskSummary {
    pub name: String,
    pub parent: Option<String>,
}

/// An image row joined with its project name, for unscoped listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub id: ImageId,
    pub name: String,
    pub project: String,
    pub parent: Option<String>,
    pub is_snapshot: bool,
    pub public: bool,
}

/// Values for a new image row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImage {
    pub name: String,
    pub project_id: ProjectId,
    pub parent_id: Option<ImageId>,
    pub public: bool,
    pub is_snapshot: bool,
    /// Row id to use instead of the store-assigned one.
    pub explicit_id: Option<ImageId>,
}

impl NewImage {
    /// A golden image with no parent.
    pub fn root(name: impl Into<String>, project_id: ProjectId) -> Self {
        Self {
            name: name.into(),
            project_id,
            parent_id: None,
            public: false,
            is_snapshot: false,
            explicit_id: None,
        }
    }

    /// An image derived from `parent`.
    pub fn child(name: impl Into<String>, project_id: ProjectId, parent: Option<ImageId>) -> Self {
        Self {
            parent_id: parent,
            ..Self::root(name, project_id)
        }
    }

    pub fn snapshot(mut self, is_snapshot: bool) -> Self {
        self.is_snapshot = is_snapshot;
        self
    }

    pub fn public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    pub fn with_id(mut self, id: Option<ImageId>) -> Self {
        self.explicit_id = id;
        self
    }
}

/// Metadata store interface.
///
/// One handle is acquired per orchestrator invocation and released with
/// [`MetadataStore::close`]; handles are not shared between invocations.
pub trait MetadataStore: Send {
    /// Look up a project id by name.
    fn find_project_id(&self, name: &str) -> Result<Option<ProjectId>, StoreError>;

    /// Insert a project, optionally with a fixed id.
    fn insert_project(&self, name: &str, id: Option<ProjectId>) -> Result<ProjectId, StoreError>;

    /// Delete a project by name. Fails if it still owns images.
    fn delete_project(&self, name: &str) -> Result<(), StoreError>;

    /// List all projects ordered by id.
    fn list_projects(&self) -> Result<Vec<ProjectRecord>, StoreError>;

    /// Insert an image row. Duplicate `(project, name)` fails with `Conflict`.
    fn insert_image(&self, image: &NewImage) -> Result<ImageId, StoreError>;

    /// Delete an image row by name.
    fn delete_image(&self, name: &str, project_id: ProjectId) -> Result<(), StoreError>;

    /// Look up an image id by name.
    fn find_image_id(&self, name: &str, project_id: ProjectId)
        -> Result<Option<ImageId>, StoreError>;

    /// Fetch a full image row by name.
    fn find_image(&self, name: &str, project_id: ProjectId)
        -> Result<Option<ImageRecord>, StoreError>;

    /// Parent id of the named image; `ImageNotFound` if the image is absent.
    fn find_parent_id(&self, project_id: ProjectId, name: &str)
        -> Result<Option<ImageId>, StoreError>;

    /// Project owning the image with this id.
    fn find_project_of_image(&self, id: ImageId) -> Result<Option<ProjectId>, StoreError>;

    /// Name of the image with this id.
    fn find_name_of_image(&self, id: ImageId) -> Result<Option<String>, StoreError>;

    /// Clone sources of a project: golden images and snapshots.
    fn list_images(&self, project_id: ProjectId) -> Result<Vec<String>, StoreError>;

    /// Snapshots of a project.
    fn list_snapshots(&self, project_id: ProjectId) -> Result<Vec<String>, StoreError>;

    /// Disks (clones) of a project.
    fn list_disks(&self, project_id: ProjectId) -> Result<Vec<DiskSummary>, StoreError>;

    /// Every image row of every project.
    fn list_all_images(&self) -> Result<Vec<ImageSummary>, StoreError>;

    /// Insert a copy of an image row into `dest_project`, returning the new id.
    fn copy_image(
        &self,
        src_project: ProjectId,
        name: &str,
        dest_project: ProjectId,
        new_name: Option<&str>,
    ) -> Result<ImageId, StoreError>;

    /// Re-parent an image row under `dest_project`, optionally renaming it.
    fn move_image(
        &self,
        src_project: ProjectId,
        name: &str,
        dest_project: ProjectId,
        new_name: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Release the handle.
    fn close(self: Box<Self>) -> Result<(), StoreError>;
}
