//! Image lifecycle: snapshots, imports, exports and cross-project copies.
//!
//! Clone sources are always flattened images carrying a protected snapshot
//! labelled `settings.snapshot`. The multi-step sequences here do not roll
//! back; a failure part way through is reported and leaves what was done.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Orchestrator, Session};
use crate::db::{ImageSummary, NewImage};
use crate::error::BmiError;
use crate::response::Response;
use crate::storage::StorageError;

/// An image row together with its derived storage name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageListing {
    #[serde(flatten)]
    pub image: ImageSummary,
    pub storage_name: String,
}

impl Session<'_> {
    /// Clone `source@label` into `target`, flatten it and give it its own
    /// protected snapshot.
    fn promote(&self, source: &str, label: &str, target: &str) -> Result<(), StorageError> {
        let storage = &self.backends.storage;
        storage.clone_image(source, label, target)?;
        storage.flatten(target)?;
        storage.snapshot(target, self.snapshot())?;
        storage.protect_snapshot(target, self.snapshot())
    }

    /// Drop the transient snapshot taken on `img`.
    fn drop_snapshot(&self, img: &str) -> Result<(), StorageError> {
        self.backends.storage.unprotect_snapshot(img, self.snapshot())?;
        self.backends.storage.remove_snapshot(img, self.snapshot())
    }

    fn create_snapshot(&self, disk_name: &str, snap_name: &str) -> Result<bool, BmiError> {
        self.validate_project()?;

        let source = self.resolve(disk_name)?;
        let storage = &self.backends.storage;
        storage.snapshot(&source, self.snapshot())?;
        storage.protect_snapshot(&source, self.snapshot())?;

        let parent = self.backends.store.find_parent_id(self.project_id(), disk_name)?;
        let id = self.backends.store.insert_image(
            &NewImage::child(snap_name, self.project_id(), parent).snapshot(true),
        )?;
        let snapshot = self.storage_name(id);

        self.promote(&source, self.snapshot(), &snapshot)?;
        self.drop_snapshot(&source)?;

        info!(disk = %disk_name, snapshot = %snap_name, storage_name = %snapshot, "Snapshot created");
        Ok(true)
    }

    fn list_snapshots(&self) -> Result<Vec<String>, BmiError> {
        self.validate_project()?;
        Ok(self.backends.store.list_snapshots(self.project_id())?)
    }

    fn list_images(&self) -> Result<Vec<String>, BmiError> {
        self.validate_project()?;
        Ok(self.backends.store.list_images(self.project_id())?)
    }

    fn list_all_images(&self) -> Result<Vec<ImageListing>, BmiError> {
        self.require_admin()?;
        let images = self.backends.store.list_all_images()?;
        Ok(images
            .into_iter()
            .map(|image| ImageListing {
                storage_name: self.storage_name(image.id),
                image,
            })
            .collect())
    }

    fn remove_image(&self, image_name: &str) -> Result<bool, BmiError> {
        self.validate_project()?;

        let name = self.resolve(image_name)?;
        self.drop_snapshot(&name)?;
        self.backends.storage.remove(&name)?;
        self.backends.store.delete_image(image_name, self.project_id())?;

        info!(image = %image_name, storage_name = %name, "Image removed");
        Ok(true)
    }

    fn import_ceph_image(&self, image: &str) -> Result<bool, BmiError> {
        let storage = &self.backends.storage;
        storage.snapshot(image, self.snapshot())?;
        storage.protect_snapshot(image, self.snapshot())?;

        let id = self
            .backends
            .store
            .insert_image(&NewImage::root(image, self.project_id()))?;
        let golden = self.storage_name(id);

        self.promote(image, self.snapshot(), &golden)?;
        self.drop_snapshot(image)?;

        info!(image = %image, storage_name = %golden, "Imported image");
        Ok(true)
    }

    fn import_ceph_snapshot(&self, image: &str, snap_name: &str, protect: bool) -> Result<bool, BmiError> {
        if protect {
            self.backends.storage.protect_snapshot(image, snap_name)?;
        }

        let id = self
            .backends
            .store
            .insert_image(&NewImage::root(image, self.project_id()))?;
        let golden = self.storage_name(id);

        self.promote(image, snap_name, &golden)?;

        info!(image = %image, snapshot = %snap_name, storage_name = %golden, "Imported snapshot");
        Ok(true)
    }

    fn export_ceph_image(&self, image: &str, name: &str) -> Result<bool, BmiError> {
        let source = self.resolve(image)?;
        self.backends.storage.clone_image(&source, self.snapshot(), name)?;
        self.backends.storage.flatten(name)?;

        info!(image = %image, export = %name, "Exported image");
        Ok(true)
    }

    fn copy_image(&self, image: &str, dest_project: &str, dest_name: Option<&str>) -> Result<bool, BmiError> {
        self.require_admin_or_own(dest_project)?;

        let dest_pid = self.find_project(dest_project)?;
        let source = self.resolve(image)?;
        let id = self
            .backends
            .store
            .copy_image(self.project_id(), image, dest_pid, dest_name)?;
        let copy = self.storage_name(id);

        self.promote(&source, self.snapshot(), &copy)?;

        info!(
            image = %image,
            dest_project = %dest_project,
            dest_name = %dest_name.unwrap_or(image),
            storage_name = %copy,
            "Image copied"
        );
        Ok(true)
    }

    fn move_image(&self, image: &str, dest_project: &str, dest_name: Option<&str>) -> Result<bool, BmiError> {
        self.require_admin_or_own(dest_project)?;

        let dest_pid = self.find_project(dest_project)?;
        self.find_image(image)?;
        // Storage is left alone: the derived name depends only on the id.
        self.backends
            .store
            .move_image(self.project_id(), image, dest_pid, dest_name)?;

        info!(
            image = %image,
            dest_project = %dest_project,
            dest_name = %dest_name.unwrap_or(image),
            "Image moved"
        );
        Ok(true)
    }
}

impl Orchestrator {
    /// Promote a disk's current state into a protected, flattened snapshot.
    pub fn create_snapshot(&self, disk_name: &str, snap_name: &str) -> Response<bool> {
        self.run("create_snapshot", |s| s.create_snapshot(disk_name, snap_name))
    }

    pub fn list_snapshots(&self) -> Response<Vec<String>> {
        self.run("list_snapshots", |s| s.list_snapshots())
    }

    /// Clone sources of the caller's project: golden images and snapshots.
    pub fn list_images(&self) -> Response<Vec<String>> {
        self.run("list_images", |s| s.list_images())
    }

    /// Every image of every project, with storage names. Admin only.
    pub fn list_all_images(&self) -> Response<Vec<ImageListing>> {
        self.run("list_all_images", |s| s.list_all_images())
    }

    pub fn remove_image(&self, image_name: &str) -> Response<bool> {
        self.run("remove_image", |s| s.remove_image(image_name))
    }

    /// Adopt an externally created RBD image as a golden image.
    pub fn import_ceph_image(&self, image: &str) -> Response<bool> {
        self.run("import_ceph_image", |s| s.import_ceph_image(image))
    }

    /// Adopt an existing snapshot `image@snap_name` as a golden image.
    pub fn import_ceph_snapshot(&self, image: &str, snap_name: &str, protect: bool) -> Response<bool> {
        self.run("import_ceph_snapshot", |s| {
            s.import_ceph_snapshot(image, snap_name, protect)
        })
    }

    /// Clone an image out of the managed namespace under `name`.
    pub fn export_ceph_image(&self, image: &str, name: &str) -> Response<bool> {
        self.run("export_ceph_image", |s| s.export_ceph_image(image, name))
    }

    pub fn copy_image(&self, image: &str, dest_project: &str, dest_name: Option<&str>) -> Response<bool> {
        self.run("copy_image", |s| s.copy_image(image, dest_project, dest_name))
    }

    pub fn move_image(&self, image: &str, dest_project: &str, dest_name: Option<&str>) -> Response<bool> {
        self.run("move_image", |s| s.move_image(image, dest_project, dest_name))
    }
}
