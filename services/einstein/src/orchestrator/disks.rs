//! Disk lifecycle: clone a golden image into a tenant disk and expose it.

use tracing::{info, warn};

use super::{Orchestrator, Session};
use crate::db::{DiskSummary, NewImage, StoreError};
use crate::error::BmiError;
use crate::response::Response;

impl Session<'_> {
    fn create_disk(&self, disk_name: &str, image_name: &str) -> Result<String, BmiError> {
        let store = &self.backends.store;
        let parent = self.find_image(image_name)?;
        let source = self.storage_name(parent);

        let id = match store.insert_image(&NewImage::child(disk_name, self.project_id(), Some(parent))) {
            Ok(id) => id,
            Err(StoreError::Conflict(_)) => {
                let endpoint = store
                    .find_image_id(disk_name, self.project_id())?
                    .map(|id| self.storage_name(id))
                    .unwrap_or_default();
                return Err(BmiError::Conflict(format!("Disk exists. Endpoint:{endpoint}")));
            }
            Err(e) => return Err(e.into()),
        };
        let clone = self.storage_name(id);

        if let Err(e) = self.backends.storage.clone_image(&source, self.snapshot(), &clone) {
            self.discard_row(disk_name);
            return Err(e.into());
        }

        if let Err(e) = self.backends.exposure.add_target(&clone) {
            if let Err(undo) = self.backends.storage.remove(&clone) {
                warn!(storage_name = %clone, error = %undo, "Failed to remove clone during rollback");
            }
            self.discard_row(disk_name);
            return Err(e.into());
        }

        info!(disk = %disk_name, image = %image_name, storage_name = %clone, "Disk created");
        Ok(clone)
    }

    fn delete_disk(&self, disk_name: &str) -> Result<bool, BmiError> {
        let name = self.resolve(disk_name)?;

        self.backends.exposure.remove_target(&name)?;

        if let Err(e) = self.backends.storage.remove(&name) {
            // The object still exists, so the row stays and the target
            // comes back.
            if let Err(undo) = self.backends.exposure.add_target(&name) {
                warn!(storage_name = %name, error = %undo, "Failed to restore target during rollback");
            }
            return Err(e.into());
        }

        self.backends.store.delete_image(disk_name, self.project_id())?;
        info!(disk = %disk_name, storage_name = %name, "Disk deleted");
        Ok(true)
    }

    fn list_disks(&self) -> Result<Vec<DiskSummary>, BmiError> {
        Ok(self.backends.store.list_disks(self.project_id())?)
    }
}

impl Orchestrator {
    /// Clone `image_name` into a new disk and expose it as an iSCSI target.
    ///
    /// Returns the derived storage name, which is also the target name.
    pub fn create_disk(&self, disk_name: &str, image_name: &str) -> Response<String> {
        self.run("create_disk", |s| s.create_disk(disk_name, image_name))
    }

    /// Remove a disk's target, storage object and row, in that order.
    pub fn delete_disk(&self, disk_name: &str) -> Response<bool> {
        self.run("delete_disk", |s| s.delete_disk(disk_name))
    }

    pub fn list_disks(&self) -> Response<Vec<DiskSummary>> {
        self.run("list_disks", |s| s.list_disks())
    }
}
