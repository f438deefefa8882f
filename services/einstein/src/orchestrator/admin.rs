//! Admin operations: metadata maintenance and target management.

use std::collections::BTreeMap;

use bmi_id::{ImageId, ProjectId, StorageName};
use tracing::{debug, error, info};

use super::{Orchestrator, Session};
use crate::db::{NewImage, ProjectRecord};
use crate::error::BmiError;
use crate::iscsi::TargetInfo;
use crate::response::Response;

/// Values for [`Orchestrator::add_image`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSpec {
    pub project: String,
    pub name: String,
    pub id: Option<ImageId>,
    pub is_snapshot: bool,
    /// Parent image, looked up in `project`.
    pub parent: Option<String>,
    pub public: bool,
}

impl Session<'_> {
    fn add_image(&self, spec: &ImageSpec) -> Result<bool, BmiError> {
        self.require_admin()?;

        let pid = self.find_project(&spec.project)?;
        let parent = spec
            .parent
            .as_deref()
            .map(|parent| self.find_image_in(parent, pid))
            .transpose()?;

        let image = NewImage::child(spec.name.as_str(), pid, parent)
            .snapshot(spec.is_snapshot)
            .public(spec.public)
            .with_id(spec.id);
        let id = self.backends.store.insert_image(&image)?;

        info!(project = %spec.project, image = %spec.name, image_id = %id, "Image row added");
        Ok(true)
    }

    fn delete_image(&self, project: &str, name: &str) -> Result<bool, BmiError> {
        self.require_admin()?;

        let pid = self.find_project(project)?;
        self.find_image_in(name, pid)?;
        self.backends.store.delete_image(name, pid)?;
        Ok(true)
    }

    fn add_project(&self, name: &str, id: Option<ProjectId>) -> Result<bool, BmiError> {
        self.require_admin()?;
        let id = self.backends.store.insert_project(name, id)?;
        info!(project = %name, project_id = %id, "Project added");
        Ok(true)
    }

    fn delete_project(&self, name: &str) -> Result<bool, BmiError> {
        self.require_admin()?;
        self.find_project(name)?;
        self.backends.store.delete_project(name)?;
        info!(project = %name, "Project deleted");
        Ok(true)
    }

    fn list_projects(&self) -> Result<Vec<ProjectRecord>, BmiError> {
        self.require_admin()?;
        Ok(self.backends.store.list_projects()?)
    }

    fn mount_image(&self, name: &str) -> Result<bool, BmiError> {
        self.require_admin()?;
        let target = self.resolve(name)?;
        self.backends.exposure.add_target(&target)?;
        Ok(true)
    }

    fn umount_image(&self, name: &str) -> Result<bool, BmiError> {
        self.require_admin()?;
        let target = self.resolve(name)?;
        self.backends.exposure.remove_target(&target)?;
        Ok(true)
    }

    fn show_mounted(&self) -> Result<BTreeMap<String, TargetInfo>, BmiError> {
        self.require_admin()?;

        let store = &self.backends.store;
        let mut mounted = BTreeMap::new();
        for (target, info) in self.backends.exposure.list_targets()? {
            let derived = match StorageName::parse(&target) {
                Ok(derived) => derived,
                Err(e) if e.is_foreign_name() => {
                    debug!(target_name = %target, "Skipping target without a derived name");
                    continue;
                }
                Err(e) => {
                    debug!(target_name = %target, error = %e, "Skipping malformed target name");
                    continue;
                }
            };
            if derived.uid() != self.ctx.settings.uid {
                debug!(
                    target_name = %target,
                    uid = derived.uid(),
                    "Skipping target of another deployment"
                );
                continue;
            }
            let id = derived.image_id();
            if store.find_project_of_image(id)? != Some(self.project_id()) {
                continue;
            }
            if let Some(name) = store.find_name_of_image(id)? {
                mounted.insert(name, info);
            }
        }
        Ok(mounted)
    }
}

impl Orchestrator {
    /// Insert an image row. Admin only, no storage side effects.
    pub fn add_image(&self, spec: &ImageSpec) -> Response<bool> {
        self.run("add_image", |s| s.add_image(spec))
    }

    /// Delete an image row. Admin only, no storage side effects.
    pub fn delete_image(&self, project: &str, name: &str) -> Response<bool> {
        self.run("delete_image", |s| s.delete_image(project, name))
    }

    pub fn add_project(&self, name: &str, id: Option<ProjectId>) -> Response<bool> {
        self.run("add_project", |s| s.add_project(name, id))
    }

    pub fn delete_project(&self, name: &str) -> Response<bool> {
        self.run("delete_project", |s| s.delete_project(name))
    }

    pub fn list_projects(&self) -> Response<Vec<ProjectRecord>> {
        self.run("list_projects", |s| s.list_projects())
    }

    /// Expose an existing image as a target, outside the disk lifecycle.
    pub fn mount_image(&self, name: &str) -> Response<bool> {
        self.run("mount_image", |s| s.mount_image(name))
    }

    pub fn umount_image(&self, name: &str) -> Response<bool> {
        self.run("umount_image", |s| s.umount_image(name))
    }

    /// Targets backed by images of the caller's project, keyed by image name.
    pub fn show_mounted(&self) -> Response<BTreeMap<String, TargetInfo>> {
        self.run("show_mounted", |s| s.show_mounted())
    }

    /// Rebuild the target table from persisted configuration.
    ///
    /// Runs outside any request, so failures are logged and not returned.
    pub fn remake_mappings(&self) {
        let Some(backends) = self.backends.as_ref() else {
            return;
        };
        match backends.exposure.persist_targets() {
            Ok(()) => info!("Target mappings restored"),
            Err(e) => error!(error = %e, "Failed to restore target mappings"),
        }
    }
}
