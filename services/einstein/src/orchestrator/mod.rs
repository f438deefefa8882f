//! Disk image orchestrator.
//!
//! An [`Orchestrator`] is opened per invocation with a resolved caller. It
//! sequences calls across the metadata store, storage backend, exposure
//! layer, network isolator and boot registration, and reports every
//! outcome as a [`Response`]. It caches nothing between calls.
//!
//! Backends are acquired in [`Orchestrator::open`] and released exactly
//! once, by [`Orchestrator::close`] or on drop.

mod admin;
mod disks;
mod images;
mod nodes;

use bmi_id::{ImageId, ProjectId, StorageName};
use tracing::{error, info, warn};

use crate::authz::{AuthorizationPolicy, Credentials, Identity};
use crate::backends::{BackendProvider, Backends};
use crate::config::BmiSection;
use crate::error::BmiError;
use crate::response::Response;

pub use admin::ImageSpec;
pub use images::ImageListing;

/// Deployment-wide orchestrator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Prefix of every derived storage name.
    pub uid: u32,
    /// Label of the protected snapshot every clone source carries.
    pub snapshot: String,
    pub admin_project: String,
    /// NIC label used to resolve a node's DHCP lease.
    pub dhcp_nic: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from(&BmiSection::default())
    }
}

impl From<&BmiSection> for Settings {
    fn from(section: &BmiSection) -> Self {
        Self {
            uid: section.uid,
            snapshot: section.snapshot.clone(),
            admin_project: section.admin_project.clone(),
            dhcp_nic: section.dhcp_nic.clone(),
        }
    }
}

/// What one invocation knows about its caller.
struct Context {
    identity: Identity,
    project_id: ProjectId,
    is_admin: bool,
    settings: Settings,
}

/// One invocation's view of the backends.
struct Session<'a> {
    ctx: &'a Context,
    backends: &'a Backends,
}

impl Session<'_> {
    fn project(&self) -> &str {
        &self.ctx.identity.project
    }

    fn project_id(&self) -> ProjectId {
        self.ctx.project_id
    }

    fn snapshot(&self) -> &str {
        &self.ctx.settings.snapshot
    }

    fn storage_name(&self, id: ImageId) -> String {
        StorageName::derive(self.ctx.settings.uid, id).to_string()
    }

    fn require_admin(&self) -> Result<(), BmiError> {
        if self.ctx.is_admin {
            Ok(())
        } else {
            Err(BmiError::AuthorizationFailed)
        }
    }

    /// Admins may target any project; others only their own.
    fn require_admin_or_own(&self, project: &str) -> Result<(), BmiError> {
        if self.ctx.is_admin || project == self.project() {
            Ok(())
        } else {
            Err(BmiError::AuthorizationFailed)
        }
    }

    /// Check that the network isolator knows the caller's project.
    fn validate_project(&self) -> Result<(), BmiError> {
        self.backends.isolation.validate_project(self.project())?;
        Ok(())
    }

    fn find_project(&self, name: &str) -> Result<ProjectId, BmiError> {
        self.backends
            .store
            .find_project_id(name)?
            .ok_or_else(|| BmiError::ProjectNotFound(name.to_string()))
    }

    fn find_image_in(&self, name: &str, project_id: ProjectId) -> Result<ImageId, BmiError> {
        self.backends
            .store
            .find_image_id(name, project_id)?
            .ok_or_else(|| BmiError::ImageNotFound(name.to_string()))
    }

    fn find_image(&self, name: &str) -> Result<ImageId, BmiError> {
        self.find_image_in(name, self.project_id())
    }

    /// Derived storage name of an image in the caller's project.
    fn resolve(&self, name: &str) -> Result<String, BmiError> {
        self.find_image(name).map(|id| self.storage_name(id))
    }

    /// Best-effort removal of a row written earlier in a failed operation.
    fn discard_row(&self, name: &str) {
        if let Err(e) = self.backends.store.delete_image(name, self.project_id()) {
            warn!(image = %name, error = %e, "Failed to remove image row during rollback");
        }
    }
}

/// A request-scoped orchestrator.
pub struct Orchestrator {
    ctx: Context,
    backends: Option<Backends>,
}

impl Orchestrator {
    /// Open an orchestrator for a client's credentials.
    pub fn open(
        provider: &dyn BackendProvider,
        policy: &dyn AuthorizationPolicy,
        settings: Settings,
        credentials: &Credentials,
    ) -> Result<Self, BmiError> {
        let identity = Identity::from_credentials(credentials)?;
        Self::with_identity(provider, policy, settings, identity)
    }

    /// Open an orchestrator as the service itself, in the admin project.
    pub fn bootstrap(
        provider: &dyn BackendProvider,
        policy: &dyn AuthorizationPolicy,
        settings: Settings,
    ) -> Result<Self, BmiError> {
        let identity = Identity::bootstrap(settings.admin_project.clone());
        Self::with_identity(provider, policy, settings, identity)
    }

    /// Open an orchestrator for an already decoded identity.
    pub fn with_identity(
        provider: &dyn BackendProvider,
        policy: &dyn AuthorizationPolicy,
        settings: Settings,
        identity: Identity,
    ) -> Result<Self, BmiError> {
        let backends = provider.acquire(&identity)?;

        let project_id = match backends.store.find_project_id(&identity.project) {
            Ok(Some(id)) => id,
            Ok(None) => {
                info!(project = %identity.project, "Project does not exist");
                let project = identity.project.clone();
                backends.release();
                return Err(BmiError::ProjectNotFound(project));
            }
            Err(e) => {
                backends.release();
                return Err(e.into());
            }
        };

        let is_admin = policy.is_admin(&identity);
        Ok(Self {
            ctx: Context {
                identity,
                project_id,
                is_admin,
                settings,
            },
            backends: Some(backends),
        })
    }

    pub fn project(&self) -> &str {
        &self.ctx.identity.project
    }

    pub fn is_admin(&self) -> bool {
        self.ctx.is_admin
    }

    /// Release the backends.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(backends) = self.backends.take() {
            backends.release();
        }
    }

    /// Run one operation and wrap its outcome in the envelope.
    fn run<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&Session<'_>) -> Result<T, BmiError>,
    ) -> Response<T> {
        let Some(backends) = self.backends.as_ref() else {
            return Response::failure(500, "Orchestrator is closed");
        };

        let session = Session {
            ctx: &self.ctx,
            backends,
        };
        match f(&session) {
            Ok(value) => {
                info!(operation, project = %self.ctx.identity.project, "Operation succeeded");
                Response::success(value)
            }
            Err(e) => {
                error!(
                    operation,
                    project = %self.ctx.identity.project,
                    reason = e.reason_code(),
                    error = %e,
                    "Operation failed"
                );
                Response::from_error(&e, backends.store.as_ref())
            }
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.release();
    }
}
