//! Shared fixtures for orchestrator integration tests.

#![allow(dead_code)]

use bmi_einstein::authz::{AdminUsers, Identity};
use bmi_einstein::db::{MetadataStore, NewImage, SqliteStore};
use bmi_einstein::mock::{MockCluster, MockDeployment};
use bmi_einstein::state::AppState;
use bmi_einstein::{Orchestrator, Settings};
use bmi_id::{ImageId, ProjectId};
use tempfile::TempDir;

pub const UID: u32 = 4;
pub const ADMIN_USER: &str = "root";
pub const TENANT_USER: &str = "alice";

/// A mock deployment with projects `bmi_admin`, `tenantA` and `tenantB`.
///
/// `root` is an admin in every project; `alice` is not.
pub struct Harness {
    pub dir: TempDir,
    pub deployment: MockDeployment,
    pub policy: AdminUsers,
    pub settings: Settings,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let deployment = MockDeployment::new(MockCluster::new(), dir.path().join("bmi.db"));
        let settings = Settings {
            uid: UID,
            ..Settings::default()
        };

        let harness = Self {
            dir,
            deployment,
            policy: AdminUsers::new([ADMIN_USER]),
            settings,
        };
        let store = harness.store();
        for project in ["bmi_admin", "tenantA", "tenantB"] {
            store.insert_project(project, None).unwrap();
        }
        harness
    }

    pub fn cluster(&self) -> &MockCluster {
        self.deployment.cluster()
    }

    pub fn store(&self) -> SqliteStore {
        self.deployment.store().unwrap()
    }

    pub fn project_id(&self, name: &str) -> ProjectId {
        self.store().find_project_id(name).unwrap().unwrap()
    }

    fn open_as(&self, username: &str, project: &str) -> Orchestrator {
        Orchestrator::with_identity(
            &self.deployment,
            &self.policy,
            self.settings.clone(),
            Identity::new(username, "secret", project),
        )
        .unwrap()
    }

    /// A non-admin caller in `project`.
    pub fn tenant(&self, project: &str) -> Orchestrator {
        self.open_as(TENANT_USER, project)
    }

    /// An admin caller in `project`.
    pub fn admin(&self, project: &str) -> Orchestrator {
        self.open_as(ADMIN_USER, project)
    }

    /// Insert a golden image row with a fixed id and create its storage
    /// object with a protected clone snapshot.
    pub fn seed_golden(&self, project: &str, name: &str, id: i64) -> String {
        let pid = self.project_id(project);
        self.store()
            .insert_image(&NewImage::root(name, pid).with_id(Some(ImageId::new(id))))
            .unwrap();
        let storage_name = format!("{UID}img{id}");
        self.cluster()
            .add_clone_source(&storage_name, &self.settings.snapshot);
        storage_name
    }

    /// Make the next store-assigned image id `next`.
    pub fn skip_ids_to(&self, next: i64) {
        let store = self.store();
        let pid = self.project_id("bmi_admin");
        store
            .insert_image(&NewImage::root("placeholder", pid).with_id(Some(ImageId::new(next - 1))))
            .unwrap();
        store.delete_image("placeholder", pid).unwrap();
    }

    /// `tenantA` with `ubuntu` as image 7 and the next id at 12.
    pub fn scenario() -> Self {
        let harness = Self::new();
        harness.seed_golden("tenantA", "ubuntu", 7);
        harness.skip_ids_to(12);
        harness
    }

    /// App state over the same cluster and database file.
    pub fn app_state(&self) -> AppState {
        let deployment = MockDeployment::new(self.cluster().clone(), self.dir.path().join("bmi.db"));
        AppState::new(
            Box::new(deployment),
            Box::new(self.policy.clone()),
            self.settings.clone(),
        )
    }
}

/// Whether any recorded call went to the storage backend.
pub fn touched_storage(calls: &[String]) -> bool {
    calls.iter().any(|call| call.starts_with("storage."))
}

/// Whether any recorded call reached a collaborator other than the store.
pub fn touched_backends(calls: &[String]) -> bool {
    calls.iter().any(|call| !call.starts_with("provider."))
}
