//! Per-invocation collaborator handles.
//!
//! A [`BackendProvider`] builds a fresh [`Backends`] for every orchestrator
//! invocation. Handles are never shared between invocations.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::authz::Identity;
use crate::config::Config;
use crate::db::{MetadataStore, SqliteStore};
use crate::dhcp::{DhcpLookup, DnsmasqLeases};
use crate::error::BmiError;
use crate::hil::{HilClient, NetworkIsolation};
use crate::iscsi::{ExposureLayer, TgtConfig, TgtExposure};
use crate::registration::{BootRegistration, PxeConfig, PxeRegistrar};
use crate::storage::{RbdConfig, RbdStorage, StorageBackend};

/// The collaborators one invocation works against.
pub struct Backends {
    pub store: Box<dyn MetadataStore>,
    pub storage: Box<dyn StorageBackend>,
    pub exposure: Box<dyn ExposureLayer>,
    pub isolation: Box<dyn NetworkIsolation>,
    pub registration: Box<dyn BootRegistration>,
    pub dhcp: Box<dyn DhcpLookup>,
}

impl Backends {
    /// Tear down storage and close the store.
    pub fn release(self) {
        let Backends {
            store, mut storage, ..
        } = self;
        storage.tear_down();
        if let Err(e) = store.close() {
            warn!(error = %e, "Failed to close metadata store");
        }
    }
}

/// Builds backends for an identity.
pub trait BackendProvider: Send + Sync {
    fn acquire(&self, identity: &Identity) -> Result<Backends, BmiError>;
}

/// Production provider: SQLite, RBD, tgt, HIL, PXE files and dnsmasq.
pub struct Deployment {
    config: Config,
    pxe: PxeConfig,
}

impl Deployment {
    /// Build a provider from configuration, loading template overrides.
    pub fn new(config: Config) -> Result<Self> {
        let mut pxe = PxeConfig::new(
            config.tftp.ipxe_path.clone(),
            config.tftp.pxelinux_path.clone(),
            config.iscsi.ip.clone(),
        );
        if let Some(path) = &config.tftp.ipxe_template {
            pxe.ipxe_template = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read iPXE template {}", path.display()))?;
        }
        if let Some(path) = &config.tftp.mac_template {
            pxe.mac_template = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read MAC template {}", path.display()))?;
        }

        let store = SqliteStore::open(&config.db.path).with_context(|| {
            format!("Failed to open metadata store {}", config.db.path.display())
        })?;
        let admin_id = store
            .ensure_project(&config.bmi.admin_project)
            .context("Failed to seed the admin project")?;
        Box::new(store)
            .close()
            .context("Failed to close metadata store")?;
        info!(
            project = %config.bmi.admin_project,
            project_id = %admin_id,
            "Admin project ready"
        );

        Ok(Self { config, pxe })
    }

    fn rbd_config(&self) -> RbdConfig {
        RbdConfig {
            binary: self.config.fs.rbd_binary.clone(),
            conf_file: self.config.fs.conf_file.clone(),
            id: self.config.fs.id.clone(),
            pool: self.config.fs.pool.clone(),
        }
    }

    fn tgt_config(&self) -> TgtConfig {
        TgtConfig {
            binary: self.config.iscsi.tgt_admin_binary.clone(),
            conf_dir: self.config.iscsi.conf_dir.clone(),
            pool: self.config.fs.pool.clone(),
            ceph_conf: self.config.fs.conf_file.clone(),
            ceph_id: self.config.fs.id.clone(),
            chap_password: self.config.iscsi.password.clone(),
        }
    }
}

impl BackendProvider for Deployment {
    fn acquire(&self, identity: &Identity) -> Result<Backends, BmiError> {
        let store = SqliteStore::open(&self.config.db.path)?;
        let isolation = HilClient::new(
            &self.config.net_isolator.url,
            &identity.username,
            &identity.password,
            self.config.net_isolator.timeout(),
        )?;

        Ok(Backends {
            store: Box::new(store),
            storage: Box::new(RbdStorage::new(self.rbd_config())),
            exposure: Box::new(TgtExposure::new(self.tgt_config())),
            isolation: Box::new(isolation),
            registration: Box::new(PxeRegistrar::new(self.pxe.clone())),
            dhcp: Box::new(DnsmasqLeases::new(self.config.dhcp.leases_file.clone())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{AdminProject, Credentials};
    use crate::orchestrator::{Orchestrator, Settings};
    use crate::response::Response;

    #[test]
    fn test_acquire_opens_configured_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.db.path = dir.path().join("bmi.db");

        let deployment = Deployment::new(config).unwrap();
        let backends = deployment
            .acquire(&Identity::new("alice", "pw", "tenantA"))
            .unwrap();
        backends.store.insert_project("tenantA", None).unwrap();
        backends.release();

        assert!(dir.path().join("bmi.db").exists());
    }

    #[test]
    fn test_fresh_store_can_be_administered() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.db.path = dir.path().join("bmi.db");
        let settings = Settings::from(&config.bmi);
        let policy = AdminProject::new(config.bmi.admin_project.clone());

        let deployment = Deployment::new(config.clone()).unwrap();
        let orch = Orchestrator::bootstrap(&deployment, &policy, settings.clone()).unwrap();
        assert!(orch.is_admin());
        assert_eq!(orch.add_project("tenantA", None), Response::success(true));
        orch.close();

        // Seeding again is a no-op.
        Deployment::new(config).unwrap();
        let credentials = Credentials::new("alice", "pw", "bmi_admin");
        let orch = Orchestrator::open(&deployment, &policy, settings, &credentials).unwrap();
        let projects = orch.list_projects().into_value().unwrap();
        let names: Vec<&str> = projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["bmi_admin", "tenantA"]);
    }

    #[test]
    fn test_unwritable_store_fails_startup() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.db.path = dir.path().join("absent").join("bmi.db");
        assert!(Deployment::new(config).is_err());
    }

    #[test]
    fn test_missing_template_fails_startup() {
        let mut config = Config::default();
        config.tftp.ipxe_template = Some("/nonexistent/ipxe.temp".into());
        assert!(Deployment::new(config).is_err());
    }

    #[test]
    fn test_template_override_is_loaded() {
        let dir = tempfile::TempDir::new().unwrap();
        let template = dir.path().join("mac.temp");
        std::fs::write(&template, "LABEL ${img_name}\n").unwrap();

        let mut config = Config::default();
        config.db.path = dir.path().join("bmi.db");
        config.tftp.mac_template = Some(template);
        let deployment = Deployment::new(config).unwrap();
        assert_eq!(deployment.pxe.mac_template, "LABEL ${img_name}\n");
    }
}
