//! In-memory collaborators for tests and development.
//!
//! A [`MockCluster`] holds the state of a fake Ceph pool, tgt daemon, HIL
//! fabric, TFTP tree and lease table. Every collaborator handed out by
//! [`MockDeployment`] shares it, so tests can inspect what an invocation did
//! after the orchestrator is closed. Named faults make a collaborator call
//! fail on demand.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::authz::Identity;
use crate::backends::{BackendProvider, Backends};
use crate::db::SqliteStore;
use crate::dhcp::DhcpLookup;
use crate::error::BmiError;
use crate::hil::{IsolationError, NetworkIsolation, Nic, NodeInfo};
use crate::iscsi::{ExposureError, ExposureLayer, TargetInfo};
use crate::registration::BootRegistration;
use crate::storage::{StorageBackend, StorageError, StorageErrorKind};

const INJECTED: &str = "injected fault";

/// Boot files written for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootRecord {
    pub image_name: String,
    pub target_name: String,
    pub mac: String,
}

#[derive(Default)]
struct ClusterState {
    images: BTreeSet<String>,
    /// `img@label` to protected flag.
    snapshots: BTreeMap<String, bool>,
    /// Unflattened clone to `img@label` it was cloned from.
    parents: BTreeMap<String, String>,
    targets: BTreeMap<String, TargetInfo>,
    next_tid: u32,
    nodes: BTreeMap<String, NodeInfo>,
    attached: BTreeMap<String, String>,
    denied_projects: BTreeSet<String>,
    boot_files: BTreeMap<String, BootRecord>,
    leases: BTreeMap<String, String>,
    faults: BTreeSet<String>,
    calls: Vec<String>,
    persists: usize,
    acquires: usize,
    releases: usize,
}

impl ClusterState {
    /// Record a call, failing if a fault is set for it.
    fn call(&mut self, op: &str, detail: String) -> Result<(), ()> {
        self.calls.push(format!("{op} {detail}"));
        if self.faults.contains(op) {
            Err(())
        } else {
            Ok(())
        }
    }
}

fn snap_key(img: &str, label: &str) -> String {
    format!("{img}@{label}")
}

/// Shared state of the fake infrastructure.
#[derive(Clone, Default)]
pub struct MockCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every call named `op` fail, e.g. `"storage.clone"`.
    pub fn fail(&self, op: &str) {
        self.lock().faults.insert(op.to_string());
    }

    pub fn heal(&self, op: &str) {
        self.lock().faults.remove(op);
    }

    /// Add a storage image created outside BMI.
    pub fn add_image(&self, name: &str) {
        self.lock().images.insert(name.to_string());
    }

    /// Add a storage image with a protected snapshot `label`.
    pub fn add_clone_source(&self, name: &str, label: &str) {
        let mut state = self.lock();
        state.images.insert(name.to_string());
        state.snapshots.insert(snap_key(name, label), true);
    }

    /// Add an unprotected snapshot to an existing image.
    pub fn add_snapshot(&self, img: &str, label: &str) {
        self.lock().snapshots.insert(snap_key(img, label), false);
    }

    /// Add a target directly, bypassing the orchestrator.
    pub fn add_target(&self, name: &str) {
        let mut state = self.lock();
        state.next_tid += 1;
        let info = TargetInfo {
            tid: Some(state.next_tid),
            backing_store: Some(format!("bmi/{name}")),
        };
        state.targets.insert(name.to_string(), info);
    }

    pub fn add_node(&self, node: &str, nics: &[(&str, &str)]) {
        let info = NodeInfo {
            nics: nics
                .iter()
                .map(|(label, mac)| Nic {
                    label: label.to_string(),
                    macaddr: mac.to_string(),
                })
                .collect(),
        };
        self.lock().nodes.insert(node.to_string(), info);
    }

    /// Make the fabric reject `project`.
    pub fn deny_project(&self, project: &str) {
        self.lock().denied_projects.insert(project.to_string());
    }

    pub fn add_lease(&self, mac: &str, ip: &str) {
        self.lock()
            .leases
            .insert(mac.to_ascii_lowercase(), ip.to_string());
    }

    pub fn images(&self) -> BTreeSet<String> {
        self.lock().images.clone()
    }

    pub fn has_image(&self, name: &str) -> bool {
        self.lock().images.contains(name)
    }

    /// `Some(protected)` if the snapshot exists.
    pub fn snapshot(&self, img: &str, label: &str) -> Option<bool> {
        self.lock().snapshots.get(&snap_key(img, label)).copied()
    }

    /// Whether `img` is still a clone of some snapshot.
    pub fn is_cloned(&self, img: &str) -> bool {
        self.lock().parents.contains_key(img)
    }

    pub fn targets(&self) -> BTreeMap<String, TargetInfo> {
        self.lock().targets.clone()
    }

    pub fn attached(&self) -> BTreeMap<String, String> {
        self.lock().attached.clone()
    }

    pub fn boot_record(&self, node: &str) -> Option<BootRecord> {
        self.lock().boot_files.get(node).cloned()
    }

    /// Every collaborator call so far, as `"op detail"`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn persist_count(&self) -> usize {
        self.lock().persists
    }

    pub fn acquires(&self) -> usize {
        self.lock().acquires
    }

    pub fn releases(&self) -> usize {
        self.lock().releases
    }
}

/// Fake RBD pool.
pub struct MockStorage {
    cluster: MockCluster,
}

impl MockStorage {
    fn call(&self, op: &str, img: &str, detail: String) -> Result<MutexGuard<'_, ClusterState>, StorageError> {
        let mut state = self.cluster.lock();
        state
            .call(op, detail)
            .map_err(|()| StorageError::for_name(img, StorageErrorKind::Failed(INJECTED.to_string())))?;
        Ok(state)
    }
}

fn missing(name: &str) -> StorageError {
    StorageError::for_name(name, StorageErrorKind::NotFound)
}

impl StorageBackend for MockStorage {
    fn clone_image(&self, src: &str, snapshot: &str, dst: &str) -> Result<(), StorageError> {
        let key = snap_key(src, snapshot);
        let mut state = self.call("storage.clone", dst, format!("{key} {dst}"))?;
        if state.snapshots.get(&key) != Some(&true) {
            return Err(missing(src));
        }
        if state.images.contains(dst) {
            return Err(StorageError::for_name(dst, StorageErrorKind::Exists));
        }
        state.images.insert(dst.to_string());
        state.parents.insert(dst.to_string(), key);
        Ok(())
    }

    fn snapshot(&self, img: &str, label: &str) -> Result<(), StorageError> {
        let key = snap_key(img, label);
        let mut state = self.call("storage.snapshot", img, key.clone())?;
        if !state.images.contains(img) {
            return Err(missing(img));
        }
        if state.snapshots.contains_key(&key) {
            return Err(StorageError::for_name(img, StorageErrorKind::Exists));
        }
        state.snapshots.insert(key, false);
        Ok(())
    }

    fn protect_snapshot(&self, img: &str, label: &str) -> Result<(), StorageError> {
        let key = snap_key(img, label);
        let mut state = self.call("storage.protect", img, key.clone())?;
        match state.snapshots.get_mut(&key) {
            Some(protected) => {
                *protected = true;
                Ok(())
            }
            None => Err(missing(img)),
        }
    }

    fn unprotect_snapshot(&self, img: &str, label: &str) -> Result<(), StorageError> {
        let key = snap_key(img, label);
        let mut state = self.call("storage.unprotect", img, key.clone())?;
        if state.parents.values().any(|parent| *parent == key) {
            return Err(StorageError::for_name(img, StorageErrorKind::Busy));
        }
        match state.snapshots.get_mut(&key) {
            Some(protected) => {
                *protected = false;
                Ok(())
            }
            None => Err(missing(img)),
        }
    }

    fn remove_snapshot(&self, img: &str, label: &str) -> Result<(), StorageError> {
        let key = snap_key(img, label);
        let mut state = self.call("storage.remove_snapshot", img, key.clone())?;
        match state.snapshots.get(&key) {
            None => Err(missing(img)),
            Some(true) => Err(StorageError::for_name(img, StorageErrorKind::Busy)),
            Some(false) => {
                state.snapshots.remove(&key);
                Ok(())
            }
        }
    }

    fn remove(&self, img: &str) -> Result<(), StorageError> {
        let mut state = self.call("storage.remove", img, img.to_string())?;
        if !state.images.contains(img) {
            return Err(missing(img));
        }
        let prefix = format!("{img}@");
        if state.snapshots.keys().any(|key| key.starts_with(&prefix)) {
            return Err(StorageError::for_name(img, StorageErrorKind::Busy));
        }
        state.images.remove(img);
        state.parents.remove(img);
        Ok(())
    }

    fn flatten(&self, img: &str) -> Result<(), StorageError> {
        let mut state = self.call("storage.flatten", img, img.to_string())?;
        if !state.images.contains(img) {
            return Err(missing(img));
        }
        state.parents.remove(img);
        Ok(())
    }

    fn tear_down(&mut self) {
        self.cluster.lock().releases += 1;
    }
}

/// Fake tgt daemon.
pub struct MockExposure {
    cluster: MockCluster,
}

impl MockExposure {
    fn call(&self, op: &str, target: &str) -> Result<MutexGuard<'_, ClusterState>, ExposureError> {
        let mut state = self.cluster.lock();
        state
            .call(op, target.to_string())
            .map_err(|()| ExposureError::CommandFailed {
                target: target.to_string(),
                reason: INJECTED.to_string(),
            })?;
        Ok(state)
    }
}

impl ExposureLayer for MockExposure {
    fn add_target(&self, name: &str) -> Result<(), ExposureError> {
        let mut state = self.call("exposure.add_target", name)?;
        if state.targets.contains_key(name) {
            return Err(ExposureError::TargetExists(name.to_string()));
        }
        state.next_tid += 1;
        let info = TargetInfo {
            tid: Some(state.next_tid),
            backing_store: Some(format!("bmi/{name}")),
        };
        state.targets.insert(name.to_string(), info);
        Ok(())
    }

    fn remove_target(&self, name: &str) -> Result<(), ExposureError> {
        let mut state = self.call("exposure.remove_target", name)?;
        state
            .targets
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ExposureError::TargetNotFound(name.to_string()))
    }

    fn list_targets(&self) -> Result<BTreeMap<String, TargetInfo>, ExposureError> {
        let state = self.call("exposure.list_targets", "*")?;
        Ok(state.targets.clone())
    }

    fn persist_targets(&self) -> Result<(), ExposureError> {
        let mut state = self.call("exposure.persist_targets", "*")?;
        state.persists += 1;
        Ok(())
    }
}

/// Fake HIL fabric.
pub struct MockIsolation {
    cluster: MockCluster,
}

impl MockIsolation {
    fn call(&self, op: &str, detail: String) -> Result<MutexGuard<'_, ClusterState>, IsolationError> {
        let mut state = self.cluster.lock();
        state.call(op, detail).map_err(|()| IsolationError::Unknown {
            status: 500,
            message: INJECTED.to_string(),
        })?;
        Ok(state)
    }
}

impl NetworkIsolation for MockIsolation {
    fn node_mac_addr(&self, node: &str, nic: &str) -> Result<String, IsolationError> {
        let state = self.call("isolation.node_mac_addr", format!("{node} {nic}"))?;
        let info = state.nodes.get(node).ok_or_else(|| IsolationError::Unknown {
            status: 404,
            message: format!("Node {node} does not exist"),
        })?;
        info.mac_for(nic)
            .map(str::to_string)
            .ok_or_else(|| IsolationError::NicNotFound {
                node: node.to_string(),
                nic: nic.to_string(),
            })
    }

    fn validate_project(&self, project: &str) -> Result<(), IsolationError> {
        let state = self.call("isolation.validate_project", project.to_string())?;
        if state.denied_projects.contains(project) {
            return Err(IsolationError::AuthorizationFailed);
        }
        Ok(())
    }

    fn attach_node(&self, project: &str, node: &str) -> Result<(), IsolationError> {
        let mut state = self.call("isolation.attach_node", format!("{project} {node}"))?;
        if !state.nodes.contains_key(node) {
            return Err(IsolationError::Unknown {
                status: 404,
                message: format!("Node {node} does not exist"),
            });
        }
        if state.attached.contains_key(node) {
            return Err(IsolationError::Unknown {
                status: 409,
                message: format!("Node {node} is already owned by a project"),
            });
        }
        state.attached.insert(node.to_string(), project.to_string());
        Ok(())
    }

    fn detach_node(&self, project: &str, node: &str) -> Result<(), IsolationError> {
        let mut state = self.call("isolation.detach_node", format!("{project} {node}"))?;
        match state.attached.get(node) {
            Some(owner) if owner == project => {
                state.attached.remove(node);
                Ok(())
            }
            _ => Err(IsolationError::Unknown {
                status: 409,
                message: format!("Node {node} is not attached to {project}"),
            }),
        }
    }

    fn list_free_nodes(&self) -> Result<Vec<String>, IsolationError> {
        let state = self.call("isolation.list_free_nodes", String::new())?;
        Ok(state
            .nodes
            .keys()
            .filter(|node| !state.attached.contains_key(*node))
            .cloned()
            .collect())
    }

    fn project_nodes(&self, project: &str) -> Result<Vec<String>, IsolationError> {
        let state = self.call("isolation.project_nodes", project.to_string())?;
        Ok(state
            .attached
            .iter()
            .filter(|(_, owner)| *owner == project)
            .map(|(node, _)| node.clone())
            .collect())
    }
}

/// Fake TFTP tree.
pub struct MockRegistration {
    cluster: MockCluster,
}

impl BootRegistration for MockRegistration {
    fn register(
        &self,
        node: &str,
        image_name: &str,
        target_name: &str,
        mac: &str,
    ) -> Result<(), BmiError> {
        let mut state = self.cluster.lock();
        state
            .call("registration.register", format!("{node} {target_name} {mac}"))
            .map_err(|()| BmiError::Registration {
                node: node.to_string(),
                reason: INJECTED.to_string(),
            })?;
        state.boot_files.insert(
            node.to_string(),
            BootRecord {
                image_name: image_name.to_string(),
                target_name: target_name.to_string(),
                mac: mac.to_string(),
            },
        );
        Ok(())
    }

    fn unregister(&self, node: &str, mac: &str) -> Result<(), BmiError> {
        let mut state = self.cluster.lock();
        state
            .call("registration.unregister", format!("{node} {mac}"))
            .map_err(|()| BmiError::Registration {
                node: node.to_string(),
                reason: INJECTED.to_string(),
            })?;
        state.boot_files.remove(node);
        Ok(())
    }
}

/// Fake lease table.
pub struct MockDhcp {
    cluster: MockCluster,
}

impl DhcpLookup for MockDhcp {
    fn ip_for(&self, mac: &str) -> Result<String, BmiError> {
        let mut state = self.cluster.lock();
        state
            .call("dhcp.ip_for", mac.to_string())
            .map_err(|()| BmiError::Dhcp(INJECTED.to_string()))?;
        state
            .leases
            .get(&mac.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| BmiError::Dhcp(format!("no lease for {mac}")))
    }
}

/// Provider handing out mock collaborators over a real SQLite file.
pub struct MockDeployment {
    cluster: MockCluster,
    db_path: PathBuf,
}

impl MockDeployment {
    pub fn new(cluster: MockCluster, db_path: impl Into<PathBuf>) -> Self {
        Self {
            cluster,
            db_path: db_path.into(),
        }
    }

    pub fn cluster(&self) -> &MockCluster {
        &self.cluster
    }

    /// Open the metadata store directly, for seeding and inspection.
    pub fn store(&self) -> Result<SqliteStore, BmiError> {
        Ok(SqliteStore::open(&self.db_path)?)
    }
}

impl BackendProvider for MockDeployment {
    fn acquire(&self, _identity: &Identity) -> Result<Backends, BmiError> {
        {
            let mut state = self.cluster.lock();
            state
                .call("provider.acquire", String::new())
                .map_err(|()| BmiError::Unknown {
                    status: 500,
                    message: INJECTED.to_string(),
                })?;
            state.acquires += 1;
        }

        let store = SqliteStore::open(&self.db_path)?;
        let cluster = || self.cluster.clone();
        Ok(Backends {
            store: Box::new(store),
            storage: Box::new(MockStorage { cluster: cluster() }),
            exposure: Box::new(MockExposure { cluster: cluster() }),
            isolation: Box::new(MockIsolation { cluster: cluster() }),
            registration: Box::new(MockRegistration { cluster: cluster() }),
            dhcp: Box::new(MockDhcp { cluster: cluster() }),
        })
    }
}
