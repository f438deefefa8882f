//! Linux SCSI target (tgt) exposure.
//!
//! Each target is persisted as `{conf_dir}/{name}.conf` so `tgt-admin
//! --execute` can rebuild the whole table after a restart.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, info, warn};

use super::{ExposureError, ExposureLayer, TargetInfo};

/// tgt settings.
#[derive(Debug, Clone)]
pub struct TgtConfig {
    /// Path to the `tgt-admin` binary.
    pub binary: String,
    /// Directory holding one config file per target.
    pub conf_dir: PathBuf,
    /// Ceph pool the backing stores live in.
    pub pool: String,
    /// Ceph configuration file passed to the rbd backing store.
    pub ceph_conf: PathBuf,
    /// Ceph client id passed to the rbd backing store.
    pub ceph_id: String,
    /// CHAP secret required from initiators, if any.
    pub chap_password: Option<String>,
}

impl Default for TgtConfig {
    fn default() -> Self {
        Self {
            binary: "tgt-admin".to_string(),
            conf_dir: PathBuf::from("/etc/tgt/conf.d"),
            pool: "bmi".to_string(),
            ceph_conf: PathBuf::from("/etc/ceph/ceph.conf"),
            ceph_id: "admin".to_string(),
            chap_password: None,
        }
    }
}

/// tgt-backed exposure layer.
pub struct TgtExposure {
    config: TgtConfig,
}

impl TgtExposure {
    pub fn new(config: TgtConfig) -> Self {
        Self { config }
    }

    fn conf_path(&self, name: &str) -> PathBuf {
        self.config.conf_dir.join(format!("{name}.conf"))
    }

    fn render_conf(&self, name: &str) -> String {
        let mut conf = format!(
            "<target {name}>\n    driver iscsi\n    bs-type rbd\n    backing-store {pool}/{name}\n    initiator-address ALL\n    bsopts \"conf={conf};id={id}\"\n",
            pool = self.config.pool,
            conf = self.config.ceph_conf.display(),
            id = self.config.ceph_id,
        );
        if let Some(password) = &self.config.chap_password {
            conf.push_str(&format!("    incominguser bmi {password}\n"));
        }
        conf.push_str("</target>\n");
        conf
    }

    fn run(&self, target: &str, args: &[&str]) -> Result<String, ExposureError> {
        debug!(args = %args.join(" "), "Running tgt-admin");

        let output = Command::new(&self.config.binary)
            .args(args)
            .output()
            .map_err(|e| ExposureError::CommandFailed {
                target: target.to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExposureError::CommandFailed {
                target: target.to_string(),
                reason: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ExposureLayer for TgtExposure {
    fn add_target(&self, name: &str) -> Result<(), ExposureError> {
        let path = self.conf_path(name);
        if path.exists() {
            return Err(ExposureError::TargetExists(name.to_string()));
        }

        fs::create_dir_all(&self.config.conf_dir)?;
        fs::write(&path, self.render_conf(name))?;

        if let Err(e) = self.run(name, &["--update", name]) {
            // A config file for a target that never came up would be
            // resurrected by the next persist_targets.
            if let Err(cleanup) = fs::remove_file(&path) {
                warn!(target_name = %name, error = %cleanup, "Failed to remove target config");
            }
            return Err(e);
        }

        info!(target_name = %name, "iSCSI target added");
        Ok(())
    }

    fn remove_target(&self, name: &str) -> Result<(), ExposureError> {
        let path = self.conf_path(name);
        if !path.exists() && !self.list_targets()?.contains_key(name) {
            return Err(ExposureError::TargetNotFound(name.to_string()));
        }

        self.run(name, &["-f", "--delete", name])?;

        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        info!(target_name = %name, "iSCSI target removed");
        Ok(())
    }

    fn list_targets(&self) -> Result<BTreeMap<String, TargetInfo>, ExposureError> {
        let stdout = self.run("*", &["-s"])?;
        Ok(parse_target_show(&stdout))
    }

    fn persist_targets(&self) -> Result<(), ExposureError> {
        self.run("*", &["--execute"])?;
        info!(conf_dir = %self.config.conf_dir.display(), "iSCSI targets reloaded");
        Ok(())
    }
}

/// Parse `tgt-admin -s` output into a target table.
pub fn parse_target_show(output: &str) -> BTreeMap<String, TargetInfo> {
    let mut targets = BTreeMap::new();
    let mut current: Option<String> = None;

    for line in output.lines() {
        let trimmed = line.trim();

        if let Some(rest) = trimmed.strip_prefix("Target ") {
            if let Some((tid, name)) = rest.split_once(": ") {
                let name = name.trim().to_string();
                targets.insert(
                    name.clone(),
                    TargetInfo {
                        tid: tid.trim().parse().ok(),
                        backing_store: None,
                    },
                );
                current = Some(name);
            }
            continue;
        }

        if let Some(path) = trimmed.strip_prefix("Backing store path:") {
            let path = path.trim();
            if path.is_empty() || path == "None" {
                continue;
            }
            if let Some(info) = current.as_ref().and_then(|name| targets.get_mut(name)) {
                info.backing_store = Some(path.to_string());
            }
        }
    }

    targets
}
