//! Configuration for the einstein service.
//!
//! Values come from an optional TOML file named by `BMI_CONFIG_FILE`, then
//! from `BMI_*` environment variables, which win over the file.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::authz::PolicyKind;

/// Orchestrator behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BmiSection {
    /// Deployment uid used as the prefix of every derived storage name.
    pub uid: u32,
    /// Snapshot label used for clone sources.
    pub snapshot: String,
    /// Run `remake_mappings` at startup.
    pub service: bool,
    pub admin_project: String,
    pub admin_users: Vec<String>,
    pub policy: PolicyKind,
    /// NIC label whose MAC is used for DHCP lookups.
    pub dhcp_nic: String,
}

impl Default for BmiSection {
    fn default() -> Self {
        Self {
            uid: 0,
            snapshot: "snapshot".to_string(),
            service: true,
            admin_project: "bmi_admin".to_string(),
            admin_users: Vec::new(),
            policy: PolicyKind::default(),
            dhcp_nic: "eth0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbSection {
    pub path: PathBuf,
}

impl Default for DbSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/bmi/bmi.db"),
        }
    }
}

/// Ceph cluster access.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FsSection {
    pub conf_file: PathBuf,
    pub id: String,
    pub pool: String,
    pub rbd_binary: String,
}

impl Default for FsSection {
    fn default() -> Self {
        Self {
            conf_file: PathBuf::from("/etc/ceph/ceph.conf"),
            id: "admin".to_string(),
            pool: "bmi".to_string(),
            rbd_binary: "rbd".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IscsiSection {
    /// Portal address written into iPXE scripts.
    pub ip: String,
    /// CHAP secret, if initiators must authenticate.
    pub password: Option<String>,
    pub conf_dir: PathBuf,
    pub tgt_admin_binary: String,
}

impl Default for IscsiSection {
    fn default() -> Self {
        Self {
            ip: "127.0.0.1".to_string(),
            password: None,
            conf_dir: PathBuf::from("/etc/tgt/conf.d"),
            tgt_admin_binary: "tgt-admin".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetIsolatorSection {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for NetIsolatorSection {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:7000".to_string(),
            timeout_secs: 30,
        }
    }
}

impl NetIsolatorSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// TFTP tree layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TftpSection {
    pub ipxe_path: PathBuf,
    pub pxelinux_path: PathBuf,
    /// Override for the built-in iPXE template.
    pub ipxe_template: Option<PathBuf>,
    /// Override for the built-in pxelinux template.
    pub mac_template: Option<PathBuf>,
}

impl Default for TftpSection {
    fn default() -> Self {
        Self {
            ipxe_path: PathBuf::from("/var/lib/tftpboot"),
            pxelinux_path: PathBuf::from("/var/lib/tftpboot/pxelinux.cfg"),
            ipxe_template: None,
            mac_template: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DhcpSection {
    pub leases_file: PathBuf,
}

impl Default for DhcpSection {
    fn default() -> Self {
        Self {
            leases_file: PathBuf::from("/var/lib/misc/dnsmasq.leases"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RpcSection {
    pub listen_addr: SocketAddr,
}

impl Default for RpcSection {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bmi: BmiSection,
    pub db: DbSection,
    pub fs: FsSection,
    pub iscsi: IscsiSection,
    pub net_isolator: NetIsolatorSection,
    pub tftp: TftpSection,
    pub dhcp: DhcpSection,
    pub rpc: RpcSection,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bmi: BmiSection::default(),
            db: DbSection::default(),
            fs: FsSection::default(),
            iscsi: IscsiSection::default(),
            net_isolator: NetIsolatorSection::default(),
            tftp: TftpSection::default(),
            dhcp: DhcpSection::default(),
            rpc: RpcSection::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the optional config file and environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration with `lookup` standing in for the environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match lookup("BMI_CONFIG_FILE") {
            Some(path) => {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file {path}"))?;
                Self::from_toml(&contents)
                    .with_context(|| format!("Failed to parse config file {path}"))?
            }
            None => Self::default(),
        };
        config.apply_env(&lookup)?;
        Ok(config)
    }

    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn apply_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<()> {
        let string = |key: &str, target: &mut String| {
            if let Some(value) = lookup(key) {
                *target = value;
            }
        };
        let path = |key: &str, target: &mut PathBuf| {
            if let Some(value) = lookup(key) {
                *target = PathBuf::from(value);
            }
        };

        if let Some(uid) = parsed::<u32>(lookup, "BMI_UID")? {
            self.bmi.uid = uid;
        }
        string("BMI_SNAPSHOT", &mut self.bmi.snapshot);
        if let Some(service) = lookup("BMI_SERVICE") {
            self.bmi.service = service == "1" || service.eq_ignore_ascii_case("true");
        }
        string("BMI_ADMIN_PROJECT", &mut self.bmi.admin_project);
        if let Some(users) = lookup("BMI_ADMIN_USERS") {
            self.bmi.admin_users = users
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(policy) = lookup("BMI_AUTHZ_POLICY") {
            self.bmi.policy = policy
                .parse()
                .map_err(anyhow::Error::msg)
                .context("BMI_AUTHZ_POLICY must be admin-project, admin-users or allow-all.")?;
        }
        string("BMI_DHCP_NIC", &mut self.bmi.dhcp_nic);

        path("BMI_DB_PATH", &mut self.db.path);

        path("BMI_CEPH_CONF", &mut self.fs.conf_file);
        string("BMI_CEPH_ID", &mut self.fs.id);
        string("BMI_CEPH_POOL", &mut self.fs.pool);
        string("BMI_RBD_BIN", &mut self.fs.rbd_binary);

        string("BMI_ISCSI_IP", &mut self.iscsi.ip);
        if let Some(password) = lookup("BMI_ISCSI_PASSWORD") {
            self.iscsi.password = Some(password).filter(|p| !p.is_empty());
        }
        path("BMI_TGT_CONF_DIR", &mut self.iscsi.conf_dir);
        string("BMI_TGT_ADMIN_BIN", &mut self.iscsi.tgt_admin_binary);

        string("BMI_HIL_URL", &mut self.net_isolator.url);
        if let Some(timeout) = parsed::<u64>(lookup, "BMI_HIL_TIMEOUT")? {
            self.net_isolator.timeout_secs = timeout;
        }

        path("BMI_IPXE_PATH", &mut self.tftp.ipxe_path);
        path("BMI_PXELINUX_PATH", &mut self.tftp.pxelinux_path);
        if let Some(template) = lookup("BMI_IPXE_TEMPLATE") {
            self.tftp.ipxe_template = Some(PathBuf::from(template));
        }
        if let Some(template) = lookup("BMI_MAC_TEMPLATE") {
            self.tftp.mac_template = Some(PathBuf::from(template));
        }

        path("BMI_DHCP_LEASES", &mut self.dhcp.leases_file);

        if let Some(addr) = parsed::<SocketAddr>(lookup, "BMI_LISTEN_ADDR")? {
            self.rpc.listen_addr = addr;
        }

        string("BMI_LOG_LEVEL", &mut self.log_level);
        Ok(())
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|v| v.parse::<T>())
        .transpose()
        .with_context(|| format!("{key} has an invalid value."))
}
