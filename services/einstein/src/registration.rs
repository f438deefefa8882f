//! PXE boot registration.
//!
//! Provisioning a node writes two files:
//! - `{ipxe_path}/{node}.ipxe`, the iPXE script that sanboots the node's
//!   iSCSI target
//! - `{pxelinux_path}/{mac}`, the pxelinux entry for the node's NIC that
//!   chains into the iPXE script

use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::BmiError;

/// Placeholder replaced with the iSCSI target name in the iPXE template.
pub const IPXE_TARGET_NAME: &str = "${target_name}";
/// Placeholder replaced with the iSCSI portal address in the iPXE template.
pub const IPXE_ISCSI_IP: &str = "${iscsi_ip}";
/// Placeholder replaced with the disk name in the MAC template.
pub const MAC_IMG_NAME: &str = "${img_name}";
/// Placeholder replaced with the iPXE file name in the MAC template.
pub const MAC_IPXE_NAME: &str = "${ipxe_name}";

pub const DEFAULT_IPXE_TEMPLATE: &str = "#!ipxe
sleep 23
set keep-san 1
ifconf --configurator=dhcp net0
sanboot iscsi:${iscsi_ip}:tcp:3260:1:${target_name}
boot
";

pub const DEFAULT_MAC_TEMPLATE: &str = "DEFAULT menu
PROMPT 0
MENU TITLE BMI PXE Boot Menu
TIMEOUT 1
LABEL ${img_name}
  MENU LABEL ${img_name}
  KERNEL ipxe.lkrn
  APPEND dhcp && chain ${ipxe_name}
";

/// pxelinux file name for a MAC address: `aa:bb:cc:dd:ee:ff` becomes
/// `01-aa-bb-cc-dd-ee-ff`.
pub fn pxe_mac_name(mac: &str) -> String {
    format!("01-{}", mac.replace(':', "-"))
}

/// Boot registration interface.
pub trait BootRegistration: Send {
    /// Write boot artifacts so `node` boots `target_name` from the NIC with
    /// pxelinux name `mac`.
    fn register(
        &self,
        node: &str,
        image_name: &str,
        target_name: &str,
        mac: &str,
    ) -> Result<(), BmiError>;

    /// Remove the boot artifacts of `node`. Missing files are not an error.
    fn unregister(&self, node: &str, mac: &str) -> Result<(), BmiError>;
}

/// PXE boot file settings.
#[derive(Debug, Clone)]
pub struct PxeConfig {
    pub ipxe_path: PathBuf,
    pub pxelinux_path: PathBuf,
    pub iscsi_ip: String,
    pub ipxe_template: String,
    pub mac_template: String,
}

impl PxeConfig {
    /// Settings using the built-in templates.
    pub fn new(
        ipxe_path: impl Into<PathBuf>,
        pxelinux_path: impl Into<PathBuf>,
        iscsi_ip: impl Into<String>,
    ) -> Self {
        Self {
            ipxe_path: ipxe_path.into(),
            pxelinux_path: pxelinux_path.into(),
            iscsi_ip: iscsi_ip.into(),
            ipxe_template: DEFAULT_IPXE_TEMPLATE.to_string(),
            mac_template: DEFAULT_MAC_TEMPLATE.to_string(),
        }
    }
}

/// Writes iPXE and pxelinux files to the TFTP tree.
pub struct PxeRegistrar {
    config: PxeConfig,
}

impl PxeRegistrar {
    pub fn new(config: PxeConfig) -> Self {
        Self { config }
    }

    fn ipxe_file(&self, node: &str) -> PathBuf {
        self.config.ipxe_path.join(format!("{node}.ipxe"))
    }

    fn mac_file(&self, mac: &str) -> PathBuf {
        self.config.pxelinux_path.join(mac)
    }

    fn render_ipxe(&self, target_name: &str) -> String {
        self.config
            .ipxe_template
            .replace(IPXE_TARGET_NAME, target_name)
            .replace(IPXE_ISCSI_IP, &self.config.iscsi_ip)
    }

    fn render_mac(&self, image_name: &str, node: &str) -> String {
        self.config
            .mac_template
            .replace(MAC_IMG_NAME, image_name)
            .replace(MAC_IPXE_NAME, &format!("{node}.ipxe"))
    }
}

fn write_file(node: &str, path: &Path, contents: &str, mode: u32) -> Result<(), BmiError> {
    let failed = |e: std::io::Error| BmiError::Registration {
        node: node.to_string(),
        reason: e.to_string(),
    };

    fs::write(path, contents).map_err(failed)?;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(failed)?;
    debug!(path = %path.display(), mode = format!("{mode:o}"), "Wrote boot file");
    Ok(())
}

fn delete_file(node: &str, path: &Path) -> Result<(), BmiError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "Boot file does not exist");
            Ok(())
        }
        Err(e) => Err(BmiError::Registration {
            node: node.to_string(),
            reason: e.to_string(),
        }),
    }
}

impl BootRegistration for PxeRegistrar {
    fn register(
        &self,
        node: &str,
        image_name: &str,
        target_name: &str,
        mac: &str,
    ) -> Result<(), BmiError> {
        write_file(node, &self.ipxe_file(node), &self.render_ipxe(target_name), 0o755)?;
        write_file(node, &self.mac_file(mac), &self.render_mac(image_name, node), 0o644)?;
        info!(node = %node, target_name = %target_name, mac = %mac, "Registered boot files");
        Ok(())
    }

    fn unregister(&self, node: &str, mac: &str) -> Result<(), BmiError> {
        delete_file(node, &self.ipxe_file(node))?;
        delete_file(node, &self.mac_file(mac))?;
        info!(node = %node, mac = %mac, "Unregistered boot files");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registrar(dir: &TempDir) -> PxeRegistrar {
        let ipxe = dir.path().join("ipxe");
        let pxelinux = dir.path().join("pxelinux.cfg");
        fs::create_dir_all(&ipxe).unwrap();
        fs::create_dir_all(&pxelinux).unwrap();
        PxeRegistrar::new(PxeConfig::new(ipxe, pxelinux, "10.0.0.5"))
    }

    #[test]
    fn test_pxe_mac_name() {
        assert_eq!(pxe_mac_name("aa:bb:cc:dd:ee:ff"), "01-aa-bb-cc-dd-ee-ff");
    }

    #[test]
    fn test_register_writes_both_files() {
        let dir = TempDir::new().unwrap();
        let registrar = registrar(&dir);

        registrar
            .register("node7", "disk1", "4img12", "01-aa-bb-cc-dd-ee-ff")
            .unwrap();

        let ipxe_path = dir.path().join("ipxe/node7.ipxe");
        let ipxe = fs::read_to_string(&ipxe_path).unwrap();
        assert!(ipxe.contains("sanboot iscsi:10.0.0.5:tcp:3260:1:4img12"));
        let mode = fs::metadata(&ipxe_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);

        let mac_path = dir.path().join("pxelinux.cfg/01-aa-bb-cc-dd-ee-ff");
        let mac = fs::read_to_string(&mac_path).unwrap();
        assert!(mac.contains("LABEL disk1"));
        assert!(mac.contains("chain node7.ipxe"));
        let mode = fs::metadata(&mac_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_unregister_missing_files_is_ok() {
        let dir = TempDir::new().unwrap();
        let registrar = registrar(&dir);
        registrar.unregister("node7", "01-aa-bb-cc-dd-ee-ff").unwrap();
    }

    #[test]
    fn test_unregister_removes_files() {
        let dir = TempDir::new().unwrap();
        let registrar = registrar(&dir);
        registrar.register("node7", "disk1", "4img12", "01-aa").unwrap();
        registrar.unregister("node7", "01-aa").unwrap();

        assert!(!dir.path().join("ipxe/node7.ipxe").exists());
        assert!(!dir.path().join("pxelinux.cfg/01-aa").exists());
    }

    #[test]
    fn test_missing_directory_is_registration_error() {
        let dir = TempDir::new().unwrap();
        let registrar = PxeRegistrar::new(PxeConfig::new(
            dir.path().join("absent"),
            dir.path().join("absent"),
            "10.0.0.5",
        ));
        let err = registrar.register("node7", "disk1", "4img12", "01-aa").unwrap_err();
        assert!(matches!(err, BmiError::Registration { ref node, .. } if node == "node7"));
        assert_eq!(err.status_code(), 500);
    }
}
