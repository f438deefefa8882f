//! DHCP lease lookup.

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use crate::error::BmiError;

/// Resolves the address leased to a MAC.
pub trait DhcpLookup: Send {
    fn ip_for(&self, mac: &str) -> Result<String, BmiError>;
}

/// Reads a dnsmasq lease file.
///
/// Each line is `expiry mac ip hostname client-id`.
pub struct DnsmasqLeases {
    path: PathBuf,
}

impl DnsmasqLeases {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Find the address leased to `mac` in lease file contents.
pub fn find_lease(contents: &str, mac: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let _expiry = fields.next()?;
        let lease_mac = fields.next()?;
        let ip = fields.next()?;
        lease_mac.eq_ignore_ascii_case(mac).then(|| ip.to_string())
    })
}

impl DhcpLookup for DnsmasqLeases {
    fn ip_for(&self, mac: &str) -> Result<String, BmiError> {
        let contents = fs::read_to_string(&self.path)
            .map_err(|e| BmiError::Dhcp(format!("{}: {e}", self.path.display())))?;

        let ip = find_lease(&contents, mac)
            .ok_or_else(|| BmiError::Dhcp(format!("no lease for {mac}")))?;
        debug!(mac = %mac, ip = %ip, "Resolved DHCP lease");
        Ok(ip)
    }
}
