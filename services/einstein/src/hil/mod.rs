//! Network-isolation service (HIL).
//!
//! Resolves node NIC MAC addresses, validates that a project is known to
//! the fabric, and attaches or detaches nodes to a project's network.

mod client;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use client::{parse_response, HilClient, HIL_API};

/// Errors from the network-isolation service.
#[derive(Debug, Error)]
pub enum IsolationError {
    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Authorization failed")]
    AuthorizationFailed,

    #[error("Nic does not exist")]
    NicNotFound { node: String, nic: String },

    #[error("{message}")]
    Unknown { status: u16, message: String },

    #[error("Unable to reach network isolator: {0}")]
    Connection(String),

    #[error("Unexpected network isolator response: {0}")]
    InvalidResponse(String),
}

impl IsolationError {
    pub fn status_code(&self) -> u16 {
        match self {
            IsolationError::AuthenticationFailed => 401,
            IsolationError::AuthorizationFailed => 403,
            IsolationError::NicNotFound { .. } => 404,
            IsolationError::Unknown { status, .. } => *status,
            IsolationError::Connection(_) | IsolationError::InvalidResponse(_) => 500,
        }
    }
}

/// One NIC of a node as reported by HIL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nic {
    pub label: String,
    pub macaddr: String,
}

/// Node details as reported by HIL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    #[serde(default)]
    pub nics: Vec<Nic>,
}

impl NodeInfo {
    /// MAC address of the NIC labelled `label`.
    pub fn mac_for(&self, label: &str) -> Option<&str> {
        self.nics
            .iter()
            .find(|nic| nic.label == label)
            .map(|nic| nic.macaddr.as_str())
    }
}

/// Network-isolation client interface.
pub trait NetworkIsolation: Send {
    /// MAC address of `node`'s NIC labelled `nic`.
    fn node_mac_addr(&self, node: &str, nic: &str) -> Result<String, IsolationError>;

    /// Succeeds if the fabric knows `project` and the caller may see it.
    fn validate_project(&self, project: &str) -> Result<(), IsolationError>;

    fn attach_node(&self, project: &str, node: &str) -> Result<(), IsolationError>;

    fn detach_node(&self, project: &str, node: &str) -> Result<(), IsolationError>;

    fn list_free_nodes(&self) -> Result<Vec<String>, IsolationError>;

    fn project_nodes(&self, project: &str) -> Result<Vec<String>, IsolationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_for() {
        let info: NodeInfo = serde_json::from_value(serde_json::json!({
            "nics": [
                {"label": "eth0", "macaddr": "aa:bb:cc:dd:ee:00"},
                {"label": "eth1", "macaddr": "aa:bb:cc:dd:ee:01"}
            ]
        }))
        .unwrap();
        assert_eq!(info.mac_for("eth1"), Some("aa:bb:cc:dd:ee:01"));
        assert_eq!(info.mac_for("eth9"), None);
    }

    #[test]
    fn test_node_without_nics() {
        let info: NodeInfo = serde_json::from_str("{}").unwrap();
        assert!(info.nics.is_empty());
    }
}
