//! Node operations: boot registration and network isolation.

use tracing::info;

use super::{Orchestrator, Session};
use crate::error::BmiError;
use crate::registration::pxe_mac_name;
use crate::response::Response;

impl Session<'_> {
    fn node_mac(&self, node: &str, nic: &str) -> Result<String, BmiError> {
        Ok(self.backends.isolation.node_mac_addr(node, nic)?)
    }

    fn provision(&self, node: &str, disk_name: &str, nic: &str) -> Result<bool, BmiError> {
        let mac = pxe_mac_name(&self.node_mac(node, nic)?);
        let target = self.resolve(disk_name)?;
        self.backends
            .registration
            .register(node, disk_name, &target, &mac)?;

        info!(node = %node, disk = %disk_name, target_name = %target, "Node provisioned");
        Ok(true)
    }

    fn deprovision(&self, node: &str, nic: &str) -> Result<bool, BmiError> {
        let mac = pxe_mac_name(&self.node_mac(node, nic)?);
        self.backends.registration.unregister(node, &mac)?;

        info!(node = %node, "Node deprovisioned");
        Ok(true)
    }

    fn get_node_ip(&self, node: &str) -> Result<String, BmiError> {
        let mac = self.node_mac(node, &self.ctx.settings.dhcp_nic)?;
        self.backends.dhcp.ip_for(&mac)
    }

    fn attach_node(&self, node: &str) -> Result<bool, BmiError> {
        self.backends.isolation.attach_node(self.project(), node)?;
        info!(node = %node, project = %self.project(), "Node attached");
        Ok(true)
    }

    fn detach_node(&self, node: &str) -> Result<bool, BmiError> {
        self.backends.isolation.detach_node(self.project(), node)?;
        info!(node = %node, project = %self.project(), "Node detached");
        Ok(true)
    }
}

impl Orchestrator {
    /// Write boot files so `node` boots `disk_name` from its `nic`.
    pub fn provision(&self, node: &str, disk_name: &str, nic: &str) -> Response<bool> {
        self.run("provision", |s| s.provision(node, disk_name, nic))
    }

    pub fn deprovision(&self, node: &str, nic: &str) -> Response<bool> {
        self.run("deprovision", |s| s.deprovision(node, nic))
    }

    pub fn get_node_mac_addr(&self, node: &str, nic: &str) -> Response<String> {
        self.run("get_node_mac_addr", |s| s.node_mac(node, nic))
    }

    /// Address leased to the node's DHCP NIC.
    pub fn get_node_ip(&self, node: &str) -> Response<String> {
        self.run("get_node_ip", |s| s.get_node_ip(node))
    }

    /// Connect a node to the caller's project network.
    pub fn attach_node(&self, node: &str) -> Response<bool> {
        self.run("attach_node", |s| s.attach_node(node))
    }

    pub fn detach_node(&self, node: &str) -> Response<bool> {
        self.run("detach_node", |s| s.detach_node(node))
    }

    pub fn list_free_nodes(&self) -> Response<Vec<String>> {
        self.run("list_free_nodes", |s| {
            Ok(s.backends.isolation.list_free_nodes()?)
        })
    }

    /// Nodes attached to the caller's project.
    pub fn list_project_nodes(&self) -> Response<Vec<String>> {
        self.run("list_project_nodes", |s| {
            Ok(s.backends.isolation.project_nodes(s.project())?)
        })
    }
}
