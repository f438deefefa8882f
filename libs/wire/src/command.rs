//! The closed set of operations a client can invoke.

use bmi_id::{ImageId, ProjectId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One orchestrator operation with its arguments.
///
/// On the wire this is `{"command": "create_disk", "args": {...}}`; commands
/// without arguments may omit `args`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "args", rename_all = "snake_case")]
pub enum Command {
    CreateDisk {
        disk_name: String,
        image_name: String,
    },
    DeleteDisk {
        disk_name: String,
    },
    ListDisks,
    CreateSnapshot {
        disk_name: String,
        snap_name: String,
    },
    ListSnapshots,
    ListImages,
    ListAllImages,
    RemoveImage {
        image_name: String,
    },
    ImportCephImage {
        image: String,
    },
    ImportCephSnapshot {
        image: String,
        snap_name: String,
        #[serde(default)]
        protect: bool,
    },
    ExportCephImage {
        image: String,
        name: String,
    },
    CopyImage {
        image: String,
        dest_project: String,
        #[serde(default)]
        dest_name: Option<String>,
    },
    MoveImage {
        image: String,
        dest_project: String,
        #[serde(default)]
        dest_name: Option<String>,
    },
    AddImage {
        project: String,
        name: String,
        #[serde(default)]
        id: Option<ImageId>,
        #[serde(default)]
        is_snapshot: bool,
        #[serde(default)]
        parent: Option<String>,
        #[serde(default)]
        public: bool,
    },
    DeleteImage {
        project: String,
        name: String,
    },
    AddProject {
        name: String,
        #[serde(default)]
        id: Option<ProjectId>,
    },
    DeleteProject {
        name: String,
    },
    ListProjects,
    MountImage {
        name: String,
    },
    UmountImage {
        name: String,
    },
    ShowMounted,
    Provision {
        node: String,
        disk_name: String,
        nic: String,
    },
    Deprovision {
        node: String,
        nic: String,
    },
    GetNodeMacAddr {
        node: String,
        nic: String,
    },
    GetNodeIp {
        node: String,
    },
    AttachNode {
        node: String,
    },
    DetachNode {
        node: String,
    },
    ListFreeNodes,
    ListProjectNodes,
}

impl Command {
    /// Build a command from its wire name and arguments.
    pub fn parse(command: &str, args: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::json!({ "command": command, "args": args }))
    }

    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateDisk { .. } => "create_disk",
            Command::DeleteDisk { .. } => "delete_disk",
            Command::ListDisks => "list_disks",
            Command::CreateSnapshot { .. } => "create_snapshot",
            Command::ListSnapshots => "list_snapshots",
            Command::ListImages => "list_images",
            Command::ListAllImages => "list_all_images",
            Command::RemoveImage { .. } => "remove_image",
            Command::ImportCephImage { .. } => "import_ceph_image",
            Command::ImportCephSnapshot { .. } => "import_ceph_snapshot",
            Command::ExportCephImage { .. } => "export_ceph_image",
            Command::CopyImage { .. } => "copy_image",
            Command::MoveImage { .. } => "move_image",
            Command::AddImage { .. } => "add_image",
            Command::DeleteImage { .. } => "delete_image",
            Command::AddProject { .. } => "add_project",
            Command::DeleteProject { .. } => "delete_project",
            Command::ListProjects => "list_projects",
            Command::MountImage { .. } => "mount_image",
            Command::UmountImage { .. } => "umount_image",
            Command::ShowMounted => "show_mounted",
            Command::Provision { .. } => "provision",
            Command::Deprovision { .. } => "deprovision",
            Command::GetNodeMacAddr { .. } => "get_node_mac_addr",
            Command::GetNodeIp { .. } => "get_node_ip",
            Command::AttachNode { .. } => "attach_node",
            Command::DetachNode { .. } => "detach_node",
            Command::ListFreeNodes => "list_free_nodes",
            Command::ListProjectNodes => "list_project_nodes",
        }
    }
}
