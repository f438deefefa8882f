//! Mapping of wire commands onto orchestrator operations.

use bmi_wire::Command;
use serde_json::Value;

use crate::orchestrator::{ImageSpec, Orchestrator};

/// Run a command and return its response envelope as JSON.
pub fn dispatch(orch: &Orchestrator, command: &Command) -> Value {
    match command {
        Command::CreateDisk {
            disk_name,
            image_name,
        } => orch.create_disk(disk_name, image_name).into_json(),
        Command::DeleteDisk { disk_name } => orch.delete_disk(disk_name).into_json(),
        Command::ListDisks => orch.list_disks().into_json(),
        Command::CreateSnapshot {
            disk_name,
            snap_name,
        } => orch.create_snapshot(disk_name, snap_name).into_json(),
        Command::ListSnapshots => orch.list_snapshots().into_json(),
        Command::ListImages => orch.list_images().into_json(),
        Command::ListAllImages => orch.list_all_images().into_json(),
        Command::RemoveImage { image_name } => orch.remove_image(image_name).into_json(),
        Command::ImportCephImage { image } => orch.import_ceph_image(image).into_json(),
        Command::ImportCephSnapshot {
            image,
            snap_name,
            protect,
        } => orch
            .import_ceph_snapshot(image, snap_name, *protect)
            .into_json(),
        Command::ExportCephImage { image, name } => {
            orch.export_ceph_image(image, name).into_json()
        }
        Command::CopyImage {
            image,
            dest_project,
            dest_name,
        } => orch
            .copy_image(image, dest_project, dest_name.as_deref())
            .into_json(),
        Command::MoveImage {
            image,
            dest_project,
            dest_name,
        } => orch
            .move_image(image, dest_project, dest_name.as_deref())
            .into_json(),
        Command::AddImage {
            project,
            name,
            id,
            is_snapshot,
            parent,
            public,
        } => orch
            .add_image(&ImageSpec {
                project: project.clone(),
                name: name.clone(),
                id: *id,
                is_snapshot: *is_snapshot,
                parent: parent.clone(),
                public: *public,
            })
            .into_json(),
        Command::DeleteImage { project, name } => orch.delete_image(project, name).into_json(),
        Command::AddProject { name, id } => orch.add_project(name, *id).into_json(),
        Command::DeleteProject { name } => orch.delete_project(name).into_json(),
        Command::ListProjects => orch.list_projects().into_json(),
        Command::MountImage { name } => orch.mount_image(name).into_json(),
        Command::UmountImage { name } => orch.umount_image(name).into_json(),
        Command::ShowMounted => orch.show_mounted().into_json(),
        Command::Provision {
            node,
            disk_name,
            nic,
        } => orch.provision(node, disk_name, nic).into_json(),
        Command::Deprovision { node, nic } => orch.deprovision(node, nic).into_json(),
        Command::GetNodeMacAddr { node, nic } => orch.get_node_mac_addr(node, nic).into_json(),
        Command::GetNodeIp { node } => orch.get_node_ip(node).into_json(),
        Command::AttachNode { node } => orch.attach_node(node).into_json(),
        Command::DetachNode { node } => orch.detach_node(node).into_json(),
        Command::ListFreeNodes => orch.list_free_nodes().into_json(),
        Command::ListProjectNodes => orch.list_project_nodes().into_json(),
    }
}
