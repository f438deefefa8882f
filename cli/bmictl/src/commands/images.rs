//! Image commands.

use std::collections::BTreeMap;

use anyhow::Result;
use bmi_id::ImageId;
use bmi_wire::Command;
use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::output::{display_option, print_done, print_output, NameRow};

use super::CommandContext;

/// Image commands.
#[derive(Debug, Args)]
pub struct ImageCommand {
    #[command(subcommand)]
    command: ImageSubcommand,
}

#[derive(Debug, Subcommand)]
enum ImageSubcommand {
    /// List clonable images in the project.
    List,

    /// List images of every project (admin).
    ListAll,

    /// Remove an image and its storage object.
    Remove(NameArgs),

    /// Adopt an existing RBD image as a golden image.
    Import(NameArgs),

    /// Adopt an existing RBD snapshot as a golden image.
    ImportSnapshot(ImportSnapshotArgs),

    /// Clone an image out to an unmanaged RBD name.
    Export(ExportArgs),

    /// Copy an image into a project.
    Copy(RelocateArgs),

    /// Move an image into a project.
    Move(RelocateArgs),

    /// Insert an image row without touching storage (admin).
    Add(AddImageArgs),

    /// Delete an image row without touching storage (admin).
    Delete(DeleteImageArgs),

    /// Expose an image as an iSCSI target (admin).
    Mount(NameArgs),

    /// Remove an image's iSCSI target (admin).
    Umount(NameArgs),

    /// Show targets backed by the project's images (admin).
    Mounted,
}

#[derive(Debug, Args)]
struct NameArgs {
    image: String,
}

#[derive(Debug, Args)]
struct ImportSnapshotArgs {
    image: String,
    snapshot: String,
    /// Protect the snapshot before cloning it.
    #[arg(long)]
    protect: bool,
}

#[derive(Debug, Args)]
struct ExportArgs {
    image: String,
    /// RBD name of the exported copy.
    name: String,
}

#[derive(Debug, Args)]
struct RelocateArgs {
    image: String,
    /// Destination project.
    project: String,
    /// Name in the destination project, defaults to the source name.
    #[arg(long)]
    name: Option<String>,
}

#[derive(Debug, Args)]
struct AddImageArgs {
    project: String,
    name: String,
    #[arg(long)]
    id: Option<ImageId>,
    #[arg(long)]
    snapshot: bool,
    /// Parent image in the same project.
    #[arg(long)]
    parent: Option<String>,
    #[arg(long)]
    public: bool,
}

#[derive(Debug, Args)]
struct DeleteImageArgs {
    project: String,
    name: String,
}

impl ImageCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            ImageSubcommand::List => {
                let names: Vec<String> = ctx.client.execute_as(&Command::ListImages).await?;
                print_output(&NameRow::rows(names), ctx.format);
                Ok(())
            }
            ImageSubcommand::ListAll => list_all(ctx).await,
            ImageSubcommand::Remove(args) => {
                let done = format!("Removed image {}", args.image);
                let command = Command::RemoveImage {
                    image_name: args.image,
                };
                run_done(ctx, command, done).await
            }
            ImageSubcommand::Import(args) => {
                let done = format!("Imported {}", args.image);
                run_done(ctx, Command::ImportCephImage { image: args.image }, done).await
            }
            ImageSubcommand::ImportSnapshot(args) => {
                let done = format!("Imported {}@{}", args.image, args.snapshot);
                let command = Command::ImportCephSnapshot {
                    image: args.image,
                    snap_name: args.snapshot,
                    protect: args.protect,
                };
                run_done(ctx, command, done).await
            }
            ImageSubcommand::Export(args) => {
                let done = format!("Exported {} as {}", args.image, args.name);
                let command = Command::ExportCephImage {
                    image: args.image,
                    name: args.name,
                };
                run_done(ctx, command, done).await
            }
            ImageSubcommand::Copy(args) => {
                let done = format!("Copied {} to {}", args.image, args.project);
                let command = Command::CopyImage {
                    image: args.image,
                    dest_project: args.project,
                    dest_name: args.name,
                };
                run_done(ctx, command, done).await
            }
            ImageSubcommand::Move(args) => {
                let done = format!("Moved {} to {}", args.image, args.project);
                let command = Command::MoveImage {
                    image: args.image,
                    dest_project: args.project,
                    dest_name: args.name,
                };
                run_done(ctx, command, done).await
            }
            ImageSubcommand::Add(args) => {
                let done = format!("Added image row {} to {}", args.name, args.project);
                let command = Command::AddImage {
                    project: args.project,
                    name: args.name,
                    id: args.id,
                    is_snapshot: args.snapshot,
                    parent: args.parent,
                    public: args.public,
                };
                run_done(ctx, command, done).await
            }
            ImageSubcommand::Delete(args) => {
                let done = format!("Deleted image row {} from {}", args.name, args.project);
                let command = Command::DeleteImage {
                    project: args.project,
                    name: args.name,
                };
                run_done(ctx, command, done).await
            }
            ImageSubcommand::Mount(args) => {
                let done = format!("Mounted {}", args.image);
                run_done(ctx, Command::MountImage { name: args.image }, done).await
            }
            ImageSubcommand::Umount(args) => {
                let done = format!("Unmounted {}", args.image);
                run_done(ctx, Command::UmountImage { name: args.image }, done).await
            }
            ImageSubcommand::Mounted => show_mounted(ctx).await,
        }
    }
}

async fn run_done(ctx: CommandContext, command: Command, done: String) -> Result<()> {
    ctx.client.execute(&command).await?;
    print_done(&done, ctx.format);
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Tabled)]
struct ImageRow {
    #[tabled(rename = "ID")]
    id: i64,

    #[tabled(rename = "Name")]
    name: String,

    #[tabled(rename = "Project")]
    project: String,

    #[tabled(rename = "Parent", display = "display_option")]
    #[serde(default)]
    parent: Option<String>,

    #[tabled(rename = "Snapshot")]
    is_snapshot: bool,

    #[tabled(rename = "Public")]
    public: bool,

    #[tabled(rename = "Storage Name")]
    storage_name: String,
}

async fn list_all(ctx: CommandContext) -> Result<()> {
    let images: Vec<ImageRow> = ctx.client.execute_as(&Command::ListAllImages).await?;
    print_output(&images, ctx.format);
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
struct TargetInfo {
    #[serde(default)]
    tid: Option<u32>,
    #[serde(default)]
    backing_store: Option<String>,
}

#[derive(Debug, Clone, Serialize, Tabled)]
struct MountRow {
    #[tabled(rename = "Image")]
    image: String,

    #[tabled(rename = "TID")]
    tid: String,

    #[tabled(rename = "Backing Store", display = "display_option")]
    backing_store: Option<String>,
}

fn mount_rows(mounted: BTreeMap<String, TargetInfo>) -> Vec<MountRow> {
    mounted
        .into_iter()
        .map(|(image, info)| MountRow {
            image,
            tid: info.tid.map_or_else(|| "-".to_string(), |tid| tid.to_string()),
            backing_store: info.backing_store,
        })
        .collect()
}

async fn show_mounted(ctx: CommandContext) -> Result<()> {
    let mounted: BTreeMap<String, TargetInfo> =
        ctx.client.execute_as(&Command::ShowMounted).await?;
    print_output(&mount_rows(mounted), ctx.format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_rows_decode() {
        let value = serde_json::json!([{
            "id": 12,
            "name": "disk1",
            "project": "tenantA",
            "parent": "ubuntu",
            "is_snapshot": false,
            "public": false,
            "storage_name": "4img12"
        }]);
        let rows: Vec<ImageRow> = serde_json::from_value(value).unwrap();
        assert_eq!(rows[0].storage_name, "4img12");
        assert_eq!(rows[0].parent.as_deref(), Some("ubuntu"));
    }

    #[test]
    fn test_mount_rows() {
        let value = serde_json::json!({
            "disk1": {"tid": 3, "backing_store": "bmi/4img12"},
            "ubuntu": {"tid": null, "backing_store": null}
        });
        let rows = mount_rows(serde_json::from_value(value).unwrap());
        assert_eq!(rows[0].image, "disk1");
        assert_eq!(rows[0].tid, "3");
        assert_eq!(rows[1].tid, "-");

        let table = tabled::Table::new(&rows).to_string();
        assert!(table.contains("Backing Store"));
        assert!(table.contains("bmi/4img12"));
    }
}
