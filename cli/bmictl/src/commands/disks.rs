//! Disk commands.

use anyhow::Result;
use bmi_wire::Command;
use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::output::{display_option, print_done, print_output, print_single};

use super::CommandContext;

/// Disk commands.
#[derive(Debug, Args)]
pub struct DiskCommand {
    #[command(subcommand)]
    command: DiskSubcommand,
}

#[derive(Debug, Subcommand)]
enum DiskSubcommand {
    /// Clone an image into a new disk and expose it over iSCSI.
    Create(CreateDiskArgs),

    /// Remove a disk and its target.
    Delete(DeleteDiskArgs),

    /// List disks in the project.
    List,
}

#[derive(Debug, Args)]
struct CreateDiskArgs {
    /// Name of the new disk.
    disk: String,
    /// Image to clone.
    image: String,
}

#[derive(Debug, Args)]
struct DeleteDiskArgs {
    disk: String,
}

impl DiskCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            DiskSubcommand::Create(args) => create_disk(ctx, args).await,
            DiskSubcommand::Delete(args) => delete_disk(ctx, args).await,
            DiskSubcommand::List => list_disks(ctx).await,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Tabled)]
struct DiskRow {
    #[tabled(rename = "Disk")]
    name: String,

    #[tabled(rename = "Image", display = "display_option")]
    #[serde(default)]
    parent: Option<String>,
}

async fn create_disk(ctx: CommandContext, args: CreateDiskArgs) -> Result<()> {
    let target: String = ctx
        .client
        .execute_as(&Command::CreateDisk {
            disk_name: args.disk,
            image_name: args.image,
        })
        .await?;

    print_single(&target, ctx.format);
    Ok(())
}

async fn delete_disk(ctx: CommandContext, args: DeleteDiskArgs) -> Result<()> {
    ctx.client
        .execute(&Command::DeleteDisk {
            disk_name: args.disk.clone(),
        })
        .await?;

    print_done(&format!("Deleted disk {}", args.disk), ctx.format);
    Ok(())
}

async fn list_disks(ctx: CommandContext) -> Result<()> {
    let disks: Vec<DiskRow> = ctx.client.execute_as(&Command::ListDisks).await?;
    print_output(&disks, ctx.format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabled::Table;

    #[test]
    fn test_disk_table_renders_missing_parent() {
        let rows: Vec<DiskRow> = serde_json::from_value(serde_json::json!([
            {"name": "disk1", "parent": "ubuntu"},
            {"name": "orphan"}
        ]))
        .unwrap();

        let table = Table::new(&rows).to_string();
        assert!(table.contains("Disk"));
        assert!(table.contains("ubuntu"));
        let orphan = table.lines().find(|line| line.contains("orphan")).unwrap();
        assert!(orphan.contains(" - "));
    }
}
