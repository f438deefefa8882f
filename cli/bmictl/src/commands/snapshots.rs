//! Snapshot commands.

use anyhow::Result;
use bmi_wire::Command;
use clap::{Args, Subcommand};

use crate::output::{print_done, print_output, NameRow};

use super::CommandContext;

/// Snapshot commands.
#[derive(Debug, Args)]
pub struct SnapshotCommand {
    #[command(subcommand)]
    command: SnapshotSubcommand,
}

#[derive(Debug, Subcommand)]
enum SnapshotSubcommand {
    /// Snapshot a disk into a new clonable image.
    Create(CreateSnapshotArgs),

    /// List snapshots in the project.
    List,
}

#[derive(Debug, Args)]
struct CreateSnapshotArgs {
    disk: String,
    /// Name of the new snapshot image.
    snapshot: String,
}

impl SnapshotCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            SnapshotSubcommand::Create(args) => {
                ctx.client
                    .execute(&Command::CreateSnapshot {
                        disk_name: args.disk.clone(),
                        snap_name: args.snapshot.clone(),
                    })
                    .await?;
                print_done(
                    &format!("Created snapshot {} of {}", args.snapshot, args.disk),
                    ctx.format,
                );
                Ok(())
            }
            SnapshotSubcommand::List => {
                let names: Vec<String> = ctx.client.execute_as(&Command::ListSnapshots).await?;
                print_output(&NameRow::rows(names), ctx.format);
                Ok(())
            }
        }
    }
}
