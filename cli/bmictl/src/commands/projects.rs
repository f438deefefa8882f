//! Project commands.

use anyhow::Result;
use bmi_id::ProjectId;
use bmi_wire::Command;
use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::output::{print_done, print_output};

use super::CommandContext;

/// Project commands.
#[derive(Debug, Args)]
pub struct ProjectCommand {
    #[command(subcommand)]
    command: ProjectSubcommand,
}

#[derive(Debug, Subcommand)]
enum ProjectSubcommand {
    /// Register a project.
    Add(AddProjectArgs),

    /// Delete a project that owns no images.
    Delete(DeleteProjectArgs),

    /// List projects.
    List,
}

#[derive(Debug, Args)]
struct AddProjectArgs {
    name: String,
    /// Fixed project id.
    #[arg(long)]
    id: Option<ProjectId>,
}

#[derive(Debug, Args)]
struct DeleteProjectArgs {
    name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tabled)]
struct ProjectRow {
    #[tabled(rename = "ID")]
    id: i64,

    #[tabled(rename = "Name")]
    name: String,
}

impl ProjectCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            ProjectSubcommand::Add(args) => {
                ctx.client
                    .execute(&Command::AddProject {
                        name: args.name.clone(),
                        id: args.id,
                    })
                    .await?;
                print_done(&format!("Added project {}", args.name), ctx.format);
            }
            ProjectSubcommand::Delete(args) => {
                ctx.client
                    .execute(&Command::DeleteProject {
                        name: args.name.clone(),
                    })
                    .await?;
                print_done(&format!("Deleted project {}", args.name), ctx.format);
            }
            ProjectSubcommand::List => {
                let projects: Vec<ProjectRow> =
                    ctx.client.execute_as(&Command::ListProjects).await?;
                print_output(&projects, ctx.format);
            }
        }
        Ok(())
    }
}
