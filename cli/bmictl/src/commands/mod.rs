//! CLI commands.

mod disks;
mod images;
mod nodes;
mod projects;
mod snapshots;

use anyhow::Result;
use bmi_wire::Credentials;
use clap::{Parser, Subcommand};

use crate::client::ApiClient;
use crate::output::OutputFormat;

/// bmi - Provision bare-metal nodes from copy-on-write disk images.
#[derive(Debug, Parser)]
#[command(name = "bmi")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (table or json).
    #[arg(long, global = true, default_value = "table")]
    format: String,

    /// Base URL of the einstein server.
    #[arg(long, global = true, env = "BMI_URL", default_value = "http://127.0.0.1:8000")]
    url: String,

    #[arg(long, global = true, env = "BMI_USERNAME", default_value = "")]
    username: String,

    #[arg(long, global = true, env = "BMI_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    /// Project to act in.
    #[arg(long, global = true, env = "BMI_PROJECT", default_value = "bmi_admin")]
    project: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Manage disks (clones of images).
    Disk(disks::DiskCommand),

    /// Snapshot disks into new images.
    Snapshot(snapshots::SnapshotCommand),

    /// Manage images.
    Image(images::ImageCommand),

    /// Manage projects (admin).
    Project(projects::ProjectCommand),

    /// Boot registration and network isolation of nodes.
    Node(nodes::NodeCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let credentials = Credentials::new(&self.username, &self.password, self.project);
        let ctx = CommandContext {
            client: ApiClient::new(&self.url, credentials)?,
            format: OutputFormat::parse(&self.format),
        };

        match self.command {
            Commands::Disk(cmd) => cmd.run(ctx).await,
            Commands::Snapshot(cmd) => cmd.run(ctx).await,
            Commands::Image(cmd) => cmd.run(ctx).await,
            Commands::Project(cmd) => cmd.run(ctx).await,
            Commands::Node(cmd) => cmd.run(ctx).await,
            Commands::Version => {
                println!("bmi {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub client: ApiClient,
    pub format: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "bmi", "disk", "create", "disk1", "ubuntu", "--project", "tenantA", "--format", "json",
        ])
        .unwrap();
        assert_eq!(cli.project, "tenantA");
        assert_eq!(cli.format, "json");
        assert!(matches!(cli.command, Commands::Disk(_)));
    }
}
