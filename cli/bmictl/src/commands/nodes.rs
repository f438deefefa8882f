//! Node commands: PXE registration, lookups and network attachment.

use anyhow::Result;
use bmi_wire::Command;
use clap::{Args, Subcommand};

use crate::output::{print_done, print_output, print_single, NameRow};

use super::CommandContext;

/// Node commands.
#[derive(Debug, Args)]
pub struct NodeCommand {
    #[command(subcommand)]
    command: NodeSubcommand,
}

#[derive(Debug, Subcommand)]
enum NodeSubcommand {
    /// Write boot files so a node boots a disk.
    Provision(ProvisionArgs),

    /// Remove a node's boot files.
    Deprovision(NicArgs),

    /// Show the address leased to a node.
    Ip(NodeArgs),

    /// Show the MAC address of a node's NIC.
    Mac(NicArgs),

    /// Connect a node to the project network.
    Attach(NodeArgs),

    /// Disconnect a node from the project network.
    Detach(NodeArgs),

    /// List nodes not attached to any project.
    Free,

    /// List nodes attached to the project.
    List,
}

#[derive(Debug, Args)]
struct ProvisionArgs {
    node: String,
    disk: String,
    /// NIC the node PXE boots from.
    nic: String,
}

#[derive(Debug, Args)]
struct NicArgs {
    node: String,
    nic: String,
}

#[derive(Debug, Args)]
struct NodeArgs {
    node: String,
}

impl NodeCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            NodeSubcommand::Provision(args) => {
                let done = format!("Provisioned {} with {}", args.node, args.disk);
                ctx.client
                    .execute(&Command::Provision {
                        node: args.node,
                        disk_name: args.disk,
                        nic: args.nic,
                    })
                    .await?;
                print_done(&done, ctx.format);
            }
            NodeSubcommand::Deprovision(args) => {
                let done = format!("Deprovisioned {}", args.node);
                ctx.client
                    .execute(&Command::Deprovision {
                        node: args.node,
                        nic: args.nic,
                    })
                    .await?;
                print_done(&done, ctx.format);
            }
            NodeSubcommand::Ip(args) => {
                let ip: String = ctx
                    .client
                    .execute_as(&Command::GetNodeIp { node: args.node })
                    .await?;
                print_single(&ip, ctx.format);
            }
            NodeSubcommand::Mac(args) => {
                let mac: String = ctx
                    .client
                    .execute_as(&Command::GetNodeMacAddr {
                        node: args.node,
                        nic: args.nic,
                    })
                    .await?;
                print_single(&mac, ctx.format);
            }
            NodeSubcommand::Attach(args) => {
                let done = format!("Attached {}", args.node);
                ctx.client
                    .execute(&Command::AttachNode { node: args.node })
                    .await?;
                print_done(&done, ctx.format);
            }
            NodeSubcommand::Detach(args) => {
                let done = format!("Detached {}", args.node);
                ctx.client
                    .execute(&Command::DetachNode { node: args.node })
                    .await?;
                print_done(&done, ctx.format);
            }
            NodeSubcommand::Free => {
                let nodes: Vec<String> = ctx.client.execute_as(&Command::ListFreeNodes).await?;
                print_output(&NameRow::rows(nodes), ctx.format);
            }
            NodeSubcommand::List => {
                let nodes: Vec<String> = ctx.client.execute_as(&Command::ListProjectNodes).await?;
                print_output(&NameRow::rows(nodes), ctx.format);
            }
        }
        Ok(())
    }
}
