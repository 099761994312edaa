//! Tool server command.

use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::adapters::tools_stdio::ToolServer;
use crate::domain::models::config::Config;
use crate::services::registry::HandlerRegistry;
use crate::services::scheduler::TaskScheduler;

#[derive(Args)]
pub struct ToolsArgs {
    #[command(subcommand)]
    pub command: ToolsCommands,
}

#[derive(Subcommand)]
pub enum ToolsCommands {
    /// Serve task tools over stdio (JSON-RPC 2.0)
    Serve,
}

pub async fn execute(args: ToolsArgs, config: Config) -> Result<()> {
    match args.command {
        ToolsCommands::Serve => serve(config).await,
    }
}

/// Stdio tool server with its own in-process scheduler. Tasks started
/// through a tool run inside this process; status queries answer from
/// the same scheduler.
async fn serve(config: Config) -> Result<()> {
    let scheduler = TaskScheduler::new(config.agent.concurrency, None, None);
    let registry = Arc::new(HandlerRegistry::with_builtin_handlers(&config));

    ToolServer::new(scheduler, registry).run().await
}
