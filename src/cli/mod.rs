//! Command-line interface.

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "taskmesh",
    version,
    about = "Distributed background-task agent",
    long_about = None
)]
pub struct Cli {
    /// Emit machine-readable JSON instead of human-oriented output
    #[arg(long, global = true)]
    pub json: bool,

    /// Explicit config file (overrides the .taskmesh/ hierarchy)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run, host, and exercise the agent process
    Agent(commands::agent::AgentArgs),
    /// Submit and inspect background tasks
    Task(commands::task::TaskArgs),
    /// Expose task operations to LLM clients
    Tools(commands::tools::ToolsArgs),
}

/// Report a top-level error and exit non-zero.
pub fn handle_error(err: &anyhow::Error, json: bool) -> ! {
    if json {
        eprintln!("{}", serde_json::json!({ "error": format!("{err:#}") }));
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
