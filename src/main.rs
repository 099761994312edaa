//! Taskmesh CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use taskmesh::cli::{Cli, Commands};
use taskmesh::infrastructure::config::ConfigLoader;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli
        .config
        .as_ref()
        .map_or_else(ConfigLoader::load, ConfigLoader::load_from_file)
    {
        Ok(config) => config,
        Err(err) => taskmesh::cli::handle_error(&err, cli.json),
    };

    // Stdout stays clean for command output and the stdio tool protocol.
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match cli.command {
        Commands::Agent(args) => {
            taskmesh::cli::commands::agent::execute(args, config, cli.json).await
        }
        Commands::Task(args) => taskmesh::cli::commands::task::execute(args, config, cli.json).await,
        Commands::Tools(args) => taskmesh::cli::commands::tools::execute(args, config).await,
    };

    if let Err(err) = result {
        taskmesh::cli::handle_error(&err, cli.json);
    }
}
