//! Agent process commands: the worker loop, the embedded broker, and the
//! ping / ask round-trips.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::{info, warn};

use crate::adapters::tools_stdio::ToolServer;
use crate::domain::models::config::Config;
use crate::domain::ports::status::StatusPublisher;
use crate::domain::ports::supervision::{NoSupervision, Supervision};
use crate::infrastructure::bus::MessageBus;
use crate::infrastructure::queue::PersistentQueue;
use crate::services::lifecycle::LifecycleSupervisor;
use crate::services::registry::HandlerRegistry;
use crate::services::scheduler::TaskScheduler;

#[derive(Args)]
pub struct AgentArgs {
    #[command(subcommand)]
    pub command: AgentCommands,
}

#[derive(Subcommand)]
pub enum AgentCommands {
    /// Run the agent worker loop in the foreground
    Run,
    /// Host the message broker in the foreground
    Broker {
        /// Listen port, overriding the configured broker URL's port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Round-trip check: submit a ping task
    Ping,
    /// Submit an llm-chat task with the given prompt
    Ask {
        /// Prompt forwarded to the configured model
        prompt: String,

        /// Optional system prompt
        #[arg(long)]
        system: Option<String>,
    },
}

pub async fn execute(args: AgentArgs, config: Config, json: bool) -> Result<()> {
    match args.command {
        AgentCommands::Run => run(config).await,
        AgentCommands::Broker { port } => broker(config, port).await,
        AgentCommands::Ping => super::task::submit(&config, "ping", None, json).await,
        AgentCommands::Ask { prompt, system } => {
            let mut payload = serde_json::json!({ "prompt": prompt });
            if let Some(system) = system {
                payload["system"] = serde_json::Value::String(system);
            }
            super::task::submit(&config, "llm-chat", Some(payload), json).await
        }
    }
}

/// Foreground worker loop: claim the project's agent slot, wire the
/// scheduler to its discovery feeds, and serve until Ctrl-C.
async fn run(config: Config) -> Result<()> {
    anyhow::ensure!(
        config.agent.enabled,
        "agent subsystem is disabled in configuration"
    );

    let queue = PersistentQueue::project_local();
    let supervisor = LifecycleSupervisor::new(&config.agent);
    supervisor.write_lock_file()?;
    info!(pid = std::process::id(), "agent started");

    // The running agent never auto-spawns a sibling agent; it only makes
    // sure a broker answers before connecting.
    let bus = Arc::new(MessageBus::new(
        config.agent.clone(),
        Arc::new(NoSupervision),
    ));
    let scheduler = TaskScheduler::new(
        config.agent.concurrency,
        Some(queue.clone()),
        Some(Arc::clone(&bus) as Arc<dyn StatusPublisher>),
    );
    let registry = Arc::new(HandlerRegistry::with_builtin_handlers(&config));

    supervisor.ensure_broker_running().await?;
    match bus.connect().await {
        Ok(()) => {
            let feed_scheduler = Arc::clone(&scheduler);
            let feed_registry = Arc::clone(&registry);
            bus.subscribe_to_tasks(
                move |task| {
                    feed_scheduler.ingest(&feed_registry, task);
                },
                config.agent.shared_group,
            )
            .await?;
            info!(broker = %config.agent.broker_url, "subscribed to task requests");
        }
        Err(err) => {
            warn!(error = %err, "broker unreachable, falling back to poll-fed discovery");
        }
    }

    if config.agent.services.polling {
        scheduler.spawn_poller(
            queue.clone(),
            Arc::clone(&registry),
            Duration::from_millis(config.agent.poll_interval_ms),
        );
    }

    if config.agent.services.tools {
        // Detached agents run with a null stdin, so the tool loop sees
        // EOF immediately and stays dormant; a foreground agent serves
        // tools over its own stdio.
        let tool_server = ToolServer::new(Arc::clone(&scheduler), Arc::clone(&registry));
        tokio::spawn(async move {
            if let Err(err) = tool_server.run().await {
                warn!(error = %err, "stdio tool server stopped");
            }
        });
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down agent");

    // Release the agent slot before tearing the connection down so a
    // supervisor probing during shutdown never sees a live lock with a
    // dead bus behind it.
    supervisor.remove_lock_file();
    bus.disconnect().await;
    Ok(())
}

/// Foreground broker host. A bind failure (port occupied) is fatal.
async fn broker(config: Config, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or_else(|| config.agent.broker_port());
    let bus = MessageBus::new(config.agent.clone(), Arc::new(NoSupervision));

    let bound = bus
        .start_internal_broker(port)
        .await
        .with_context(|| format!("failed to bind broker on port {port}"))?;
    info!(port = bound, "broker listening");
    eprintln!("Broker listening on port {bound}. Press Ctrl-C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down broker");
    bus.disconnect().await;
    Ok(())
}
