//! Task submission and inspection commands.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::{presets, ContentArrangement, Table};
use tracing::warn;

use crate::domain::models::config::Config;
use crate::domain::models::task::TaskMessage;
use crate::domain::ports::supervision::Supervision;
use crate::infrastructure::bus::MessageBus;
use crate::infrastructure::queue::PersistentQueue;
use crate::services::lifecycle::LifecycleSupervisor;

#[derive(Args)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommands,
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Submit a task by type
    Submit {
        /// Task type (e.g. ping, docs-update, drift-scan, llm-chat)
        #[arg(value_name = "TYPE")]
        kind: String,

        /// JSON payload for the handler
        #[arg(long, value_name = "JSON")]
        payload: Option<String>,
    },
    /// List every locally recorded task
    List,
    /// Show one task's durable record
    Status {
        /// Task id, as returned by submit
        id: String,
    },
}

pub async fn execute(args: TaskArgs, config: Config, json: bool) -> Result<()> {
    match args.command {
        TaskCommands::Submit { kind, payload } => {
            let payload = payload
                .map(|raw| serde_json::from_str(&raw))
                .transpose()
                .context("payload is not valid JSON")?;
            submit(&config, &kind, payload, json).await
        }
        TaskCommands::List => list(json),
        TaskCommands::Status { id } => status(&id, json),
    }
}

/// Durably enqueue a task, then try to hand it to the bus. Bus failure
/// degrades to queue-only submission: a polling agent will still find
/// the record.
pub async fn submit(
    config: &Config,
    kind: &str,
    payload: Option<serde_json::Value>,
    json: bool,
) -> Result<()> {
    let queue = PersistentQueue::project_local();
    let task_id = queue
        .enqueue(kind, payload.clone())
        .context("failed to enqueue task")?;

    let supervisor: Arc<dyn Supervision> = Arc::new(LifecycleSupervisor::new(&config.agent));
    let bus = MessageBus::new(config.agent.clone(), supervisor);

    let mut message = TaskMessage::new(kind, payload);
    message.id = task_id.clone();

    let delivered = match bus.publish_task(&message).await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "bus delivery failed, task stays queued locally");
            false
        }
    };
    bus.disconnect().await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "id": task_id,
                "type": kind,
                "delivered": delivered,
            }))?
        );
    } else {
        println!("Task submitted: {task_id}");
        if !delivered {
            println!("  (queued locally; no broker reachable)");
        }
    }
    Ok(())
}

fn list(json: bool) -> Result<()> {
    let records = PersistentQueue::project_local().load();

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(["ID", "TYPE", "STATUS", "CREATED"]);
    for record in &records {
        table.add_row([
            record.id.clone(),
            record.kind.clone(),
            record.status.as_str().to_string(),
            record.created_at.to_rfc3339(),
        ]);
    }
    println!("{table}");
    println!("\n{} task(s)", records.len());
    Ok(())
}

fn status(id: &str, json: bool) -> Result<()> {
    let records = PersistentQueue::project_local().load();
    let record = records
        .iter()
        .find(|r| r.id == id)
        .with_context(|| format!("task {id} not found"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
    } else {
        println!("Task:    {}", record.id);
        println!("Type:    {}", record.kind);
        println!("Status:  {}", record.status.as_str());
        println!("Created: {}", record.created_at.to_rfc3339());
        if let Some(payload) = &record.payload {
            println!("Payload: {payload}");
        }
    }
    Ok(())
}
