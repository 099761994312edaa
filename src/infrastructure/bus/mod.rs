//! Message bus.
//!
//! One abstraction for both roles a process can play: host of the shared
//! message hub (embedded broker) and/or a publisher/subscriber client of
//! it. The wire protocol lives in [`protocol`]; the broker engine in
//! [`broker`]; the client session in [`client`].

pub mod broker;
pub mod client;
pub mod protocol;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::domain::error::BusError;
use crate::domain::models::config::AgentConfig;
use crate::domain::models::task::{StatusUpdate, TaskMessage, TaskStatus};
use crate::domain::ports::status::StatusPublisher;
use crate::domain::ports::supervision::Supervision;

pub use broker::Broker;
pub use client::BusClient;
pub use protocol::{status_channel, SHARED_GROUP, TASK_REQUEST_CHANNEL};

/// Unified bus facade owned by whichever process entry point needs it.
///
/// Explicitly constructed and dependency-injected; there is no hidden
/// module-level instance, so tests can run independent buses in parallel.
pub struct MessageBus {
    config: AgentConfig,
    supervisor: Arc<dyn Supervision>,
    broker: Mutex<Option<Broker>>,
    client: Mutex<Option<BusClient>>,
}

impl MessageBus {
    pub fn new(config: AgentConfig, supervisor: Arc<dyn Supervision>) -> Self {
        Self {
            config,
            supervisor,
            broker: Mutex::new(None),
            client: Mutex::new(None),
        }
    }

    /// Bind the embedded broker on `port`. Callers are expected to have
    /// checked liveness first (that check lives in the lifecycle
    /// supervisor); a second bind on an occupied port fails with
    /// [`BusError::Bind`].
    pub async fn start_internal_broker(&self, port: u16) -> Result<u16, BusError> {
        let broker = Broker::bind(port).await?;
        let bound = broker.port();
        *self.broker.lock().await = Some(broker);
        Ok(bound)
    }

    /// Open a client connection to the configured broker. Must complete
    /// before any subscribe/publish call.
    pub async fn connect(&self) -> Result<(), BusError> {
        let mut client = self.client.lock().await;
        if client.is_some() {
            return Ok(());
        }
        let session = BusClient::connect(
            &self.config.broker_host(),
            self.config.broker_port(),
            None,
        )
        .await?;
        *client = Some(session);
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.client.lock().await.is_some()
    }

    /// Subscribe to the task-request channel. With `use_shared_group`,
    /// agents become competing consumers: each task goes to exactly one
    /// member of the group. Without it, every subscriber sees every task.
    ///
    /// Malformed payloads are logged and dropped; they never reach
    /// `on_task` and never crash the subscriber.
    pub async fn subscribe_to_tasks(
        &self,
        on_task: impl Fn(TaskMessage) + Send + Sync + 'static,
        use_shared_group: bool,
    ) -> Result<(), BusError> {
        let client = self.client.lock().await;
        let client = client.as_ref().ok_or(BusError::NotConnected)?;

        let group = use_shared_group.then_some(SHARED_GROUP);
        client.subscribe(
            TASK_REQUEST_CHANNEL,
            group,
            Arc::new(move |channel, body| match serde_json::from_value(body) {
                Ok(task) => on_task(task),
                Err(err) => {
                    warn!(channel, error = %err, "dropping malformed task message");
                }
            }),
        )
    }

    /// Publish a task to the shared request channel (retained, so a
    /// late-joining agent still receives the most recent unconsumed task).
    ///
    /// When no connection is held yet, this first runs the supervisor's
    /// liveness/auto-start flow and then connects using the active
    /// configuration. Errors here are surfaced: the caller decides whether
    /// to degrade to queue-only submission.
    pub async fn publish_task(&self, task: &TaskMessage) -> anyhow::Result<()> {
        if !self.is_connected().await {
            self.supervisor.ensure_broker_running().await?;
            self.supervisor.ensure_agent_running().await?;
            self.connect().await?;
        }

        let client = self.client.lock().await;
        let client = client.as_ref().ok_or(BusError::NotConnected)?;
        client.publish(TASK_REQUEST_CHANNEL, serde_json::to_value(task)?, true)?;
        info!(task_id = %task.id, kind = %task.kind, "task published to bus");
        Ok(())
    }

    /// Close the client connection and/or the embedded broker (listening
    /// socket first, then the engine). Idempotent: double-disconnect is a
    /// no-op.
    pub async fn disconnect(&self) {
        if let Some(client) = self.client.lock().await.take() {
            client.disconnect().await;
        }
        if let Some(broker) = self.broker.lock().await.take() {
            broker.shutdown().await;
        }
    }
}

#[async_trait]
impl StatusPublisher for MessageBus {
    /// Publish a retained status update on the per-task channel. Callers
    /// treat failures as non-fatal.
    async fn publish_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        payload: Option<serde_json::Value>,
    ) -> Result<(), BusError> {
        let client = self.client.lock().await;
        let client = client.as_ref().ok_or(BusError::NotConnected)?;
        let update = StatusUpdate::new(task_id, status, payload);
        client.publish(
            &status_channel(task_id),
            serde_json::to_value(&update)?,
            true,
        )
    }
}
