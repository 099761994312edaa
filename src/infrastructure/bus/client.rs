//! Bus client connection.
//!
//! One TCP connection to a broker (embedded or external), a writer task
//! draining outbound frames, and a reader task dispatching deliveries to
//! registered subscription callbacks.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::error::BusError;
use crate::infrastructure::bus::protocol::{channel_matches, Frame};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Callback invoked with (channel, body) for each delivered message.
pub type MessageCallback = Arc<dyn Fn(&str, serde_json::Value) + Send + Sync>;

struct Subscription {
    pattern: String,
    callback: MessageCallback,
}

/// Client connection handle. Dropping it tears the connection down.
pub struct BusClient {
    client_id: String,
    writer_tx: mpsc::UnboundedSender<String>,
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl BusClient {
    /// Open a connection and start the session. The client identity is
    /// randomized unless supplied; sessions are always clean (nothing is
    /// remembered across connections).
    pub async fn connect(
        host: &str,
        port: u16,
        client_id: Option<String>,
    ) -> Result<Self, BusError> {
        let target = format!("{host}:{port}");
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&target))
            .await
            .map_err(|_| BusError::ConnectTimeout {
                target: target.clone(),
            })?
            .map_err(|source| BusError::Connection {
                target: target.clone(),
                source,
            })?;

        let client_id =
            client_id.unwrap_or_else(|| format!("taskmesh-agent-{}", Uuid::new_v4().simple()));

        let (read_half, mut write_half) = stream.into_split();
        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<String>();

        let writer_task = tokio::spawn(async move {
            while let Some(line) = writer_rx.recv().await {
                if write_half.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
                if write_half.write_all(b"\n").await.is_err() {
                    break;
                }
            }
        });

        let subscriptions: Arc<Mutex<Vec<Subscription>>> = Arc::default();
        let reader_subs = Arc::clone(&subscriptions);
        let reader_task = tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<Frame>(line) {
                    Ok(Frame::Message { channel, body }) => {
                        let subs = reader_subs.lock().expect("subscriptions poisoned");
                        for sub in subs
                            .iter()
                            .filter(|s| channel_matches(&s.pattern, &channel))
                        {
                            (sub.callback)(&channel, body.clone());
                        }
                    }
                    Ok(other) => {
                        debug!(?other, "ignoring non-delivery frame from broker");
                    }
                    Err(err) => {
                        warn!(error = %err, "dropping malformed frame from broker");
                    }
                }
            }
            debug!("bus connection closed by broker");
        });

        let client = Self {
            client_id,
            writer_tx,
            subscriptions,
            reader_task,
            writer_task,
        };
        client.send(&Frame::Hello {
            client_id: client.client_id.clone(),
        })?;

        info!(target = %target, client_id = %client.client_id, "connected to message broker");
        Ok(client)
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Subscribe to a channel pattern, optionally as a member of a
    /// competing-consumer group.
    pub fn subscribe(
        &self,
        pattern: &str,
        group: Option<&str>,
        callback: MessageCallback,
    ) -> Result<(), BusError> {
        self.subscriptions
            .lock()
            .expect("subscriptions poisoned")
            .push(Subscription {
                pattern: pattern.to_string(),
                callback,
            });
        self.send(&Frame::Subscribe {
            channel: pattern.to_string(),
            group: group.map(String::from),
        })
    }

    /// Publish a message; `retain` keeps it for late subscribers.
    pub fn publish(
        &self,
        channel: &str,
        body: serde_json::Value,
        retain: bool,
    ) -> Result<(), BusError> {
        self.send(&Frame::Publish {
            channel: channel.to_string(),
            body,
            retain,
        })
    }

    /// Tear the connection down. Safe to call on an already-dead session.
    pub async fn disconnect(self) {
        // Dropping the writer sender ends the writer task, which closes
        // the socket's write half; the reader then sees EOF.
        drop(self.writer_tx);
        let _ = self.writer_task.await;
        self.reader_task.abort();
        let _ = self.reader_task.await;
        debug!(client_id = %self.client_id, "bus client disconnected");
    }

    fn send(&self, frame: &Frame) -> Result<(), BusError> {
        let line = serde_json::to_string(frame)?;
        self.writer_tx.send(line).map_err(|_| BusError::Closed)
    }
}
