//! Embedded broker engine.
//!
//! A TCP listener with an in-process pub/sub engine attached to every
//! accepted connection. Retained messages are replayed on subscribe;
//! shared-group subscribers are competing consumers served round-robin.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::error::BusError;
use crate::infrastructure::bus::protocol::{channel_matches, Frame};

/// One live subscription registered with the engine.
struct Subscriber {
    conn_id: u64,
    channel: String,
    group: Option<String>,
    tx: mpsc::UnboundedSender<String>,
}

/// Pub/sub routing state shared by every connection task.
#[derive(Default)]
struct Engine {
    subscribers: Vec<Subscriber>,
    retained: HashMap<String, serde_json::Value>,
    rotation: HashMap<String, usize>,
}

impl Engine {
    /// Register a subscription and return the retained messages it should
    /// immediately receive.
    fn subscribe(
        &mut self,
        conn_id: u64,
        channel: String,
        group: Option<String>,
        tx: mpsc::UnboundedSender<String>,
    ) -> Vec<String> {
        let replay: Vec<String> = self
            .retained
            .iter()
            .filter(|(retained_channel, _)| channel_matches(&channel, retained_channel))
            .filter_map(|(retained_channel, body)| {
                encode_message(retained_channel, body.clone())
            })
            .collect();

        self.subscribers.push(Subscriber {
            conn_id,
            channel,
            group,
            tx,
        });
        replay
    }

    /// Route one publish: broadcast subscribers each get a copy; for every
    /// shared group with matching members, exactly one member is picked by
    /// rotation.
    fn publish(&mut self, channel: &str, body: &serde_json::Value, retain: bool) {
        if retain {
            self.retained.insert(channel.to_string(), body.clone());
        }

        let Some(line) = encode_message(channel, body.clone()) else {
            return;
        };

        let mut groups: HashMap<&str, Vec<&Subscriber>> = HashMap::new();
        for sub in self
            .subscribers
            .iter()
            .filter(|s| channel_matches(&s.channel, channel))
        {
            match sub.group.as_deref() {
                None => {
                    let _ = sub.tx.send(line.clone());
                }
                Some(group) => groups.entry(group).or_default().push(sub),
            }
        }

        for (group, members) in groups {
            let counter = self.rotation.entry(group.to_string()).or_insert(0);
            let chosen = &members[*counter % members.len()];
            *counter = counter.wrapping_add(1);
            let _ = chosen.tx.send(line.clone());
        }
    }

    fn drop_connection(&mut self, conn_id: u64) {
        self.subscribers.retain(|s| s.conn_id != conn_id);
    }
}

fn encode_message(channel: &str, body: serde_json::Value) -> Option<String> {
    serde_json::to_string(&Frame::Message {
        channel: channel.to_string(),
        body,
    })
    .ok()
}

/// Handle to a running embedded broker.
pub struct Broker {
    port: u16,
    state: Arc<Mutex<Engine>>,
    accept_task: JoinHandle<()>,
}

impl Broker {
    /// Bind the listening socket and start accepting connections.
    pub async fn bind(port: u16) -> Result<Self, BusError> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|source| BusError::Bind { port, source })?;
        let port = listener
            .local_addr()
            .map(|addr| addr.port())
            .unwrap_or(port);

        let state: Arc<Mutex<Engine>> = Arc::default();
        let accept_state = Arc::clone(&state);
        let accept_task = tokio::spawn(async move {
            let mut next_conn_id: u64 = 0;
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        next_conn_id += 1;
                        debug!(conn_id = next_conn_id, %peer, "broker connection accepted");
                        tokio::spawn(handle_connection(
                            next_conn_id,
                            stream,
                            Arc::clone(&accept_state),
                        ));
                    }
                    Err(err) => {
                        warn!(error = %err, "broker accept failed");
                    }
                }
            }
        });

        info!(port, "message broker listening");
        Ok(Self {
            port,
            state,
            accept_task,
        })
    }

    /// Actual bound port (useful when bound to port 0 in tests).
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Close the listening socket, then the engine, in that order.
    pub async fn shutdown(self) {
        self.accept_task.abort();
        let _ = self.accept_task.await;
        self.state
            .lock()
            .expect("broker engine poisoned")
            .subscribers
            .clear();
        info!(port = self.port, "message broker stopped");
    }
}

async fn handle_connection(conn_id: u64, stream: TcpStream, state: Arc<Mutex<Engine>>) {
    let (read_half, mut write_half) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if write_half.write_all(b"\n").await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(read_half).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Frame>(line) {
            Ok(Frame::Hello { client_id }) => {
                debug!(conn_id, client_id, "client session started");
            }
            Ok(Frame::Subscribe { channel, group }) => {
                let replay = state
                    .lock()
                    .expect("broker engine poisoned")
                    .subscribe(conn_id, channel, group, tx.clone());
                for retained in replay {
                    let _ = tx.send(retained);
                }
            }
            Ok(Frame::Publish {
                channel,
                body,
                retain,
            }) => {
                state
                    .lock()
                    .expect("broker engine poisoned")
                    .publish(&channel, &body, retain);
            }
            Ok(Frame::Message { .. }) => {
                // Delivery frames only flow broker-to-client.
                debug!(conn_id, "ignoring message frame from client");
            }
            Err(err) => {
                debug!(conn_id, error = %err, "dropping malformed frame");
            }
        }
    }

    state
        .lock()
        .expect("broker engine poisoned")
        .drop_connection(conn_id);
    writer.abort();
    debug!(conn_id, "broker connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> (mpsc::UnboundedSender<String>, mpsc::UnboundedReceiver<String>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn broadcast_reaches_every_plain_subscriber() {
        let mut engine = Engine::default();
        let (tx_a, mut rx_a) = sender();
        let (tx_b, mut rx_b) = sender();
        engine.subscribe(1, "ch".to_string(), None, tx_a);
        engine.subscribe(2, "ch".to_string(), None, tx_b);

        engine.publish("ch", &serde_json::json!({"n": 1}), false);

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn shared_group_gets_exactly_one_delivery_per_publish() {
        let mut engine = Engine::default();
        let (tx_a, mut rx_a) = sender();
        let (tx_b, mut rx_b) = sender();
        engine.subscribe(1, "ch".to_string(), Some("workers".to_string()), tx_a);
        engine.subscribe(2, "ch".to_string(), Some("workers".to_string()), tx_b);

        for n in 0..10 {
            engine.publish("ch", &serde_json::json!({ "n": n }), false);
        }

        let mut count = 0;
        while rx_a.try_recv().is_ok() {
            count += 1;
        }
        while rx_b.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 10, "each publish delivered to exactly one member");
    }

    #[test]
    fn retained_message_replays_on_subscribe() {
        let mut engine = Engine::default();
        engine.publish("ch", &serde_json::json!({"kept": true}), true);

        let (tx, _rx) = sender();
        let replay = engine.subscribe(1, "ch".to_string(), None, tx);
        assert_eq!(replay.len(), 1);
        assert!(replay[0].contains("kept"));
    }

    #[test]
    fn dropping_a_connection_unsubscribes_it() {
        let mut engine = Engine::default();
        let (tx, mut rx) = sender();
        engine.subscribe(7, "ch".to_string(), None, tx);
        engine.drop_connection(7);

        engine.publish("ch", &serde_json::json!({}), false);
        assert!(rx.try_recv().is_err());
    }
}
