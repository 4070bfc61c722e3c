//! Realtime row-change subscription over the backend's websocket endpoint.
//!
//! The protocol is Phoenix-channel shaped: join a topic scoped to a single
//! order, then receive a message whenever that order's row is updated. The
//! socket is driven by a background task that forwards decoded updates over
//! an mpsc channel; dropping the [`OrderSubscription`] aborts the task and
//! closes the socket.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use portal_sete_core::{OrderId, OrderStatus};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::BackendError;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// A decoded change event for the subscribed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderUpdate {
    pub order_id: OrderId,
    pub status: OrderStatus,
}

/// Live subscription to one order's row changes.
pub struct OrderSubscription {
    rx: mpsc::Receiver<OrderUpdate>,
    task: Option<JoinHandle<()>>,
}

impl OrderSubscription {
    /// Wait for the next update. Returns `None` once the channel closes
    /// (socket dropped or task ended).
    pub async fn next(&mut self) -> Option<OrderUpdate> {
        self.rx.recv().await
    }

    /// Build a subscription from a raw channel. Used by in-process fakes.
    #[cfg(test)]
    pub(crate) fn from_channel(rx: mpsc::Receiver<OrderUpdate>) -> Self {
        Self { rx, task: None }
    }
}

impl Drop for OrderSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Open a websocket subscription for updates to a single order.
///
/// # Errors
///
/// Returns [`BackendError::Realtime`] if the socket cannot be established
/// or the join message cannot be sent.
pub(crate) async fn subscribe_order(
    base_url: &str,
    anon_key: &str,
    order_id: OrderId,
) -> Result<OrderSubscription, BackendError> {
    let ws_base = base_url
        .replacen("https://", "wss://", 1)
        .replacen("http://", "ws://", 1);
    let url = format!("{ws_base}/realtime/v1/websocket?apikey={anon_key}&vsn=1.0.0");

    let (mut socket, _) = connect_async(&url)
        .await
        .map_err(|e| BackendError::Realtime(format!("connect failed: {e}")))?;

    let join = join_message(order_id);
    socket
        .send(Message::Text(join.into()))
        .await
        .map_err(|e| BackendError::Realtime(format!("join failed: {e}")))?;

    info!(%order_id, "subscribed to order updates");

    let (tx, rx) = mpsc::channel(16);
    let task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await; // first tick fires immediately
        let mut heartbeat_ref = 2u64;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    let msg = heartbeat_message(heartbeat_ref);
                    heartbeat_ref += 1;
                    if let Err(e) = socket.send(Message::Text(msg.into())).await {
                        warn!("heartbeat failed, closing subscription: {e}");
                        break;
                    }
                }
                incoming = socket.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(update) = parse_order_update(&text) {
                                debug!(status = %update.status, "order update received");
                                if tx.send(update).await.is_err() {
                                    break; // receiver gone
                                }
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            if socket.send(Message::Pong(payload)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!("realtime socket closed");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!("realtime socket error: {e}");
                            break;
                        }
                    }
                }
            }
        }
    });

    Ok(OrderSubscription {
        rx,
        task: Some(task),
    })
}

fn join_message(order_id: OrderId) -> String {
    serde_json::json!({
        "topic": format!("realtime:order-updates-{order_id}"),
        "event": "phx_join",
        "ref": "1",
        "payload": {
            "config": {
                "postgres_changes": [{
                    "event": "UPDATE",
                    "schema": "public",
                    "table": "orders",
                    "filter": format!("id=eq.{order_id}"),
                }],
            },
        },
    })
    .to_string()
}

fn heartbeat_message(reference: u64) -> String {
    serde_json::json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "ref": reference.to_string(),
        "payload": {},
    })
    .to_string()
}

/// Decode a change event from a raw frame, ignoring protocol chatter
/// (join replies, heartbeat acks, presence messages).
fn parse_order_update(text: &str) -> Option<OrderUpdate> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;

    if value.get("event")?.as_str()? != "postgres_changes" {
        return None;
    }

    let record = value.pointer("/payload/data/record")?;
    let order_id: OrderId = record.get("id")?.as_str()?.parse().ok()?;
    let status: OrderStatus = record.get("status")?.as_str()?.parse().ok()?;

    Some(OrderUpdate { order_id, status })
}
