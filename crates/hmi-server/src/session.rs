//! Realtime client sessions over `WebSocket`.
//!
//! Clients connect to `GET /ws`. Each connection registers a bounded
//! delivery queue with the hub and then runs two pumps in one task:
//!
//! - **inbound**: reads frames under a read deadline, decodes text frames
//!   as command envelopes and dispatches them. Undecodable frames are
//!   logged and skipped. Any frame, pongs included, restarts the deadline.
//!   Each dispatch runs on its own task, so a session that ends while a
//!   command is in flight still runs that command to completion.
//! - **outbound**: drains the delivery queue and sends a ping every
//!   `ping_interval`, each write under its own write deadline. When the
//!   queue ends (eviction or unregister) it sends a Close frame.
//!
//! Whichever pump finishes first ends the session; the other is dropped.
//! The session then unregisters exactly once and the socket is dropped.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use hmi_core::CommandProcessor;
use hmi_core::config::ServerConfig;
use hmi_types::Command;
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, timeout};
use tracing::{debug, info, warn};

use crate::hub::{ClientConnection, ConnectionId};
use crate::state::AppState;

/// Per-connection queue size and liveness timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Delivery queue capacity. A client this far behind is evicted.
    pub queue_capacity: usize,
    /// Maximum silence from the client before the session ends.
    pub read_deadline: Duration,
    /// Maximum time a single frame write may take.
    pub write_deadline: Duration,
    /// Period between liveness pings. Must be shorter than the read
    /// deadline so pongs keep the session alive.
    pub ping_interval: Duration,
}

impl SessionConfig {
    /// Take session settings from the `server` config section.
    pub const fn from_server_config(config: &ServerConfig) -> Self {
        Self {
            queue_capacity: config.client_queue_capacity,
            read_deadline: config.read_deadline(),
            write_deadline: config.write_deadline(),
            ping_interval: config.ping_interval(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_server_config(&ServerConfig::default())
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    ReadTimeout,
    ClientClosed,
    StreamEnded,
    ReadFailed,
    WriteFailed,
    WriteTimeout,
    QueueClosed,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::ReadTimeout => "read deadline exceeded",
            Self::ClientClosed => "client sent close",
            Self::StreamEnded => "stream ended",
            Self::ReadFailed => "read failed",
            Self::WriteFailed => "write failed",
            Self::WriteTimeout => "write deadline exceeded",
            Self::QueueClosed => "delivery queue closed",
        };
        f.write_str(reason)
    }
}

/// Upgrade an HTTP request to a realtime session.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_session(socket, state))
}

async fn run_session(socket: WebSocket, state: Arc<AppState>) {
    let config = state.session;
    let (conn, outbox) = ClientConnection::new(config.queue_capacity);
    let id = conn.id();
    state.hub.register(conn);
    info!(connection = %id, "client connected");

    let (sink, stream) = socket.split();
    let end = tokio::select! {
        end = inbound(stream, Arc::clone(&state.commands), config.read_deadline, id) => end,
        end = outbound(sink, outbox, &config) => end,
    };

    state.hub.unregister(id);
    info!(connection = %id, reason = %end, "client disconnected");
}

async fn inbound(
    mut stream: SplitStream<WebSocket>,
    commands: Arc<CommandProcessor>,
    read_deadline: Duration,
    id: ConnectionId,
) -> SessionEnd {
    loop {
        let frame = match timeout(read_deadline, stream.next()).await {
            Err(_) => return SessionEnd::ReadTimeout,
            Ok(None) => return SessionEnd::StreamEnded,
            Ok(Some(Err(e))) => {
                debug!(connection = %id, error = %e, "websocket read error");
                return SessionEnd::ReadFailed;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => match Command::decode(text.as_str()) {
                Ok(command) => {
                    debug!(
                        connection = %id,
                        kind = command.kind(),
                        pump_id = command.pump_id(),
                        "command received"
                    );
                    dispatch(&commands, command, id).await;
                }
                Err(e) => warn!(connection = %id, error = %e, "dropping undecodable message"),
            },
            Message::Close(_) => return SessionEnd::ClientClosed,
            Message::Binary(_) => debug!(connection = %id, "ignoring binary frame"),
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
}

/// Run one command to completion on a detached task and wait for it.
///
/// Dropping the returned future does not cancel the command.
async fn dispatch(commands: &Arc<CommandProcessor>, command: Command, id: ConnectionId) {
    let commands = Arc::clone(commands);
    let task = tokio::spawn(async move { commands.dispatch(command).await });
    match task.await {
        Ok(outcome) => debug!(connection = %id, ?outcome, "command dispatched"),
        Err(e) => warn!(connection = %id, error = %e, "command task failed"),
    }
}

async fn outbound(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbox: mpsc::Receiver<Arc<str>>,
    config: &SessionConfig,
) -> SessionEnd {
    let mut ping = tokio::time::interval(config.ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of a tokio interval completes immediately.
    ping.tick().await;

    loop {
        let message = tokio::select! {
            payload = outbox.recv() => match payload {
                Some(json) => Message::Text(json.as_ref().into()),
                None => {
                    let _ = timeout(config.write_deadline, sink.send(Message::Close(None))).await;
                    return SessionEnd::QueueClosed;
                }
            },
            _ = ping.tick() => Message::Ping(Bytes::new()),
        };

        match timeout(config.write_deadline, sink.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => return SessionEnd::WriteFailed,
            Err(_) => return SessionEnd::WriteTimeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_server_config() {
        let config = SessionConfig::default();
        assert_eq!(config.queue_capacity, 256);
        assert_eq!(config.read_deadline, Duration::from_secs(60));
        assert_eq!(config.write_deadline, Duration::from_secs(10));
        assert_eq!(config.ping_interval, Duration::from_secs(45));
        assert!(config.ping_interval < config.read_deadline);
    }
}
