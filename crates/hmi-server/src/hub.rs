//! Broadcast hub: the single owner of the connected-client registry.
//!
//! One actor task drains a FIFO request queue (register, unregister,
//! broadcast, client count) against a plain `HashMap`. Because every
//! registry change goes through that one task, requests are totally
//! ordered and the registry needs no lock.
//!
//! Each registered connection has a bounded delivery queue. A broadcast
//! `try_send`s the shared payload to every queue; a connection whose queue
//! is full (or whose receiver is gone) is dropped from the registry on the
//! spot. Dropping the registry's sender is what closes the connection: the
//! session's outbound pump sees its queue end and sends a Close frame.
//!
//! Broadcasts carry the store version of their snapshot. Producers publish
//! after releasing the store lock, so a slow producer can submit an older
//! snapshot after a newer one; the hub drops anything not newer than the
//! last payload it delivered, and clients never see state go backwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use hmi_core::{Snapshot, StatePublisher};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identity of one realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The hub-side half of a connection: its id and the sending end of its
/// bounded delivery queue.
#[derive(Debug)]
pub struct ClientConnection {
    id: ConnectionId,
    outbox: mpsc::Sender<Arc<str>>,
}

impl ClientConnection {
    /// Create a connection with a delivery queue of `capacity` messages.
    ///
    /// Returns the connection (to hand to [`HubHandle::register`]) and the
    /// receiving end for the session's outbound pump.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (outbox, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                id: ConnectionId::new(),
                outbox,
            },
            rx,
        )
    }

    /// This connection's identifier.
    pub const fn id(&self) -> ConnectionId {
        self.id
    }
}

/// The hub is no longer running.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("broadcast hub has stopped")]
pub struct HubStopped;

enum HubRequest {
    Register(ClientConnection),
    Unregister(ConnectionId),
    Broadcast { version: u64, payload: Arc<str> },
    ClientCount(oneshot::Sender<usize>),
}

/// The hub actor. Construct with [`Hub::new`] and drive with [`Hub::run`],
/// or use [`Hub::spawn`].
pub struct Hub {
    registry: HashMap<ConnectionId, mpsc::Sender<Arc<str>>>,
    requests: mpsc::UnboundedReceiver<HubRequest>,
    last_version: Option<u64>,
}

impl Hub {
    /// Create a hub and the handle used to talk to it.
    pub fn new() -> (Self, HubHandle) {
        let (tx, requests) = mpsc::unbounded_channel();
        (
            Self {
                registry: HashMap::new(),
                requests,
                last_version: None,
            },
            HubHandle { requests: tx },
        )
    }

    /// Create a hub and run it on a background task.
    pub fn spawn() -> (HubHandle, JoinHandle<()>) {
        let (hub, handle) = Self::new();
        (handle, tokio::spawn(hub.run()))
    }

    /// Process requests until every [`HubHandle`] has been dropped.
    pub async fn run(mut self) {
        info!("broadcast hub started");
        while let Some(request) = self.requests.recv().await {
            self.handle(request);
        }
        info!(clients = self.registry.len(), "broadcast hub stopped");
    }

    fn handle(&mut self, request: HubRequest) {
        match request {
            HubRequest::Register(conn) => {
                self.registry.insert(conn.id, conn.outbox);
                debug!(connection = %conn.id, clients = self.registry.len(), "client registered");
            }
            HubRequest::Unregister(id) => {
                if self.registry.remove(&id).is_some() {
                    debug!(connection = %id, clients = self.registry.len(), "client unregistered");
                }
            }
            HubRequest::Broadcast { version, payload } => {
                if let Some(last) = self.last_version
                    && version <= last
                {
                    debug!(version, last, "dropping stale snapshot");
                    return;
                }
                self.last_version = Some(version);
                self.broadcast(&payload);
            }
            HubRequest::ClientCount(reply) => {
                let _ = reply.send(self.registry.len());
            }
        }
    }

    fn broadcast(&mut self, payload: &Arc<str>) {
        self.registry
            .retain(|id, outbox| match outbox.try_send(Arc::clone(payload)) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(connection = %id, "delivery queue full, evicting slow client");
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(connection = %id, "delivery queue closed, removing client");
                    false
                }
            });
    }
}

/// Cloneable handle for submitting requests to the hub.
///
/// All submissions are non-blocking; they are queued and processed by the
/// hub task in order.
#[derive(Debug, Clone)]
pub struct HubHandle {
    requests: mpsc::UnboundedSender<HubRequest>,
}

impl HubHandle {
    /// Add a connection. It is eligible for the next broadcast processed
    /// after this request.
    pub fn register(&self, conn: ClientConnection) {
        self.submit(HubRequest::Register(conn));
    }

    /// Remove a connection and close its delivery queue. Removing an
    /// absent connection is a no-op.
    pub fn unregister(&self, id: ConnectionId) {
        self.submit(HubRequest::Unregister(id));
    }

    /// Deliver a pre-serialized payload to every registered connection,
    /// unless a payload with the same or a later `version` was already
    /// delivered.
    pub fn broadcast(&self, version: u64, payload: Arc<str>) {
        self.submit(HubRequest::Broadcast { version, payload });
    }

    /// Number of registered connections, as seen by the hub task.
    ///
    /// # Errors
    ///
    /// Returns [`HubStopped`] if the hub task is no longer running.
    pub async fn client_count(&self) -> Result<usize, HubStopped> {
        let (reply, rx) = oneshot::channel();
        if self.requests.send(HubRequest::ClientCount(reply)).is_err() {
            return Err(HubStopped);
        }
        rx.await.or(Err(HubStopped))
    }

    fn submit(&self, request: HubRequest) {
        if self.requests.send(request).is_err() {
            debug!("broadcast hub stopped, request dropped");
        }
    }
}

impl StatePublisher for HubHandle {
    fn publish(&self, snapshot: &Snapshot) {
        match serde_json::to_string(&snapshot.state) {
            Ok(json) => self.broadcast(snapshot.version, Arc::from(json)),
            Err(e) => warn!(error = %e, "failed to serialize facility snapshot"),
        }
    }
}
