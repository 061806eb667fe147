//! HTTP status API and realtime `WebSocket` channel for the HMI backend.
//!
//! - **`GET /api/v1/status`** returns the current facility snapshot
//! - **`GET /ws`** streams a full snapshot after every state change and
//!   accepts pump commands
//! - **`GET /api/v1/health`** reports liveness and the connected client count
//!
//! # Architecture
//!
//! Snapshots reach clients through the [`hub`], a single actor task that
//! owns the client registry and evicts any client whose bounded delivery
//! queue is full. Each connection runs a [`session`] with an inbound pump
//! (commands, read deadline) and an outbound pump (deliveries, pings,
//! write deadline).

pub mod error;
pub mod handlers;
pub mod hub;
pub mod router;
pub mod server;
pub mod session;
pub mod state;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use hub::{ClientConnection, ConnectionId, Hub, HubHandle, HubStopped};
pub use router::build_router;
pub use server::{ServerError, serve, shutdown_signal, start_server};
pub use session::SessionConfig;
pub use state::AppState;
