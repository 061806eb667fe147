//! Shared application state for the HTTP and `WebSocket` handlers.

use std::sync::Arc;

use hmi_core::{CommandProcessor, PersistenceGateway, Store};

use crate::hub::HubHandle;
use crate::session::SessionConfig;

/// Everything a request handler or session needs.
pub struct AppState {
    /// The authoritative facility state.
    pub store: Arc<Store>,
    /// Handle to the broadcast hub.
    pub hub: HubHandle,
    /// Processor for commands arriving over realtime sessions.
    pub commands: Arc<CommandProcessor>,
    /// Per-connection queue and timing settings.
    pub session: SessionConfig,
}

impl AppState {
    /// Assemble state whose command processor persists through `gateway`
    /// and publishes through `hub`.
    pub fn new(
        store: Arc<Store>,
        hub: HubHandle,
        gateway: Arc<dyn PersistenceGateway>,
        session: SessionConfig,
    ) -> Self {
        let commands = CommandProcessor::new(Arc::clone(&store), gateway, Arc::new(hub.clone()));
        Self {
            store,
            hub,
            commands: Arc::new(commands),
            session,
        }
    }
}
