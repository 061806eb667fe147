//! HMI facility backend.
//!
//! Wires the state store, broadcast hub, simulation engine, command
//! processors and persistence gateway together and serves the status API
//! and realtime channel.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `hmi-config.yaml` (or `$HMI_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Connect to `PostgreSQL`, falling back to offline mode
//! 4. Load the initial facility state, falling back to the seed state
//! 5. Start the broadcast hub and the simulation engine
//! 6. Serve HTTP until `Ctrl-C`/`SIGTERM`

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use hmi_core::config::LoggingConfig;
use hmi_core::{
    HmiConfig, OfflineGateway, PersistenceGateway, SimulationEngine, Store, load_or_seed,
};
use hmi_db::{PostgresConfig, PostgresGateway};
use hmi_server::{AppState, Hub, SessionConfig, start_server};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::BackendError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "hmi-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the listener
/// cannot be bound.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    init_logging(&config.logging);

    info!(
        host = config.server.host,
        port = config.server.port,
        tick_interval_ms = config.simulation.tick_interval_ms,
        tanks = config.simulation.tanks.len(),
        pumps = config.simulation.pumps.len(),
        "hmi-backend starting"
    );

    let gateway = connect_gateway(&config).await;
    let initial = load_or_seed(gateway.as_ref(), &config.simulation).await;
    let store = Arc::new(Store::new(initial));

    let (hub, _hub_task) = Hub::spawn();

    let _simulation = SimulationEngine::new(
        config.simulation.clone(),
        Arc::clone(&store),
        Arc::new(hub.clone()),
    )
    .spawn();

    let state = Arc::new(AppState::new(
        store,
        hub,
        gateway,
        SessionConfig::from_server_config(&config.server),
    ));

    start_server(&config.server, state)
        .await
        .map_err(BackendError::from)?;

    info!("hmi-backend stopped");
    Ok(())
}

/// Load configuration from `$HMI_CONFIG` or `hmi-config.yaml`.
///
/// A missing file means defaults (with environment overrides).
fn load_config() -> Result<HmiConfig, BackendError> {
    let path = std::env::var_os("HMI_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    if path.exists() {
        Ok(HmiConfig::from_file(&path)?)
    } else {
        Ok(HmiConfig::from_env())
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `logging.level`.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Connect the `PostgreSQL` gateway, or fall back to offline mode when no
/// database is configured or it cannot be reached.
async fn connect_gateway(config: &HmiConfig) -> Arc<dyn PersistenceGateway> {
    let Some(pg_config) = PostgresConfig::from_database_config(&config.database) else {
        info!("No database configured, running without persistence");
        return Arc::new(OfflineGateway);
    };

    match PostgresGateway::connect(&pg_config, &config.simulation.seed_state()).await {
        Ok(gateway) => {
            info!("Persistence gateway connected");
            Arc::new(gateway)
        }
        Err(e) => {
            warn!(error = %e, "Database unavailable, running without persistence");
            Arc::new(OfflineGateway)
        }
    }
}
