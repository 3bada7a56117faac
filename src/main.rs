//! ==============================================================================
//! main.rs - telemetry hub entry point
//! ==============================================================================
//!
//! purpose:
//!     the "hub" that remote sensor nodes report to. nodes register once,
//!     push a full reading every cycle, and anyone can list what is known.
//!
//! responsibilities:
//!     - load configuration (config/hub.toml)
//!     - initialize tracing
//!     - create the registry + recorder once and share them with handlers
//!     - serve the http api until ctrl-c
//!
//! relationships:
//!     - uses: config.rs (hub.toml schema)
//!     - uses: api.rs (router, AppState)
//!     - writes: <data_dir>/data_<device>.csv (via recorder.rs / storage.rs)
//!
//! architecture:
//!
//!     ┌─────────────┐  POST /update   ┌──────────────────────────────────┐
//!     │ sensor node │ ──────────────> │ api.rs                           │
//!     └─────────────┘                 │   ├─ registry.rs  (live state)   │
//!                                     │   └─ recorder.rs ─> storage.rs   │
//!     ┌─────────────┐  /get_list      │                    (csv per dev) │
//!     │   client    │ ──────────────> │                                  │
//!     └─────────────┘                 └──────────────────────────────────┘
//!
//! ==============================================================================

use anyhow::{Context, Result};
use telemetry_hub::{create_router, AppState, HubConfig};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // startup banner
    println!("===========================================================");
    println!("  Telemetry Hub");
    println!("  register / update / unregister / get_list");
    println!("===========================================================");

    // step 1: load configuration
    let config = HubConfig::load_or_default()?;
    config.print_summary();

    // step 2: logging (RUST_LOG overrides the configured level)
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("Invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // step 3: shared state
    let state = AppState::from_config(&config);
    state
        .recorder
        .log()
        .ensure_dir()
        .await
        .with_context(|| {
            format!(
                "Failed to create data directory {}",
                config.storage.data_dir.display()
            )
        })?;
    tracing::info!(
        metrics = ?state.registry.metrics().iter().map(|m| m.key()).collect::<Vec<_>>(),
        data_dir = %state.recorder.log().data_dir().display(),
        policy = ?state.recorder.policy(),
        "Registry ready"
    );

    // step 4: serve until ctrl-c
    let app = create_router(state);
    let listener = TcpListener::bind(config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    tracing::info!("Hub listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Hub stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c");
    }
}
