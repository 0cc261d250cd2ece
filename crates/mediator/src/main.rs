//! `registry-mediator` binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Settings`] from environment variables.
//! 2. Initialise the telemetry pipeline.
//! 3. Read `mediator.json` and seed the runtime config (side cache first,
//!    then `config_<env>.json`).
//! 4. Build the router; every route sits behind the admission gate.
//! 5. Register with the hub, merge its config, check prerequisites, bind.
//! 6. Apply hub-pushed configs until the server stops.
//!
//! Any failure is logged and ends the process with a non-zero status.

mod auth;
mod config;
mod hub;
mod lifecycle;
mod server;
mod telemetry;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::Router;
use tracing::{error, info};

use config::{ConfigLoader, ConfigStore, FileConfigLoader, Settings};
use hub::OpenHimClient;
use lifecycle::{LifecycleController, RequiredKeys};
use server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = ?e, "mediator stopped");
        // Telemetry may not be up yet; write to stderr as well.
        eprintln!("ERROR: {e:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let settings = Settings::from_env()?;

    telemetry::init_telemetry(
        settings.otel_exporter_otlp_endpoint.as_deref(),
        &settings.log_level,
    )?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        profile = %settings.profile(),
        config_dir = %settings.config_dir.display(),
        "registry-mediator starting"
    );

    let loader = FileConfigLoader::new(&settings.config_dir, settings.profile());
    let mediator = loader.load_mediator().context("failed to load mediator.json")?;
    let store = ConfigStore::new(loader.load_seed().context("failed to load runtime config")?);

    let router = server::router::build(AppState::new(store.clone()), Router::new());

    let mut lifecycle = LifecycleController::new(
        Arc::new(OpenHimClient::new().context("failed to build hub client")?),
        Arc::new(loader),
        Arc::new(RequiredKeys::default()),
        store,
        mediator,
        Duration::from_secs(settings.heartbeat_interval_secs),
    );

    let running = lifecycle
        .start(router, |running| {
            info!(addr = %running.local_addr, "accepting requests");
        })
        .await?;
    lifecycle.run(running).await?;
    Ok(())
}
