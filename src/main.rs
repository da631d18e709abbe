//! Sensor Hub Server
//!
//! Run with: cargo run --bin sensor-hub
//!
//! # Configuration
//!
//! Read from `config.toml` in the usual locations (see [`Config::load_default`]),
//! or from the path given as the first argument. Environment variables:
//! - `SENSOR_HUB_HOST`: Host to bind to (default: 0.0.0.0)
//! - `SENSOR_HUB_PORT`: Port to listen on (default: 8082)
//! - `SENSOR_HUB_TIMEZONE`: Timezone for envelope timestamps (default: Europe/Berlin)
//! - `SENSOR_HUB_LOG_LEVEL` / `SENSOR_HUB_LOG_FORMAT`: Logging (default: info / pretty)
//! - `RUST_LOG`: Overrides the log filter entirely

use anyhow::Context;
use sensor_hub::api::{serve, AppState};
use sensor_hub::config::{Config, ConfigLoad, LoggingConfig};
use sensor_hub::websocket::Hub;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let loaded = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => ConfigLoad {
            config: Config::load_with_env(&path)
                .with_context(|| format!("loading {}", path.display()))?,
            source: Some(path),
            errors: Vec::new(),
        },
        None => Config::load_default(),
    };

    init_tracing(&loaded.config.logging);

    tracing::info!("Starting sensor hub v{}", env!("CARGO_PKG_VERSION"));
    for error in &loaded.errors {
        tracing::warn!(error = %error, "Skipped config file");
    }
    match &loaded.source {
        Some(path) => tracing::info!("Loaded config from {:?}", path),
        None => tracing::info!("Using default config with environment overrides"),
    }

    let config = loaded.config;

    let hub_config = config.hub.to_hub_config()?;
    tracing::info!(
        timezone = %hub_config.clock.timezone().name(),
        equipment_id = %hub_config.equipment_id,
        "Broadcast hub configured"
    );

    let (hub, hub_task) = Hub::spawn(hub_config);
    let state = AppState::new(hub, config.server.clone());

    serve(state).await?;

    // serve() stops the hub once the server has drained
    hub_task.await.context("broadcast hub task panicked")?;
    tracing::info!("Sensor hub stopped");

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("sensor_hub={},tower_http=info", logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);

    if logging.is_json() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
