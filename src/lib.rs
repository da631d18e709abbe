//! # Sensor Hub
//!
//! Real-time broadcast hub for sensor readings. Clients hold a WebSocket open;
//! every reading a producer submits is stamped with the time in a fixed
//! timezone and pushed to all currently-open connections.
//!
//! ## Modules
//!
//! - [`websocket`]: Connection registry, broadcast hub and connection lifecycle
//! - [`clock`]: `HH:MM:SS` timestamps in a named timezone
//! - [`api`]: HTTP server the hub attaches to (Axum)
//! - [`config`]: TOML + environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sensor_hub::websocket::{Hub, HubConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (hub, _task) = Hub::spawn(HubConfig::default());
//!
//!     // Connections register themselves through the `/ws` handler;
//!     // producers just broadcast.
//!     let report = hub.broadcast(&serde_json::json!({"temp": 21.5})).await?;
//!     println!("sent to {} clients at {}", report.sent, report.time);
//!
//!     hub.shutdown();
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod clock;
pub mod config;
pub mod websocket;

pub use api::{build_router, serve, serve_on, ApiError, AppState};

pub use clock::{ClockError, StampClock};

pub use config::{Config, ConfigError, ConfigLoad, HubSettings, LoggingConfig, ServerConfig};

pub use websocket::{
    websocket_handler, BroadcastReport, ConnectionId, Envelope, EquipmentId, Hub, HubConfig,
    HubError, HubHandle, Registry, Transport,
};
