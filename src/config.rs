//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::clock::{StampClock, DEFAULT_TIMEZONE};
use crate::websocket::{EquipmentId, HubConfig};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub hub: HubSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP/WebSocket server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Broadcast hub configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HubSettings {
    /// IANA timezone used for envelope timestamps
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Tag recorded for connections that register without identifying themselves
    #[serde(default = "default_equipment_id")]
    pub equipment_id: String,
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_equipment_id() -> String {
    EquipmentId::PLACEHOLDER.to_string()
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            equipment_id: default_equipment_id(),
        }
    }
}

impl HubSettings {
    /// Validate the settings and build the hub configuration
    pub fn to_hub_config(&self) -> Result<HubConfig, ConfigError> {
        let clock = StampClock::from_name(&self.timezone)
            .map_err(|_| ConfigError::Timezone(self.timezone.clone()))?;

        Ok(HubConfig {
            clock,
            equipment_id: EquipmentId::new(self.equipment_id.clone()),
        })
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment.
    ///
    /// Nothing is logged here; this runs before the subscriber is installed.
    /// The caller reports [`ConfigLoad::source`] and [`ConfigLoad::errors`].
    pub fn load_default() -> ConfigLoad {
        let config_paths: Vec<PathBuf> = [
            dirs::config_dir().map(|p| p.join("sensor-hub").join("config.toml")),
            Some(PathBuf::from("/etc/sensor-hub/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self::load_first(&config_paths)
    }

    /// Load the first existing candidate that parses, collecting failures
    /// from the ones that don't
    pub fn load_first(candidates: &[PathBuf]) -> ConfigLoad {
        let mut errors = Vec::new();

        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_with_env(path) {
                Ok(config) => {
                    return ConfigLoad {
                        config,
                        source: Some(path.clone()),
                        errors,
                    }
                }
                Err(e) => errors.push(e),
            }
        }

        ConfigLoad {
            config: Self::from_env(),
            source: None,
            errors,
        }
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("SENSOR_HUB_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SENSOR_HUB_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        if let Some(timezone) = lookup("SENSOR_HUB_TIMEZONE") {
            self.hub.timezone = timezone;
        }

        if let Some(level) = lookup("SENSOR_HUB_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("SENSOR_HUB_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Outcome of searching the default config locations
#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    /// File the config came from; `None` means defaults plus environment
    pub source: Option<PathBuf>,
    /// Candidate files that exist but could not be loaded
    pub errors: Vec<ConfigError>,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Unknown timezone: {0}")]
    Timezone(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Sensor Hub Configuration
#
# Environment variables override these settings:
# - SENSOR_HUB_HOST
# - SENSOR_HUB_PORT
# - SENSOR_HUB_TIMEZONE
# - SENSOR_HUB_LOG_LEVEL
# - SENSOR_HUB_LOG_FORMAT

[server]
# Address to bind the HTTP/WebSocket server to
host = "0.0.0.0"
port = 8082

# Allowed CORS origins (empty = any origin)
cors_origins = []

[hub]
# Timezone used for the "time" field of every broadcast
timezone = "Europe/Berlin"

# Tag recorded for connections that register without identifying themselves
equipment_id = "1"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
