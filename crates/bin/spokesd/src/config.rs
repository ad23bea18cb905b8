//! spokesd settings: where to listen, where the hub is, which bridge
//! variants to serve and how they reach their vendors.
//!
//! `spokes.toml` in the working directory is optional; a missing section
//! falls back to the defaults below (HTTP on 3333, hub on
//! `localhost:3661`, every bridge enabled). `SPOKES_*` variables then win
//! over the file, and `RUST_LOG` wins over `SPOKES_LOG`.

use serde::Deserialize;
use spokes_adapter_hub_tcp::HubConfig;
use spokes_adapter_iqsign::IqsignConfig;
use spokes_adapter_smartthings::SmartThingsConfig;
use spokes_domain::schema::DEFAULT_MAX_DEPTH;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listener for hub requests and pull devices.
    pub server: ServerConfig,
    /// Where DEVICES, EVENT and INITIALIZE messages are delivered.
    pub hub: HubConfig,
    pub logging: LoggingConfig,
    pub schema: SchemaConfig,
    /// A disabled variant answers "No such bridge".
    pub bridges: BridgesConfig,
    pub smartthings: SmartThingsConfig,
    pub iqsign: IqsignConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive handed to the subscriber.
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Deepest schema nesting the normalizer descends into.
    pub max_depth: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BridgesConfig {
    pub generic: bool,
    pub smartthings: bool,
    pub iqsign: bool,
}

impl Config {
    /// Read `spokes.toml`, layer the `SPOKES_*` environment on top and
    /// check the result.
    ///
    /// # Errors
    ///
    /// Fails on an unreadable or malformed `spokes.toml`, a zero port for
    /// the listener or the hub, or a zero schema depth.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("spokes.toml")?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("SPOKES_HOST") {
            self.server.host = val;
        }
        if let Some(port) = var("SPOKES_PORT").and_then(|val| val.parse().ok()) {
            self.server.port = port;
        }
        if let Some(val) = var("SPOKES_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Some(val) = var("SPOKES_HUB_HOST") {
            self.hub.host = val;
        }
        if let Some(port) = var("SPOKES_HUB_PORT").and_then(|val| val.parse().ok()) {
            self.hub.port = port;
        }
        if let Some(val) = var("SPOKES_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server port must be non-zero".to_string(),
            ));
        }
        if self.hub.port == 0 {
            return Err(ConfigError::Validation(
                "hub port must be non-zero".to_string(),
            ));
        }
        if self.schema.max_depth == 0 {
            return Err(ConfigError::Validation(
                "schema max_depth must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// `host:port` for the hub-facing listener.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3333,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "spokesd=info,spokes=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Default for BridgesConfig {
    fn default() -> Self {
        Self {
            generic: true,
            smartthings: true,
            iqsign: true,
        }
    }
}

/// Why spokesd refused to start.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("spokes.toml is not valid TOML")]
    Parse(#[from] toml::de::Error),
    #[error("cannot read spokes.toml")]
    Io(#[from] std::io::Error),
    #[error("invalid spokes settings: {0}")]
    Validation(String),
}
