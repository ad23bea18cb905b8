//! Hub connection configuration.

use std::time::Duration;

use serde::Deserialize;

/// Where the hub listens and how long one exchange may take.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Hub hostname or IP address.
    pub host: String,
    /// Hub socket port.
    pub port: u16,
    /// Upper bound on connect + write + read, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3661,
            timeout_ms: 10_000,
        }
    }
}

impl HubConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
