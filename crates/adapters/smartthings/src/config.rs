//! SmartThings adapter configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the SmartThings bridge.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmartThingsConfig {
    /// Base URL of the platform REST API.
    pub api_url: String,
    /// Period of the background value refresh, in seconds. `0` disables it.
    pub refresh_interval_secs: u64,
}

impl Default for SmartThingsConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.smartthings.com/v1/".to_string(),
            refresh_interval_secs: 0,
        }
    }
}

impl SmartThingsConfig {
    #[must_use]
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_disable_refresh_by_default() {
        let config = SmartThingsConfig::default();
        assert_eq!(config.api_url, "https://api.smartthings.com/v1/");
        assert!(config.refresh_interval().is_none());
    }

    #[test]
    fn should_deserialize_from_toml() {
        let config: SmartThingsConfig = toml::from_str(
            r#"
            api_url = "http://localhost:9000/"
            refresh_interval_secs = 300
        "#,
        )
        .unwrap();
        assert_eq!(config.api_url, "http://localhost:9000/");
        assert_eq!(config.refresh_interval(), Some(Duration::from_secs(300)));
    }
}
