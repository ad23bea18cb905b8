//! iQsign adapter configuration.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IqsignConfig {
    /// Root of the sign service; REST paths are resolved under it.
    pub base_url: String,
}

impl Default for IqsignConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3335/".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_fall_back_to_default_url() {
        let config: IqsignConfig = toml::from_str("").unwrap();
        assert_eq!(config.base_url, IqsignConfig::default().base_url);
    }

    #[test]
    fn should_deserialize_from_toml() {
        let config: IqsignConfig = toml::from_str(r#"base_url = "http://signs.local/""#).unwrap();
        assert_eq!(config.base_url, "http://signs.local/");
    }
}
