//! SmartThings adapter error types.

/// Errors talking to the SmartThings REST API.
#[derive(Debug, thiserror::Error)]
pub enum SmartThingsError {
    #[error("invalid SmartThings API URL")]
    InvalidUrl(#[from] url::ParseError),

    #[error("SmartThings request failed")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("SmartThings API returned HTTP {status} for {path}")]
    Status { status: u16, path: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_status_error() {
        let err = SmartThingsError::Status {
            status: 404,
            path: "devices/x/status".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "SmartThings API returned HTTP 404 for devices/x/status"
        );
    }
}
