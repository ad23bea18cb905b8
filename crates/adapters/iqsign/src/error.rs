/// Errors talking to the iQsign service.
#[derive(Debug, thiserror::Error)]
pub enum IqsignError {
    #[error("invalid iQsign URL")]
    InvalidUrl(#[from] url::ParseError),

    #[error("iQsign request failed")]
    Transport(#[from] reqwest::Error),

    /// HTTP failure or an `ERROR` status in the reply body.
    #[error("iQsign rejected {path}: {message}")]
    Rejected { path: String, message: String },

    #[error("no iQsign session")]
    NoSession,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_rejection() {
        let err = IqsignError::Rejected {
            path: "rest/signs".to_string(),
            message: "Unauthorized".to_string(),
        };
        assert_eq!(err.to_string(), "iQsign rejected rest/signs: Unauthorized");
    }
}
