//! Hub gateway error types.

use std::time::Duration;

/// Ways one hub exchange can fail.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("failed to encode hub message")]
    Encode(#[source] serde_json::Error),

    #[error("failed to connect to hub")]
    Connect(#[source] std::io::Error),

    #[error("hub connection failed")]
    Io(#[source] std::io::Error),

    /// The reply was not a JSON document.
    #[error("malformed hub reply")]
    Decode(#[source] serde_json::Error),

    #[error("hub did not answer within {0:?}")]
    Timeout(Duration),
}
