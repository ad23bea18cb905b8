//! Common error types used across the workspace.
//!
//! Vendor and hub adapters keep their own error enums and never let them
//! cross a port: those failures are logged where they happen and surface
//! as `None` or an empty result.

/// Top-level error shared by ports and services.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// Authentication failed. The cause is deliberately not exposed.
    #[error("unauthorized")]
    Unauthorized,

    #[error("no such bridge: {0}")]
    UnknownBridge(String),
}

/// Domain invariant violations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("identifier must not be empty")]
    EmptyId,

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("malformed auth data")]
    MalformedAuthData,
}

/// A lookup found nothing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{entity} not found: {id}")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_not_found_with_entity_and_id() {
        let err = NotFoundError {
            entity: "User",
            id: "alice".to_string(),
        };
        assert_eq!(err.to_string(), "User not found: alice");
    }

    #[test]
    fn should_convert_validation_error_into_bridge_error() {
        let err: BridgeError = ValidationError::EmptyId.into();
        assert!(matches!(
            err,
            BridgeError::Validation(ValidationError::EmptyId)
        ));
    }

    #[test]
    fn should_not_leak_cause_in_unauthorized_message() {
        assert_eq!(BridgeError::Unauthorized.to_string(), "unauthorized");
    }
}
