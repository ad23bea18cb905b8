//! Typed identifier newtypes.
//!
//! Identifiers in this system are minted by someone else (the hub, a vendor
//! platform, a pull device), so they wrap opaque strings rather than UUIDs.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a non-empty identifier.
            ///
            /// # Errors
            ///
            /// Returns [`ValidationError::EmptyId`] when `value` is empty.
            pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
                let value = value.into();
                if value.is_empty() {
                    return Err(ValidationError::EmptyId);
                }
                Ok(Self(value))
            }

            /// Borrow the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Vendor-scoped user identifier (the `uid` of a bridge registration).
    UserId
);

define_id!(
    /// Hub-scoped identifier of one bridge registration (`bridgeid` / `bid`).
    BridgeId
);

define_id!(
    /// Unique identifier of a [`Device`](crate::device::Device) within a bridge.
    DeviceUid
);

/// Generate a random 32-character alphanumeric secret (seeds, tokens).
#[must_use]
pub fn new_secret() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
