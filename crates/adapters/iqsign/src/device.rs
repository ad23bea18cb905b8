//! Canonical descriptors for signs.
//!
//! A sign is described with the same attribute/command capability shape
//! the platform bridges receive, so it goes through the normalizer like
//! any vendor schema.

use serde_json::{Map, Value, json};
use spokes_domain::device::Device;
use spokes_domain::error::BridgeError;
use spokes_domain::id::DeviceUid;
use spokes_domain::schema::{Diagnostics, SchemaNormalizer, attributes_of, commands_of};

use crate::client::{SavedSign, Sign};

pub const UID_PREFIX: &str = "iQsign_";
pub const CURRENT_SIGN: &str = "currentSign";
pub const SAVED_SIGNS: &str = "savedSigns";
pub const SET_SIGN: &str = "setSign";

#[must_use]
pub fn sign_uid(signid: u64) -> DeviceUid {
    DeviceUid::from(format!("{UID_PREFIX}{signid}"))
}

/// Sign id encoded in a device UID, if it is one of ours.
#[must_use]
pub fn sign_id(uid: &DeviceUid) -> Option<u64> {
    uid.as_str().strip_prefix(UID_PREFIX)?.parse().ok()
}

fn capability(saved: &[SavedSign]) -> Value {
    let names: Vec<&str> = saved.iter().map(|s| s.name.as_str()).collect();
    json!({
        "attributes": {
            CURRENT_SIGN: {"schema": {"properties": {"value": {"type": "string"}}}},
            SAVED_SIGNS: {"schema": {"properties": {"value": {
                "type": "array",
                "items": {"type": "string"}
            }}}}
        },
        "commands": {
            SET_SIGN: {"arguments": [
                {"name": "setTo", "schema": {"title": "Sign to display", "type": "string", "enum": names}},
                {"name": "otherText", "schema": {"title": "Additional text", "type": "string"}}
            ]}
        }
    })
}

/// # Errors
///
/// Returns [`BridgeError::Validation`] if the resulting device is invalid.
pub fn describe_sign(
    sign: &Sign,
    bridge: &str,
    saved: &[SavedSign],
    normalizer: &SchemaNormalizer,
    diagnostics: &mut Diagnostics,
) -> Result<Device, BridgeError> {
    let definition = capability(saved);
    let mut builder = Device::builder()
        .uid(sign_uid(sign.signid))
        .bridge(bridge)
        .name(format!("iQsign {}", sign.name))
        .label(sign.name.as_str());
    for (name, attribute) in attributes_of(&definition) {
        if let Some(param) = normalizer.attribute_parameter(name, attribute, diagnostics) {
            builder = builder.parameter(param);
        }
    }
    for (key, command) in commands_of(&definition) {
        if let Some(transition) = normalizer.command_transition(key, command, diagnostics) {
            builder = builder.transition(transition);
        }
    }
    builder.build()
}

/// Current values of `sign`, restricted to `names` unless it is empty.
#[must_use]
pub fn sign_values(sign: &Sign, saved: &[SavedSign], names: &[String]) -> Map<String, Value> {
    let wanted = |name: &str| names.is_empty() || names.iter().any(|n| n == name);
    let mut values = Map::new();
    if wanted(CURRENT_SIGN) {
        values.insert(CURRENT_SIGN.to_string(), json!(sign.current()));
    }
    if wanted(SAVED_SIGNS) {
        let saved: Vec<&str> = saved.iter().map(|s| s.name.as_str()).collect();
        values.insert(SAVED_SIGNS.to_string(), json!(saved));
    }
    values
}
