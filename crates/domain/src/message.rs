//! Messages sent from a bridge to the hub.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::device::Device;
use crate::id::{BridgeId, DeviceUid, UserId};

/// One envelope of the bridge → hub protocol, tagged by `command`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "UPPERCASE")]
pub enum HubMessage {
    /// Full device list of one user; the hub replaces what it knew.
    Devices {
        uid: UserId,
        bridge: String,
        bid: BridgeId,
        devices: Vec<Device>,
    },
    /// A single parameter update.
    Event {
        uid: UserId,
        bridge: String,
        bid: BridgeId,
        event: ParameterEvent,
    },
    /// Announces this bridge server and the token the hub must present.
    Initialize { auth: String },
}

impl HubMessage {
    /// The wire `command` name, for logging.
    #[must_use]
    pub fn command(&self) -> &'static str {
        match self {
            Self::Devices { .. } => "DEVICES",
            Self::Event { .. } => "EVENT",
            Self::Initialize { .. } => "INITIALIZE",
        }
    }
}

/// A parameter value change, `{TYPE: "PARAMETER", DEVICE, PARAMETER, VALUE}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "TYPE", rename = "PARAMETER", rename_all = "UPPERCASE")]
pub struct ParameterEvent {
    pub device: DeviceUid,
    pub parameter: String,
    #[serde(default)]
    pub value: Value,
}

impl ParameterEvent {
    #[must_use]
    pub fn new(device: impl Into<DeviceUid>, parameter: impl Into<String>, value: Value) -> Self {
        Self {
            device: device.into(),
            parameter: parameter.into(),
            value,
        }
    }
}

/// A hub command aimed at one device: `{deviceid, command, values}`.
///
/// Pull devices receive this shape verbatim from their command queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCommand {
    #[serde(rename = "deviceid")]
    pub device: DeviceUid,
    pub command: String,
    #[serde(default)]
    pub values: Value,
}
