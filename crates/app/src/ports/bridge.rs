//! Bridge ports — what every bridge variant offers the hub, and the extra
//! protocol pull devices speak.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use spokes_domain::device::Device;
use spokes_domain::error::{BridgeError, ValidationError};
use spokes_domain::id::{BridgeId, DeviceUid, UserId};
use spokes_domain::message::{DeviceCommand, ParameterEvent};
use spokes_domain::sensor::ActiveSensor;

use crate::services::hub_service::RouteOutcome;

/// Opaque registration payload from the hub's `addbridge` request.
///
/// Its shape depends on the variant; each adapter parses what it expects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthData(pub Value);

impl AuthData {
    /// Parse the payload into a variant-specific shape.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MalformedAuthData`] when the payload does
    /// not match `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ValidationError> {
        T::deserialize(&self.0).map_err(|_| ValidationError::MalformedAuthData)
    }
}

/// `{uid, token}`: registration payload of bearer-token variants.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenAuth {
    pub uid: UserId,
    pub token: String,
}

/// Capability interface of one bridge variant.
///
/// None of these operations fail outward: unknown users, devices or
/// commands are logged and ignored, transport problems are logged and
/// produce empty results.
pub trait BridgeAdapter: Send + Sync {
    /// Bridge name used in hub envelopes (`"generic"`, `"smartthings"`, …).
    fn name(&self) -> &'static str;

    /// Register (or re-register) a user under `bridge_id`.
    ///
    /// Returns `false` only when `auth` is unusable.
    fn add_bridge(
        &self,
        auth: AuthData,
        bridge_id: BridgeId,
    ) -> impl Future<Output = bool> + Send;

    /// Re-discover the user's devices and push the list when it grew.
    fn get_devices(&self, uid: UserId) -> impl Future<Output = ()> + Send;

    /// Run (or enqueue) one device command; returns the vendor response, if any.
    fn handle_command(
        &self,
        bridge_id: BridgeId,
        uid: UserId,
        command: DeviceCommand,
    ) -> impl Future<Output = Option<Value>> + Send;

    /// Read current parameter values of one device, restricted to `names`
    /// unless it is empty.
    fn handle_parameters(
        &self,
        bridge_id: BridgeId,
        uid: UserId,
        device: DeviceUid,
        names: Vec<String>,
    ) -> impl Future<Output = Map<String, Value>> + Send;

    /// Replace the user's active-sensor set wholesale.
    fn handle_active_sensors(
        &self,
        bridge_id: BridgeId,
        uid: UserId,
        active: Vec<ActiveSensor>,
    ) -> impl Future<Output = ()> + Send;
}

impl<T: BridgeAdapter> BridgeAdapter for std::sync::Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn add_bridge(
        &self,
        auth: AuthData,
        bridge_id: BridgeId,
    ) -> impl Future<Output = bool> + Send {
        (**self).add_bridge(auth, bridge_id)
    }

    fn get_devices(&self, uid: UserId) -> impl Future<Output = ()> + Send {
        (**self).get_devices(uid)
    }

    fn handle_command(
        &self,
        bridge_id: BridgeId,
        uid: UserId,
        command: DeviceCommand,
    ) -> impl Future<Output = Option<Value>> + Send {
        (**self).handle_command(bridge_id, uid, command)
    }

    fn handle_parameters(
        &self,
        bridge_id: BridgeId,
        uid: UserId,
        device: DeviceUid,
        names: Vec<String>,
    ) -> impl Future<Output = Map<String, Value>> + Send {
        (**self).handle_parameters(bridge_id, uid, device, names)
    }

    fn handle_active_sensors(
        &self,
        bridge_id: BridgeId,
        uid: UserId,
        active: Vec<ActiveSensor>,
    ) -> impl Future<Output = ()> + Send {
        (**self).handle_active_sensors(bridge_id, uid, active)
    }
}

/// Reply to a pull device's poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "UPPERCASE")]
pub enum PingReply {
    /// Nothing to do.
    Ok,
    /// Execute this command.
    Command { command: DeviceCommand },
    /// Post the device list.
    Devices,
}

/// Device-initiated protocol of the pull variant.
///
/// `attach` → `authorize` exchanges a seed for a bearer token; every other
/// call is made by a device already resolved from that token.
pub trait PullBridge: Send + Sync {
    /// Start a handshake: issue a fresh seed, discarding any earlier state.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotFound`] when `uid` was never registered.
    fn attach(&self, uid: &UserId) -> Result<String, BridgeError>;

    /// Finish a handshake by proving knowledge of the registered secret.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotFound`] for an unknown user and
    /// [`BridgeError::Unauthorized`] for a wrong proof or missing seed.
    fn authorize(&self, uid: &UserId, patencoded: &str) -> Result<String, BridgeError>;

    /// Resolve a bearer token to its user.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Unauthorized`] for an unknown token.
    fn authenticate(&self, token: &str) -> Result<UserId, BridgeError>;

    /// Forward the posted device list to the hub.
    fn receive_devices(
        &self,
        uid: UserId,
        devices: Vec<Device>,
    ) -> impl Future<Output = Result<(), BridgeError>> + Send;

    /// Dequeue the next thing the device should do.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotFound`] for an unknown user.
    fn ping(&self, uid: &UserId) -> Result<PingReply, BridgeError>;

    /// Forward a posted parameter event through the active-sensor filter.
    fn receive_event(
        &self,
        uid: UserId,
        event: ParameterEvent,
    ) -> impl Future<Output = Result<RouteOutcome, BridgeError>> + Send;
}

impl<T: PullBridge> PullBridge for std::sync::Arc<T> {
    fn attach(&self, uid: &UserId) -> Result<String, BridgeError> {
        (**self).attach(uid)
    }

    fn authorize(&self, uid: &UserId, patencoded: &str) -> Result<String, BridgeError> {
        (**self).authorize(uid, patencoded)
    }

    fn authenticate(&self, token: &str) -> Result<UserId, BridgeError> {
        (**self).authenticate(token)
    }

    fn receive_devices(
        &self,
        uid: UserId,
        devices: Vec<Device>,
    ) -> impl Future<Output = Result<(), BridgeError>> + Send {
        (**self).receive_devices(uid, devices)
    }

    fn ping(&self, uid: &UserId) -> Result<PingReply, BridgeError> {
        (**self).ping(uid)
    }

    fn receive_event(
        &self,
        uid: UserId,
        event: ParameterEvent,
    ) -> impl Future<Output = Result<RouteOutcome, BridgeError>> + Send {
        (**self).receive_event(uid, event)
    }
}
