//! Hub messaging service — builds the bridge → hub envelopes and applies the
//! active-sensor filter to events.

use serde_json::Value;
use spokes_domain::device::Device;
use spokes_domain::id::{BridgeId, UserId};
use spokes_domain::message::{HubMessage, ParameterEvent};
use spokes_domain::schema::Diagnostics;
use spokes_domain::sensor::ActiveSensors;

use crate::ports::HubGateway;

/// What happened to one parameter event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Delivered to the hub.
    Forwarded,
    /// The hub does not listen to this parameter.
    Suppressed,
    /// Allowed, but the hub could not be reached.
    Unreachable,
}

/// Sends envelopes for one bridge name through a [`HubGateway`].
pub struct HubService<G> {
    gateway: G,
    bridge: &'static str,
}

impl<G: Clone> Clone for HubService<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            bridge: self.bridge,
        }
    }
}

impl<G: HubGateway> HubService<G> {
    /// Create a service stamping `bridge` on every envelope.
    pub fn new(gateway: G, bridge: &'static str) -> Self {
        Self { gateway, bridge }
    }

    #[must_use]
    pub fn bridge(&self) -> &'static str {
        self.bridge
    }

    /// Push the full device list of one user.
    ///
    /// Returns `true` when the hub answered.
    #[tracing::instrument(skip(self, devices), fields(bridge = self.bridge, count = devices.len()))]
    pub async fn push_devices(&self, uid: &UserId, bid: &BridgeId, devices: Vec<Device>) -> bool {
        let message = HubMessage::Devices {
            uid: uid.clone(),
            bridge: self.bridge.to_string(),
            bid: bid.clone(),
            devices,
        };
        self.deliver(message).await.is_some()
    }

    /// Forward one event unless the active-sensor set excludes it.
    #[tracing::instrument(
        skip(self, sensors, event),
        fields(bridge = self.bridge, device = %event.device, parameter = %event.parameter)
    )]
    pub async fn route_event(
        &self,
        sensors: &ActiveSensors,
        uid: &UserId,
        bid: &BridgeId,
        event: ParameterEvent,
    ) -> RouteOutcome {
        if !sensors.allows_event(&event) {
            tracing::trace!("event suppressed by active sensor set");
            return RouteOutcome::Suppressed;
        }
        let message = HubMessage::Event {
            uid: uid.clone(),
            bridge: self.bridge.to_string(),
            bid: bid.clone(),
            event,
        };
        match self.deliver(message).await {
            Some(_) => RouteOutcome::Forwarded,
            None => RouteOutcome::Unreachable,
        }
    }

    /// Announce this server to the hub with the token it must present.
    #[tracing::instrument(skip_all)]
    pub async fn initialize(&self, auth: &str) -> Option<Value> {
        self.deliver(HubMessage::Initialize {
            auth: auth.to_string(),
        })
        .await
    }

    async fn deliver(&self, message: HubMessage) -> Option<Value> {
        let command = message.command();
        let reply = self.gateway.send(message).await;
        if reply.is_none() {
            tracing::warn!(command, "hub unreachable");
        }
        reply
    }
}

/// Log every schema element dropped while describing `device`.
pub fn log_diagnostics(device: &str, diagnostics: &mut Diagnostics) {
    for entry in diagnostics.drain() {
        tracing::debug!(device, path = %entry.path, reason = %entry.reason, "schema element dropped");
    }
}
