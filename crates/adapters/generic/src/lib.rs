//! # spokes-adapter-generic
//!
//! Bridge variant for devices that cannot be reached, only polled.
//!
//! A device attaches with the uid the hub registered, proves it knows the
//! registered secret, and then polls with its bearer token. Hub commands are
//! queued until the next poll; device lists and events are posted by the
//! device and relayed to the hub.

mod queue;
mod session;

pub use queue::CommandQueue;
pub use session::{AuthorizeError, Handshake, PatAuth, PullSession, hash};

use std::time::Duration;

use serde_json::{Map, Value};
use spokes_app::ports::{AuthData, BridgeAdapter, HubGateway, PingReply, PullBridge};
use spokes_app::services::{HubService, RouteOutcome};
use spokes_app::user_store::{BridgeUser, UserStore};
use spokes_domain::device::Device;
use spokes_domain::error::{BridgeError, NotFoundError};
use spokes_domain::id::{BridgeId, DeviceUid, UserId};
use spokes_domain::message::{DeviceCommand, ParameterEvent};
use spokes_domain::sensor::ActiveSensor;
use spokes_domain::time;

/// Bridge name stamped on hub envelopes.
pub const BRIDGE_NAME: &str = "generic";

/// Queuing for a device silent this long is logged as a warning.
const IDLE_AFTER: Duration = Duration::from_secs(300);

/// The pull bridge: handshake state, queues and device lists per user.
pub struct GenericBridge<G> {
    users: UserStore<PullSession>,
    hub: HubService<G>,
}

fn user_not_found(uid: &UserId) -> BridgeError {
    NotFoundError {
        entity: "User",
        id: uid.to_string(),
    }
    .into()
}

impl<G: HubGateway> GenericBridge<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            users: UserStore::new(),
            hub: HubService::new(gateway, BRIDGE_NAME),
        }
    }

    /// Number of commands waiting for `uid`'s next poll.
    #[must_use]
    pub fn pending_commands(&self, uid: &UserId) -> usize {
        self.users
            .with_user(uid, |user| user.session.queue.len())
            .unwrap_or_default()
    }
}

impl<G: HubGateway> BridgeAdapter for GenericBridge<G> {
    fn name(&self) -> &'static str {
        BRIDGE_NAME
    }

    #[tracing::instrument(skip(self, auth))]
    async fn add_bridge(&self, auth: AuthData, bridge_id: BridgeId) -> bool {
        let auth: PatAuth = match auth.parse() {
            Ok(auth) => auth,
            Err(err) => {
                tracing::warn!(error = %err, "rejected pull registration");
                return false;
            }
        };
        tracing::info!(uid = %auth.uid, "pull user registered");
        self.users.insert(BridgeUser::new(
            auth.uid,
            bridge_id,
            PullSession::new(auth.pat),
        ));
        true
    }

    /// Pull devices cannot be queried; ask the device on its next poll.
    #[tracing::instrument(skip(self))]
    async fn get_devices(&self, uid: UserId) {
        if self
            .users
            .with_user(&uid, |user| user.session.need_devices = true)
            .is_none()
        {
            tracing::warn!("device refresh for unknown user");
        }
    }

    #[tracing::instrument(skip(self, command), fields(device = %command.device, command = %command.command))]
    async fn handle_command(
        &self,
        bridge_id: BridgeId,
        uid: UserId,
        command: DeviceCommand,
    ) -> Option<Value> {
        let queued = self.users.with_user(&uid, |user| {
            let known = user
                .find_device(&command.device)
                .is_some_and(|d| d.find_transition(&command.command).is_some());
            known.then(|| {
                user.session.queue.push(command);
                user.session.idle_for(time::now())
            })
        });
        let Some(queued) = queued else {
            tracing::warn!("command for unknown user");
            return None;
        };
        let Some(idle) = queued else {
            tracing::warn!("command for unknown device or transition");
            return None;
        };
        match idle {
            Some(idle) if idle < IDLE_AFTER => tracing::debug!("command queued"),
            idle => tracing::warn!(
                idle_secs = idle.map(|d| d.as_secs()),
                "command queued for a device that is not polling"
            ),
        }
        None
    }

    /// There is no synchronous read path to a pull device.
    async fn handle_parameters(
        &self,
        _bridge_id: BridgeId,
        uid: UserId,
        device: DeviceUid,
        _names: Vec<String>,
    ) -> Map<String, Value> {
        tracing::debug!(%uid, %device, "parameter read not supported by pull devices");
        Map::new()
    }

    #[tracing::instrument(skip(self, active), fields(count = active.len()))]
    async fn handle_active_sensors(&self, _bridge_id: BridgeId, uid: UserId, active: Vec<ActiveSensor>) {
        if !self.users.replace_active_sensors(&uid, active) {
            tracing::warn!("active sensors for unknown user");
        }
    }
}

impl<G: HubGateway> PullBridge for GenericBridge<G> {
    fn attach(&self, uid: &UserId) -> Result<String, BridgeError> {
        let seed = self
            .users
            .with_user(uid, |user| user.session.attach())
            .ok_or_else(|| user_not_found(uid))?;
        tracing::debug!(%uid, "pull device attached");
        Ok(seed)
    }

    fn authorize(&self, uid: &UserId, patencoded: &str) -> Result<String, BridgeError> {
        let outcome = self
            .users
            .with_user(uid, |user| user.session.authorize(patencoded))
            .ok_or_else(|| user_not_found(uid))?;
        match outcome {
            Ok(token) => {
                tracing::info!(%uid, "pull device authorized");
                Ok(token)
            }
            Err(reason) => {
                tracing::warn!(%uid, ?reason, "pull device authorization refused");
                Err(BridgeError::Unauthorized)
            }
        }
    }

    fn authenticate(&self, token: &str) -> Result<UserId, BridgeError> {
        self.users
            .find_user(
                |user| user.session.token() == Some(token),
                |user| user.uid.clone(),
            )
            .ok_or(BridgeError::Unauthorized)
    }

    #[tracing::instrument(skip(self, devices), fields(count = devices.len()))]
    async fn receive_devices(&self, uid: UserId, devices: Vec<Device>) -> Result<(), BridgeError> {
        let merged = self
            .users
            .merge_devices(&uid, devices)
            .ok_or_else(|| user_not_found(&uid))?;
        self.hub
            .push_devices(&uid, &merged.bridge_id, merged.devices)
            .await;
        self.users
            .with_user(&uid, |user| user.session.need_devices = false);
        Ok(())
    }

    fn ping(&self, uid: &UserId) -> Result<PingReply, BridgeError> {
        self.users
            .with_user(uid, |user| {
                let session = &mut user.session;
                session.record_poll();
                if let Some(command) = session.queue.pop() {
                    PingReply::Command { command }
                } else if session.need_devices {
                    PingReply::Devices
                } else {
                    PingReply::Ok
                }
            })
            .ok_or_else(|| user_not_found(uid))
    }

    #[tracing::instrument(skip(self, event), fields(device = %event.device, parameter = %event.parameter))]
    async fn receive_event(
        &self,
        uid: UserId,
        event: ParameterEvent,
    ) -> Result<RouteOutcome, BridgeError> {
        let (bridge_id, sensors) = self
            .users
            .routing(&uid)
            .ok_or_else(|| user_not_found(&uid))?;
        Ok(self.hub.route_event(&sensors, &uid, &bridge_id, event).await)
    }
}
