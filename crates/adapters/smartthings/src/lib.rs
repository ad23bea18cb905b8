//! # spokes-adapter-smartthings
//!
//! Bridge variant for the SmartThings platform.
//!
//! Registration hands over a personal access token. Discovery lists the
//! user's devices, resolves every capability of their `main` component
//! (cached per adapter), runs the schemas through the normalizer and
//! refines them with the device presentation. Commands are executed
//! immediately through the REST API.

mod capability;
mod client;
mod config;
mod device;
mod error;

pub use capability::{CapabilityCache, MAIN_COMPONENT, SKIPPED_CAPABILITIES};
pub use client::{CapabilityRef, SmartThingsClient, StCommand, StDevice};
pub use config::SmartThingsConfig;
pub use device::{PresentationIndex, describe_device, status_values};
pub use error::SmartThingsError;

use std::sync::Arc;

use serde_json::{Map, Value};
use spokes_app::ports::{AuthData, BridgeAdapter, HubGateway, TokenAuth};
use spokes_app::services::HubService;
use spokes_app::services::hub_service::log_diagnostics;
use spokes_app::user_store::UserStore;
use spokes_domain::device::{Device, Transition};
use spokes_domain::id::{BridgeId, DeviceUid, UserId};
use spokes_domain::message::{DeviceCommand, ParameterEvent};
use spokes_domain::schema::{Diagnostics, SchemaNormalizer};
use spokes_domain::sensor::ActiveSensor;
use tokio::task::JoinHandle;

use crate::device::CapabilitySource;

/// Bridge name stamped on hub envelopes.
pub const BRIDGE_NAME: &str = "smartthings";

struct Inner<G> {
    config: SmartThingsConfig,
    http: reqwest::Client,
    users: UserStore<SmartThingsClient>,
    hub: HubService<G>,
    capabilities: CapabilityCache,
    normalizer: SchemaNormalizer,
}

/// The SmartThings bridge. Cheap to clone; clones share all state.
pub struct SmartThingsBridge<G> {
    inner: Arc<Inner<G>>,
}

impl<G> Clone for SmartThingsBridge<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G: HubGateway + 'static> SmartThingsBridge<G> {
    pub fn new(config: SmartThingsConfig, normalizer: SchemaNormalizer, gateway: G) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                http: reqwest::Client::new(),
                users: UserStore::new(),
                hub: HubService::new(gateway, BRIDGE_NAME),
                capabilities: CapabilityCache::default(),
                normalizer,
            }),
        }
    }

    /// Devices currently known for `uid`.
    #[must_use]
    pub fn devices(&self, uid: &UserId) -> Vec<Device> {
        self.inner
            .users
            .with_user(uid, |user| user.devices.clone())
            .unwrap_or_default()
    }

    /// Spawn the periodic value refresh, if configured.
    #[must_use]
    pub fn spawn_refresh(&self) -> Option<JoinHandle<()>> {
        let period = self.inner.config.refresh_interval()?;
        let inner = Arc::clone(&self.inner);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                for uid in inner.users.uids() {
                    inner.update_values(&uid).await;
                }
            }
        }))
    }
}

impl<G: HubGateway> Inner<G> {
    #[tracing::instrument(skip(self))]
    async fn discover(&self, uid: &UserId) {
        let Some(client) = self.users.session(uid) else {
            tracing::warn!("discovery for unknown user");
            return;
        };
        let listed = match client.list_devices().await {
            Ok(listed) => listed,
            Err(err) => {
                tracing::warn!(error = %err, "device listing failed");
                return;
            }
        };

        let mut discovered = Vec::with_capacity(listed.len());
        for st_device in &listed {
            if let Some(device) = self.describe(&client, st_device).await {
                discovered.push(device);
            }
        }

        let Some(merged) = self.users.merge_devices(uid, discovered) else {
            return;
        };
        tracing::info!(count = merged.devices.len(), changed = merged.changed, "discovery finished");
        if merged.changed {
            self.hub
                .push_devices(uid, &merged.bridge_id, merged.devices)
                .await;
        }
        self.update_values(uid).await;
    }

    async fn describe(&self, client: &SmartThingsClient, st_device: &StDevice) -> Option<Device> {
        let presentation = match client.device_presentation(&st_device.device_id).await {
            Ok(presentation) => PresentationIndex::new(&presentation),
            Err(err) => {
                tracing::debug!(device = %st_device.device_id, error = %err, "no presentation");
                PresentationIndex::default()
            }
        };

        let mut resolved = Vec::new();
        for component in st_device
            .components
            .iter()
            .filter(|c| c.id == MAIN_COMPONENT)
        {
            for cap in &component.capabilities {
                if let Some(definition) = self.capabilities.resolve(client, cap).await {
                    resolved.push((component.id.as_str(), cap.id.as_str(), definition));
                }
            }
        }
        let sources: Vec<_> = resolved
            .iter()
            .map(|(component, id, definition)| CapabilitySource {
                component,
                id,
                definition: definition.as_ref(),
            })
            .collect();

        let mut diagnostics = Diagnostics::default();
        let described = describe_device(
            st_device,
            BRIDGE_NAME,
            &sources,
            &presentation,
            &self.normalizer,
            &mut diagnostics,
        );
        log_diagnostics(&st_device.device_id, &mut diagnostics);
        match described {
            Ok(device) => Some(device),
            Err(err) => {
                tracing::warn!(device = %st_device.device_id, error = %err, "device skipped");
                None
            }
        }
    }

    /// Read the current values of every known device and route them as events.
    async fn update_values(&self, uid: &UserId) {
        let Some(client) = self.users.session(uid) else {
            return;
        };
        let device_ids: Vec<DeviceUid> = self
            .users
            .with_user(uid, |user| user.devices.iter().map(|d| d.uid.clone()).collect())
            .unwrap_or_default();

        for device in device_ids {
            let status = match client.device_status(device.as_str()).await {
                Ok(status) => status,
                Err(err) => {
                    tracing::warn!(%device, error = %err, "status read failed");
                    continue;
                }
            };
            let Some((bridge_id, sensors)) = self.users.routing(uid) else {
                return;
            };
            for (parameter, state) in status_values(&status, &[]) {
                let value = state.get("value").cloned().unwrap_or(Value::Null);
                let event = ParameterEvent::new(device.clone(), parameter, value);
                self.hub.route_event(&sensors, uid, &bridge_id, event).await;
            }
        }
    }
}

/// Hub command values as a positional argument list.
///
/// Objects are ordered by the transition's parameter list; arrays pass
/// through; a scalar becomes a single argument.
fn command_arguments(transition: &Transition, values: Value) -> Vec<Value> {
    match values {
        Value::Null => Vec::new(),
        Value::Array(args) => args,
        Value::Object(mut named) => transition
            .parameters
            .iter()
            .filter_map(|p| named.remove(&p.name))
            .collect(),
        scalar => vec![scalar],
    }
}

impl<G: HubGateway + 'static> BridgeAdapter for SmartThingsBridge<G> {
    fn name(&self) -> &'static str {
        BRIDGE_NAME
    }

    #[tracing::instrument(skip(self, auth))]
    async fn add_bridge(&self, auth: AuthData, bridge_id: BridgeId) -> bool {
        let auth: TokenAuth = match auth.parse() {
            Ok(auth) => auth,
            Err(err) => {
                tracing::warn!(error = %err, "rejected SmartThings registration");
                return false;
            }
        };
        let client = match SmartThingsClient::new(
            self.inner.http.clone(),
            &self.inner.config.api_url,
            auth.token,
        ) {
            Ok(client) => client,
            Err(err) => {
                tracing::error!(error = %err, "cannot build SmartThings client");
                return false;
            }
        };
        let created = self
            .inner
            .users
            .upsert_session(auth.uid.clone(), bridge_id, client);
        tracing::info!(uid = %auth.uid, created, "SmartThings user registered");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.discover(&auth.uid).await });
        true
    }

    async fn get_devices(&self, uid: UserId) {
        self.inner.discover(&uid).await;
    }

    #[tracing::instrument(skip(self, command), fields(device = %command.device, command = %command.command))]
    async fn handle_command(
        &self,
        _bridge_id: BridgeId,
        uid: UserId,
        command: DeviceCommand,
    ) -> Option<Value> {
        let Some(client) = self.inner.users.session(&uid) else {
            tracing::warn!("command for unknown user");
            return None;
        };
        let Some(transition) = self
            .inner
            .users
            .device(&uid, &command.device)
            .and_then(|d| d.find_transition(&command.command).cloned())
        else {
            tracing::warn!("command for unknown device or transition");
            return None;
        };
        let st_command = StCommand {
            component: transition
                .origin
                .component
                .clone()
                .unwrap_or_else(|| MAIN_COMPONENT.to_string()),
            capability: transition.origin.capability.clone().unwrap_or_default(),
            command: command.command.clone(),
            arguments: command_arguments(&transition, command.values),
        };
        match client.execute(command.device.as_str(), &[st_command]).await {
            Ok(reply) => Some(reply),
            Err(err) => {
                tracing::warn!(error = %err, "command execution failed");
                None
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn handle_parameters(
        &self,
        _bridge_id: BridgeId,
        uid: UserId,
        device: DeviceUid,
        names: Vec<String>,
    ) -> Map<String, Value> {
        let Some(client) = self.inner.users.session(&uid) else {
            tracing::warn!("parameter read for unknown user");
            return Map::new();
        };
        match client.device_status(device.as_str()).await {
            Ok(status) => status_values(&status, &names),
            Err(err) => {
                tracing::warn!(error = %err, "status read failed");
                Map::new()
            }
        }
    }

    #[tracing::instrument(skip(self, active), fields(count = active.len()))]
    async fn handle_active_sensors(&self, _bridge_id: BridgeId, uid: UserId, active: Vec<ActiveSensor>) {
        if !self.inner.users.replace_active_sensors(&uid, active) {
            tracing::warn!("active sensors for unknown user");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use spokes_domain::device::{Parameter, ParameterKind};
    use spokes_domain::message::HubMessage;
    use std::future::Future;
    use std::sync::Mutex;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Clone, Default)]
    struct RecordingGateway {
        sent: Arc<Mutex<Vec<HubMessage>>>,
    }

    impl RecordingGateway {
        fn sent(&self) -> Vec<HubMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl HubGateway for RecordingGateway {
        fn send(&self, message: HubMessage) -> impl Future<Output = Option<Value>> + Send {
            self.sent.lock().unwrap().push(message);
            async { Some(json!({"status": "OK"})) }
        }
    }

    fn alice() -> UserId {
        UserId::from("alice")
    }

    async fn mount_get(server: &MockServer, at: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn platform() -> MockServer {
        let server = MockServer::start().await;
        mount_get(
            &server,
            "/devices",
            json!({"items": [{
                "deviceId": "d1",
                "name": "dimmer",
                "label": "Hall",
                "components": [
                    {"id": "main", "capabilities": [
                        {"id": "switchLevel", "version": 1},
                        {"id": "healthCheck", "version": 1}
                    ]},
                    {"id": "aux", "capabilities": [{"id": "battery", "version": 1}]}
                ]
            }]}),
        )
        .await;
        mount_get(&server, "/devices/d1/presentation", json!({})).await;
        mount_get(
            &server,
            "/capabilities/switchLevel/1",
            json!({
                "id": "switchLevel",
                "status": "live",
                "attributes": {
                    "level": {"schema": {"properties": {"value": {"type": "integer", "minimum": 0, "maximum": 100}}}}
                },
                "commands": {
                    "setLevel": {"arguments": [
                        {"name": "level", "schema": {"type": "integer"}},
                        {"name": "rate", "schema": {"type": "integer"}}
                    ]}
                }
            }),
        )
        .await;
        mount_get(
            &server,
            "/devices/d1/status",
            json!({"components": {"main": {"switchLevel": {"level": {"value": 40, "unit": "%"}}}}}),
        )
        .await;
        server
    }

    fn bridge(server: &MockServer, gateway: &RecordingGateway) -> SmartThingsBridge<RecordingGateway> {
        let config = SmartThingsConfig {
            api_url: server.uri(),
            ..SmartThingsConfig::default()
        };
        SmartThingsBridge::new(config, SchemaNormalizer::default(), gateway.clone())
    }

    fn register(bridge: &SmartThingsBridge<RecordingGateway>, server: &MockServer) {
        let client = SmartThingsClient::new(reqwest::Client::new(), &server.uri(), "pat").unwrap();
        bridge
            .inner
            .users
            .upsert_session(alice(), BridgeId::from("b1"), client);
    }

    #[tokio::test]
    async fn should_discover_push_devices_and_route_values() {
        let server = platform().await;
        let gateway = RecordingGateway::default();
        let bridge = bridge(&server, &gateway);
        register(&bridge, &server);

        bridge.get_devices(alice()).await;

        let devices = bridge.devices(&alice());
        assert_eq!(devices.len(), 1);
        assert!(devices[0].find_parameter("level").is_some());
        assert!(devices[0].find_transition("setLevel").is_some());

        let sent = gateway.sent();
        assert_eq!(sent.len(), 2);
        assert!(matches!(&sent[0], HubMessage::Devices { devices, .. } if devices.len() == 1));
        let HubMessage::Event { event, .. } = &sent[1] else {
            panic!("expected EVENT");
        };
        assert_eq!(event.parameter, "level");
        assert_eq!(event.value, json!(40));
    }

    #[tokio::test]
    async fn should_not_push_unchanged_device_list() {
        let server = platform().await;
        let gateway = RecordingGateway::default();
        let bridge = bridge(&server, &gateway);
        register(&bridge, &server);

        bridge.get_devices(alice()).await;
        bridge.get_devices(alice()).await;

        let pushes = gateway
            .sent()
            .iter()
            .filter(|m| matches!(m, HubMessage::Devices { .. }))
            .count();
        assert_eq!(pushes, 1);
        assert_eq!(bridge.devices(&alice()).len(), 1);
    }

    #[tokio::test]
    async fn should_suppress_values_outside_active_sensors() {
        let server = platform().await;
        let gateway = RecordingGateway::default();
        let bridge = bridge(&server, &gateway);
        register(&bridge, &server);
        bridge
            .handle_active_sensors(
                BridgeId::from("b1"),
                alice(),
                vec![ActiveSensor {
                    device: DeviceUid::from("d1"),
                    parameter: "switch".to_string(),
                }],
            )
            .await;

        bridge.get_devices(alice()).await;

        assert!(gateway
            .sent()
            .iter()
            .all(|m| !matches!(m, HubMessage::Event { .. })));
    }

    #[tokio::test]
    async fn should_execute_command_with_ordered_arguments() {
        let server = platform().await;
        Mock::given(method("POST"))
            .and(path("/devices/d1/commands"))
            .and(body_json(json!({"commands": [{
                "component": "main",
                "capability": "switchLevel",
                "command": "setLevel",
                "arguments": [40, 2]
            }]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .expect(1)
            .mount(&server)
            .await;
        let gateway = RecordingGateway::default();
        let bridge = bridge(&server, &gateway);
        register(&bridge, &server);
        bridge.get_devices(alice()).await;

        let reply = bridge
            .handle_command(
                BridgeId::from("b1"),
                alice(),
                DeviceCommand {
                    device: DeviceUid::from("d1"),
                    command: "setLevel".to_string(),
                    values: json!({"rate": 2, "level": 40}),
                },
            )
            .await;

        assert_eq!(reply, Some(json!({"results": []})));
    }

    #[tokio::test]
    async fn should_ignore_unknown_command() {
        let server = platform().await;
        let gateway = RecordingGateway::default();
        let bridge = bridge(&server, &gateway);
        register(&bridge, &server);
        bridge.get_devices(alice()).await;

        let reply = bridge
            .handle_command(
                BridgeId::from("b1"),
                alice(),
                DeviceCommand {
                    device: DeviceUid::from("d1"),
                    command: "selfDestruct".to_string(),
                    values: Value::Null,
                },
            )
            .await;

        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn should_read_requested_parameters() {
        let server = platform().await;
        let gateway = RecordingGateway::default();
        let bridge = bridge(&server, &gateway);
        register(&bridge, &server);

        let values = bridge
            .handle_parameters(
                BridgeId::from("b1"),
                alice(),
                DeviceUid::from("d1"),
                vec!["level".to_string()],
            )
            .await;

        assert_eq!(values["level"]["value"], 40);
    }

    #[tokio::test]
    async fn should_reject_registration_without_token() {
        let server = MockServer::start().await;
        let gateway = RecordingGateway::default();
        let bridge = bridge(&server, &gateway);

        let ok = bridge
            .add_bridge(AuthData(json!({"uid": "alice"})), BridgeId::from("b1"))
            .await;

        assert!(!ok);
        assert!(bridge.devices(&alice()).is_empty());
    }

    #[test]
    fn should_order_named_arguments_by_transition() {
        let transition = Transition::new(
            "setColor",
            vec![
                Parameter::new("hue", ParameterKind::Real { min: None, max: None }),
                Parameter::new("saturation", ParameterKind::Real { min: None, max: None }),
            ],
        );
        assert_eq!(
            command_arguments(&transition, json!({"saturation": 50, "hue": 10})),
            vec![json!(10), json!(50)]
        );
        assert_eq!(command_arguments(&transition, json!([1, 2])), vec![json!(1), json!(2)]);
        assert_eq!(command_arguments(&transition, json!("on")), vec![json!("on")]);
        assert!(command_arguments(&transition, Value::Null).is_empty());
    }
}
