//! # spokes-adapter-iqsign
//!
//! Bridge variant for the iQsign sign service. Registration hands over a
//! login code which is exchanged for a service session on first use; each
//! sign the user owns becomes one device with a `setSign` transition.

mod client;
mod config;
mod device;
mod error;

pub use client::{Authorization, IqsignClient, SavedSign, Sign};
pub use config::IqsignConfig;
pub use device::{CURRENT_SIGN, SAVED_SIGNS, SET_SIGN, describe_sign, sign_id, sign_uid};
pub use error::IqsignError;

use std::sync::Arc;

use serde_json::{Map, Value};
use spokes_app::ports::{AuthData, BridgeAdapter, HubGateway, TokenAuth};
use spokes_app::services::HubService;
use spokes_app::services::hub_service::log_diagnostics;
use spokes_app::user_store::UserStore;
use spokes_domain::device::Device;
use spokes_domain::id::{BridgeId, DeviceUid, UserId};
use spokes_domain::message::{DeviceCommand, ParameterEvent};
use spokes_domain::schema::{Diagnostics, SchemaNormalizer};
use spokes_domain::sensor::ActiveSensor;

use crate::device::sign_values;

pub const BRIDGE_NAME: &str = "iqsign";

/// Per-user service credentials.
#[derive(Debug, Clone)]
pub struct IqsignAccount {
    client: IqsignClient,
    session: Option<String>,
}

struct Inner<G> {
    config: IqsignConfig,
    http: reqwest::Client,
    users: UserStore<IqsignAccount>,
    hub: HubService<G>,
    normalizer: SchemaNormalizer,
}

/// The iQsign bridge. Clones share all state.
pub struct IqsignBridge<G> {
    inner: Arc<Inner<G>>,
}

impl<G> Clone for IqsignBridge<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G: HubGateway> IqsignBridge<G> {
    pub fn new(config: IqsignConfig, normalizer: SchemaNormalizer, gateway: G) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                http: reqwest::Client::new(),
                users: UserStore::new(),
                hub: HubService::new(gateway, BRIDGE_NAME),
                normalizer,
            }),
        }
    }

    #[must_use]
    pub fn devices(&self, uid: &UserId) -> Vec<Device> {
        self.inner
            .users
            .with_user(uid, |user| user.devices.clone())
            .unwrap_or_default()
    }
}

impl<G: HubGateway> Inner<G> {
    /// The user's client and a live session id, authorizing if needed.
    async fn session(&self, uid: &UserId) -> Result<(IqsignClient, String), IqsignError> {
        let account = self.users.session(uid).ok_or(IqsignError::NoSession)?;
        if let Some(session) = account.session {
            return Ok((account.client, session));
        }
        let auth = account.client.authorize().await?;
        tracing::info!(%uid, "iQsign session established");
        self.users.with_user(uid, |user| {
            user.session.session = Some(auth.session.clone());
        });
        Ok((account.client, auth.session))
    }

    /// Drop the cached session so the next call authorizes again.
    fn forget_session(&self, uid: &UserId) {
        self.users.with_user(uid, |user| user.session.session = None);
    }

    async fn fetch(
        &self,
        uid: &UserId,
    ) -> Result<(IqsignClient, String, Vec<Sign>, Vec<SavedSign>), IqsignError> {
        let (client, session) = self.session(uid).await?;
        let signs = client.signs(&session).await?;
        let saved = client.saved_signs(&session).await?;
        Ok((client, session, signs, saved))
    }

    #[tracing::instrument(skip(self))]
    async fn discover(&self, uid: &UserId) {
        let (_, _, signs, saved) = match self.fetch(uid).await {
            Ok(fetched) => fetched,
            Err(err) => {
                tracing::warn!(error = %err, "sign listing failed");
                return;
            }
        };

        let mut discovered = Vec::with_capacity(signs.len());
        for sign in &signs {
            let mut diagnostics = Diagnostics::default();
            let described =
                describe_sign(sign, BRIDGE_NAME, &saved, &self.normalizer, &mut diagnostics);
            log_diagnostics(sign.name.as_str(), &mut diagnostics);
            match described {
                Ok(device) => discovered.push(device),
                Err(err) => tracing::warn!(sign = sign.signid, error = %err, "sign skipped"),
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
        for sign in &signs {
            self.report(uid, sign_uid(sign.signid), sign.current()).await;
        }
    }

    async fn report(&self, uid: &UserId, device: DeviceUid, shown: &str) {
        let Some((bridge_id, sensors)) = self.users.routing(uid) else {
            return;
        };
        let event = ParameterEvent::new(device, CURRENT_SIGN, Value::from(shown));
        self.hub.route_event(&sensors, uid, &bridge_id, event).await;
    }
}

/// `(setTo, otherText)` from named or positional command values.
fn set_sign_arguments(values: &Value) -> Option<(String, String)> {
    let (set_to, other) = match values {
        Value::Object(named) => (named.get("setTo"), named.get("otherText")),
        Value::Array(args) => (args.first(), args.get(1)),
        _ => (None, None),
    };
    let set_to = set_to.and_then(Value::as_str)?.to_string();
    let other = other.and_then(Value::as_str).unwrap_or_default().to_string();
    Some((set_to, other))
}

impl<G: HubGateway + 'static> BridgeAdapter for IqsignBridge<G> {
    fn name(&self) -> &'static str {
        BRIDGE_NAME
    }

    #[tracing::instrument(skip(self, auth))]
    async fn add_bridge(&self, auth: AuthData, bridge_id: BridgeId) -> bool {
        let auth: TokenAuth = match auth.parse() {
            Ok(auth) => auth,
            Err(err) => {
                tracing::warn!(error = %err, "rejected iQsign registration");
                return false;
            }
        };
        let client = match IqsignClient::new(
            self.inner.http.clone(),
            &self.inner.config.base_url,
            auth.token,
        ) {
            Ok(client) => client,
            Err(err) => {
                tracing::error!(error = %err, "cannot build iQsign client");
                return false;
            }
        };
        let account = IqsignAccount {
            client,
            session: None,
        };
        let created = self
            .inner
            .users
            .upsert_session(auth.uid.clone(), bridge_id, account);
        tracing::info!(uid = %auth.uid, created, "iQsign user registered");

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
        let known = self
            .inner
            .users
            .device(&uid, &command.device)
            .is_some_and(|d| d.find_transition(&command.command).is_some());
        if !known || command.command != SET_SIGN {
            tracing::warn!("command for unknown device or transition");
            return None;
        }
        let Some(signid) = sign_id(&command.device) else {
            tracing::warn!("device is not a sign");
            return None;
        };
        let Some((set_to, other)) = set_sign_arguments(&command.values) else {
            tracing::warn!("setSign without a sign name");
            return None;
        };

        let (client, session) = match self.inner.session(&uid).await {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = %err, "no iQsign session");
                return None;
            }
        };
        match client.set_sign(&session, signid, &set_to, &other).await {
            Ok(reply) => {
                self.inner.report(&uid, command.device, &set_to).await;
                Some(reply)
            }
            Err(err) => {
                tracing::warn!(error = %err, "setSign dropped");
                if matches!(err, IqsignError::Rejected { .. }) {
                    self.inner.forget_session(&uid);
                }
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
        let Some(signid) = sign_id(&device) else {
            return Map::new();
        };
        match self.inner.fetch(&uid).await {
            Ok((_, _, signs, saved)) => signs
                .iter()
                .find(|s| s.signid == signid)
                .map(|sign| sign_values(sign, &saved, &names))
                .unwrap_or_default(),
            Err(err) => {
                tracing::warn!(error = %err, "sign read failed");
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

    async fn service() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/authorize"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status": "OK", "session": "s1"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/signs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "OK",
                "data": [{"signid": 3, "name": "Office", "displayname": "Busy"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/namedsigns"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "OK",
                "data": [{"name": "Busy"}, {"name": "Away"}]
            })))
            .mount(&server)
            .await;
        server
    }

    fn bridge(server: &MockServer, gateway: &RecordingGateway) -> IqsignBridge<RecordingGateway> {
        let config = IqsignConfig {
            base_url: server.uri(),
        };
        let bridge = IqsignBridge::new(config, SchemaNormalizer::default(), gateway.clone());
        let client = IqsignClient::new(reqwest::Client::new(), &server.uri(), "code").unwrap();
        bridge.inner.users.upsert_session(
            alice(),
            BridgeId::from("b1"),
            IqsignAccount {
                client,
                session: None,
            },
        );
        bridge
    }

    fn set_sign(values: Value) -> DeviceCommand {
        DeviceCommand {
            device: DeviceUid::from("iQsign_3"),
            command: SET_SIGN.to_string(),
            values,
        }
    }

    #[tokio::test]
    async fn should_discover_signs_and_report_current_sign() {
        let server = service().await;
        let gateway = RecordingGateway::default();
        let bridge = bridge(&server, &gateway);

        bridge.get_devices(alice()).await;

        let devices = bridge.devices(&alice());
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].uid.as_str(), "iQsign_3");

        let sent = gateway.sent();
        assert!(matches!(&sent[0], HubMessage::Devices { bridge, .. } if bridge == "iqsign"));
        let HubMessage::Event { event, .. } = &sent[1] else {
            panic!("expected EVENT");
        };
        assert_eq!(event.parameter, CURRENT_SIGN);
        assert_eq!(event.value, json!("Busy"));
    }

    #[tokio::test]
    async fn should_set_sign_and_emit_event() {
        let server = service().await;
        Mock::given(method("POST"))
            .and(path("/rest/sign/setto"))
            .and(body_json(json!({"session": "s1", "signid": 3, "value": "Away", "other": ""})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "OK"})))
            .expect(1)
            .mount(&server)
            .await;
        let gateway = RecordingGateway::default();
        let bridge = bridge(&server, &gateway);
        bridge.get_devices(alice()).await;

        let reply = bridge
            .handle_command(BridgeId::from("b1"), alice(), set_sign(json!({"setTo": "Away"})))
            .await;

        assert_eq!(reply, Some(json!({"status": "OK"})));
        let Some(HubMessage::Event { event, .. }) = gateway.sent().pop() else {
            panic!("expected EVENT");
        };
        assert_eq!(event.value, json!("Away"));
    }

    #[tokio::test]
    async fn should_drop_command_when_service_rejects_session() {
        let server = service().await;
        Mock::given(method("POST"))
            .and(path("/rest/sign/setto"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"status": "ERROR", "message": "Unauthorized"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        let gateway = RecordingGateway::default();
        let bridge = bridge(&server, &gateway);
        bridge.get_devices(alice()).await;
        let before = gateway.sent().len();

        let reply = bridge
            .handle_command(BridgeId::from("b1"), alice(), set_sign(json!(["Away", "soon"])))
            .await;

        assert!(reply.is_none());
        assert_eq!(gateway.sent().len(), before);
        let account = bridge.inner.users.session(&alice()).unwrap();
        assert!(account.session.is_none());
    }

    #[tokio::test]
    async fn should_ignore_command_for_unknown_sign() {
        let server = service().await;
        let gateway = RecordingGateway::default();
        let bridge = bridge(&server, &gateway);

        let reply = bridge
            .handle_command(BridgeId::from("b1"), alice(), set_sign(json!({"setTo": "Away"})))
            .await;

        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn should_read_sign_values() {
        let server = service().await;
        let gateway = RecordingGateway::default();
        let bridge = bridge(&server, &gateway);

        let values = bridge
            .handle_parameters(BridgeId::from("b1"), alice(), DeviceUid::from("iQsign_3"), vec![])
            .await;

        assert_eq!(values[CURRENT_SIGN], "Busy");
        assert_eq!(values[SAVED_SIGNS], json!(["Busy", "Away"]));
    }

    #[tokio::test]
    async fn should_reject_registration_without_token() {
        let server = MockServer::start().await;
        let gateway = RecordingGateway::default();
        let bridge = bridge(&server, &gateway);

        let ok = bridge
            .add_bridge(AuthData(json!({"token": "code"})), BridgeId::from("b2"))
            .await;

        assert!(!ok);
    }

    #[test]
    fn should_accept_named_and_positional_arguments() {
        assert_eq!(
            set_sign_arguments(&json!({"setTo": "Busy", "otherText": "until 3"})),
            Some(("Busy".to_string(), "until 3".to_string()))
        );
        assert_eq!(
            set_sign_arguments(&json!(["Away"])),
            Some(("Away".to_string(), String::new()))
        );
        assert_eq!(set_sign_arguments(&json!({})), None);
    }
}
