//! Bridge registry — selects the bridge variant a hub request is aimed at.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use spokes_domain::error::BridgeError;
use spokes_domain::id::{BridgeId, DeviceUid, UserId};
use spokes_domain::message::DeviceCommand;
use spokes_domain::sensor::ActiveSensor;

use crate::ports::{AuthData, BridgeAdapter};

/// The supported bridge variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeKind {
    /// Pull devices speaking the seed/token polling protocol.
    Generic,
    /// The SmartThings platform.
    SmartThings,
    /// The iQsign sign service.
    Iqsign,
}

impl BridgeKind {
    pub const ALL: [Self; 3] = [Self::Generic, Self::SmartThings, Self::Iqsign];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::SmartThings => "smartthings",
            Self::Iqsign => "iqsign",
        }
    }
}

impl fmt::Display for BridgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BridgeKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generic" => Ok(Self::Generic),
            "smartthings" | "samsung" => Ok(Self::SmartThings),
            "iqsign" => Ok(Self::Iqsign),
            other => Err(BridgeError::UnknownBridge(other.to_string())),
        }
    }
}

/// One slot per variant; an empty slot means the variant is disabled.
pub struct BridgeRegistry<G, S, I> {
    generic: Option<G>,
    smartthings: Option<S>,
    iqsign: Option<I>,
}

impl<G, S, I> Default for BridgeRegistry<G, S, I> {
    fn default() -> Self {
        Self {
            generic: None,
            smartthings: None,
            iqsign: None,
        }
    }
}

/// Evaluate `$body` with `$adapter` bound to the enabled adapter for `$kind`.
macro_rules! dispatch {
    ($self:ident, $kind:expr, |$adapter:ident| $body:expr) => {
        match $kind {
            BridgeKind::Generic => match &$self.generic {
                Some($adapter) => Ok($body),
                None => Err(BridgeError::UnknownBridge(BridgeKind::Generic.to_string())),
            },
            BridgeKind::SmartThings => match &$self.smartthings {
                Some($adapter) => Ok($body),
                None => Err(BridgeError::UnknownBridge(BridgeKind::SmartThings.to_string())),
            },
            BridgeKind::Iqsign => match &$self.iqsign {
                Some($adapter) => Ok($body),
                None => Err(BridgeError::UnknownBridge(BridgeKind::Iqsign.to_string())),
            },
        }
    };
}

impl<G, S, I> BridgeRegistry<G, S, I>
where
    G: BridgeAdapter,
    S: BridgeAdapter,
    I: BridgeAdapter,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_generic(mut self, adapter: G) -> Self {
        self.generic = Some(adapter);
        self
    }

    #[must_use]
    pub fn with_smartthings(mut self, adapter: S) -> Self {
        self.smartthings = Some(adapter);
        self
    }

    #[must_use]
    pub fn with_iqsign(mut self, adapter: I) -> Self {
        self.iqsign = Some(adapter);
        self
    }

    /// Names of the enabled variants.
    #[must_use]
    pub fn enabled(&self) -> Vec<&'static str> {
        BridgeKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                BridgeKind::Generic => self.generic.is_some(),
                BridgeKind::SmartThings => self.smartthings.is_some(),
                BridgeKind::Iqsign => self.iqsign.is_some(),
            })
            .map(BridgeKind::as_str)
            .collect()
    }

    /// # Errors
    ///
    /// Returns [`BridgeError::UnknownBridge`] when `kind` is disabled.
    #[tracing::instrument(skip(self, auth))]
    pub async fn add_bridge(
        &self,
        kind: BridgeKind,
        auth: AuthData,
        bridge_id: BridgeId,
    ) -> Result<bool, BridgeError> {
        dispatch!(self, kind, |adapter| adapter.add_bridge(auth, bridge_id).await)
    }

    /// # Errors
    ///
    /// Returns [`BridgeError::UnknownBridge`] when `kind` is disabled.
    #[tracing::instrument(skip(self))]
    pub async fn get_devices(&self, kind: BridgeKind, uid: UserId) -> Result<(), BridgeError> {
        dispatch!(self, kind, |adapter| adapter.get_devices(uid).await)
    }

    /// # Errors
    ///
    /// Returns [`BridgeError::UnknownBridge`] when `kind` is disabled.
    #[tracing::instrument(skip(self, command), fields(device = %command.device, command = %command.command))]
    pub async fn handle_command(
        &self,
        kind: BridgeKind,
        bridge_id: BridgeId,
        uid: UserId,
        command: DeviceCommand,
    ) -> Result<Option<Value>, BridgeError> {
        dispatch!(self, kind, |adapter| adapter
            .handle_command(bridge_id, uid, command)
            .await)
    }

    /// # Errors
    ///
    /// Returns [`BridgeError::UnknownBridge`] when `kind` is disabled.
    #[tracing::instrument(skip(self))]
    pub async fn handle_parameters(
        &self,
        kind: BridgeKind,
        bridge_id: BridgeId,
        uid: UserId,
        device: DeviceUid,
        names: Vec<String>,
    ) -> Result<Map<String, Value>, BridgeError> {
        dispatch!(self, kind, |adapter| adapter
            .handle_parameters(bridge_id, uid, device, names)
            .await)
    }

    /// # Errors
    ///
    /// Returns [`BridgeError::UnknownBridge`] when `kind` is disabled.
    #[tracing::instrument(skip(self, active), fields(count = active.len()))]
    pub async fn handle_active_sensors(
        &self,
        kind: BridgeKind,
        bridge_id: BridgeId,
        uid: UserId,
        active: Vec<ActiveSensor>,
    ) -> Result<(), BridgeError> {
        dispatch!(self, kind, |adapter| adapter
            .handle_active_sensors(bridge_id, uid, active)
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::future::Future;
    use std::sync::{Arc, Mutex};

    /// Records which operations reached it.
    #[derive(Clone, Default)]
    struct StubAdapter {
        name: &'static str,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl StubAdapter {
        fn named(name: &'static str) -> Self {
            Self {
                name,
                calls: Arc::default(),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, op: &str) {
            self.calls.lock().unwrap().push(op.to_string());
        }
    }

    impl BridgeAdapter for StubAdapter {
        fn name(&self) -> &'static str {
            self.name
        }

        fn add_bridge(&self, _auth: AuthData, _bid: BridgeId) -> impl Future<Output = bool> + Send {
            self.record("add_bridge");
            async { true }
        }

        fn get_devices(&self, _uid: UserId) -> impl Future<Output = ()> + Send {
            self.record("get_devices");
            async {}
        }

        fn handle_command(
            &self,
            _bid: BridgeId,
            _uid: UserId,
            command: DeviceCommand,
        ) -> impl Future<Output = Option<Value>> + Send {
            self.record("handle_command");
            let name = self.name;
            async move { Some(json!({"by": name, "command": command.command})) }
        }

        fn handle_parameters(
            &self,
            _bid: BridgeId,
            _uid: UserId,
            _device: DeviceUid,
            _names: Vec<String>,
        ) -> impl Future<Output = Map<String, Value>> + Send {
            self.record("handle_parameters");
            async { Map::new() }
        }

        fn handle_active_sensors(
            &self,
            _bid: BridgeId,
            _uid: UserId,
            _active: Vec<ActiveSensor>,
        ) -> impl Future<Output = ()> + Send {
            self.record("handle_active_sensors");
            async {}
        }
    }

    type Registry = BridgeRegistry<StubAdapter, StubAdapter, StubAdapter>;

    #[test]
    fn should_parse_bridge_names_and_alias() {
        assert_eq!("generic".parse::<BridgeKind>().unwrap(), BridgeKind::Generic);
        assert_eq!("samsung".parse::<BridgeKind>().unwrap(), BridgeKind::SmartThings);
        assert_eq!("smartthings".parse::<BridgeKind>().unwrap(), BridgeKind::SmartThings);
        assert_eq!("iqsign".parse::<BridgeKind>().unwrap(), BridgeKind::Iqsign);
    }

    #[test]
    fn should_reject_unknown_bridge_name() {
        let err = "zigbee".parse::<BridgeKind>().unwrap_err();
        assert!(matches!(err, BridgeError::UnknownBridge(name) if name == "zigbee"));
    }

    #[tokio::test]
    async fn should_dispatch_command_to_selected_variant() {
        let generic = StubAdapter::named("generic");
        let iqsign = StubAdapter::named("iqsign");
        let registry = Registry::new()
            .with_generic(generic.clone())
            .with_iqsign(iqsign.clone());

        let reply = registry
            .handle_command(
                BridgeKind::Iqsign,
                BridgeId::from("b"),
                UserId::from("u"),
                DeviceCommand {
                    device: DeviceUid::from("d"),
                    command: "setSign".to_string(),
                    values: json!({}),
                },
            )
            .await
            .unwrap();

        assert_eq!(reply, Some(json!({"by": "iqsign", "command": "setSign"})));
        assert_eq!(iqsign.calls(), ["handle_command"]);
        assert!(generic.calls().is_empty());
    }

    #[tokio::test]
    async fn should_reject_disabled_variant() {
        let registry = Registry::new().with_generic(StubAdapter::named("generic"));
        let result = registry
            .add_bridge(BridgeKind::SmartThings, AuthData::default(), BridgeId::from("b"))
            .await;
        assert!(matches!(result, Err(BridgeError::UnknownBridge(name)) if name == "smartthings"));
    }

    #[tokio::test]
    async fn should_forward_every_operation() {
        let generic = StubAdapter::named("generic");
        let registry = Registry::new().with_generic(generic.clone());
        let kind = BridgeKind::Generic;

        assert!(registry
            .add_bridge(kind, AuthData::default(), BridgeId::from("b"))
            .await
            .unwrap());
        registry.get_devices(kind, UserId::from("u")).await.unwrap();
        registry
            .handle_parameters(kind, BridgeId::from("b"), UserId::from("u"), DeviceUid::from("d"), vec![])
            .await
            .unwrap();
        registry
            .handle_active_sensors(kind, BridgeId::from("b"), UserId::from("u"), vec![])
            .await
            .unwrap();

        assert_eq!(
            generic.calls(),
            ["add_bridge", "get_devices", "handle_parameters", "handle_active_sensors"]
        );
    }

    #[test]
    fn should_list_enabled_variants_in_order() {
        let registry = Registry::new()
            .with_iqsign(StubAdapter::named("iqsign"))
            .with_generic(StubAdapter::named("generic"));
        assert_eq!(registry.enabled(), ["generic", "iqsign"]);
    }
}
