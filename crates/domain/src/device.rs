//! Canonical device model — the `{UID, PARAMETERS, TRANSITIONS}` descriptor
//! every bridge adapter hands to the hub.
//!
//! Field names follow the hub's wire format (`UID`, `ISSENSOR`,
//! `DEFAULTS.PARAMETERS`, …) so a [`Device`] serializes directly into a
//! `DEVICES` message.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{BridgeError, ValidationError};
use crate::id::DeviceUid;

/// A device owned by one bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct Device {
    pub uid: DeviceUid,
    pub bridge: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
    /// Descriptor keys this bridge does not interpret, relayed unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Validation`] when the UID or bridge is empty.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.uid.as_str().is_empty() {
            return Err(ValidationError::EmptyId.into());
        }
        if self.bridge.is_empty() {
            return Err(ValidationError::MissingField("BRIDGE").into());
        }
        Ok(())
    }

    /// Find a transition by exact name.
    #[must_use]
    pub fn find_transition(&self, name: &str) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.name == name)
    }

    /// Find a parameter by exact name.
    #[must_use]
    pub fn find_parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    uid: Option<DeviceUid>,
    bridge: Option<String>,
    name: Option<String>,
    label: Option<String>,
    description: Option<String>,
    parameters: Vec<Parameter>,
    transitions: Vec<Transition>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn uid(mut self, uid: impl Into<DeviceUid>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    #[must_use]
    pub fn bridge(mut self, bridge: impl Into<String>) -> Self {
        self.bridge = Some(bridge.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    #[must_use]
    pub fn transition(mut self, transition: Transition) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// The description defaults to `"<name>:<label>"`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Validation`] if the UID or bridge is missing.
    pub fn build(self) -> Result<Device, BridgeError> {
        let name = self.name.unwrap_or_default();
        let label = self.label.unwrap_or_else(|| name.clone());
        let description = self
            .description
            .unwrap_or_else(|| format!("{name}:{label}"));
        let device = Device {
            uid: self.uid.ok_or(ValidationError::EmptyId)?,
            bridge: self.bridge.unwrap_or_default(),
            name,
            label,
            description,
            parameters: self.parameters,
            transitions: self.transitions,
            extra: Map::new(),
        };
        device.validate()?;
        Ok(device)
    }
}

/// One observable or settable value of a device.
///
/// Keys outside the model are kept in `extra` and written back as they
/// came, so descriptors posted by pull devices reach the hub intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Parameter {
    pub name: String,
    pub kind: ParameterKind,
    pub is_sensor: bool,
    pub label: Option<String>,
    pub units: Option<Vec<String>>,
    pub default_unit: Option<String>,
    pub range_ref: Option<RangeRef>,
    pub origin: Origin,
    pub extra: Map<String, Value>,
}

impl Parameter {
    /// A non-sensor parameter with no optional metadata.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            kind,
            is_sensor: false,
            label: None,
            units: None,
            default_unit: None,
            range_ref: None,
            origin: Origin::default(),
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn sensor(mut self, is_sensor: bool) -> Self {
        self.is_sensor = is_sensor;
        self
    }
}

/// Remove `key` and decode it; absent and `null` both read as `None`.
fn take<T: DeserializeOwned>(
    map: &mut Map<String, Value>,
    key: &str,
) -> Result<Option<T>, serde_json::Error> {
    match map.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value).map(Some),
    }
}

impl TryFrom<Map<String, Value>> for Parameter {
    type Error = serde_json::Error;

    fn try_from(mut map: Map<String, Value>) -> Result<Self, Self::Error> {
        let name = take(&mut map, "NAME")?.ok_or_else(|| serde_json::Error::missing_field("NAME"))?;
        let type_name: String =
            take(&mut map, "TYPE")?.ok_or_else(|| serde_json::Error::missing_field("TYPE"))?;
        let kind = ParameterKind::take_from(type_name, &mut map)?;
        Ok(Self {
            name,
            kind,
            is_sensor: take(&mut map, "ISSENSOR")?.unwrap_or(false),
            label: take(&mut map, "LABEL")?,
            units: take(&mut map, "UNITS")?,
            default_unit: take(&mut map, "DEFAULT_UNIT")?,
            range_ref: take(&mut map, "RANGEREF")?,
            origin: Origin {
                component: take(&mut map, "componentid")?,
                capability: take(&mut map, "capabilityid")?,
            },
            extra: map,
        })
    }
}

impl From<Parameter> for Map<String, Value> {
    fn from(param: Parameter) -> Self {
        let mut map = Map::new();
        map.insert("NAME".into(), Value::String(param.name));
        param.kind.write_into(&mut map);
        map.insert("ISSENSOR".into(), Value::Bool(param.is_sensor));
        if let Some(label) = param.label {
            map.insert("LABEL".into(), Value::String(label));
        }
        if let Some(units) = param.units {
            map.insert("UNITS".into(), Value::from(units));
        }
        if let Some(unit) = param.default_unit {
            map.insert("DEFAULT_UNIT".into(), Value::String(unit));
        }
        if let Some(range) = param.range_ref {
            let mut target = Map::new();
            target.insert("DEVICE".into(), Value::from(range.device.as_str()));
            target.insert("PARAMETER".into(), Value::String(range.parameter));
            map.insert("RANGEREF".into(), Value::Object(target));
        }
        if let Some(component) = param.origin.component {
            map.insert("componentid".into(), Value::String(component));
        }
        if let Some(capability) = param.origin.capability {
            map.insert("capabilityid".into(), Value::String(capability));
        }
        for (key, value) in param.extra {
            map.entry(key).or_insert(value);
        }
        map
    }
}

/// Parameter type together with its type-specific fields (the wire `TYPE`).
///
/// `Other` keeps types this bridge does not interpret, such as `TIME`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterKind {
    String,
    Integer {
        min: Option<Number>,
        max: Option<Number>,
    },
    Real {
        min: Option<Number>,
        max: Option<Number>,
    },
    Boolean,
    Enum {
        values: Vec<Value>,
    },
    Set {
        values: Vec<Value>,
    },
    StringList,
    Object {
        fields: Vec<Parameter>,
    },
    Color,
    Other(String),
}

impl ParameterKind {
    /// The wire `TYPE` name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::String => "STRING",
            Self::Integer { .. } => "INTEGER",
            Self::Real { .. } => "REAL",
            Self::Boolean => "BOOLEAN",
            Self::Enum { .. } => "ENUM",
            Self::Set { .. } => "SET",
            Self::StringList => "STRINGLIST",
            Self::Object { .. } => "OBJECT",
            Self::Color => "COLOR",
            Self::Other(name) => name.as_str(),
        }
    }

    fn take_from(type_name: String, map: &mut Map<String, Value>) -> Result<Self, serde_json::Error> {
        Ok(match type_name.as_str() {
            "STRING" => Self::String,
            "INTEGER" => Self::Integer {
                min: take(map, "MIN")?,
                max: take(map, "MAX")?,
            },
            "REAL" => Self::Real {
                min: take(map, "MIN")?,
                max: take(map, "MAX")?,
            },
            "BOOLEAN" => Self::Boolean,
            "ENUM" => Self::Enum {
                values: take(map, "VALUES")?.unwrap_or_default(),
            },
            "SET" => Self::Set {
                values: take(map, "values")?.unwrap_or_default(),
            },
            "STRINGLIST" => Self::StringList,
            "OBJECT" => Self::Object {
                fields: take(map, "FIELDS")?.unwrap_or_default(),
            },
            "COLOR" => Self::Color,
            _ => Self::Other(type_name),
        })
    }

    fn write_into(self, map: &mut Map<String, Value>) {
        map.insert("TYPE".into(), Value::from(self.type_name()));
        match self {
            Self::Integer { min, max } | Self::Real { min, max } => {
                if let Some(min) = min {
                    map.insert("MIN".into(), Value::Number(min));
                }
                if let Some(max) = max {
                    map.insert("MAX".into(), Value::Number(max));
                }
            }
            Self::Enum { values } => {
                if !values.is_empty() {
                    map.insert("VALUES".into(), Value::Array(values));
                }
            }
            Self::Set { values } => {
                map.insert("values".into(), Value::Array(values));
            }
            Self::Object { fields } => {
                let fields = fields.into_iter().map(|f| Value::Object(f.into())).collect();
                map.insert("FIELDS".into(), Value::Array(fields));
            }
            Self::String | Self::Boolean | Self::StringList | Self::Color | Self::Other(_) => {}
        }
    }
}

/// Cross-reference to another parameter whose current value drives the
/// range of this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct RangeRef {
    pub device: DeviceUid,
    pub parameter: String,
}

/// Back-reference to the vendor component/capability a parameter or
/// transition came from. Empty for vendors without that notion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    #[serde(rename = "componentid", default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(rename = "capabilityid", default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
}

impl Origin {
    #[must_use]
    pub fn new(component: impl Into<String>, capability: impl Into<String>) -> Self {
        Self {
            component: Some(component.into()),
            capability: Some(capability.into()),
        }
    }
}

/// A command the hub can invoke on a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "TransitionWire", from = "TransitionWire")]
pub struct Transition {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub origin: Origin,
    pub extra: Map<String, Value>,
}

impl Transition {
    #[must_use]
    pub fn new(name: impl Into<String>, parameters: Vec<Parameter>) -> Self {
        Self {
            name: name.into(),
            parameters,
            origin: Origin::default(),
            extra: Map::new(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct TransitionWire {
    name: String,
    #[serde(default)]
    defaults: TransitionDefaults,
    #[serde(flatten)]
    origin: Origin,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct TransitionDefaults {
    #[serde(default)]
    parameters: Vec<Parameter>,
}

impl From<Transition> for TransitionWire {
    fn from(t: Transition) -> Self {
        Self {
            name: t.name,
            defaults: TransitionDefaults {
                parameters: t.parameters,
            },
            origin: t.origin,
            extra: t.extra,
        }
    }
}

impl From<TransitionWire> for Transition {
    fn from(w: TransitionWire) -> Self {
        Self {
            name: w.name,
            parameters: w.defaults.parameters,
            origin: w.origin,
            extra: w.extra,
        }
    }
}

/// Merge a freshly discovered device list into the stored one, by UID only.
///
/// Existing entries are kept untouched, unseen UIDs are appended in
/// discovery order, and devices missing from `discovered` are never
/// removed. Returns `true` when at least one device was appended.
pub fn merge_devices(
    current: &mut Vec<Device>,
    discovered: impl IntoIterator<Item = Device>,
) -> bool {
    let mut changed = false;
    for device in discovered {
        if current.iter().any(|d| d.uid == device.uid) {
            continue;
        }
        current.push(device);
        changed = true;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn device(uid: &str) -> Device {
        Device::builder()
            .uid(uid)
            .bridge("generic")
            .name(uid)
            .build()
            .unwrap()
    }

    #[test]
    fn should_build_device_with_default_description() {
        let dev = Device::builder()
            .uid("d1")
            .bridge("smartthings")
            .name("Lamp")
            .label("Desk Lamp")
            .build()
            .unwrap();
        assert_eq!(dev.description, "Lamp:Desk Lamp");
    }

    #[test]
    fn should_return_validation_error_when_uid_missing() {
        let result = Device::builder().bridge("generic").build();
        assert!(matches!(
            result,
            Err(BridgeError::Validation(ValidationError::EmptyId))
        ));
    }

    #[test]
    fn should_return_validation_error_when_bridge_missing() {
        let result = Device::builder().uid("d1").build();
        assert!(matches!(
            result,
            Err(BridgeError::Validation(ValidationError::MissingField("BRIDGE")))
        ));
    }

    #[test]
    fn should_serialize_descriptor_in_hub_wire_shape() {
        let dev = Device::builder()
            .uid("d1")
            .bridge("generic")
            .name("Thermo")
            .label("Thermo")
            .parameter(
                Parameter::new(
                    "temperature",
                    ParameterKind::Real {
                        min: Some(Number::from(-40)),
                        max: Some(Number::from(120)),
                    },
                )
                .sensor(true),
            )
            .transition(Transition::new(
                "setMode",
                vec![Parameter::new(
                    "mode",
                    ParameterKind::Enum {
                        values: vec![json!("heat"), json!("cool")],
                    },
                )],
            ))
            .build()
            .unwrap();

        let value = serde_json::to_value(&dev).unwrap();
        assert_eq!(
            value,
            json!({
                "UID": "d1",
                "BRIDGE": "generic",
                "NAME": "Thermo",
                "LABEL": "Thermo",
                "DESCRIPTION": "Thermo:Thermo",
                "PARAMETERS": [{
                    "NAME": "temperature",
                    "TYPE": "REAL",
                    "MIN": -40,
                    "MAX": 120,
                    "ISSENSOR": true
                }],
                "TRANSITIONS": [{
                    "NAME": "setMode",
                    "DEFAULTS": {
                        "PARAMETERS": [{
                            "NAME": "mode",
                            "TYPE": "ENUM",
                            "VALUES": ["heat", "cool"],
                            "ISSENSOR": false
                        }]
                    }
                }]
            })
        );
    }

    #[test]
    fn should_deserialize_descriptor_posted_by_pull_device() {
        let value = json!({
            "UID": "sensor-1",
            "BRIDGE": "generic",
            "NAME": "Presence",
            "PARAMETERS": [
                {"NAME": "present", "TYPE": "BOOLEAN", "ISSENSOR": true},
                {"NAME": "tags", "TYPE": "STRINGLIST"},
                {"NAME": "rgb", "TYPE": "COLOR"}
            ],
            "TRANSITIONS": [
                {"NAME": "reset", "DEFAULTS": {"PARAMETERS": []}},
                {"NAME": "beep"}
            ]
        });
        let dev: Device = serde_json::from_value(value).unwrap();
        assert_eq!(dev.uid.as_str(), "sensor-1");
        assert_eq!(dev.parameters.len(), 3);
        assert_eq!(dev.parameters[0].kind, ParameterKind::Boolean);
        assert!(dev.parameters[0].is_sensor);
        assert_eq!(dev.parameters[1].kind, ParameterKind::StringList);
        assert!(!dev.parameters[1].is_sensor);
        assert!(dev.find_transition("beep").is_some());
        assert!(dev.find_transition("Beep").is_none());
    }

    #[test]
    fn should_keep_unknown_parameter_type_and_extra_keys() {
        let value = json!({
            "UID": "d2",
            "BRIDGE": "generic",
            "NAME": "Clock",
            "VTYPE": "clock",
            "PARAMETERS": [{"NAME": "when", "TYPE": "TIME", "ISSENSOR": true, "FORMAT": "HH:mm"}],
            "TRANSITIONS": [{"NAME": "sync", "LABEL": "Sync now"}]
        });
        let dev: Device = serde_json::from_value(value).unwrap();
        assert_eq!(dev.parameters[0].kind, ParameterKind::Other("TIME".to_string()));
        assert_eq!(dev.extra["VTYPE"], "clock");

        let back = serde_json::to_value(&dev).unwrap();
        assert_eq!(back["VTYPE"], "clock");
        assert_eq!(back["PARAMETERS"][0]["TYPE"], "TIME");
        assert_eq!(back["PARAMETERS"][0]["FORMAT"], "HH:mm");
        assert_eq!(back["PARAMETERS"][0]["ISSENSOR"], true);
        assert_eq!(back["TRANSITIONS"][0]["LABEL"], "Sync now");
    }

    #[test]
    fn should_reject_parameter_without_type() {
        let value = json!({"NAME": "when"});
        assert!(serde_json::from_value::<Parameter>(value).is_err());
    }

    #[test]
    fn should_serialize_set_values_in_lowercase_key() {
        let param = Parameter::new(
            "modes",
            ParameterKind::Set {
                values: vec![json!("a")],
            },
        );
        let value = serde_json::to_value(&param).unwrap();
        assert_eq!(value["TYPE"], "SET");
        assert_eq!(value["values"], json!(["a"]));
    }

    #[test]
    fn should_carry_origin_on_transitions() {
        let mut t = Transition::new("on", Vec::new());
        t.origin = Origin::new("main", "switch");
        let value = serde_json::to_value(&t).unwrap();
        assert_eq!(value["componentid"], "main");
        assert_eq!(value["capabilityid"], "switch");
        let back: Transition = serde_json::from_value(value).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn should_append_unseen_uid_and_keep_existing() {
        let mut existing = device("a");
        existing.label = "kept".to_string();
        let mut current = vec![existing];

        let mut fresh_a = device("a");
        fresh_a.label = "replacement".to_string();
        let changed = merge_devices(&mut current, vec![fresh_a, device("b")]);

        assert!(changed);
        assert_eq!(current.len(), 2);
        assert_eq!(current[0].uid.as_str(), "a");
        assert_eq!(current[0].label, "kept");
        assert_eq!(current[1].uid.as_str(), "b");
    }

    #[test]
    fn should_report_unchanged_when_no_new_uid() {
        let mut current = vec![device("a"), device("b")];
        let changed = merge_devices(&mut current, vec![device("b")]);
        assert!(!changed);
        assert_eq!(current.len(), 2);
    }

    #[test]
    fn should_not_duplicate_uid_repeated_in_one_discovery() {
        let mut current = Vec::new();
        let changed = merge_devices(&mut current, vec![device("a"), device("a")]);
        assert!(changed);
        assert_eq!(current.len(), 1);
    }
}
