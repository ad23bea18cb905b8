//! Turns a SmartThings device, its capability definitions and its
//! presentation into a canonical [`Device`].
//!
//! The capability schemas go through the shared [`SchemaNormalizer`]; the
//! presentation then refines the result:
//!
//! - a `supportedValues` reference (`"attr.value"`, directly or under `list`
//!   / `numberField`) adds a `RANGEREF` to the ENUM/INTEGER/REAL parameters
//!   of the referring capability;
//! - list alternatives of a condition turn a free-form string sensor into an
//!   ENUM of the alternative keys.

use std::collections::HashMap;

use serde_json::{Map, Value};
use spokes_domain::device::{Device, Origin, Parameter, ParameterKind, RangeRef};
use spokes_domain::error::BridgeError;
use spokes_domain::id::DeviceUid;
use spokes_domain::schema::{Diagnostics, SchemaNormalizer, attributes_of, commands_of};

use crate::client::StDevice;

/// Capability-indexed view of a device presentation.
#[derive(Debug, Default)]
pub struct PresentationIndex {
    conditions: HashMap<String, Value>,
    /// Capability id → attribute that holds its supported values.
    references: HashMap<String, String>,
}

impl PresentationIndex {
    /// Index the `automation` section, or `dashboard` when there is none.
    #[must_use]
    pub fn new(presentation: &Value) -> Self {
        let mut index = Self::default();
        let Some(section) = presentation
            .get("automation")
            .or_else(|| presentation.get("dashboard"))
        else {
            return index;
        };

        for condition in entries(section, "conditions") {
            if let Some(capability) = condition.get("capability").and_then(Value::as_str) {
                index.conditions.insert(capability.to_string(), condition.clone());
            }
            index.note_reference(condition);
        }
        for action in entries(section, "actions") {
            index.note_reference(action);
        }
        index
    }

    fn note_reference(&mut self, entry: &Value) {
        let Some(capability) = entry.get("capability").and_then(Value::as_str) else {
            return;
        };
        let supported = entry
            .get("supportedValues")
            .or_else(|| entry.get("list").and_then(|l| l.get("supportedValues")))
            .or_else(|| entry.get("numberField").and_then(|n| n.get("supportedValues")))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty());
        if let Some(supported) = supported {
            let attribute = supported
                .rsplit_once('.')
                .map_or(supported, |(attr, _)| attr);
            self.references
                .insert(capability.to_string(), attribute.to_string());
        }
    }

    /// Attribute holding the range of `parameter`, unless it is itself.
    #[must_use]
    pub fn reference(&self, capability: &str, parameter: &str) -> Option<&str> {
        self.references
            .get(capability)
            .map(String::as_str)
            .filter(|attr| *attr != parameter)
    }

    /// Keys of the active list alternatives of the capability's condition.
    #[must_use]
    pub fn alternatives(&self, capability: &str) -> Option<Vec<Value>> {
        let keys: Vec<Value> = self
            .conditions
            .get(capability)?
            .get("list")?
            .get("alternatives")?
            .as_array()?
            .iter()
            .filter(|alt| {
                matches!(
                    alt.get("type").and_then(Value::as_str),
                    None | Some("active")
                )
            })
            .filter_map(|alt| alt.get("key").cloned())
            .collect();
        (!keys.is_empty()).then_some(keys)
    }
}

fn entries<'a>(section: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    section
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// One resolved capability of the analyzed component.
#[derive(Debug, Clone, Copy)]
pub struct CapabilitySource<'a> {
    pub component: &'a str,
    pub id: &'a str,
    pub definition: &'a Value,
}

/// Build the canonical descriptor of `device`.
///
/// # Errors
///
/// Returns [`BridgeError::Validation`] when the device has no id.
pub fn describe_device(
    device: &StDevice,
    bridge: &str,
    capabilities: &[CapabilitySource<'_>],
    index: &PresentationIndex,
    normalizer: &SchemaNormalizer,
    diagnostics: &mut Diagnostics,
) -> Result<Device, BridgeError> {
    let uid = DeviceUid::new(device.device_id.as_str())?;
    let mut builder = Device::builder()
        .uid(uid.clone())
        .bridge(bridge)
        .name(device.name.as_str());
    if let Some(label) = &device.label {
        builder = builder.label(label.as_str());
    }

    for cap in capabilities {
        let origin = Origin::new(cap.component, cap.id);
        for (name, attribute) in attributes_of(cap.definition) {
            let Some(mut param) = normalizer.attribute_parameter(name, attribute, diagnostics) else {
                continue;
            };
            refine(&mut param, &uid, cap.id, index);
            param.origin = origin.clone();
            builder = builder.parameter(param);
        }
        for (key, command) in commands_of(cap.definition) {
            let Some(mut transition) = normalizer.command_transition(key, command, diagnostics) else {
                continue;
            };
            for param in &mut transition.parameters {
                let reference = index.reference(cap.id, &param.name);
                attach_range(param, &uid, reference);
            }
            transition.origin = origin.clone();
            builder = builder.transition(transition);
        }
    }

    builder.build()
}

fn refine(param: &mut Parameter, device: &DeviceUid, capability: &str, index: &PresentationIndex) {
    let reference = index.reference(capability, &param.name);
    if param.is_sensor && param.kind == ParameterKind::String {
        if let Some(values) = index.alternatives(capability) {
            param.kind = ParameterKind::Enum { values };
        }
    }
    attach_range(param, device, reference);
}

fn attach_range(param: &mut Parameter, device: &DeviceUid, reference: Option<&str>) {
    let Some(attribute) = reference else {
        return;
    };
    if matches!(
        param.kind,
        ParameterKind::Enum { .. } | ParameterKind::Integer { .. } | ParameterKind::Real { .. }
    ) {
        param.range_ref = Some(RangeRef {
            device: device.clone(),
            parameter: attribute.to_string(),
        });
    }
}

/// Flatten a `devices/{id}/status` document into attribute → state,
/// keeping only `names` unless it is empty.
#[must_use]
pub fn status_values(status: &Value, names: &[String]) -> Map<String, Value> {
    let mut values = Map::new();
    let components = status
        .get("components")
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(Map::values);
    for capabilities in components.filter_map(Value::as_object) {
        for attributes in capabilities.values().filter_map(Value::as_object) {
            for (name, state) in attributes {
                if names.is_empty() || names.iter().any(|n| n == name) {
                    values.insert(name.clone(), state.clone());
                }
            }
        }
    }
    values
}
