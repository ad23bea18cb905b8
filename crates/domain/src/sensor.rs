//! Active-sensor allow-list pushed by the hub.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::id::DeviceUid;
use crate::message::ParameterEvent;

/// One `{DEVICE, PARAMETER}` pair the hub wants updates for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct ActiveSensor {
    pub device: DeviceUid,
    pub parameter: String,
}

/// Device UID → parameter names the hub listens to.
///
/// Devices without an entry are unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveSensors {
    by_device: HashMap<DeviceUid, HashSet<String>>,
}

impl ActiveSensors {
    /// Replace the whole set with a fresh snapshot.
    pub fn replace(&mut self, active: impl IntoIterator<Item = ActiveSensor>) {
        self.by_device.clear();
        for sensor in active {
            self.by_device
                .entry(sensor.device)
                .or_default()
                .insert(sensor.parameter);
        }
    }

    #[must_use]
    pub fn allows(&self, device: &DeviceUid, parameter: &str) -> bool {
        self.by_device
            .get(device)
            .is_none_or(|params| params.contains(parameter))
    }

    #[must_use]
    pub fn allows_event(&self, event: &ParameterEvent) -> bool {
        self.allows(&event.device, &event.parameter)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_device.is_empty()
    }
}

impl FromIterator<ActiveSensor> for ActiveSensors {
    fn from_iter<T: IntoIterator<Item = ActiveSensor>>(iter: T) -> Self {
        let mut sensors = Self::default();
        sensors.replace(iter);
        sensors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(device: &str, parameter: &str) -> ActiveSensor {
        ActiveSensor {
            device: DeviceUid::from(device),
            parameter: parameter.to_string(),
        }
    }

    #[test]
    fn should_suppress_unlisted_parameter_of_listed_device() {
        let sensors: ActiveSensors = [pair("devA", "p1")].into_iter().collect();
        assert!(sensors.allows(&DeviceUid::from("devA"), "p1"));
        assert!(!sensors.allows(&DeviceUid::from("devA"), "p2"));
    }

    #[test]
    fn should_fail_open_for_unlisted_device() {
        let sensors: ActiveSensors = [pair("devA", "p1")].into_iter().collect();
        assert!(sensors.allows(&DeviceUid::from("devB"), "anything"));
        assert!(ActiveSensors::default().allows(&DeviceUid::from("devA"), "p2"));
    }

    #[test]
    fn should_replace_previous_snapshot_wholesale() {
        let mut sensors: ActiveSensors = [pair("devA", "p1")].into_iter().collect();
        sensors.replace([pair("devB", "p9")]);
        assert!(sensors.allows(&DeviceUid::from("devA"), "p2"));
        assert!(!sensors.allows(&DeviceUid::from("devB"), "p1"));

        sensors.replace([]);
        assert!(sensors.is_empty());
    }

    #[test]
    fn should_parse_wire_pairs() {
        let parsed: Vec<ActiveSensor> =
            serde_json::from_str(r#"[{"DEVICE":"d","PARAMETER":"level"}]"#).unwrap();
        assert_eq!(parsed, vec![pair("d", "level")]);
    }
}
