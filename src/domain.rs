use crate::error::{HubError, Result};
use crate::metrics::{MetricSet, MetricValues};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Longest name accepted for a device.
pub const MAX_NAME_LEN: usize = 64;

/// A device name that is safe to embed in a file name.
///
/// Only ascii letters, digits, `_`, `-` and `.` are allowed, and the name may
/// not start with `.`, so it can never walk out of the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceName(String);

impl DeviceName {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(HubError::validation("No name provided"));
        }
        if raw.len() > MAX_NAME_LEN {
            return Err(HubError::validation(format!(
                "Device name longer than {MAX_NAME_LEN} characters"
            )));
        }
        if raw.starts_with('.') {
            return Err(HubError::validation(format!(
                "Device name may not start with '.': {raw}"
            )));
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(HubError::validation(format!(
                "Device name contains invalid character {bad:?}: {raw}"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// one registered sensor device
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,

    /// free-form location label (e.g. "39.042388, -77.550108")
    pub location: String,

    /// latest value per metric; always holds every metric of the set
    pub data: MetricValues,

    /// time of registration or of the last successful update
    #[serde(rename = "last_upd")]
    pub last_updated: DateTime<Local>,
}

impl Device {
    /// A freshly registered device: every metric at 0.0.
    pub fn new(name: &DeviceName, location: impl Into<String>, metrics: &MetricSet) -> Self {
        Self {
            name: name.to_string(),
            location: location.into(),
            data: metrics.zeroed(),
            last_updated: Local::now(),
        }
    }

    /// Replaces every metric value and bumps the timestamp.
    pub fn apply(&mut self, values: MetricValues) {
        self.data = values;
        self.touch();
    }

    // keeps last_updated strictly increasing even on a coarse clock
    fn touch(&mut self) {
        let now = Local::now();
        self.last_updated = if now > self.last_updated {
            now
        } else {
            self.last_updated + chrono::Duration::microseconds(1)
        };
    }
}

/// Point-in-time copy of the whole registry, keyed by device name.
pub type Snapshot = HashMap<String, Device>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metric;

    #[test]
    fn test_accepts_plain_names() {
        for name in ["sensor_01", "bme680-lab", "node.3", "A"] {
            assert!(DeviceName::parse(name).is_ok(), "{name} should be accepted");
        }
    }

    #[test]
    fn test_rejects_path_traversal() {
        for name in ["", "../etc/passwd", "a/b", "a\\b", ".hidden", "..", "name with space"] {
            let err = DeviceName::parse(name).unwrap_err();
            assert!(matches!(err, HubError::Validation(_)), "{name} should be rejected");
        }
        assert!(DeviceName::parse(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_new_device_is_zeroed() {
        let name = DeviceName::parse("sensor_01").unwrap();
        let device = Device::new(&name, "roof", &MetricSet::standard());
        assert_eq!(device.name, "sensor_01");
        assert_eq!(device.data.len(), 4);
        assert!(device.data.values().all(|v| *v == 0.0));
    }

    #[test]
    fn test_apply_moves_timestamp_forward() {
        let name = DeviceName::parse("sensor_01").unwrap();
        let set = MetricSet::standard();
        let mut device = Device::new(&name, "roof", &set);
        let before = device.last_updated;

        let mut values = set.zeroed();
        values.insert(Metric::Temperature, 23.5);
        device.apply(values);

        assert!(device.last_updated > before);
        assert_eq!(device.data[&Metric::Temperature], 23.5);
    }

    #[test]
    fn test_json_shape() {
        let name = DeviceName::parse("sensor_01").unwrap();
        let device = Device::new(&name, "roof", &MetricSet::standard());
        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(json["name"], "sensor_01");
        assert_eq!(json["location"], "roof");
        assert_eq!(json["data"]["gasResistance"], 0.0);
        assert!(json["last_upd"].is_string());
    }
}
