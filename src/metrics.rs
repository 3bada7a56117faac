//! ==============================================================================
//! metrics.rs - the fixed metric set
//! ==============================================================================
//!
//! purpose:
//!     names the sensor quantities every update must supply in full, in the
//!     column order used by the reading logs.
//!
//! ```text
//! the base deployment (bme680) reports:
//!     temperature (°C), humidity (%), pressure (kPa), gas resistance (KOhm)
//! the gas deployment (bme680 + mq2) adds:
//!     lpg, methane, smoke (ppm)
//! ```
//!
//! relationships:
//!     - used by: registry.rs (zeroed metrics on register)
//!     - used by: recorder.rs (payload validation)
//!     - used by: storage.rs (csv header + row order)
//!
//! ==============================================================================

use crate::error::{HubError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Latest value per metric. Ordered by [`Metric`] declaration order.
pub type MetricValues = BTreeMap<Metric, f64>;

/// Raw reading as pushed by a sensor node: metric keys plus whatever else the
/// node chose to send.
pub type Payload = BTreeMap<String, Value>;

/// One sensor quantity. Serialized with the key the sensor nodes send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "temperature")]
    Temperature,
    #[serde(rename = "humidity")]
    Humidity,
    #[serde(rename = "pressure")]
    Pressure,
    #[serde(rename = "gasResistance")]
    GasResistance,
    #[serde(rename = "lpg")]
    Lpg,
    #[serde(rename = "methane")]
    Methane,
    #[serde(rename = "smoke")]
    Smoke,
}

impl Metric {
    /// payload / json key
    pub fn key(self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::Pressure => "pressure",
            Metric::GasResistance => "gasResistance",
            Metric::Lpg => "lpg",
            Metric::Methane => "methane",
            Metric::Smoke => "smoke",
        }
    }

    /// csv header label, unit included
    pub fn label(self) -> &'static str {
        match self {
            Metric::Temperature => "Temperature (°C)",
            Metric::Humidity => "Humidity (%)",
            Metric::Pressure => "Pressure (kPa)",
            Metric::GasResistance => "Gas Resistance (KOhm)",
            Metric::Lpg => "LPG (ppm)",
            Metric::Methane => "Methane (ppm)",
            Metric::Smoke => "Smoke (ppm)",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The agreed list of metrics for this deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSet {
    metrics: Vec<Metric>,
}

impl MetricSet {
    /// bme680 only
    pub fn standard() -> Self {
        Self {
            metrics: vec![
                Metric::Temperature,
                Metric::Humidity,
                Metric::Pressure,
                Metric::GasResistance,
            ],
        }
    }

    /// bme680 + mq2 gas sensor
    pub fn with_gas() -> Self {
        let mut set = Self::standard();
        set.metrics.extend([Metric::Lpg, Metric::Methane, Metric::Smoke]);
        set
    }

    pub fn iter(&self) -> impl Iterator<Item = Metric> + '_ {
        self.metrics.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Every metric at 0.0, the state of a freshly registered device.
    pub fn zeroed(&self) -> MetricValues {
        self.iter().map(|m| (m, 0.0)).collect()
    }

    /// Header row for a reading log: timestamp first, then one labeled column
    /// per metric.
    pub fn header(&self) -> Vec<&'static str> {
        std::iter::once("Timestamp")
            .chain(self.iter().map(Metric::label))
            .collect()
    }

    /// Pulls a value for every metric out of a raw payload.
    ///
    /// Fails on the first missing or non-numeric metric, in column order.
    /// Keys that are not part of the set are ignored, whatever their type.
    pub fn extract(&self, payload: &Payload) -> Result<MetricValues> {
        let mut values = MetricValues::new();
        for metric in self.iter() {
            let raw = payload
                .get(metric.key())
                .ok_or_else(|| HubError::validation(format!("No value provided for {metric}")))?;
            let value = raw
                .as_f64()
                .filter(|v| v.is_finite())
                .ok_or_else(|| {
                    HubError::validation(format!("Value for {metric} is not a finite number"))
                })?;
            values.insert(metric, value);
        }

        for key in payload.keys() {
            if !self.iter().any(|m| m.key() == key) {
                tracing::debug!(key = %key, "Ignoring unknown key in payload");
            }
        }

        Ok(values)
    }
}

impl Default for MetricSet {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_header_order() {
        assert_eq!(
            MetricSet::standard().header(),
            vec![
                "Timestamp",
                "Temperature (°C)",
                "Humidity (%)",
                "Pressure (kPa)",
                "Gas Resistance (KOhm)"
            ]
        );
        assert_eq!(MetricSet::with_gas().header().len(), 8);
    }

    #[test]
    fn test_zeroed_covers_every_metric() {
        let set = MetricSet::with_gas();
        let zeroed = set.zeroed();
        assert_eq!(zeroed.len(), set.len());
        assert!(zeroed.values().all(|v| *v == 0.0));
    }

    #[test]
    fn test_extract_names_missing_metric() {
        let set = MetricSet::standard();
        let err = set
            .extract(&payload(json!({
                "temperature": 21.0,
                "humidity": 40.0,
                "gasResistance": 12.0,
            })))
            .unwrap_err();
        assert!(matches!(err, HubError::Validation(_)));
        assert!(err.to_string().contains("pressure"));
    }

    #[test]
    fn test_extract_ignores_extra_keys() {
        let set = MetricSet::standard();
        let values = set
            .extract(&payload(json!({
                "temperature": 21.5,
                "humidity": 40,
                "pressure": 101.3,
                "gasResistance": 12.0,
                "battery": 3.7,
                "location": "roof",
                "firmware": {"version": 2},
            })))
            .unwrap();
        assert_eq!(values.len(), 4);
        assert_eq!(values[&Metric::Pressure], 101.3);
        assert_eq!(values[&Metric::Humidity], 40.0);
    }

    #[test]
    fn test_extract_rejects_non_numeric_metric() {
        let set = MetricSet::standard();
        let err = set
            .extract(&payload(json!({
                "temperature": 21.5,
                "humidity": "wet",
                "pressure": 101.3,
                "gasResistance": 12.0,
            })))
            .unwrap_err();
        assert!(matches!(err, HubError::Validation(ref m) if m.contains("humidity")));
    }

    #[test]
    fn test_gas_set_requires_gas_metrics() {
        let set = MetricSet::with_gas();
        let err = set
            .extract(&payload(json!({
                "temperature": 21.5,
                "humidity": 40.0,
                "pressure": 101.3,
                "gasResistance": 12.0,
            })))
            .unwrap_err();
        assert!(err.to_string().contains("lpg"));
    }

    #[test]
    fn test_metric_serializes_as_key() {
        let json = serde_json::to_string(&MetricSet::standard().zeroed()).unwrap();
        assert!(json.contains("\"gasResistance\":0.0"));
    }
}
