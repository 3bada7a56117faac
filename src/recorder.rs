//! ==============================================================================
//! recorder.rs - reading recorder
//! ==============================================================================
//!
//! purpose:
//!     applies one pushed reading to a device.
//!
//! ```text
//! 1. validate   - every metric of the set present (else nothing changes)
//! 2. look up    - the device must be registered
//! 3. merge      - live values + timestamp replaced in the registry
//! 4. append     - one row to the device's reading log
//! ```
//!
//! steps 2-4 run under the registry write lock, so two readings for the
//! same device land in memory and on disk in the same order.
//!
//! log failures:
//!     the merge happens before the append. when the append fails the
//!     LogFailurePolicy decides what the caller is left with:
//!     - keep:     live values stay updated, history misses the row
//!     - rollback: live values are restored, memory and history agree
//!     either way the caller gets HubError::Persistence, never Validation.
//!
//! ==============================================================================

use crate::domain::{Device, DeviceName};
use crate::error::{HubError, Result};
use crate::metrics::Payload;
use crate::registry::Registry;
use crate::storage::ReadingLog;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

/// What happens to the in-memory merge when the log append fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFailurePolicy {
    #[default]
    Keep,
    Rollback,
}

pub struct Recorder {
    registry: Arc<Registry>,
    log: ReadingLog,
    policy: LogFailurePolicy,
    show_sensor_data: bool,
}

impl Recorder {
    pub fn new(registry: Arc<Registry>, log: ReadingLog, policy: LogFailurePolicy) -> Self {
        Self {
            registry,
            log,
            policy,
            show_sensor_data: true,
        }
    }

    /// Whether accepted values are included in the "updated" log event.
    pub fn with_sensor_data_logging(mut self, show: bool) -> Self {
        self.show_sensor_data = show;
        self
    }

    pub fn shows_sensor_data(&self) -> bool {
        self.show_sensor_data
    }

    pub fn log(&self) -> &ReadingLog {
        &self.log
    }

    pub fn policy(&self) -> LogFailurePolicy {
        self.policy
    }

    /// Applies `payload` to the device and appends it to the device's log.
    ///
    /// Returns the record as it stands after the merge.
    pub async fn record(&self, name: &DeviceName, payload: &Payload) -> Result<Device> {
        let values = self.registry.metrics().extract(payload)?;

        let mut device = self.registry.get_for_update(name).await?;
        let previous = (device.data.clone(), device.last_updated);

        device.apply(values);
        if self.show_sensor_data {
            info!(device = %name, data = ?device.data, "Updated data for device");
        } else {
            info!(device = %name, "Updated data for device");
        }

        let appended = self
            .log
            .append(name, &device.last_updated, &device.data)
            .await;
        if let Err(source) = appended {
            let rolled_back = self.policy == LogFailurePolicy::Rollback;
            if rolled_back {
                (device.data, device.last_updated) = previous;
            }
            warn!(
                device = %name,
                rolled_back,
                error = %source,
                "Reading log append failed"
            );
            return Err(HubError::Persistence {
                device: name.to_string(),
                rolled_back,
                source,
            });
        }

        Ok(device.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{Metric, MetricSet};
    use serde_json::json;
    use std::path::Path;

    fn name(s: &str) -> DeviceName {
        DeviceName::parse(s).unwrap()
    }

    fn reading(t: f64) -> Payload {
        serde_json::from_value(json!({
            "temperature": t,
            "humidity": 45.0,
            "pressure": 100.9,
            "gasResistance": 8.5,
        }))
        .unwrap()
    }

    fn line_count(path: &Path) -> usize {
        std::fs::read_to_string(path)
            .map(|c| c.lines().count())
            .unwrap_or(0)
    }

    fn setup(data_dir: &Path, policy: LogFailurePolicy) -> (Arc<Registry>, Recorder) {
        let registry = Arc::new(Registry::new(MetricSet::standard()));
        let log = ReadingLog::new(data_dir, MetricSet::standard());
        let recorder = Recorder::new(registry.clone(), log, policy);
        (registry, recorder)
    }

    #[tokio::test]
    async fn test_record_updates_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, recorder) = setup(dir.path(), LogFailurePolicy::Keep);
        let n = name("N");
        let registered = registry.register(&n, "lab").await;

        let updated = recorder.record(&n, &reading(22.5)).await.unwrap();
        assert_eq!(updated.data[&Metric::Temperature], 22.5);
        assert!(updated.last_updated > registered.last_updated);

        let listed = registry.list().await;
        assert_eq!(listed["N"], updated);
        // header + one row
        assert_eq!(line_count(&recorder.log().path_for(&n)), 2);

        recorder.record(&n, &reading(23.0)).await.unwrap();
        assert_eq!(line_count(&recorder.log().path_for(&n)), 3);
    }

    #[tokio::test]
    async fn test_record_unknown_device() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, recorder) = setup(dir.path(), LogFailurePolicy::Keep);
        let n = name("ghost");

        let err = recorder.record(&n, &reading(20.0)).await.unwrap_err();
        assert!(matches!(err, HubError::NotFound(_)));
        assert!(registry.is_empty().await);
        assert!(!recorder.log().path_for(&n).exists());
    }

    #[tokio::test]
    async fn test_record_missing_metric_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, recorder) = setup(dir.path(), LogFailurePolicy::Keep);
        let n = name("N");
        registry.register(&n, "lab").await;
        recorder.record(&n, &reading(19.0)).await.unwrap();
        let before = registry.get(&n).await.unwrap();

        let mut partial = reading(35.0);
        partial.remove("humidity");
        let err = recorder.record(&n, &partial).await.unwrap_err();

        assert!(matches!(err, HubError::Validation(ref m) if m.contains("humidity")));
        assert_eq!(registry.get(&n).await.unwrap(), before);
        assert_eq!(line_count(&recorder.log().path_for(&n)), 2);
    }

    #[tokio::test]
    async fn test_log_failure_keep() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, recorder) = setup(&dir.path().join("missing"), LogFailurePolicy::Keep);
        let n = name("N");
        registry.register(&n, "lab").await;

        let err = recorder.record(&n, &reading(27.0)).await.unwrap_err();
        assert!(matches!(err, HubError::Persistence { rolled_back: false, .. }));
        assert_eq!(registry.get(&n).await.unwrap().data[&Metric::Temperature], 27.0);
    }

    #[tokio::test]
    async fn test_log_failure_rollback() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, recorder) = setup(&dir.path().join("missing"), LogFailurePolicy::Rollback);
        let n = name("N");
        let registered = registry.register(&n, "lab").await;

        let err = recorder.record(&n, &reading(27.0)).await.unwrap_err();
        assert!(matches!(err, HubError::Persistence { rolled_back: true, .. }));
        assert_eq!(registry.get(&n).await.unwrap(), registered);
    }

    #[tokio::test]
    async fn test_concurrent_devices() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, recorder) = setup(dir.path(), LogFailurePolicy::Keep);
        let recorder = Arc::new(recorder);
        let (a, b) = (name("alpha"), name("beta"));
        registry.register(&a, "north").await;
        registry.register(&b, "south").await;

        let mut tasks = Vec::new();
        for (device, base) in [(a.clone(), 100.0), (b.clone(), 200.0)] {
            let recorder = recorder.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..25 {
                    recorder.record(&device, &reading(base + i as f64)).await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let devices = registry.list().await;
        assert_eq!(devices["alpha"].data[&Metric::Temperature], 124.0);
        assert_eq!(devices["beta"].data[&Metric::Temperature], 224.0);
        assert_eq!(line_count(&recorder.log().path_for(&a)), 26);
        assert_eq!(line_count(&recorder.log().path_for(&b)), 26);
    }

    #[tokio::test]
    async fn test_quiet_recorder_still_records() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(Registry::new(MetricSet::standard()));
        let log = ReadingLog::new(dir.path(), MetricSet::standard());
        let recorder = Recorder::new(registry.clone(), log, LogFailurePolicy::Keep)
            .with_sensor_data_logging(false);
        assert!(!recorder.shows_sensor_data());

        let n = name("N");
        registry.register(&n, "lab").await;
        let updated = recorder.record(&n, &reading(17.5)).await.unwrap();
        assert_eq!(updated.data[&Metric::Temperature], 17.5);
        assert_eq!(line_count(&recorder.log().path_for(&n)), 2);
    }
}
