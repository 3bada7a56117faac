//! ==============================================================================
//! registry.rs - in-memory device registry
//! ==============================================================================
//!
//! purpose:
//!     owns every device record. nothing else in the process stores device
//!     state; handlers reach it through a shared handle (see api.rs AppState).
//!
//! locking:
//!     a single tokio RwLock guards the whole map.
//!     - list / get: read lock, return owned copies
//!     - register / unregister: write lock
//!     - get_for_update: write lock, held by the caller for the whole update
//!       (merge + log append), so per-device log order matches memory order
//!
//! nothing here is persisted; a restart forgets every device while the
//! reading logs stay on disk.
//!
//! ==============================================================================

use crate::domain::{Device, DeviceName, Snapshot};
use crate::error::{HubError, Result};
use crate::metrics::MetricSet;
use std::collections::HashMap;
use tokio::sync::{RwLock, RwLockMappedWriteGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Exclusive access to one device record; the registry stays locked while
/// this guard is alive.
pub type DeviceGuard<'a> = RwLockMappedWriteGuard<'a, Device>;

pub struct Registry {
    metrics: MetricSet,
    devices: RwLock<HashMap<String, Device>>,
}

impl Registry {
    pub fn new(metrics: MetricSet) -> Self {
        Self {
            metrics,
            devices: RwLock::new(HashMap::new()),
        }
    }

    pub fn metrics(&self) -> &MetricSet {
        &self.metrics
    }

    /// Creates a zeroed record under `name`, replacing any existing one.
    pub async fn register(&self, name: &DeviceName, location: &str) -> Device {
        let device = Device::new(name, location, &self.metrics);
        let previous = self
            .devices
            .write()
            .await
            .insert(name.to_string(), device.clone());

        if previous.is_some() {
            info!(
                device = %name,
                location = %location,
                "Re-registered device, previous data discarded"
            );
        } else {
            info!(device = %name, location = %location, "Registered device");
        }
        device
    }

    pub async fn unregister(&self, name: &DeviceName) -> Result<Device> {
        let removed = self
            .devices
            .write()
            .await
            .remove(name.as_str())
            .ok_or_else(|| HubError::not_found(name.as_str()))?;

        info!(device = %name, "Unregistered device");
        Ok(removed)
    }

    /// Owned copy of every record.
    pub async fn list(&self) -> Snapshot {
        let devices = self.devices.read().await;
        debug!(count = devices.len(), "Listing devices");
        devices.clone()
    }

    pub async fn get(&self, name: &DeviceName) -> Result<Device> {
        self.devices
            .read()
            .await
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| HubError::not_found(name.as_str()))
    }

    /// Locks the registry and hands out the record for `name`.
    pub async fn get_for_update(&self, name: &DeviceName) -> Result<DeviceGuard<'_>> {
        let guard = self.devices.write().await;
        RwLockWriteGuard::try_map(guard, |devices| devices.get_mut(name.as_str()))
            .map_err(|_| HubError::not_found(name.as_str()))
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }
}
