//! telemetry-hub: sensor devices register, push readings, and get listed.
//!
//! The registry keeps the live state of every device in memory; each accepted
//! reading is also appended to a per-device CSV log under the data directory.

pub mod api;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod recorder;
pub mod registry;
pub mod storage;

pub use api::{create_router, AppState};
pub use client::{ClientError, HubClient};
pub use config::HubConfig;
pub use domain::{Device, DeviceName, Snapshot};
pub use error::{HubError, Result};
pub use metrics::{Metric, MetricSet, MetricValues, Payload};
pub use recorder::{LogFailurePolicy, Recorder};
pub use registry::Registry;
pub use storage::ReadingLog;
