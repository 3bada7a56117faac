//! ==============================================================================
//! storage.rs - per-device reading logs
//! ==============================================================================
//!
//! layout:
//!
//! ```text
//! <data_dir>/data_<device>.csv
//!
//! Timestamp,Temperature (°C),Humidity (%),Pressure (kPa),Gas Resistance (KOhm)
//! 2026-10-17 09:14:02.417,21.5,40.2,101.3,12.8
//! ```
//!
//! the header goes in when the file is created (or found empty). rows are only
//! ever appended; nothing here rewrites or deletes a log.
//!
//! ==============================================================================

use crate::domain::DeviceName;
use crate::metrics::{MetricSet, MetricValues};
use chrono::{DateTime, Local};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Clone)]
pub struct ReadingLog {
    data_dir: PathBuf,
    metrics: MetricSet,
}

impl ReadingLog {
    pub fn new(data_dir: impl Into<PathBuf>, metrics: MetricSet) -> Self {
        Self {
            data_dir: data_dir.into(),
            metrics,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// creates the data directory if it is missing
    pub async fn ensure_dir(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.data_dir).await
    }

    pub fn path_for(&self, device: &DeviceName) -> PathBuf {
        self.data_dir.join(format!("data_{device}.csv"))
    }

    /// Appends one reading row, writing the header first on a new file.
    pub async fn append(
        &self,
        device: &DeviceName,
        timestamp: &DateTime<Local>,
        values: &MetricValues,
    ) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(device))
            .await?;

        let mut buf = String::new();
        if file.metadata().await?.len() == 0 {
            buf.push_str(&self.metrics.header().join(","));
            buf.push('\n');
        }
        buf.push_str(&self.row(timestamp, values));
        buf.push('\n');

        // one write per append so a row is never split across calls
        file.write_all(buf.as_bytes()).await?;
        file.flush().await
    }

    fn row(&self, timestamp: &DateTime<Local>, values: &MetricValues) -> String {
        std::iter::once(timestamp.format(TIMESTAMP_FORMAT).to_string())
            .chain(
                self.metrics
                    .iter()
                    .map(|m| values.get(&m).copied().unwrap_or_default().to_string()),
            )
            .collect::<Vec<_>>()
            .join(",")
    }
}
