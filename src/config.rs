//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `hub.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - ServerConfig: Address the web server binds to.
//!     - StorageConfig: Where reading logs go, and what a failed append does.
//!     - MetricsConfig: Which metric set this deployment requires.
//!     - LoggingConfig: Default log level (RUST_LOG still wins), and whether
//!       accepted readings are echoed into the log.
//!
//! every section is optional; missing sections and keys take the defaults.
//!
//! ==============================================================================

use crate::metrics::MetricSet;
use crate::recorder::LogFailurePolicy;
use anyhow::Context;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "TELEMETRY_HUB_CONFIG";

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HubConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub on_log_failure: LogFailurePolicy,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MetricsConfig {
    /// mq2 deployments also report lpg, methane and smoke
    pub gas_sensor: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 5000)),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            on_log_failure: LogFailurePolicy::Keep,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_sensor_data: true,
        }
    }
}

impl MetricsConfig {
    pub fn metric_set(&self) -> MetricSet {
        if self.gas_sensor {
            MetricSet::with_gas()
        } else {
            MetricSet::standard()
        }
    }
}

impl HubConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load with default fallback
    ///
    /// An explicit path in `TELEMETRY_HUB_CONFIG` must load; the well-known
    /// locations are only tried when it is unset.
    pub fn load_or_default() -> anyhow::Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            let config = Self::load(&path)?;
            println!("[CONFIG] Loaded from {}", Path::new(&path).display());
            return Ok(config);
        }

        let paths = [
            PathBuf::from("config").join("hub.toml"),
            PathBuf::from("..").join("config").join("hub.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: {:#}", e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Ok(Self::default())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("┌─────────────────────────────────────────┐");
        println!("│            HUB CONFIGURATION            │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Bind: {}", self.server.bind);
        println!("│ Data Dir: {}", self.storage.data_dir.display());
        println!("│ On Log Failure: {:?}", self.storage.on_log_failure);
        println!("│ Gas Sensor Metrics: {}", self.metrics.gas_sensor);
        println!("│ Log Level: {}", self.logging.level);
        println!("│ Show Sensor Data: {}", self.logging.show_sensor_data);
        println!("└─────────────────────────────────────────┘");
    }
}
