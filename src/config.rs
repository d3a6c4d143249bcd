//! Configuration loading using Figment.
//!
//! Configuration is loaded from (in order of precedence, highest last):
//! 1. Built-in defaults
//! 2. TOML configuration file (default: `config/light_daq.toml`, optional)
//! 3. Environment variables prefixed with `LIGHT_DAQ_`, nested keys separated by `__`
//!
//! ```text
//! LIGHT_DAQ_APPLICATION__LOG_LEVEL=debug
//! LIGHT_DAQ_TRANSPORT__UDP_PORT=9000
//! LIGHT_DAQ_TRANSPORT__PORT_NAME=/dev/ttyACM0
//! ```
//!
//! # Example
//!
//! ```no_run
//! use light_daq::config::Settings;
//!
//! let settings = Settings::load_from("config/light_daq.toml")?;
//! println!("Priority: {:?}", settings.transport.priority);
//! # Ok::<(), light_daq::error::DaqError>(())
//! ```

use crate::error::{AppResult, DaqError};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/light_daq.toml";

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "LIGHT_DAQ_";

/// Transport variant selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Serial,
    Udp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Serial => f.write_str("serial"),
            TransportKind::Udp => f.write_str("udp"),
        }
    }
}

impl std::str::FromStr for TransportKind {
    type Err = DaqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serial" => Ok(TransportKind::Serial),
            "udp" => Ok(TransportKind::Udp),
            other => Err(DaqError::Configuration(format!(
                "Unknown transport '{}'. Must be one of: serial, udp",
                other
            ))),
        }
    }
}

/// How the priority list is turned into acquisition loops.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityPolicy {
    /// One loop per listed transport, all feeding the same queue.
    #[default]
    Concurrent,
    /// A single loop that moves down the list after repeated connect failures.
    Failover,
}

impl std::str::FromStr for PriorityPolicy {
    type Err = DaqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "concurrent" => Ok(PriorityPolicy::Concurrent),
            "failover" => Ok(PriorityPolicy::Failover),
            other => Err(DaqError::Configuration(format!(
                "Unknown priority policy '{}'. Must be one of: concurrent, failover",
                other
            ))),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub application: ApplicationConfig,
    pub transport: TransportConfig,
    pub normalization: NormalizationConfig,
    pub queue: QueueConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Transport selection and connection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Serial device (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,
    /// Serial baud rate
    pub baud_rate: u32,
    /// Local UDP port to listen on
    pub udp_port: u16,
    /// Fixed delay between a failure and the next connect attempt
    pub retry_delay_ms: u64,
    /// Transports to run, most preferred first
    pub priority: Vec<TransportKind>,
    pub policy: PriorityPolicy,
    /// Consecutive connect failures before failing over to the next transport
    pub failover_after: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port_name: default_port_name(),
            baud_rate: 115_200,
            udp_port: 8000,
            retry_delay_ms: 1000,
            priority: vec![TransportKind::Serial, TransportKind::Udp],
            policy: PriorityPolicy::Concurrent,
            failover_after: 3,
        }
    }
}

impl TransportConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_port_name() -> String {
    if cfg!(windows) {
        "COM3".to_string()
    } else {
        "/dev/ttyUSB0".to_string()
    }
}

/// Mapping of raw sensor counts onto the output range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Full-scale raw reading (10-bit ADC)
    pub raw_max: f32,
    pub output_min: f32,
    pub output_max: f32,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            raw_max: 1023.0,
            output_min: 0.0,
            output_max: 24.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum queued samples; oldest are dropped beyond this. Unbounded when unset.
    pub capacity: Option<usize>,
}

impl Settings {
    /// Load from [`DEFAULT_CONFIG_PATH`] and the environment.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file path and the environment.
    ///
    /// A missing file is not an error; defaults and environment variables still apply.
    /// The result is validated before it is returned.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let settings: Self = Self::figment(path.as_ref()).extract()?;
        settings.validate()?;
        Ok(settings)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    ///
    /// Checks:
    /// - Log level is valid (trace, debug, info, warn, error)
    /// - Priority list is non-empty and has no duplicates
    /// - Serial port name and baud rate are usable when serial is listed
    /// - UDP port is non-zero when UDP is listed
    /// - Normalization range is finite and `raw_max` is positive
    /// - Queue capacity, when set, is non-zero
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_ascii_lowercase().as_str()) {
            return Err(DaqError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        self.transport.validate()?;

        let n = &self.normalization;
        if !(n.raw_max.is_finite() && n.raw_max > 0.0) {
            return Err(DaqError::Configuration(format!(
                "Invalid raw_max {}. Must be a positive number",
                n.raw_max
            )));
        }
        if !(n.output_min.is_finite() && n.output_max.is_finite()) {
            return Err(DaqError::Configuration(
                "Output range bounds must be finite".to_string(),
            ));
        }

        if self.queue.capacity == Some(0) {
            return Err(DaqError::Configuration(
                "Queue capacity must be greater than 0 (omit it for an unbounded queue)"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

impl TransportConfig {
    pub fn validate(&self) -> AppResult<()> {
        if self.priority.is_empty() {
            return Err(DaqError::Configuration(
                "Transport priority list cannot be empty".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for kind in &self.priority {
            if !seen.insert(kind) {
                return Err(DaqError::Configuration(format!(
                    "Duplicate transport '{}' in priority list",
                    kind
                )));
            }
        }

        if seen.contains(&TransportKind::Serial) {
            if self.port_name.trim().is_empty() {
                return Err(DaqError::Configuration(
                    "Serial transport: 'port_name' cannot be empty".to_string(),
                ));
            }
            if self.baud_rate == 0 {
                return Err(DaqError::Configuration(
                    "Serial transport: 'baud_rate' must be greater than 0".to_string(),
                ));
            }
        }

        if seen.contains(&TransportKind::Udp) && self.udp_port == 0 {
            return Err(DaqError::Configuration(
                "UDP transport: 'udp_port' must be greater than 0".to_string(),
            ));
        }

        if self.policy == PriorityPolicy::Failover && self.failover_after == 0 {
            return Err(DaqError::Configuration(
                "'failover_after' must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
