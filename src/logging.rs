//! Tracing subscriber setup.
//!
//! The configured level applies to this crate and everything else by default;
//! `RUST_LOG`, when set, takes precedence so individual modules can be tuned:
//!
//! ```text
//! RUST_LOG=light_daq::acquisition=trace light-daq
//! ```

use crate::config::Settings;
use crate::error::{AppResult, DaqError};
use tracing_subscriber::{fmt, EnvFilter};

/// Build the filter for `level`, deferring to `RUST_LOG` when present.
pub fn env_filter(level: &str) -> AppResult<EnvFilter> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(level),
    }
    .map_err(|e| DaqError::Configuration(format!("Invalid log filter: {}", e)))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(level: &str) -> AppResult<()> {
    fmt()
        .with_env_filter(env_filter(level)?)
        .with_target(true)
        .try_init()
        .map_err(|e| DaqError::Configuration(format!("Failed to initialize tracing: {}", e)))
}

pub fn init_from_config(settings: &Settings) -> AppResult<()> {
    init(&settings.application.log_level)
}
