//! Logging setup
//!
//! Library code only emits `tracing` events. Binaries embedding a session
//! call [`init_logging`] once, or install their own subscriber.

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use herald_core::{HeraldError, HeraldResult};

/// Output format of the global subscriber
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Install the global subscriber
///
/// `RUST_LOG` wins over `default_directive` when set. Fails if a global
/// subscriber is already installed.
pub fn init_logging(format: LogFormat, default_directive: &str) -> HeraldResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|e| HeraldError::Logging(e.to_string()))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let result = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| HeraldError::Logging(e.to_string()))?;

    tracing::debug!(?format, "logging initialized");
    Ok(())
}
