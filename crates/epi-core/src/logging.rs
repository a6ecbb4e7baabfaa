//! Logging setup.
//!
//! stderr receives all log output so stdout stays parseable; the
//! `EPI_LOG` environment variable selects the filter (`info` default,
//! standard `tracing` directive syntax).

use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "EPI_LOG";

/// Initialize the global subscriber. Safe to call once per process.
pub fn init() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
