//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, ConfigResult, LoggingConfig};

/// Install a global fmt subscriber for `config`.
///
/// `RUST_LOG` wins over the configured filter when set. Returns `Ok(false)`
/// if a global subscriber was already installed (tests call this repeatedly).
pub fn init_tracing(config: &LoggingConfig) -> ConfigResult<bool> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives),
        _ => EnvFilter::try_new(&config.filter),
    }
    .map_err(|e| ConfigError::InvalidFilter {
        filter: config.filter.clone(),
        reason: e.to_string(),
    })?;

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(true)
        .try_init()
        .is_ok();
    Ok(installed)
}
