//! Logging bootstrap, powered by `tracing-subscriber`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LogConfig;

/// Builds the filter from config directives. `RUST_LOG`, when set, wins.
///
/// # Errors
///
/// Returns an error if the directives do not parse.
pub fn build_env_filter(config: &LogConfig) -> anyhow::Result<EnvFilter> {
    if let Ok(from_env) = EnvFilter::try_from_default_env() {
        return Ok(from_env);
    }
    EnvFilter::try_new(&config.filter)
        .map_err(|e| anyhow::anyhow!("invalid log filter '{}': {}", config.filter, e))
}

/// Installs the global subscriber, writing to stderr.
///
/// Returns `Ok(false)` if a subscriber was already installed; the existing
/// one is kept.
///
/// # Errors
///
/// Returns an error if the filter directives do not parse.
pub fn init(config: &LogConfig) -> anyhow::Result<bool> {
    let filter = build_env_filter(config)?;
    let layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed()
    };
    Ok(tracing_subscriber::registry().with(layer).try_init().is_ok())
}
