pub mod hook;
pub mod plugin;

use std::path::Path;

use anyhow::{Context, Result};
use cadence_config::{Config, ConfigError, find_and_load_config, load_config as load_file};
use tracing::debug;

/// Loads an explicit configuration file, or the nearest `cadence.toml`.
///
/// Running without any configuration file is allowed and yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        return load_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()));
    }
    match find_and_load_config() {
        Ok(config) => Ok(config),
        Err(ConfigError::NotFound(path)) => {
            debug!(path = %path.display(), "no configuration file, using defaults");
            Ok(Config::default())
        }
        Err(e) => Err(e).context("failed to load configuration"),
    }
}

/// Builds the async runtime the commands block on.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to create async runtime")
}
