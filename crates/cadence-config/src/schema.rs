//! Configuration schema.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use cadence_plugin::{ConfigMap, Hook};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Host-side settings.
    #[serde(default)]
    pub host: HostConfig,

    /// Plugins to load, in dispatch order.
    #[serde(default)]
    pub plugins: Vec<PluginEntry>,
}

impl Config {
    /// Returns the entry named `name`.
    #[must_use]
    pub fn plugin(&self, name: &str) -> Option<&PluginEntry> {
        self.plugins.iter().find(|p| p.name == name)
    }

    /// Returns the enabled entries in declaration order.
    pub fn enabled_plugins(&self) -> impl Iterator<Item = &PluginEntry> {
        self.plugins.iter().filter(|p| p.enabled)
    }

    /// Checks constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Host`] for zero timeouts and
    /// [`ConfigError::Plugin`] for empty or duplicate plugin names.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.host.get_info_timeout_ms == 0 || self.host.startup_timeout_ms == 0 {
            return Err(ConfigError::Host(
                "timeouts must be greater than zero".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for plugin in &self.plugins {
            if plugin.name.trim().is_empty() {
                return Err(ConfigError::Plugin {
                    name: plugin.name.clone(),
                    reason: "name cannot be empty".to_string(),
                });
            }
            if !seen.insert(plugin.name.as_str()) {
                return Err(ConfigError::Plugin {
                    name: plugin.name.clone(),
                    reason: "declared twice".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Host configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// How long to wait for a plugin's `GetInfo` answer.
    #[serde(default = "default_get_info_timeout_ms")]
    pub get_info_timeout_ms: u64,

    /// How long a plugin may take to print its handshake.
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,

    /// How long a plugin may take to exit on shutdown before it is killed.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Directory holding `cadence-plugin-<name>` binaries.
    #[serde(default)]
    pub plugin_dir: Option<PathBuf>,

    /// Prefixes of environment variables exposed to plugins.
    #[serde(default = "default_env_allowlist")]
    pub env_allowlist: Vec<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            get_info_timeout_ms: default_get_info_timeout_ms(),
            startup_timeout_ms: default_startup_timeout_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            plugin_dir: None,
            env_allowlist: default_env_allowlist(),
        }
    }
}

impl HostConfig {
    #[must_use]
    pub fn get_info_timeout(&self) -> Duration {
        Duration::from_millis(self.get_info_timeout_ms)
    }

    #[must_use]
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Returns the plugin directory, defaulting to `~/.cadence/plugins`.
    ///
    /// Without a home directory the default is relative to the working
    /// directory.
    #[must_use]
    pub fn plugin_dir(&self) -> PathBuf {
        self.plugin_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_default()
                .join(".cadence")
                .join("plugins")
        })
    }
}

fn default_get_info_timeout_ms() -> u64 {
    5_000
}

fn default_startup_timeout_ms() -> u64 {
    10_000
}

fn default_shutdown_grace_ms() -> u64 {
    2_000
}

fn default_env_allowlist() -> Vec<String> {
    vec!["CI".to_string(), "CADENCE_".to_string()]
}

/// One `[[plugins]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginEntry {
    /// Plugin name; the binary is `cadence-plugin-<name>` unless `path` is set.
    pub name: String,

    /// Explicit binary path.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Whether the plugin is loaded at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Restricts the hooks the plugin is called for. `None` means every hook
    /// it declares.
    #[serde(default)]
    pub hooks: Option<Vec<Hook>>,

    /// Free-form settings forwarded to the plugin.
    #[serde(default)]
    pub config: toml::Table,
}

fn default_true() -> bool {
    true
}

impl PluginEntry {
    /// Creates an enabled entry with no settings.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            enabled: true,
            hooks: None,
            config: toml::Table::new(),
        }
    }

    /// Returns true unless the `hooks` filter excludes `hook`.
    #[must_use]
    pub fn wants(&self, hook: Hook) -> bool {
        self.hooks.as_ref().is_none_or(|hooks| hooks.contains(&hook))
    }

    /// Converts the settings table into the map sent to the plugin.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Plugin`] if a value has no JSON equivalent.
    pub fn config_map(&self) -> ConfigResult<ConfigMap> {
        match serde_json::to_value(&self.config) {
            Ok(serde_json::Value::Object(map)) => Ok(map),
            Ok(_) => Ok(ConfigMap::new()),
            Err(e) => Err(ConfigError::Plugin {
                name: self.name.clone(),
                reason: format!("config table: {e}"),
            }),
        }
    }
}
