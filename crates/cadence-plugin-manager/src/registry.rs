//! Plugins loaded into the current host session.

use cadence_config::PluginEntry;
use cadence_plugin::{Hook, Info};
use cadence_rpc::PluginProcess;

/// A started plugin together with what it told us about itself.
#[derive(Debug)]
pub struct LoadedPlugin {
    pub entry: PluginEntry,
    pub info: Info,
    pub process: PluginProcess,
}

impl LoadedPlugin {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.entry.name
    }

    /// Returns true if a `hook` dispatch should reach this plugin.
    #[must_use]
    pub fn handles(&self, hook: Hook) -> bool {
        dispatches_to(&self.entry, &self.info, hook)
    }
}

/// A hook reaches a plugin only if the plugin declares it and the
/// configuration does not filter it out.
#[must_use]
pub fn dispatches_to(entry: &PluginEntry, info: &Info, hook: Hook) -> bool {
    entry.enabled && info.supports(hook) && entry.wants(hook)
}

/// Loaded plugins, kept in configuration order.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Vec<LoadedPlugin>,
}

impl PluginRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, plugin: LoadedPlugin) {
        self.plugins.push(plugin);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&LoadedPlugin> {
        self.plugins.iter().find(|p| p.name() == name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Names of loaded plugins, in load order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(LoadedPlugin::name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoadedPlugin> {
        self.plugins.iter()
    }

    /// Plugins a `hook` dispatch reaches, in load order.
    pub fn supporting(&self, hook: Hook) -> impl Iterator<Item = &LoadedPlugin> {
        self.plugins.iter().filter(move |p| p.handles(hook))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = LoadedPlugin> + '_ {
        self.plugins.drain(..)
    }
}
