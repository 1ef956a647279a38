//! Plugin metadata.

use serde::{Deserialize, Serialize};

use crate::Hook;

/// Plugin metadata returned by `GetInfo`.
///
/// The zero value (see [`Info::default`]) is what the host falls back to when
/// a plugin cannot be probed; such a plugin supports no hooks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    /// Plugin name.
    pub name: String,

    /// Plugin version.
    pub version: String,

    /// Short description.
    #[serde(default)]
    pub description: String,

    /// Plugin author.
    #[serde(default)]
    pub author: String,

    /// Hooks the plugin wants to be called for.
    #[serde(default)]
    pub hooks: Vec<Hook>,

    /// JSON schema describing the accepted configuration map.
    #[serde(default)]
    pub config_schema: Option<String>,
}

impl Info {
    /// Creates info with a name and version.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the author.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Sets the supported hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: impl IntoIterator<Item = Hook>) -> Self {
        self.hooks = hooks.into_iter().collect();
        self
    }

    /// Sets the configuration schema.
    #[must_use]
    pub fn with_config_schema(mut self, schema: impl Into<String>) -> Self {
        self.config_schema = Some(schema.into());
        self
    }

    /// Returns true if the plugin declared support for the hook.
    #[must_use]
    pub fn supports(&self, hook: Hook) -> bool {
        self.hooks.contains(&hook)
    }

    /// Returns true for the zero value (an unusable plugin).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}
