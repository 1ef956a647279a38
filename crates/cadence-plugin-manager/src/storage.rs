//! Local plugin binaries.
//!
//! Plugins live in a single directory, `~/.cadence/plugins/` by default:
//! ```text
//! ~/.cadence/plugins/
//! ├── cadence-plugin-echo
//! ├── cadence-plugin-slack
//! └── ...
//! ```
//! A `[[plugins]]` entry with an explicit `path` bypasses the directory.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use cadence_config::PluginEntry;
use tracing::debug;

use crate::{PluginManagerError, PluginManagerResult};

/// File name prefix of every plugin binary.
pub const BINARY_PREFIX: &str = "cadence-plugin-";

/// A plugin binary found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPlugin {
    /// Name without the `cadence-plugin-` prefix.
    pub name: String,
    pub path: PathBuf,
}

/// Resolves plugin binaries.
#[derive(Debug, Clone)]
pub struct PluginStorage {
    plugins_dir: PathBuf,
}

impl PluginStorage {
    /// Creates a storage rooted at `~/.cadence/plugins`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory is unknown or the directory
    /// cannot be created.
    pub fn new() -> PluginManagerResult<Self> {
        let home = dirs::home_dir().ok_or_else(|| PluginManagerError::StorageCreation {
            path: PathBuf::from("~/.cadence/plugins"),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine home directory",
            ),
        })?;
        Self::with_dir(home.join(".cadence").join("plugins"))
    }

    /// Creates a storage rooted at `plugins_dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn with_dir(plugins_dir: impl Into<PathBuf>) -> PluginManagerResult<Self> {
        let plugins_dir = plugins_dir.into();
        std::fs::create_dir_all(&plugins_dir).map_err(|source| {
            PluginManagerError::StorageCreation {
                path: plugins_dir.clone(),
                source,
            }
        })?;
        Ok(Self { plugins_dir })
    }

    #[must_use]
    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    /// Returns `cadence-plugin-<name>`.
    #[must_use]
    pub fn binary_name(name: &str) -> String {
        format!("{BINARY_PREFIX}{name}")
    }

    /// Returns where the binary of `name` is expected.
    #[must_use]
    pub fn binary_path(&self, name: &str) -> PathBuf {
        self.plugins_dir.join(Self::binary_name(name))
    }

    /// Resolves the binary for a configuration entry.
    ///
    /// # Errors
    ///
    /// Returns [`PluginManagerError::BinaryNotFound`] if the file does not
    /// exist.
    pub fn resolve(&self, entry: &PluginEntry) -> PluginManagerResult<PathBuf> {
        let path = entry
            .path
            .clone()
            .unwrap_or_else(|| self.binary_path(&entry.name));
        debug!(plugin = %entry.name, path = %path.display(), "resolving plugin binary");

        if path.is_file() {
            Ok(path)
        } else {
            Err(PluginManagerError::BinaryNotFound {
                name: entry.name.clone(),
                path,
            })
        }
    }

    /// Lists executable plugin binaries in the directory, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn list(&self) -> PluginManagerResult<Vec<DiscoveredPlugin>> {
        let mut found = Vec::new();
        for entry in std::fs::read_dir(&self.plugins_dir)? {
            let entry = entry?;
            let path = entry.path();
            let Some(name) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix(BINARY_PREFIX))
            else {
                continue;
            };
            if name.is_empty() || !is_executable(&path) {
                continue;
            }
            found.push(DiscoveredPlugin {
                name: name.to_string(),
                path,
            });
        }
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}
