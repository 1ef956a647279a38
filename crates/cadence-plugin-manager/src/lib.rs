//! Plugin manager for Cadence.
//!
//! This crate handles:
//! - Locating `cadence-plugin-<name>` binaries on disk
//! - Starting the plugins listed in `cadence.toml`
//! - Dispatching lifecycle hooks to every plugin that handles them
//! - Validating plugin configuration and shutting plugins down

pub mod error;
pub mod manager;
pub mod registry;
pub mod storage;

pub use error::{PluginManagerError, PluginManagerResult};
pub use manager::{HookOutcome, LoadFailure, PluginManager, ValidationOutcome};
pub use registry::{LoadedPlugin, PluginRegistry};
pub use storage::{BINARY_PREFIX, DiscoveredPlugin, PluginStorage};
