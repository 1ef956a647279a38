//! Error types for the plugin manager.

use std::path::PathBuf;

use cadence_rpc::{RpcError, SupervisorError};

/// Result type for plugin manager operations.
pub type PluginManagerResult<T> = Result<T, PluginManagerError>;

/// Plugin manager error types.
#[derive(Debug, thiserror::Error)]
pub enum PluginManagerError {
    /// Failed to create storage directory.
    #[error("failed to create storage directory: {path}")]
    StorageCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Plugin not declared in the configuration or not loaded.
    #[error("plugin not found: {name}")]
    PluginNotFound { name: String },

    /// Plugin binary missing on disk.
    #[error("binary for plugin {name} not found at {}", path.display())]
    BinaryNotFound { name: String, path: PathBuf },

    /// Plugin loaded twice.
    #[error("plugin already loaded: {name}")]
    AlreadyLoaded { name: String },

    /// Plugin process could not be started.
    #[error("failed to start plugin {name}")]
    Start {
        name: String,
        #[source]
        source: SupervisorError,
    },

    /// Plugin answered `GetInfo` with nothing.
    #[error("plugin {name} did not describe itself")]
    NoInfo { name: String },

    /// Plugin configuration could not be converted.
    #[error(transparent)]
    Config(#[from] cadence_config::ConfigError),

    /// A call to the plugin failed at the transport level.
    #[error("call to plugin {name} failed")]
    Rpc {
        name: String,
        #[source]
        source: RpcError,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_not_found_display() {
        let err = PluginManagerError::BinaryNotFound {
            name: "slack".to_string(),
            path: PathBuf::from("/opt/plugins/cadence-plugin-slack"),
        };
        assert_eq!(
            err.to_string(),
            "binary for plugin slack not found at /opt/plugins/cadence-plugin-slack"
        );
    }

    #[test]
    fn test_rpc_error_keeps_source() {
        let err = PluginManagerError::Rpc {
            name: "slack".to_string(),
            source: RpcError::ConnectionClosed,
        };
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "connection to plugin closed");
    }
}
