//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No configuration file at the given location.
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file exists but is not a valid `cadence.toml`.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A `[host]` setting is out of range.
    #[error("invalid host settings: {0}")]
    Host(String),

    /// A `[[plugins]]` entry is unusable.
    #[error("plugin \"{name}\": {reason}")]
    Plugin { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = ConfigError::NotFound(PathBuf::from("/srv/release/cadence.toml"));
        assert_eq!(
            err.to_string(),
            "configuration file not found: /srv/release/cadence.toml"
        );
    }

    #[test]
    fn test_plugin_display() {
        let err = ConfigError::Plugin {
            name: "slack".to_string(),
            reason: "declared twice".to_string(),
        };
        assert_eq!(err.to_string(), "plugin \"slack\": declared twice");
    }

    #[test]
    fn test_parse_error_names_file() {
        let source = toml::from_str::<toml::Table>("[[[").unwrap_err();
        let err = ConfigError::Parse {
            path: PathBuf::from("cadence.toml"),
            source,
        };
        assert!(err.to_string().starts_with("failed to parse cadence.toml: "));
        assert!(std::error::Error::source(&err).is_some());
    }
}
