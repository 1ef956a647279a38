//! Plugin error types.

use thiserror::Error;

use crate::Hook;

/// Errors a plugin implementation can return from a call.
///
/// These travel back to the host as RPC errors. Domain failures (a publish
/// step that failed) belong in [`crate::ExecuteResponse`] instead.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The plugin was asked to run a hook it does not support.
    #[error("unsupported hook: {0}")]
    UnsupportedHook(Hook),

    /// Configuration error.
    #[error("plugin configuration error: {0}")]
    Config(String),

    /// Plugin execution failed.
    #[error("plugin execution failed: {0}")]
    ExecutionFailed(String),

    /// The call was cancelled by the host.
    #[error("call cancelled")]
    Cancelled,

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_hook_display() {
        let err = PluginError::UnsupportedHook(Hook::PrePublish);
        assert_eq!(err.to_string(), "unsupported hook: pre-publish");
    }

    #[test]
    fn test_config_display() {
        let err = PluginError::Config("missing webhook".to_string());
        assert_eq!(err.to_string(), "plugin configuration error: missing webhook");
    }

    #[test]
    fn test_execution_failed_display() {
        let err = PluginError::ExecutionFailed("crash".to_string());
        assert_eq!(err.to_string(), "plugin execution failed: crash");
    }

    #[test]
    fn test_cancelled_display() {
        assert_eq!(PluginError::Cancelled.to_string(), "call cancelled");
    }

    #[test]
    fn test_json_from() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = PluginError::from(json_err);
        assert!(err.to_string().starts_with("JSON error:"));
    }

    #[test]
    fn test_plugin_result_err() {
        let result: PluginResult<i32> = Err(PluginError::Cancelled);
        assert!(result.is_err());
    }
}
