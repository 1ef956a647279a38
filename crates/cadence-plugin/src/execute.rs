//! `Execute` request and response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ConfigMap, Hook, ReleaseContext};

/// A request to run one lifecycle hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    /// The hook being fired.
    pub hook: Hook,

    /// The plugin's configuration map.
    #[serde(default)]
    pub config: ConfigMap,

    /// The release being run.
    pub context: ReleaseContext,

    /// When true the plugin must not perform side effects.
    #[serde(default)]
    pub dry_run: bool,
}

impl ExecuteRequest {
    /// Creates a request with an empty configuration.
    #[must_use]
    pub fn new(hook: Hook, context: ReleaseContext) -> Self {
        Self {
            hook,
            config: ConfigMap::new(),
            context,
            dry_run: false,
        }
    }

    /// Sets the configuration map.
    #[must_use]
    pub fn with_config(mut self, config: ConfigMap) -> Self {
        self.config = config;
        self
    }

    /// Sets the dry run flag.
    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Something a plugin produced (a package, an uploaded asset, a URL).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Display name.
    pub name: String,

    /// Local path or URL.
    pub path: String,

    /// Artifact kind (e.g., "deb", "crate", "url").
    #[serde(default)]
    pub r#type: String,

    /// Size in bytes.
    #[serde(default)]
    pub size: u64,

    /// Checksum, usually `sha256:<hex>`.
    #[serde(default)]
    pub checksum: String,
}

impl Artifact {
    /// Creates an artifact.
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<String>, r#type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            r#type: r#type.into(),
            size: 0,
            checksum: String::new(),
        }
    }

    /// Sets size and checksum.
    #[must_use]
    pub fn with_digest(mut self, size: u64, checksum: impl Into<String>) -> Self {
        self.size = size;
        self.checksum = checksum.into();
        self
    }
}

/// The outcome of an `Execute` call.
///
/// A failed operation is reported with `success == false` and an `error`
/// message, never as a transport error, so the host always gets a result to
/// log and display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    /// Whether the hook succeeded.
    pub success: bool,

    /// Human-readable summary.
    #[serde(default)]
    pub message: String,

    /// Failure description when `success` is false.
    #[serde(default)]
    pub error: Option<String>,

    /// Free-form outputs for later hooks or the host UI.
    #[serde(default)]
    pub outputs: ConfigMap,

    /// Produced artifacts, in production order.
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

impl ExecuteResponse {
    /// Creates a successful response.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Self::default()
        }
    }

    /// Creates a failed response.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Adds an output value.
    #[must_use]
    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(key.into(), value.into());
        self
    }

    /// Appends an artifact.
    #[must_use]
    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builder() {
        let mut config = ConfigMap::new();
        config.insert("channel".to_string(), json!("#releases"));

        let request = ExecuteRequest::new(Hook::PostPublish, ReleaseContext::new("1.0.0"))
            .with_config(config)
            .dry_run(true);

        assert_eq!(request.hook, Hook::PostPublish);
        assert!(request.dry_run);
        assert_eq!(request.config["channel"], "#releases");
    }

    #[test]
    fn test_success_response() {
        let response = ExecuteResponse::success("published")
            .with_output("url", "https://example.com/pkg")
            .with_artifact(Artifact::new("pkg", "dist/pkg.tgz", "tarball").with_digest(42, "sha256:ab"));

        assert!(response.success);
        assert!(response.error.is_none());
        assert_eq!(response.outputs["url"], "https://example.com/pkg");
        assert_eq!(response.artifacts[0].size, 42);
    }

    #[test]
    fn test_failure_response() {
        let response = ExecuteResponse::failure("bad credentials");
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("bad credentials"));
        assert!(response.message.is_empty());
    }

    #[test]
    fn test_default_is_not_success() {
        assert!(!ExecuteResponse::default().success);
    }
}
