//! Wire-level message types.
//!
//! These mirror the plugin contract field for field but stay deliberately
//! flat: hooks are integers, optional strings are empty strings, dates are
//! RFC 3339 text and free-form maps travel as JSON-encoded strings. Use
//! [`crate::convert`] to move between these and the `cadence_plugin` types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Integer hook identifier on the wire.
///
/// `0` is reserved for "unspecified"; unknown integers decode to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
#[repr(i32)]
pub enum WireHook {
    #[default]
    Unspecified = 0,
    PreInit = 1,
    PostInit = 2,
    PrePlan = 3,
    PostPlan = 4,
    PreVersion = 5,
    PostVersion = 6,
    PreNotes = 7,
    PostNotes = 8,
    PreApprove = 9,
    PostApprove = 10,
    PrePublish = 11,
    PostPublish = 12,
    OnSuccess = 13,
    OnError = 14,
}

impl WireHook {
    /// Every variant, `Unspecified` first.
    pub const ALL: [Self; 15] = [
        Self::Unspecified,
        Self::PreInit,
        Self::PostInit,
        Self::PrePlan,
        Self::PostPlan,
        Self::PreVersion,
        Self::PostVersion,
        Self::PreNotes,
        Self::PostNotes,
        Self::PreApprove,
        Self::PostApprove,
        Self::PrePublish,
        Self::PostPublish,
        Self::OnSuccess,
        Self::OnError,
    ];
}

impl From<i32> for WireHook {
    fn from(value: i32) -> Self {
        Self::ALL
            .into_iter()
            .find(|hook| *hook as i32 == value)
            .unwrap_or(Self::Unspecified)
    }
}

impl From<WireHook> for i32 {
    fn from(hook: WireHook) -> Self {
        hook as Self
    }
}

/// Params of `plugin.getInfo` responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub hooks: Vec<WireHook>,
    #[serde(default)]
    pub config_schema: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireConventionalCommit {
    pub hash: String,
    pub r#type: String,
    #[serde(default)]
    pub scope: String,
    pub description: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub breaking: bool,
    #[serde(default)]
    pub breaking_description: String,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub author: String,
    /// RFC 3339 timestamp.
    #[serde(default)]
    pub date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireCategorizedChanges {
    #[serde(default)]
    pub features: Vec<WireConventionalCommit>,
    #[serde(default)]
    pub fixes: Vec<WireConventionalCommit>,
    #[serde(default)]
    pub breaking: Vec<WireConventionalCommit>,
    #[serde(default)]
    pub performance: Vec<WireConventionalCommit>,
    #[serde(default)]
    pub refactor: Vec<WireConventionalCommit>,
    #[serde(default)]
    pub docs: Vec<WireConventionalCommit>,
    #[serde(default)]
    pub other: Vec<WireConventionalCommit>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireReleaseContext {
    pub version: String,
    #[serde(default)]
    pub previous_version: String,
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub release_type: String,
    #[serde(default)]
    pub repository_owner: String,
    #[serde(default)]
    pub repository_name: String,
    #[serde(default)]
    pub repository_url: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub commit_sha: String,
    #[serde(default)]
    pub changelog: String,
    #[serde(default)]
    pub release_notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<WireCategorizedChanges>,
    #[serde(default)]
    pub environment: HashMap<String, String>,
}

/// Params of `plugin.execute`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireExecuteRequest {
    pub hook: WireHook,
    /// JSON-encoded configuration object.
    #[serde(default)]
    pub config: String,
    #[serde(default)]
    pub context: WireReleaseContext,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireArtifact {
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub r#type: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub checksum: String,
}

/// Result of `plugin.execute`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireExecuteResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub error: String,
    /// JSON-encoded outputs object; empty means no outputs.
    #[serde(default)]
    pub outputs: String,
    #[serde(default)]
    pub artifacts: Vec<WireArtifact>,
}

/// Params of `plugin.validate`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireValidateRequest {
    /// JSON-encoded configuration object.
    #[serde(default)]
    pub config: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireValidationError {
    pub field: String,
    pub message: String,
    #[serde(default)]
    pub code: String,
}

/// Result of `plugin.validate`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireValidateResponse {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<WireValidationError>,
}
