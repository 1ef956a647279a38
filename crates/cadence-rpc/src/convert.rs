//! Conversions between the plugin contract and the wire types.
//!
//! Conversions are lossless except where the wire format cannot express a
//! distinction: an empty optional string and an absent one are the same on
//! the wire, and an unspecified hook has no native counterpart.

use cadence_commit::{CategorizedChanges, ConventionalCommit};
use cadence_plugin::{
    Artifact, ConfigMap, ExecuteRequest, ExecuteResponse, Hook, Info, ReleaseContext,
    RepositoryInfo, ValidateResponse, ValidationError,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::wire::{
    WireArtifact, WireCategorizedChanges, WireConventionalCommit, WireExecuteRequest,
    WireExecuteResponse, WireHook, WireInfo, WireReleaseContext, WireValidateResponse,
    WireValidationError,
};

/// Reasons an inbound `plugin.execute` request cannot be turned into an
/// [`ExecuteRequest`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unspecified hook")]
    UnspecifiedHook,

    #[error("invalid config: {0}")]
    InvalidConfig(#[source] serde_json::Error),
}

/// Maps a native hook onto its wire integer; `None` becomes `Unspecified`.
#[must_use]
pub fn hook_to_wire(hook: Option<Hook>) -> WireHook {
    let Some(hook) = hook else {
        return WireHook::Unspecified;
    };
    match hook {
        Hook::PreInit => WireHook::PreInit,
        Hook::PostInit => WireHook::PostInit,
        Hook::PrePlan => WireHook::PrePlan,
        Hook::PostPlan => WireHook::PostPlan,
        Hook::PreVersion => WireHook::PreVersion,
        Hook::PostVersion => WireHook::PostVersion,
        Hook::PreNotes => WireHook::PreNotes,
        Hook::PostNotes => WireHook::PostNotes,
        Hook::PreApprove => WireHook::PreApprove,
        Hook::PostApprove => WireHook::PostApprove,
        Hook::PrePublish => WireHook::PrePublish,
        Hook::PostPublish => WireHook::PostPublish,
        Hook::OnSuccess => WireHook::OnSuccess,
        Hook::OnError => WireHook::OnError,
    }
}

/// Maps a wire hook back; `Unspecified` becomes `None`.
#[must_use]
pub fn hook_from_wire(hook: WireHook) -> Option<Hook> {
    match hook {
        WireHook::Unspecified => None,
        WireHook::PreInit => Some(Hook::PreInit),
        WireHook::PostInit => Some(Hook::PostInit),
        WireHook::PrePlan => Some(Hook::PrePlan),
        WireHook::PostPlan => Some(Hook::PostPlan),
        WireHook::PreVersion => Some(Hook::PreVersion),
        WireHook::PostVersion => Some(Hook::PostVersion),
        WireHook::PreNotes => Some(Hook::PreNotes),
        WireHook::PostNotes => Some(Hook::PostNotes),
        WireHook::PreApprove => Some(Hook::PreApprove),
        WireHook::PostApprove => Some(Hook::PostApprove),
        WireHook::PrePublish => Some(Hook::PrePublish),
        WireHook::PostPublish => Some(Hook::PostPublish),
        WireHook::OnSuccess => Some(Hook::OnSuccess),
        WireHook::OnError => Some(Hook::OnError),
    }
}

/// Maps a hook name (`post-publish`) onto the wire; unknown names become
/// `Unspecified`.
#[must_use]
pub fn hook_name_to_wire(name: &str) -> WireHook {
    hook_to_wire(name.parse().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

#[must_use]
pub fn info_to_wire(info: &Info) -> WireInfo {
    WireInfo {
        name: info.name.clone(),
        version: info.version.clone(),
        description: info.description.clone(),
        author: info.author.clone(),
        hooks: info.hooks.iter().map(|h| hook_to_wire(Some(*h))).collect(),
        config_schema: info.config_schema.clone().unwrap_or_default(),
    }
}

/// Converts a wire `Info`; unspecified hooks are dropped.
#[must_use]
pub fn info_from_wire(info: WireInfo) -> Info {
    Info {
        name: info.name,
        version: info.version,
        description: info.description,
        author: info.author,
        hooks: info.hooks.into_iter().filter_map(hook_from_wire).collect(),
        config_schema: non_empty(info.config_schema),
    }
}

#[must_use]
pub fn commit_to_wire(commit: &ConventionalCommit) -> WireConventionalCommit {
    WireConventionalCommit {
        hash: commit.hash.clone(),
        r#type: commit.r#type.clone(),
        scope: commit.scope.clone().unwrap_or_default(),
        description: commit.description.clone(),
        body: commit.body.clone().unwrap_or_default(),
        breaking: commit.breaking,
        breaking_description: commit.breaking_description.clone().unwrap_or_default(),
        issues: commit.issues.clone(),
        author: commit.author.clone(),
        date: commit.date.to_rfc3339(),
    }
}

/// Converts a wire commit; an unparseable date becomes the Unix epoch.
#[must_use]
pub fn commit_from_wire(commit: WireConventionalCommit) -> ConventionalCommit {
    let date = DateTime::parse_from_rfc3339(&commit.date)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_default();
    ConventionalCommit {
        hash: commit.hash,
        r#type: commit.r#type,
        scope: non_empty(commit.scope),
        description: commit.description,
        body: non_empty(commit.body),
        breaking: commit.breaking,
        breaking_description: non_empty(commit.breaking_description),
        issues: commit.issues,
        author: commit.author,
        date,
    }
}

fn commits_to_wire(commits: &[ConventionalCommit]) -> Vec<WireConventionalCommit> {
    commits.iter().map(commit_to_wire).collect()
}

fn commits_from_wire(commits: Vec<WireConventionalCommit>) -> Vec<ConventionalCommit> {
    commits.into_iter().map(commit_from_wire).collect()
}

/// Converts every category independently, preserving order within each.
#[must_use]
pub fn changes_to_wire(changes: &CategorizedChanges) -> WireCategorizedChanges {
    WireCategorizedChanges {
        features: commits_to_wire(&changes.features),
        fixes: commits_to_wire(&changes.fixes),
        breaking: commits_to_wire(&changes.breaking),
        performance: commits_to_wire(&changes.performance),
        refactor: commits_to_wire(&changes.refactor),
        docs: commits_to_wire(&changes.docs),
        other: commits_to_wire(&changes.other),
    }
}

#[must_use]
pub fn changes_from_wire(changes: WireCategorizedChanges) -> CategorizedChanges {
    CategorizedChanges {
        features: commits_from_wire(changes.features),
        fixes: commits_from_wire(changes.fixes),
        breaking: commits_from_wire(changes.breaking),
        performance: commits_from_wire(changes.performance),
        refactor: commits_from_wire(changes.refactor),
        docs: commits_from_wire(changes.docs),
        other: commits_from_wire(changes.other),
    }
}

#[must_use]
pub fn context_to_wire(context: &ReleaseContext) -> WireReleaseContext {
    WireReleaseContext {
        version: context.version.clone(),
        previous_version: context.previous_version.clone(),
        tag_name: context.tag_name.clone(),
        release_type: context.release_type.clone(),
        repository_owner: context.repository.owner.clone(),
        repository_name: context.repository.name.clone(),
        repository_url: context.repository.url.clone(),
        branch: context.branch.clone(),
        commit_sha: context.commit_sha.clone(),
        changelog: context.changelog.clone(),
        release_notes: context.release_notes.clone(),
        changes: context.changes.as_ref().map(changes_to_wire),
        environment: context.environment.clone(),
    }
}

#[must_use]
pub fn context_from_wire(context: WireReleaseContext) -> ReleaseContext {
    ReleaseContext {
        version: context.version,
        previous_version: context.previous_version,
        tag_name: context.tag_name,
        release_type: context.release_type,
        repository: RepositoryInfo {
            owner: context.repository_owner,
            name: context.repository_name,
            url: context.repository_url,
        },
        branch: context.branch,
        commit_sha: context.commit_sha,
        changelog: context.changelog,
        release_notes: context.release_notes,
        changes: context.changes.map(changes_from_wire),
        environment: context.environment,
    }
}

/// Encodes a configuration map as a JSON object string.
///
/// # Errors
///
/// Returns an error if a value cannot be serialized.
pub fn config_to_wire(config: &ConfigMap) -> serde_json::Result<String> {
    serde_json::to_string(config)
}

/// Decodes a JSON object string; the empty string is an empty map.
///
/// # Errors
///
/// Returns an error if the text is not a JSON object.
pub fn config_from_wire(config: &str) -> serde_json::Result<ConfigMap> {
    if config.trim().is_empty() {
        return Ok(ConfigMap::new());
    }
    serde_json::from_str(config)
}

/// Encodes an outgoing execute request.
///
/// # Errors
///
/// Returns an error if the configuration cannot be serialized.
pub fn execute_request_to_wire(request: &ExecuteRequest) -> serde_json::Result<WireExecuteRequest> {
    Ok(WireExecuteRequest {
        hook: hook_to_wire(Some(request.hook)),
        config: config_to_wire(&request.config)?,
        context: context_to_wire(&request.context),
        dry_run: request.dry_run,
    })
}

/// Decodes an inbound execute request.
///
/// # Errors
///
/// Returns [`DecodeError`] for an unspecified hook or unparseable config.
pub fn execute_request_from_wire(request: WireExecuteRequest) -> Result<ExecuteRequest, DecodeError> {
    let hook = hook_from_wire(request.hook).ok_or(DecodeError::UnspecifiedHook)?;
    let config = config_from_wire(&request.config).map_err(DecodeError::InvalidConfig)?;
    Ok(ExecuteRequest {
        hook,
        config,
        context: context_from_wire(request.context),
        dry_run: request.dry_run,
    })
}

#[must_use]
pub fn artifact_to_wire(artifact: &Artifact) -> WireArtifact {
    WireArtifact {
        name: artifact.name.clone(),
        path: artifact.path.clone(),
        r#type: artifact.r#type.clone(),
        size: artifact.size,
        checksum: artifact.checksum.clone(),
    }
}

#[must_use]
pub fn artifact_from_wire(artifact: WireArtifact) -> Artifact {
    Artifact {
        name: artifact.name,
        path: artifact.path,
        r#type: artifact.r#type,
        size: artifact.size,
        checksum: artifact.checksum,
    }
}

/// Encodes an execute response; empty outputs travel as the empty string.
///
/// # Errors
///
/// Returns an error if an output value cannot be serialized.
pub fn execute_response_to_wire(
    response: &ExecuteResponse,
) -> serde_json::Result<WireExecuteResponse> {
    let outputs = if response.outputs.is_empty() {
        String::new()
    } else {
        config_to_wire(&response.outputs)?
    };
    Ok(WireExecuteResponse {
        success: response.success,
        message: response.message.clone(),
        error: response.error.clone().unwrap_or_default(),
        outputs,
        artifacts: response.artifacts.iter().map(artifact_to_wire).collect(),
    })
}

/// Decodes an execute response.
///
/// Outputs that fail to parse turn the response into a failure rather than
/// an error, so the caller still sees the plugin's message and artifacts.
#[must_use]
pub fn execute_response_from_wire(response: WireExecuteResponse) -> ExecuteResponse {
    let mut decoded = ExecuteResponse {
        success: response.success,
        message: response.message,
        error: non_empty(response.error),
        outputs: ConfigMap::new(),
        artifacts: response.artifacts.into_iter().map(artifact_from_wire).collect(),
    };
    match config_from_wire(&response.outputs) {
        Ok(outputs) => decoded.outputs = outputs,
        Err(e) => {
            decoded.success = false;
            decoded.error = Some(format!("invalid outputs from plugin: {e}"));
        }
    }
    decoded
}

#[must_use]
pub fn validate_response_to_wire(response: &ValidateResponse) -> WireValidateResponse {
    WireValidateResponse {
        valid: response.valid,
        errors: response
            .errors
            .iter()
            .map(|e| WireValidationError {
                field: e.field.clone(),
                message: e.message.clone(),
                code: e.code.clone(),
            })
            .collect(),
    }
}

#[must_use]
pub fn validate_response_from_wire(response: WireValidateResponse) -> ValidateResponse {
    ValidateResponse {
        valid: response.valid,
        errors: response
            .errors
            .into_iter()
            .map(|e| ValidationError {
                field: e.field,
                message: e.message,
                code: e.code,
            })
            .collect(),
    }
}
