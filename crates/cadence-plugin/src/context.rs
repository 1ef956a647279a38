//! Release context passed to every `Execute` call.

use std::collections::HashMap;

use cadence_commit::CategorizedChanges;
use semver::Version;
use serde::{Deserialize, Serialize};

/// Identity of the repository being released.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    /// Repository owner or organisation.
    pub owner: String,

    /// Repository name.
    pub name: String,

    /// Clone or web URL.
    #[serde(default)]
    pub url: String,
}

impl RepositoryInfo {
    /// Creates a repository identity.
    #[must_use]
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            url: String::new(),
        }
    }

    /// Returns `owner/name`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// State of the release the host is running, as seen by a plugin.
///
/// The host builds one before each `Execute` call; plugins treat it as
/// read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseContext {
    /// The version being released.
    pub version: String,

    /// The previously released version.
    #[serde(default)]
    pub previous_version: String,

    /// The git tag of this release (e.g., "v1.2.3").
    #[serde(default)]
    pub tag_name: String,

    /// Release type (major, minor, patch, prerelease).
    #[serde(default)]
    pub release_type: String,

    /// Repository identity.
    #[serde(default)]
    pub repository: RepositoryInfo,

    /// Branch the release is cut from.
    #[serde(default)]
    pub branch: String,

    /// Commit SHA being released.
    #[serde(default)]
    pub commit_sha: String,

    /// Generated changelog text.
    #[serde(default)]
    pub changelog: String,

    /// Human-written release notes.
    #[serde(default)]
    pub release_notes: String,

    /// Commits since the previous release, grouped by category.
    #[serde(default)]
    pub changes: Option<CategorizedChanges>,

    /// Environment variables the host chose to expose.
    #[serde(default)]
    pub environment: HashMap<String, String>,
}

impl ReleaseContext {
    /// Creates a context for the given version.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Self::default()
        }
    }

    /// Sets the previous version.
    #[must_use]
    pub fn with_previous_version(mut self, previous: impl Into<String>) -> Self {
        self.previous_version = previous.into();
        self
    }

    /// Sets the tag name.
    #[must_use]
    pub fn with_tag_name(mut self, tag: impl Into<String>) -> Self {
        self.tag_name = tag.into();
        self
    }

    /// Sets the release type.
    #[must_use]
    pub fn with_release_type(mut self, release_type: impl Into<String>) -> Self {
        self.release_type = release_type.into();
        self
    }

    /// Sets the repository identity.
    #[must_use]
    pub fn with_repository(mut self, repository: RepositoryInfo) -> Self {
        self.repository = repository;
        self
    }

    /// Sets the branch and commit.
    #[must_use]
    pub fn with_commit(mut self, branch: impl Into<String>, sha: impl Into<String>) -> Self {
        self.branch = branch.into();
        self.commit_sha = sha.into();
        self
    }

    /// Sets the changelog text.
    #[must_use]
    pub fn with_changelog(mut self, changelog: impl Into<String>) -> Self {
        self.changelog = changelog.into();
        self
    }

    /// Sets the release notes.
    #[must_use]
    pub fn with_release_notes(mut self, notes: impl Into<String>) -> Self {
        self.release_notes = notes.into();
        self
    }

    /// Sets the categorized changes.
    #[must_use]
    pub fn with_changes(mut self, changes: CategorizedChanges) -> Self {
        self.changes = Some(changes);
        self
    }

    /// Exposes the variables whose name starts with one of `allowed_prefixes`.
    ///
    /// Everything else is dropped so secrets held by the host process do not
    /// leak into plugins that did not ask for them.
    #[must_use]
    pub fn with_filtered_environment<I, K, V>(mut self, vars: I, allowed_prefixes: &[String]) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.environment = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .filter(|(key, _)| {
                allowed_prefixes
                    .iter()
                    .any(|prefix| key.starts_with(prefix.as_str()))
            })
            .collect();
        self
    }

    /// Parses [`ReleaseContext::version`] as a semantic version.
    ///
    /// A leading `v` is accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the version is not valid semver.
    pub fn semver(&self) -> Result<Version, semver::Error> {
        Version::parse(self.version.trim_start_matches('v'))
    }

    /// Returns true if the version carries a pre-release component.
    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        self.semver().is_ok_and(|v| !v.pre.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_commit::ConventionalCommit;

    fn create_context() -> ReleaseContext {
        ReleaseContext::new("1.1.0")
            .with_previous_version("1.0.0")
            .with_tag_name("v1.1.0")
            .with_release_type("minor")
            .with_repository(RepositoryInfo::new("acme", "rocket"))
            .with_commit("main", "deadbeef")
    }

    #[test]
    fn test_new() {
        let ctx = ReleaseContext::new("2.0.0");
        assert_eq!(ctx.version, "2.0.0");
        assert!(ctx.previous_version.is_empty());
        assert!(ctx.changes.is_none());
        assert!(ctx.environment.is_empty());
    }

    #[test]
    fn test_builder_fields() {
        let ctx = create_context();
        assert_eq!(ctx.previous_version, "1.0.0");
        assert_eq!(ctx.tag_name, "v1.1.0");
        assert_eq!(ctx.release_type, "minor");
        assert_eq!(ctx.repository.full_name(), "acme/rocket");
        assert_eq!(ctx.branch, "main");
        assert_eq!(ctx.commit_sha, "deadbeef");
    }

    #[test]
    fn test_with_changes() {
        let changes = CategorizedChanges::from_commits(vec![
            ConventionalCommit::builder("a", "feat").build(),
        ]);
        let ctx = create_context().with_changes(changes);
        assert_eq!(ctx.changes.unwrap().features.len(), 1);
    }

    #[test]
    fn test_filtered_environment_keeps_allowed_prefixes() {
        let vars = vec![
            ("CI", "true"),
            ("GITHUB_REF", "refs/heads/main"),
            ("AWS_SECRET_ACCESS_KEY", "hunter2"),
            ("HOME", "/root"),
        ];
        let allowed = vec!["CI".to_string(), "GITHUB_".to_string()];

        let ctx = create_context().with_filtered_environment(vars, &allowed);

        assert_eq!(ctx.environment.len(), 2);
        assert_eq!(ctx.environment.get("CI").map(String::as_str), Some("true"));
        assert!(ctx.environment.contains_key("GITHUB_REF"));
        assert!(!ctx.environment.contains_key("AWS_SECRET_ACCESS_KEY"));
    }

    #[test]
    fn test_filtered_environment_empty_allowlist() {
        let ctx = create_context().with_filtered_environment(vec![("CI", "1")], &[]);
        assert!(ctx.environment.is_empty());
    }

    #[test]
    fn test_semver_with_v_prefix() {
        let ctx = ReleaseContext::new("v1.2.3");
        assert_eq!(ctx.semver().unwrap(), Version::new(1, 2, 3));
        assert!(!ctx.is_prerelease());
    }

    #[test]
    fn test_prerelease() {
        let ctx = ReleaseContext::new("1.2.3-rc.1");
        assert!(ctx.is_prerelease());
    }

    #[test]
    fn test_semver_invalid() {
        assert!(ReleaseContext::new("next").semver().is_err());
    }
}
