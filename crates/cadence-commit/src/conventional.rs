//! Conventional commit type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A commit parsed according to the Conventional Commits format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConventionalCommit {
    /// The commit hash (SHA).
    pub hash: String,

    /// The commit type (feat, fix, docs, etc.).
    pub r#type: String,

    /// The optional scope.
    pub scope: Option<String>,

    /// The description (subject without type and scope prefix).
    pub description: String,

    /// The commit body.
    pub body: Option<String>,

    /// Whether this is a breaking change.
    pub breaking: bool,

    /// The `BREAKING CHANGE:` footer text, if any.
    pub breaking_description: Option<String>,

    /// Referenced issues (e.g. `#42`).
    pub issues: Vec<String>,

    /// The commit author name.
    pub author: String,

    /// The commit date.
    pub date: DateTime<Utc>,
}

impl ConventionalCommit {
    /// Creates a new conventional commit builder.
    #[must_use]
    pub fn builder(
        hash: impl Into<String>,
        r#type: impl Into<String>,
    ) -> ConventionalCommitBuilder {
        ConventionalCommitBuilder::new(hash, r#type)
    }

    /// Returns true if this commit represents a feature.
    #[must_use]
    pub fn is_feature(&self) -> bool {
        self.r#type == "feat"
    }

    /// Returns true if this commit represents a bug fix.
    #[must_use]
    pub fn is_fix(&self) -> bool {
        self.r#type == "fix"
    }

    /// Returns the abbreviated hash (first 7 characters).
    #[must_use]
    pub fn short_hash(&self) -> &str {
        self.hash.get(..7).unwrap_or(&self.hash)
    }
}

/// Builder for [`ConventionalCommit`].
#[derive(Debug)]
pub struct ConventionalCommitBuilder {
    hash: String,
    r#type: String,
    scope: Option<String>,
    description: String,
    body: Option<String>,
    breaking: bool,
    breaking_description: Option<String>,
    issues: Vec<String>,
    author: String,
    date: DateTime<Utc>,
}

impl ConventionalCommitBuilder {
    fn new(hash: impl Into<String>, r#type: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            r#type: r#type.into(),
            scope: None,
            description: String::new(),
            body: None,
            breaking: false,
            breaking_description: None,
            issues: Vec::new(),
            author: String::new(),
            date: Utc::now(),
        }
    }

    /// Sets the scope.
    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the breaking flag.
    #[must_use]
    pub fn breaking(mut self, breaking: bool) -> Self {
        self.breaking = breaking;
        self
    }

    /// Marks the commit as breaking with the given footer text.
    #[must_use]
    pub fn breaking_description(mut self, description: impl Into<String>) -> Self {
        self.breaking = true;
        self.breaking_description = Some(description.into());
        self
    }

    /// Adds an issue reference.
    #[must_use]
    pub fn issue(mut self, issue: impl Into<String>) -> Self {
        self.issues.push(issue.into());
        self
    }

    /// Sets the author.
    #[must_use]
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Sets the date.
    #[must_use]
    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    /// Builds the [`ConventionalCommit`].
    #[must_use]
    pub fn build(self) -> ConventionalCommit {
        ConventionalCommit {
            hash: self.hash,
            r#type: self.r#type,
            scope: self.scope,
            description: self.description,
            body: self.body,
            breaking: self.breaking,
            breaking_description: self.breaking_description,
            issues: self.issues,
            author: self.author,
            date: self.date,
        }
    }
}
