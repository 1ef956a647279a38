//! Commits grouped into changelog categories.

use serde::{Deserialize, Serialize};

use crate::ConventionalCommit;

/// The changelog bucket a commit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeCategory {
    Features,
    Fixes,
    Breaking,
    Performance,
    Refactor,
    Docs,
    Other,
}

impl ChangeCategory {
    /// All categories in changelog order.
    pub const ALL: [Self; 7] = [
        Self::Breaking,
        Self::Features,
        Self::Fixes,
        Self::Performance,
        Self::Refactor,
        Self::Docs,
        Self::Other,
    ];

    /// Determines the category of a commit.
    ///
    /// Breaking changes always land in [`ChangeCategory::Breaking`], whatever
    /// their type.
    #[must_use]
    pub fn of(commit: &ConventionalCommit) -> Self {
        if commit.breaking {
            return Self::Breaking;
        }
        match commit.r#type.as_str() {
            "feat" => Self::Features,
            "fix" => Self::Fixes,
            "perf" => Self::Performance,
            "refactor" => Self::Refactor,
            "docs" => Self::Docs,
            _ => Self::Other,
        }
    }
}

/// Commits grouped into the seven changelog buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizedChanges {
    /// New features.
    #[serde(default)]
    pub features: Vec<ConventionalCommit>,

    /// Bug fixes.
    #[serde(default)]
    pub fixes: Vec<ConventionalCommit>,

    /// Breaking changes.
    #[serde(default)]
    pub breaking: Vec<ConventionalCommit>,

    /// Performance improvements.
    #[serde(default)]
    pub performance: Vec<ConventionalCommit>,

    /// Refactorings.
    #[serde(default)]
    pub refactor: Vec<ConventionalCommit>,

    /// Documentation changes.
    #[serde(default)]
    pub docs: Vec<ConventionalCommit>,

    /// Anything else (chore, ci, test, ...).
    #[serde(default)]
    pub other: Vec<ConventionalCommit>,
}

impl CategorizedChanges {
    /// Groups commits into categories, preserving their relative order.
    #[must_use]
    pub fn from_commits(commits: impl IntoIterator<Item = ConventionalCommit>) -> Self {
        let mut changes = Self::default();
        for commit in commits {
            changes.push(commit);
        }
        changes
    }

    /// Adds a commit to its category.
    pub fn push(&mut self, commit: ConventionalCommit) {
        self.bucket_mut(ChangeCategory::of(&commit)).push(commit);
    }

    /// Returns the commits of a category.
    #[must_use]
    pub fn bucket(&self, category: ChangeCategory) -> &[ConventionalCommit] {
        match category {
            ChangeCategory::Features => &self.features,
            ChangeCategory::Fixes => &self.fixes,
            ChangeCategory::Breaking => &self.breaking,
            ChangeCategory::Performance => &self.performance,
            ChangeCategory::Refactor => &self.refactor,
            ChangeCategory::Docs => &self.docs,
            ChangeCategory::Other => &self.other,
        }
    }

    fn bucket_mut(&mut self, category: ChangeCategory) -> &mut Vec<ConventionalCommit> {
        match category {
            ChangeCategory::Features => &mut self.features,
            ChangeCategory::Fixes => &mut self.fixes,
            ChangeCategory::Breaking => &mut self.breaking,
            ChangeCategory::Performance => &mut self.performance,
            ChangeCategory::Refactor => &mut self.refactor,
            ChangeCategory::Docs => &mut self.docs,
            ChangeCategory::Other => &mut self.other,
        }
    }

    /// Returns the total number of commits across all categories.
    #[must_use]
    pub fn len(&self) -> usize {
        ChangeCategory::ALL
            .iter()
            .map(|category| self.bucket(*category).len())
            .sum()
    }

    /// Returns true if no category holds a commit.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
