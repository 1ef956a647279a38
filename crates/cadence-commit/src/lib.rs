//! Commit types for Cadence.
//!
//! This crate provides the commit types carried in a release context:
//! - [`ConventionalCommit`]: A commit parsed according to Conventional Commits
//! - [`CategorizedChanges`]: Commits grouped into changelog buckets

mod categorized;
mod conventional;

pub use categorized::{CategorizedChanges, ChangeCategory};
pub use conventional::{ConventionalCommit, ConventionalCommitBuilder};
