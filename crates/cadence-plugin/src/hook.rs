//! Release lifecycle hooks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A named point in the release lifecycle at which plugins are invoked.
///
/// The string forms (`pre-init`, `post-publish`, ...) are part of the wire
/// contract and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Hook {
    PreInit,
    PostInit,
    PrePlan,
    PostPlan,
    PreVersion,
    PostVersion,
    PreNotes,
    PostNotes,
    PreApprove,
    PostApprove,
    PrePublish,
    PostPublish,
    OnSuccess,
    OnError,
}

impl Hook {
    /// Every hook in canonical lifecycle order.
    ///
    /// Each `pre-X` hook appears before its `post-X` counterpart; the two
    /// terminal hooks come last.
    pub const ALL: [Self; 14] = [
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

    /// Returns the wire string of this hook.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PreInit => "pre-init",
            Self::PostInit => "post-init",
            Self::PrePlan => "pre-plan",
            Self::PostPlan => "post-plan",
            Self::PreVersion => "pre-version",
            Self::PostVersion => "post-version",
            Self::PreNotes => "pre-notes",
            Self::PostNotes => "post-notes",
            Self::PreApprove => "pre-approve",
            Self::PostApprove => "post-approve",
            Self::PrePublish => "pre-publish",
            Self::PostPublish => "post-publish",
            Self::OnSuccess => "on-success",
            Self::OnError => "on-error",
        }
    }

    /// Returns the position of this hook in [`Hook::ALL`].
    #[must_use]
    pub fn position(self) -> usize {
        Self::ALL
            .iter()
            .position(|hook| *hook == self)
            .unwrap_or(Self::ALL.len())
    }

    /// Returns true for the `pre-*` stages.
    #[must_use]
    pub const fn is_pre(self) -> bool {
        matches!(
            self,
            Self::PreInit
                | Self::PrePlan
                | Self::PreVersion
                | Self::PreNotes
                | Self::PreApprove
                | Self::PrePublish
        )
    }

    /// Returns true for `on-success` and `on-error`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::OnSuccess | Self::OnError)
    }

    /// Returns the other half of a `pre-X`/`post-X` pair.
    ///
    /// Terminal hooks have no counterpart.
    #[must_use]
    pub const fn counterpart(self) -> Option<Self> {
        match self {
            Self::PreInit => Some(Self::PostInit),
            Self::PostInit => Some(Self::PreInit),
            Self::PrePlan => Some(Self::PostPlan),
            Self::PostPlan => Some(Self::PrePlan),
            Self::PreVersion => Some(Self::PostVersion),
            Self::PostVersion => Some(Self::PreVersion),
            Self::PreNotes => Some(Self::PostNotes),
            Self::PostNotes => Some(Self::PreNotes),
            Self::PreApprove => Some(Self::PostApprove),
            Self::PostApprove => Some(Self::PreApprove),
            Self::PrePublish => Some(Self::PostPublish),
            Self::PostPublish => Some(Self::PrePublish),
            Self::OnSuccess | Self::OnError => None,
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown hook name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown hook: {0}")]
pub struct ParseHookError(pub String);

impl FromStr for Hook {
    type Err = ParseHookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|hook| hook.as_str() == s)
            .ok_or_else(|| ParseHookError(s.to_string()))
    }
}
