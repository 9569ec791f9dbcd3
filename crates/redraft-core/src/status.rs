//! Status registry: the closed set of fork lifecycle statuses.
//!
//! The store persists plain status strings. The registry maps the symbolic
//! fork states onto the concrete names configured for a site and answers
//! questions such as "does this status denote an open fork?".

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Symbolic status keys known to the fork engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusKey {
    Published,
    DraftFork,
    PendingFork,
    /// Terminal status of a fork after its content was merged back.
    Merged,
}

impl StatusKey {
    pub const ALL: [Self; 4] = [
        Self::Published,
        Self::DraftFork,
        Self::PendingFork,
        Self::Merged,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::DraftFork => "draft-fork",
            Self::PendingFork => "pending-fork",
            Self::Merged => "merged",
        }
    }

    /// Keys that mark a document as a fork, open or retired.
    #[must_use]
    pub const fn is_fork_lifecycle(self) -> bool {
        matches!(self, Self::DraftFork | Self::PendingFork | Self::Merged)
    }

    #[must_use]
    pub const fn is_open_fork(self) -> bool {
        matches!(self, Self::DraftFork | Self::PendingFork)
    }
}

impl fmt::Display for StatusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusKey {
    type Err = UnknownStatusKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "published" | "publish" => Ok(Self::Published),
            "draft-fork" | "draft_fork" => Ok(Self::DraftFork),
            "pending-fork" | "pending_fork" => Ok(Self::PendingFork),
            "merged" => Ok(Self::Merged),
            other => Err(UnknownStatusKey(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status key '{0}': expected published, draft-fork, pending-fork or merged")]
pub struct UnknownStatusKey(pub String);

/// Concrete status names for one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRegistry {
    published: String,
    draft_fork: String,
    pending_fork: String,
    merged: String,
    ordinary: Vec<String>,
}

impl Default for StatusRegistry {
    fn default() -> Self {
        Self::new(
            "publish",
            "wpse-draft",
            "wpse-pending",
            "wpse-merged",
            ["draft", "pending", "private", "future"],
        )
    }
}

impl StatusRegistry {
    pub fn new<I, S>(
        published: impl Into<String>,
        draft_fork: impl Into<String>,
        pending_fork: impl Into<String>,
        merged: impl Into<String>,
        ordinary: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            published: published.into(),
            draft_fork: draft_fork.into(),
            pending_fork: pending_fork.into(),
            merged: merged.into(),
            ordinary: ordinary.into_iter().map(Into::into).collect(),
        }
    }

    /// Concrete status value for a symbolic key, or `None` when unset.
    #[must_use]
    pub fn resolve_status_name(&self, key: StatusKey) -> Option<&str> {
        let name = match key {
            StatusKey::Published => &self.published,
            StatusKey::DraftFork => &self.draft_fork,
            StatusKey::PendingFork => &self.pending_fork,
            StatusKey::Merged => &self.merged,
        };
        let name = name.trim();
        if name.is_empty() { None } else { Some(name) }
    }

    /// Reverse lookup of a concrete status value.
    #[must_use]
    pub fn lookup(&self, status: &str) -> Option<StatusKey> {
        StatusKey::ALL
            .into_iter()
            .find(|key| self.resolve_status_name(*key) == Some(status))
    }

    #[must_use]
    pub fn is_open_fork(&self, status: &str) -> bool {
        self.lookup(status).is_some_and(StatusKey::is_open_fork)
    }

    #[must_use]
    pub fn is_fork_lifecycle(&self, status: &str) -> bool {
        self.lookup(status).is_some_and(StatusKey::is_fork_lifecycle)
    }

    /// Whether the store may hold this status at all.
    #[must_use]
    pub fn is_known(&self, status: &str) -> bool {
        self.lookup(status).is_some() || self.ordinary.iter().any(|s| s == status)
    }

    /// Concrete names of the statuses that denote an open fork.
    #[must_use]
    pub fn open_fork_statuses(&self) -> Vec<String> {
        [StatusKey::DraftFork, StatusKey::PendingFork]
            .into_iter()
            .filter_map(|key| self.resolve_status_name(key))
            .map(str::to_string)
            .collect()
    }

    #[must_use]
    pub fn ordinary(&self) -> &[String] {
        &self.ordinary
    }

    /// Validate a fork lifecycle transition.
    ///
    /// Valid transitions for a fork:
    /// - `draft-fork -> pending-fork`
    /// - `draft-fork -> published` (routed to merge)
    /// - `pending-fork -> published` (routed to merge)
    /// - `draft-fork | pending-fork -> merged` (merge retirement)
    ///
    /// Other documents move freely between known statuses but never into a
    /// fork lifecycle status; forks are only created by forking.
    #[must_use]
    pub fn can_transition(&self, from: &str, to: &str) -> bool {
        match self.lookup(from) {
            Some(StatusKey::DraftFork) => matches!(
                self.lookup(to),
                Some(StatusKey::PendingFork | StatusKey::Published | StatusKey::Merged)
            ),
            Some(StatusKey::PendingFork) => matches!(
                self.lookup(to),
                Some(StatusKey::Published | StatusKey::Merged)
            ),
            Some(StatusKey::Merged) => false,
            Some(StatusKey::Published) | None => {
                self.is_known(to) && !self.is_fork_lifecycle(to)
            }
        }
    }
}
