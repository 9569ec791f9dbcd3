use std::fmt;

use crate::model::DocumentId;
use crate::store::StoreError;

/// Machine-readable error codes for scripted callers and the endpoint layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    DocumentNotFound,
    InvalidArgument,
    NotForkable,
    ForkFailed,
    NotAFork,
    InvalidStatusTransition,
    StoreFailure,
    Unauthorized,
    LockContention,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::DocumentNotFound => "E2001",
            Self::InvalidArgument => "E2002",
            Self::NotForkable => "E2003",
            Self::NotAFork => "E2004",
            Self::InvalidStatusTransition => "E2005",
            Self::ForkFailed => "E3001",
            Self::StoreFailure => "E3002",
            Self::Unauthorized => "E4001",
            Self::LockContention => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::DocumentNotFound => "Document not found",
            Self::InvalidArgument => "Not a valid document",
            Self::NotForkable => "Document cannot be forked",
            Self::NotAFork => "Document is not an open fork",
            Self::InvalidStatusTransition => "Invalid status transition",
            Self::ForkFailed => "Fork could not be created",
            Self::StoreFailure => "Document store failure",
            Self::Unauthorized => "Request token rejected",
            Self::LockContention => "Lock contention",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to editors and operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `rd init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .redraft/config.toml and retry."),
            Self::DocumentNotFound | Self::InvalidArgument => None,
            Self::NotForkable => Some(
                "Finish or publish the open draft of this document before starting another.",
            ),
            Self::NotAFork => Some("Only open drafts (draft or pending review) can be merged."),
            Self::InvalidStatusTransition => {
                Some("Follow valid transitions: draft -> pending review -> publish.")
            }
            Self::ForkFailed | Self::StoreFailure | Self::InternalUnexpected => {
                Some("Retry once. If persistent, report a bug with logs.")
            }
            Self::Unauthorized => Some("Request a fresh token with `rd token` and retry."),
            Self::LockContention => Some("Retry after the other `rd` process releases its lock."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failure of a Fork Engine operation.
///
/// Store failures never escape raw: they are wrapped in [`ForkError::Store`]
/// or folded into [`ForkError::ForkFailed`] where the operation defines it.
#[derive(Debug, thiserror::Error)]
pub enum ForkError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("document {id} could not be forked: {reason}")]
    NotForkable { id: DocumentId, reason: String },

    #[error("document could not be forked: {0}")]
    ForkFailed(String),

    #[error("document {id} is not an open fork: {reason}")]
    NotAFork { id: DocumentId, reason: String },

    #[error("status transition {from} -> {to} is not allowed")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ForkError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::NotForkable { .. } => ErrorCode::NotForkable,
            Self::ForkFailed(_) => ErrorCode::ForkFailed,
            Self::NotAFork { .. } => ErrorCode::NotAFork,
            Self::InvalidTransition { .. } => ErrorCode::InvalidStatusTransition,
            Self::Store(_) => ErrorCode::StoreFailure,
        }
    }

    /// Optional remediation hint for editors and operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    /// Whether the message is safe and useful to show an editor verbatim.
    ///
    /// Store-level detail stays in the logs.
    #[must_use]
    pub const fn is_actionable(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::NotForkable { .. }
                | Self::NotAFork { .. }
                | Self::InvalidTransition { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, ForkError};
    use crate::model::DocumentId;
    use crate::store::StoreError;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::NotInitialized,
            ErrorCode::ConfigParseError,
            ErrorCode::DocumentNotFound,
            ErrorCode::InvalidArgument,
            ErrorCode::NotForkable,
            ErrorCode::ForkFailed,
            ErrorCode::NotAFork,
            ErrorCode::InvalidStatusTransition,
            ErrorCode::StoreFailure,
            ErrorCode::Unauthorized,
            ErrorCode::LockContention,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::NotForkable.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn store_errors_are_not_actionable() {
        let err = ForkError::from(StoreError::Backend("disk I/O error".to_string()));
        assert_eq!(err.code(), ErrorCode::StoreFailure);
        assert!(!err.is_actionable());

        let failed = ForkError::ForkFailed("content, title, and excerpt are empty".to_string());
        assert!(!failed.is_actionable());
    }

    #[test]
    fn eligibility_errors_are_actionable() {
        let id = DocumentId::new(42).expect("positive id");
        let err = ForkError::NotForkable {
            id,
            reason: "document already has an open fork".to_string(),
        };
        assert_eq!(err.code(), ErrorCode::NotForkable);
        assert!(err.is_actionable());
        assert!(err.hint().is_some());
        assert!(err.to_string().contains("42"));
    }
}
