//! Notifications emitted around every mutating fork engine step.
//!
//! The engine calls [`ForkObserver::notify`] without knowing who listens.
//! Observers are fire-and-forget: nothing they do can fail or alter an
//! operation.

use crate::model::DocumentId;
use std::sync::Mutex;

/// Which copy step a [`ForkEvent::CopyFailed`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStep {
    Meta,
    Terms,
}

impl CopyStep {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Meta => "meta",
            Self::Terms => "terms",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForkEvent {
    BeforeFork {
        original: DocumentId,
    },
    AfterFork {
        fork: DocumentId,
        original: DocumentId,
    },
    BeforeCopyMeta {
        from: DocumentId,
        to: DocumentId,
    },
    AfterCopyMeta {
        from: DocumentId,
        to: DocumentId,
        copied: usize,
    },
    BeforeCopyTerms {
        from: DocumentId,
        to: DocumentId,
    },
    AfterCopyTerms {
        from: DocumentId,
        to: DocumentId,
        assigned: usize,
    },
    /// A copy step failed after the fork document was created.
    CopyFailed {
        step: CopyStep,
        from: DocumentId,
        to: DocumentId,
        message: String,
    },
    BeforeMerge {
        fork: DocumentId,
        original: DocumentId,
    },
    AfterMerge {
        fork: DocumentId,
        original: DocumentId,
    },
}

impl ForkEvent {
    /// Stable event name, e.g. for log fields.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::BeforeFork { .. } => "before_fork",
            Self::AfterFork { .. } => "after_fork",
            Self::BeforeCopyMeta { .. } => "before_copy_meta",
            Self::AfterCopyMeta { .. } => "after_copy_meta",
            Self::BeforeCopyTerms { .. } => "before_copy_terms",
            Self::AfterCopyTerms { .. } => "after_copy_terms",
            Self::CopyFailed { .. } => "copy_failed",
            Self::BeforeMerge { .. } => "before_merge",
            Self::AfterMerge { .. } => "after_merge",
        }
    }
}

/// Receiver of fork engine notifications.
pub trait ForkObserver: Send + Sync {
    fn notify(&self, event: &ForkEvent);
}

/// Ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ForkObserver for NoopObserver {
    fn notify(&self, _event: &ForkEvent) {}
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ForkObserver for TracingObserver {
    fn notify(&self, event: &ForkEvent) {
        match event {
            ForkEvent::CopyFailed {
                step,
                from,
                to,
                message,
            } => tracing::warn!(
                event = event.name(),
                step = step.as_str(),
                from = %from,
                to = %to,
                "{message}"
            ),
            ForkEvent::AfterFork { fork, original } => {
                tracing::info!(event = event.name(), fork = %fork, original = %original, "fork created");
            }
            ForkEvent::AfterMerge { fork, original } => {
                tracing::info!(event = event.name(), fork = %fork, original = %original, "fork merged");
            }
            other => tracing::debug!(event = other.name(), detail = ?other, "fork engine step"),
        }
    }
}

/// Keeps every event in order; useful for tests and audit trails.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ForkEvent>>,
}

impl RecordingObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far.
    #[must_use]
    pub fn events(&self) -> Vec<ForkEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(ForkEvent::name).collect()
    }
}

impl ForkObserver for RecordingObserver {
    fn notify(&self, event: &ForkEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
