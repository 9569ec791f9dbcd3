//! The fork engine.
//!
//! A fork is an ordinary document whose status is the draft-fork or
//! pending-fork status and whose `parent` points at the original. The engine
//! is the only place with business rules; the store and the status registry
//! are injected at construction and never reached through global state.
//!
//! # Failure model
//!
//! Every operation returns a [`ForkError`]; raw store errors are wrapped.
//! Creating a fork is not transactional with the metadata and term copies
//! that follow it: a failed copy is logged, reported to observers as
//! [`ForkEvent::CopyFailed`] and the fork id is still returned.

mod merge;
mod prepare;

pub use prepare::{EXCLUDED_FIELDS, is_excluded, strip_excluded};

use crate::error::ForkError;
use crate::events::{CopyStep, ForkEvent, ForkObserver};
use crate::model::{Document, DocumentId, FieldMap, TermCopyOutcome, field};
use crate::status::{StatusKey, StatusRegistry};
use crate::store::{DocumentStore, StoreError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// What happens to a fork once its content has been merged back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetireMode {
    /// Keep the fork with the terminal merged status.
    #[default]
    Status,
    /// Delete the fork document.
    Delete,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForkOptions {
    /// Field names excluded on top of [`EXCLUDED_FIELDS`].
    pub extra_excluded_fields: Vec<String>,
    pub retire: RetireMode,
}

/// Result of [`ForkEngine::transition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The document's status was changed in place.
    Updated { id: DocumentId, status: String },
    /// The document was an open fork being published; it was merged instead.
    Merged {
        fork: DocumentId,
        original: DocumentId,
    },
}

pub struct ForkEngine<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    statuses: &'a StatusRegistry,
    observer: &'a dyn ForkObserver,
    options: ForkOptions,
}

impl<S: DocumentStore + ?Sized> std::fmt::Debug for ForkEngine<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForkEngine")
            .field("statuses", self.statuses)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<'a, S: DocumentStore + ?Sized> ForkEngine<'a, S> {
    #[must_use]
    pub fn new(store: &'a S, statuses: &'a StatusRegistry, observer: &'a dyn ForkObserver) -> Self {
        Self {
            store,
            statuses,
            observer,
            options: ForkOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ForkOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub const fn statuses(&self) -> &StatusRegistry {
        self.statuses
    }

    #[must_use]
    pub const fn options(&self) -> &ForkOptions {
        &self.options
    }

    /// Read a document through the engine's store.
    pub fn document(&self, id: DocumentId) -> Result<Option<Document>, ForkError> {
        Ok(self.store.get_document(id)?)
    }

    // ---- eligibility ----

    /// Whether `id` exists, is not itself a fork and has no open fork.
    ///
    /// Read-only. Store failures count as "cannot fork".
    #[must_use]
    pub fn can_fork(&self, id: DocumentId) -> bool {
        match self.fork_blocker(id) {
            Ok(None) => true,
            Ok(Some(reason)) => {
                debug!(document = %id, %reason, "document cannot be forked");
                false
            }
            Err(err) => {
                warn!(document = %id, error = %err, "fork eligibility check failed");
                false
            }
        }
    }

    /// Whether some child of `id` carries an open fork status.
    #[must_use]
    pub fn has_open_fork(&self, id: DocumentId) -> bool {
        match self.open_fork(id) {
            Ok(found) => found.is_some(),
            Err(err) => {
                warn!(document = %id, error = %err, "open fork lookup failed");
                false
            }
        }
    }

    /// The open fork of `id`, if any.
    pub fn open_fork(&self, id: DocumentId) -> Result<Option<Document>, ForkError> {
        Ok(self
            .store
            .children(id)?
            .into_iter()
            .find(|child| self.statuses.is_open_fork(&child.status)))
    }

    /// Why `id` cannot be forked, or `None` when it can.
    pub fn fork_blocker(&self, id: DocumentId) -> Result<Option<String>, ForkError> {
        let Some(document) = self.store.get_document(id)? else {
            return Ok(Some(format!("document {id} does not exist")));
        };
        if self.statuses.is_fork_lifecycle(&document.status) {
            return Ok(Some(format!(
                "document {id} is itself a fork (status '{}')",
                document.status
            )));
        }
        if let Some(open) = self.open_fork(id)? {
            return Ok(Some(format!("document {id} already has an open fork ({})", open.id)));
        }
        Ok(None)
    }

    // ---- fork ----

    /// Create a fork of `id` after checking eligibility.
    pub fn fork(&self, id: DocumentId) -> Result<DocumentId, ForkError> {
        if let Some(reason) = self.fork_blocker(id)? {
            warn!(document = %id, %reason, "fork rejected");
            return Err(ForkError::NotForkable { id, reason });
        }

        let fork_id = self.fork_document(id)?;
        if fork_id == id {
            warn!(document = %id, "store returned the original id for a new fork");
            return Err(ForkError::ForkFailed(format!(
                "store returned the original id {id} for the fork"
            )));
        }
        Ok(fork_id)
    }

    /// Create the fork document and copy metadata and terms onto it.
    ///
    /// Performs no eligibility check of its own; the store still refuses a
    /// second open fork for the same parent.
    pub fn fork_document(&self, id: DocumentId) -> Result<DocumentId, ForkError> {
        let original = self.require(id, "it is not a valid document")?;

        self.observer.notify(&ForkEvent::BeforeFork { original: id });

        let fields = self.prepare_fork_data(&original);
        if fields.is_empty() {
            return Err(ForkError::ForkFailed(
                "the fork status could not be determined".to_string(),
            ));
        }

        let fork_id = match self.store.insert_document(&fields) {
            Ok(fork_id) => fork_id,
            Err(StoreError::OpenForkExists { existing, .. }) => {
                warn!(document = %id, existing = %existing, "concurrent fork detected by the store");
                return Err(ForkError::NotForkable {
                    id,
                    reason: format!("document {id} already has an open fork ({existing})"),
                });
            }
            Err(err) => {
                warn!(document = %id, error = %err, "fork insert rejected");
                return Err(ForkError::ForkFailed(err.to_string()));
            }
        };

        if let Err(err) = self.copy_meta(id, fork_id) {
            self.report_copy_failure(CopyStep::Meta, id, fork_id, &err);
        }
        if let Err(err) = self.copy_terms(id, fork_id) {
            self.report_copy_failure(CopyStep::Terms, id, fork_id, &err);
        }

        self.observer.notify(&ForkEvent::AfterFork {
            fork: fork_id,
            original: id,
        });
        info!(document = %id, fork = %fork_id, "fork created");
        Ok(fork_id)
    }

    /// Field set for a new fork of `original`.
    ///
    /// Returns an empty map when the draft-fork status is not configured;
    /// callers must treat that as a failed preparation.
    #[must_use]
    pub fn prepare_fork_data(&self, original: &Document) -> FieldMap {
        let Some(status) = self.statuses.resolve_status_name(StatusKey::DraftFork) else {
            warn!(
                document = %original.id,
                "could not prepare fork data: no draft fork status is configured"
            );
            return FieldMap::new();
        };

        let mut fields = strip_excluded(&original.to_field_map(), &self.options.extra_excluded_fields);
        fields.insert(field::PARENT.to_string(), original.id.to_string());
        fields.insert(field::STATUS.to_string(), status.to_string());
        fields
    }

    // ---- copies ----

    /// Replace the metadata of `to` with that of `from`.
    pub fn copy_meta(&self, from: DocumentId, to: DocumentId) -> Result<usize, ForkError> {
        self.require_pair(from, to, "could not copy metadata")?;

        let cleared = self.store.clear_metadata(to)?;
        debug!(from = %from, to = %to, cleared, "cleared target metadata");

        self.observer.notify(&ForkEvent::BeforeCopyMeta { from, to });
        let copied = self.store.copy_metadata(from, to)?;
        self.observer.notify(&ForkEvent::AfterCopyMeta { from, to, copied });
        Ok(copied)
    }

    /// Make every taxonomy assignment of `to` equal to that of `from`.
    pub fn copy_terms(
        &self,
        from: DocumentId,
        to: DocumentId,
    ) -> Result<TermCopyOutcome, ForkError> {
        self.require_pair(from, to, "could not copy terms")?;

        self.observer.notify(&ForkEvent::BeforeCopyTerms { from, to });
        let outcome = self.store.copy_terms(from, to)?;
        self.observer.notify(&ForkEvent::AfterCopyTerms {
            from,
            to,
            assigned: outcome.total(),
        });
        Ok(outcome)
    }

    // ---- status ----

    /// Move a draft fork to review.
    pub fn submit_for_review(&self, id: DocumentId) -> Result<(), ForkError> {
        let document = self.require(id, "it is not a valid document")?;
        if self.statuses.lookup(&document.status) != Some(StatusKey::DraftFork) {
            return Err(ForkError::InvalidTransition {
                from: document.status,
                to: self.status_name(StatusKey::PendingFork)?.to_string(),
            });
        }
        let pending = self.status_name(StatusKey::PendingFork)?;
        self.compare_and_set(&document, pending)?;
        Ok(())
    }

    /// Change the status of `id`.
    ///
    /// Publishing an open fork merges it instead of writing the published
    /// status onto the fork. The merged status can only be reached by merging.
    pub fn transition(&self, id: DocumentId, to: &str) -> Result<TransitionOutcome, ForkError> {
        let document = self.require(id, "it is not a valid document")?;
        let from = document.status.clone();

        let target = self.statuses.lookup(to);
        if target == Some(StatusKey::Merged) || !self.statuses.can_transition(&from, to) {
            return Err(ForkError::InvalidTransition {
                from,
                to: to.to_string(),
            });
        }

        if self.statuses.is_open_fork(&from) && target == Some(StatusKey::Published) {
            let original = self.merge(id)?;
            return Ok(TransitionOutcome::Merged { fork: id, original });
        }

        if from != to {
            self.compare_and_set(&document, to)?;
        }
        Ok(TransitionOutcome::Updated {
            id,
            status: to.to_string(),
        })
    }

    // ---- helpers ----

    fn compare_and_set(&self, document: &Document, to: &str) -> Result<(), ForkError> {
        match self.store.transition_status(document.id, &document.status, to) {
            Ok(()) => {
                info!(document = %document.id, from = %document.status, to, "status changed");
                Ok(())
            }
            Err(StoreError::StatusConflict { actual, .. }) => Err(ForkError::InvalidTransition {
                from: actual,
                to: to.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    fn status_name(&self, key: StatusKey) -> Result<&'a str, ForkError> {
        self.statuses
            .resolve_status_name(key)
            .ok_or_else(|| ForkError::ForkFailed(format!("no status is configured for {key}")))
    }

    fn require(&self, id: DocumentId, reason: &str) -> Result<Document, ForkError> {
        self.store
            .get_document(id)?
            .ok_or_else(|| ForkError::InvalidArgument(format!("document {id}: {reason}")))
    }

    fn require_pair(&self, from: DocumentId, to: DocumentId, action: &str) -> Result<(), ForkError> {
        let valid = self.store.get_document(from)?.is_some() && self.store.get_document(to)?.is_some();
        if valid {
            Ok(())
        } else {
            Err(ForkError::InvalidArgument(format!(
                "{action} because the documents given ({from}, {to}) were not valid"
            )))
        }
    }

    fn report_copy_failure(&self, step: CopyStep, from: DocumentId, to: DocumentId, err: &ForkError) {
        warn!(
            step = step.as_str(),
            from = %from,
            to = %to,
            error = %err,
            "copy failed after fork was created"
        );
        self.observer.notify(&ForkEvent::CopyFailed {
            step,
            from,
            to,
            message: err.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{NoopObserver, RecordingObserver};
    use crate::model::MetaEntry;
    use crate::store::memory::MemoryStore;

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn published(store: &MemoryStore, title: &str) -> DocumentId {
        store
            .insert_document(&fields(&[
                ("status", "publish"),
                ("title", title),
                ("body", "original body"),
                ("tags_input", "news"),
            ]))
            .expect("insert original")
    }

    #[test]
    fn prepare_fork_data_strips_and_links() {
        let store = MemoryStore::default();
        let statuses = StatusRegistry::default();
        let engine = ForkEngine::new(&store, &statuses, &NoopObserver);
        let id = published(&store, "Hello");
        let original = store.get_document(id).expect("read").expect("exists");

        let data = engine.prepare_fork_data(&original);
        assert_eq!(data.get("status").map(String::as_str), Some("wpse-draft"));
        assert_eq!(data.get("parent"), Some(&id.to_string()));
        assert_eq!(data.get("title").map(String::as_str), Some("Hello"));
        for name in ["id", "guid", "created_at", "modified_at_gmt", "tags_input"] {
            assert!(!data.contains_key(name), "{name} leaked into fork data");
        }
    }

    #[test]
    fn prepare_fork_data_is_empty_without_draft_status() {
        let store = MemoryStore::default();
        let statuses = StatusRegistry::new("publish", " ", "wpse-pending", "wpse-merged", ["draft"]);
        let engine = ForkEngine::new(&store, &statuses, &NoopObserver);
        let id = published(&store, "Hello");

        let original = store.get_document(id).expect("read").expect("exists");
        assert!(engine.prepare_fork_data(&original).is_empty());

        let err = engine.fork(id).expect_err("fork must fail");
        assert!(matches!(err, ForkError::ForkFailed(_)), "{err:?}");
        assert_eq!(store.list_documents().expect("list").len(), 1);
    }

    #[test]
    fn fork_emits_events_in_order() {
        let store = MemoryStore::default();
        let statuses = StatusRegistry::default();
        let recorder = RecordingObserver::new();
        let engine = ForkEngine::new(&store, &statuses, &recorder);
        let id = published(&store, "Hello");

        engine.fork(id).expect("fork");
        assert_eq!(
            recorder.names(),
            vec![
                "before_fork",
                "before_copy_meta",
                "after_copy_meta",
                "before_copy_terms",
                "after_copy_terms",
                "after_fork",
            ]
        );
    }

    #[test]
    fn forks_and_merged_documents_cannot_be_forked() {
        let store = MemoryStore::default();
        let statuses = StatusRegistry::default();
        let engine = ForkEngine::new(&store, &statuses, &NoopObserver);
        let id = published(&store, "Hello");
        let fork = engine.fork(id).expect("fork");

        assert!(!engine.can_fork(fork));
        assert!(!engine.can_fork(id));
        let missing = DocumentId::new(999).expect("positive id");
        assert!(!engine.can_fork(missing));

        engine.merge(fork).expect("merge");
        assert!(!engine.can_fork(fork), "merged forks stay ineligible");
        assert!(engine.can_fork(id));
    }

    #[test]
    fn copy_meta_rejects_unknown_documents() {
        let store = MemoryStore::default();
        let statuses = StatusRegistry::default();
        let engine = ForkEngine::new(&store, &statuses, &NoopObserver);
        let id = published(&store, "Hello");
        let missing = DocumentId::new(77).expect("positive id");

        let err = engine.copy_meta(id, missing).expect_err("invalid target");
        assert!(matches!(err, ForkError::InvalidArgument(_)));
        let err = engine.copy_terms(missing, id).expect_err("invalid source");
        assert!(matches!(err, ForkError::InvalidArgument(_)));
    }

    #[test]
    fn copy_meta_replaces_stale_rows() {
        let store = MemoryStore::default();
        let statuses = StatusRegistry::default();
        let engine = ForkEngine::new(&store, &statuses, &NoopObserver);
        let a = published(&store, "A");
        let b = published(&store, "B");
        store.add_metadata(a, "views", "10").expect("meta");
        store.add_metadata(b, "stale", "yes").expect("meta");

        assert_eq!(engine.copy_meta(a, b).expect("copy"), 1);
        assert_eq!(store.metadata(b).expect("meta"), vec![MetaEntry::new("views", "10")]);
    }

    #[test]
    fn submit_then_publish_routes_to_merge() {
        let store = MemoryStore::default();
        let statuses = StatusRegistry::default();
        let engine = ForkEngine::new(&store, &statuses, &NoopObserver);
        let id = published(&store, "Hello");
        let fork = engine.fork(id).expect("fork");

        engine.submit_for_review(fork).expect("submit");
        let err = engine.submit_for_review(fork).expect_err("already pending");
        assert!(matches!(err, ForkError::InvalidTransition { .. }));

        let back = engine.transition(fork, "wpse-draft").expect_err("no way back");
        assert!(matches!(back, ForkError::InvalidTransition { .. }));

        let outcome = engine.transition(fork, "publish").expect("publish");
        assert_eq!(outcome, TransitionOutcome::Merged { fork, original: id });
        assert!(!engine.has_open_fork(id));
    }

    #[test]
    fn ordinary_transitions_update_in_place() {
        let store = MemoryStore::default();
        let statuses = StatusRegistry::default();
        let engine = ForkEngine::new(&store, &statuses, &NoopObserver);
        let id = published(&store, "Hello");

        let outcome = engine.transition(id, "private").expect("ordinary change");
        assert_eq!(
            outcome,
            TransitionOutcome::Updated {
                id,
                status: "private".to_string()
            }
        );
        assert!(engine.transition(id, "wpse-merged").is_err());
        assert!(engine.transition(id, "unknown").is_err());
    }
}
