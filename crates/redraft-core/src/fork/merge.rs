//! Merge: fold an open fork back onto its original.
//!
//! The fork is claimed first with a compare-and-set to the merged status, so
//! only one caller ever writes to the parent. The claimed merge then
//! overwrites the parent's content fields (and publishes it), replaces its
//! metadata and replaces its terms. If any of those steps fails the claim is
//! released and the fork is open again, so the merge can be retried.

use super::{ForkEngine, RetireMode, strip_excluded};
use crate::error::ForkError;
use crate::events::ForkEvent;
use crate::model::{Document, DocumentId, FieldMap, field};
use crate::status::StatusKey;
use crate::store::{DocumentStore, StoreError};
use tracing::{info, warn};

impl<S: DocumentStore + ?Sized> ForkEngine<'_, S> {
    /// Merge the open fork `fork_id` into its parent and retire it.
    ///
    /// Returns the parent id. Fails with [`ForkError::NotAFork`] when the
    /// document is not an open fork, its parent is gone, or another merge
    /// claimed it first.
    pub fn merge(&self, fork_id: DocumentId) -> Result<DocumentId, ForkError> {
        let (fork, parent) = self.resolve_merge_pair(fork_id)?;
        let published = self.status_name(StatusKey::Published)?;
        let merged = self.status_name(StatusKey::Merged)?;

        self.claim(&fork, merged)?;
        self.observer.notify(&ForkEvent::BeforeMerge {
            fork: fork_id,
            original: parent.id,
        });

        if let Err(err) = self.apply_merge(&fork, parent.id, published) {
            self.release(&fork, merged);
            return Err(err);
        }
        if self.options.retire == RetireMode::Delete {
            self.store.delete_document(fork_id)?;
        }

        self.observer.notify(&ForkEvent::AfterMerge {
            fork: fork_id,
            original: parent.id,
        });
        info!(fork = %fork_id, original = %parent.id, "fork merged");
        Ok(parent.id)
    }

    fn apply_merge(
        &self,
        fork: &Document,
        parent: DocumentId,
        published: &str,
    ) -> Result<(), ForkError> {
        let fields = self.merge_fields(fork, published);
        self.store.update_document_fields(parent, &fields)?;
        self.copy_meta(fork.id, parent)?;
        self.copy_terms(fork.id, parent)?;
        Ok(())
    }

    fn resolve_merge_pair(&self, fork_id: DocumentId) -> Result<(Document, Document), ForkError> {
        let not_a_fork = |reason: String| {
            warn!(document = %fork_id, %reason, "merge rejected");
            ForkError::NotAFork { id: fork_id, reason }
        };

        let Some(fork) = self.store.get_document(fork_id)? else {
            return Err(not_a_fork("document does not exist".to_string()));
        };
        if !self.statuses.is_open_fork(&fork.status) {
            return Err(not_a_fork(format!(
                "status '{}' is not an open fork status",
                fork.status
            )));
        }
        let Some(parent_id) = fork.parent else {
            return Err(not_a_fork("fork has no parent document".to_string()));
        };
        let Some(parent) = self.store.get_document(parent_id)? else {
            return Err(not_a_fork(format!("parent document {parent_id} does not exist")));
        };
        Ok((fork, parent))
    }

    /// Content fields of the fork, plus the published status for the parent.
    fn merge_fields(&self, fork: &Document, published: &str) -> FieldMap {
        let mut fields = strip_excluded(&fork.fields, &self.options.extra_excluded_fields);
        fields.insert(field::STATUS.to_string(), published.to_string());
        fields
    }

    /// Move the fork out of its open status; the losing caller of a race
    /// gets `NotAFork` before anything was written.
    fn claim(&self, fork: &Document, merged: &str) -> Result<(), ForkError> {
        match self.store.transition_status(fork.id, &fork.status, merged) {
            Ok(()) => Ok(()),
            Err(StoreError::StatusConflict { .. } | StoreError::NotFound(_)) => {
                Err(ForkError::NotAFork {
                    id: fork.id,
                    reason: "fork was merged by a concurrent request".to_string(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn release(&self, fork: &Document, merged: &str) {
        if let Err(err) = self.store.transition_status(fork.id, merged, &fork.status) {
            warn!(fork = %fork.id, error = %err, "could not reopen fork after a failed merge");
        }
    }
}
