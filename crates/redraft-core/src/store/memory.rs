//! In-process document store.

use super::{
    DocumentStore, StoreError, StoreOptions, prepare_insert, prepare_update, taxonomy_union,
};
use crate::model::{Document, DocumentId, FieldMap, MetaEntry, TermCopyOutcome, TermSet, field};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    documents: BTreeMap<DocumentId, Document>,
    metadata: BTreeMap<DocumentId, Vec<MetaEntry>>,
    terms: BTreeMap<DocumentId, TermSet>,
}

impl State {
    fn require(&self, id: DocumentId) -> Result<(), StoreError> {
        if self.documents.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::NotFound(id))
        }
    }

    fn open_fork_of(
        &self,
        options: &StoreOptions,
        parent: DocumentId,
        ignore: Option<DocumentId>,
    ) -> Option<DocumentId> {
        self.documents
            .values()
            .filter(|doc| Some(doc.id) != ignore)
            .find(|doc| doc.parent == Some(parent) && options.is_open_fork(&doc.status))
            .map(|doc| doc.id)
    }

    fn guard_open_fork(
        &self,
        options: &StoreOptions,
        status: &str,
        parent: Option<DocumentId>,
        ignore: Option<DocumentId>,
    ) -> Result<(), StoreError> {
        let Some(parent) = parent else {
            return Ok(());
        };
        if !options.is_open_fork(status) {
            return Ok(());
        }
        match self.open_fork_of(options, parent, ignore) {
            Some(existing) => Err(StoreError::OpenForkExists { parent, existing }),
            None => Ok(()),
        }
    }
}

/// A [`DocumentStore`] held entirely in memory behind a mutex.
///
/// Every operation runs under the one lock, so the open-fork check in
/// `insert_document` cannot interleave with another insert.
#[derive(Debug)]
pub struct MemoryStore {
    options: StoreOptions,
    state: Mutex<State>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreOptions::default())
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new(options: StoreOptions) -> Self {
        Self {
            options,
            state: Mutex::new(State {
                next_id: 1,
                ..State::default()
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

impl DocumentStore for MemoryStore {
    fn get_document(&self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        Ok(self.lock()?.documents.get(&id).cloned())
    }

    fn insert_document(&self, fields: &FieldMap) -> Result<DocumentId, StoreError> {
        let columns = prepare_insert(fields)?;
        let status = columns.status.unwrap_or_default();
        let parent = columns.parent.flatten();

        let mut state = self.lock()?;
        if let Some(parent) = parent {
            state.require(parent)?;
        }
        state.guard_open_fork(&self.options, &status, parent, None)?;

        let id = DocumentId::new(state.next_id)
            .ok_or_else(|| StoreError::Backend("document id sequence exhausted".to_string()))?;
        state.next_id += 1;

        let mut doc_fields = columns.fields;
        doc_fields
            .entry(field::GUID.to_string())
            .or_insert_with(|| self.options.locator_for(id));

        state.documents.insert(
            id,
            Document {
                id,
                status,
                parent,
                fields: doc_fields,
            },
        );
        Ok(id)
    }

    fn update_document_fields(&self, id: DocumentId, fields: &FieldMap) -> Result<(), StoreError> {
        let columns = prepare_update(fields)?;
        let mut state = self.lock()?;
        let current = state
            .documents
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))?;

        let status = columns.status.unwrap_or_else(|| current.status.clone());
        let parent = columns.parent.unwrap_or(current.parent);
        if let Some(parent) = parent {
            state.require(parent)?;
        }
        state.guard_open_fork(&self.options, &status, parent, Some(id))?;

        if let Some(doc) = state.documents.get_mut(&id) {
            doc.status = status;
            doc.parent = parent;
            doc.fields.extend(columns.fields);
        }
        Ok(())
    }

    fn transition_status(&self, id: DocumentId, from: &str, to: &str) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let current = state
            .documents
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))?;
        if current.status != from {
            return Err(StoreError::StatusConflict {
                id,
                expected: from.to_string(),
                actual: current.status,
            });
        }
        state.guard_open_fork(&self.options, to, current.parent, Some(id))?;
        if let Some(doc) = state.documents.get_mut(&id) {
            doc.status = to.to_string();
        }
        Ok(())
    }

    fn delete_document(&self, id: DocumentId) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.require(id)?;
        state.documents.remove(&id);
        state.metadata.remove(&id);
        state.terms.remove(&id);
        for doc in state.documents.values_mut() {
            if doc.parent == Some(id) {
                doc.parent = None;
            }
        }
        Ok(())
    }

    fn children(&self, parent: DocumentId) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .lock()?
            .documents
            .values()
            .filter(|doc| doc.parent == Some(parent))
            .cloned()
            .collect())
    }

    fn list_documents(&self) -> Result<Vec<Document>, StoreError> {
        Ok(self.lock()?.documents.values().cloned().collect())
    }

    fn metadata(&self, id: DocumentId) -> Result<Vec<MetaEntry>, StoreError> {
        let state = self.lock()?;
        state.require(id)?;
        Ok(state.metadata.get(&id).cloned().unwrap_or_default())
    }

    fn add_metadata(&self, id: DocumentId, key: &str, value: &str) -> Result<(), StoreError> {
        if key.trim().is_empty() {
            return Err(StoreError::Validation("metadata key must not be empty".to_string()));
        }
        let mut state = self.lock()?;
        state.require(id)?;
        state
            .metadata
            .entry(id)
            .or_default()
            .push(MetaEntry::new(key, value));
        Ok(())
    }

    fn clear_metadata(&self, id: DocumentId) -> Result<usize, StoreError> {
        let mut state = self.lock()?;
        state.require(id)?;
        Ok(state.metadata.remove(&id).map_or(0, |rows| rows.len()))
    }

    fn copy_metadata(&self, from: DocumentId, to: DocumentId) -> Result<usize, StoreError> {
        let mut state = self.lock()?;
        state.require(from)?;
        state.require(to)?;
        let rows = state.metadata.get(&from).cloned().unwrap_or_default();
        let copied = rows.len();
        state.metadata.entry(to).or_default().extend(rows);
        Ok(copied)
    }

    fn terms(&self, id: DocumentId) -> Result<TermSet, StoreError> {
        let state = self.lock()?;
        state.require(id)?;
        Ok(state.terms.get(&id).cloned().unwrap_or_default())
    }

    fn set_terms(
        &self,
        id: DocumentId,
        taxonomy: &str,
        terms: &[String],
    ) -> Result<usize, StoreError> {
        if taxonomy.trim().is_empty() {
            return Err(StoreError::Validation("taxonomy must not be empty".to_string()));
        }
        let mut state = self.lock()?;
        state.require(id)?;
        let mut unique: Vec<String> = Vec::with_capacity(terms.len());
        for term in terms {
            if !unique.contains(term) {
                unique.push(term.clone());
            }
        }
        let count = unique.len();
        let set = state.terms.entry(id).or_default();
        if unique.is_empty() {
            set.remove(taxonomy);
        } else {
            set.insert(taxonomy.to_string(), unique);
        }
        Ok(count)
    }

    fn copy_terms(&self, from: DocumentId, to: DocumentId) -> Result<TermCopyOutcome, StoreError> {
        let mut state = self.lock()?;
        state.require(from)?;
        state.require(to)?;
        let source = state.terms.get(&from).cloned().unwrap_or_default();
        let target = state.terms.get(&to).cloned().unwrap_or_default();

        let mut outcome = TermCopyOutcome::default();
        for taxonomy in taxonomy_union(&source, &target) {
            let count = source.get(taxonomy).map_or(0, Vec::len);
            outcome.per_taxonomy.insert(taxonomy.to_string(), count);
        }
        if source.is_empty() {
            state.terms.remove(&to);
        } else {
            state.terms.insert(to, source);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn published(store: &MemoryStore, title: &str) -> DocumentId {
        store
            .insert_document(&fields(&[("status", "publish"), ("title", title)]))
            .expect("insert published document")
    }

    #[test]
    fn insert_assigns_sequential_ids_and_locator() {
        let store = MemoryStore::default();
        let first = published(&store, "one");
        let second = published(&store, "two");
        assert_eq!(first.get() + 1, second.get());

        let doc = store.get_document(second).expect("get").expect("exists");
        assert_eq!(doc.guid(), Some("http://localhost/?p=2"));
        assert_eq!(doc.status, "publish");
        assert!(doc.field(field::CREATED_AT_GMT).is_some());
    }

    #[test]
    fn second_open_fork_for_parent_is_rejected() {
        let store = MemoryStore::default();
        let parent = published(&store, "original");
        let parent_raw = parent.to_string();
        let fork_fields = fields(&[
            ("status", "wpse-draft"),
            ("title", "copy"),
            ("parent", parent_raw.as_str()),
        ]);

        let fork = store.insert_document(&fork_fields).expect("first fork");
        let err = store
            .insert_document(&fork_fields)
            .expect_err("second open fork");
        assert_eq!(
            err,
            StoreError::OpenForkExists {
                parent,
                existing: fork
            }
        );
        assert_eq!(store.list_documents().expect("list").len(), 2);
    }

    #[test]
    fn insert_rejects_unknown_parent() {
        let store = MemoryStore::default();
        let err = store
            .insert_document(&fields(&[("status", "publish"), ("title", "x"), ("parent", "99")]))
            .expect_err("unknown parent");
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn transition_status_is_compare_and_set() {
        let store = MemoryStore::default();
        let id = published(&store, "doc");
        store
            .transition_status(id, "publish", "private")
            .expect("first transition");
        let err = store
            .transition_status(id, "publish", "draft")
            .expect_err("stale expectation");
        assert!(matches!(err, StoreError::StatusConflict { .. }));
    }

    #[test]
    fn metadata_keeps_order_and_repeated_keys() {
        let store = MemoryStore::default();
        let a = published(&store, "a");
        let b = published(&store, "b");
        store.add_metadata(a, "views", "10").expect("add");
        store.add_metadata(a, "related", "3").expect("add");
        store.add_metadata(a, "related", "5").expect("add");

        assert_eq!(store.copy_metadata(a, b).expect("copy"), 3);
        assert_eq!(store.metadata(b).expect("meta"), store.metadata(a).expect("meta"));
        assert_eq!(store.clear_metadata(b).expect("clear"), 3);
        assert!(store.metadata(b).expect("meta").is_empty());
    }

    #[test]
    fn copy_terms_replaces_every_taxonomy() {
        let store = MemoryStore::default();
        let a = published(&store, "a");
        let b = published(&store, "b");
        store
            .set_terms(a, "category", &["news".to_string()])
            .expect("set");
        store
            .set_terms(b, "post_tag", &["stale".to_string()])
            .expect("set");

        let outcome = store.copy_terms(a, b).expect("copy");
        assert_eq!(outcome.per_taxonomy.get("category"), Some(&1));
        assert_eq!(outcome.per_taxonomy.get("post_tag"), Some(&0));
        assert_eq!(store.terms(b).expect("terms"), store.terms(a).expect("terms"));
    }

    #[test]
    fn delete_detaches_children() {
        let store = MemoryStore::default();
        let parent = published(&store, "parent");
        let parent_raw = parent.to_string();
        let child = store
            .insert_document(&fields(&[
                ("status", "draft"),
                ("title", "child"),
                ("parent", parent_raw.as_str()),
            ]))
            .expect("child");
        store.delete_document(parent).expect("delete");
        let child = store.get_document(child).expect("get").expect("exists");
        assert_eq!(child.parent, None);
    }
}
