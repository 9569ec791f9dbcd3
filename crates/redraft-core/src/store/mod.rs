//! Document store contract consumed by the fork engine, plus two backends.
//!
//! - [`memory::MemoryStore`] keeps everything behind one mutex; it backs tests
//!   and embedders that bring their own persistence.
//! - [`sqlite::SqliteStore`] persists to a `SQLite` database and enforces the
//!   one-open-fork-per-document rule with a partial unique index.
//!
//! Both backends share the insert/update validation in this module so they
//! reject and default exactly the same field sets.

pub mod memory;
pub mod sqlite;

use crate::model::{
    Document, DocumentId, FieldMap, MetaEntry, TermCopyOutcome, TermSet, field,
};
use chrono::{Local, Utc};

/// Timestamp format used for the local and GMT date fields.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Failures raised by a document store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("document {0} not found")]
    NotFound(DocumentId),

    #[error("invalid document data: {0}")]
    Validation(String),

    #[error("document {parent} already has an open fork ({existing})")]
    OpenForkExists {
        parent: DocumentId,
        existing: DocumentId,
    },

    #[error("document {id} has status '{actual}', expected '{expected}'")]
    StatusConflict {
        id: DocumentId,
        expected: String,
        actual: String,
    },

    #[error("store backend failure: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Settings every store needs regardless of backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Base URL used to mint document locators (`<site_url>/?p=<id>`).
    pub site_url: String,
    /// Status values that denote an open fork; at most one per parent.
    pub open_fork_statuses: Vec<String>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            site_url: "http://localhost".to_string(),
            open_fork_statuses: vec!["wpse-draft".to_string(), "wpse-pending".to_string()],
        }
    }
}

impl StoreOptions {
    #[must_use]
    pub fn locator_for(&self, id: DocumentId) -> String {
        format!("{}/?p={id}", self.site_url.trim_end_matches('/'))
    }

    #[must_use]
    pub fn is_open_fork(&self, status: &str) -> bool {
        self.open_fork_statuses.iter().any(|s| s == status)
    }
}

/// The document store contract.
///
/// Implementations must be safe to call from several threads when they are
/// shared; the check-then-insert of an open fork is serialized inside
/// [`DocumentStore::insert_document`].
pub trait DocumentStore {
    fn get_document(&self, id: DocumentId) -> Result<Option<Document>, StoreError>;

    /// Insert a new document. `fields` carries `status` and optionally
    /// `parent`; `id` must be absent.
    fn insert_document(&self, fields: &FieldMap) -> Result<DocumentId, StoreError>;

    /// Overwrite the given fields key-for-key and refresh modified timestamps.
    fn update_document_fields(&self, id: DocumentId, fields: &FieldMap) -> Result<(), StoreError>;

    /// Compare-and-set status change.
    fn transition_status(&self, id: DocumentId, from: &str, to: &str) -> Result<(), StoreError>;

    fn delete_document(&self, id: DocumentId) -> Result<(), StoreError>;

    /// Documents whose parent is `parent`, in id order.
    fn children(&self, parent: DocumentId) -> Result<Vec<Document>, StoreError>;

    /// All documents in id order.
    fn list_documents(&self) -> Result<Vec<Document>, StoreError>;

    fn metadata(&self, id: DocumentId) -> Result<Vec<MetaEntry>, StoreError>;

    fn add_metadata(&self, id: DocumentId, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove every metadata row; returns how many were removed.
    fn clear_metadata(&self, id: DocumentId) -> Result<usize, StoreError>;

    /// Append every metadata row of `from` onto `to`, preserving order.
    fn copy_metadata(&self, from: DocumentId, to: DocumentId) -> Result<usize, StoreError>;

    fn terms(&self, id: DocumentId) -> Result<TermSet, StoreError>;

    /// Replace the assignment for one taxonomy; returns the new term count.
    fn set_terms(
        &self,
        id: DocumentId,
        taxonomy: &str,
        terms: &[String],
    ) -> Result<usize, StoreError>;

    /// Make every taxonomy assignment of `to` equal to that of `from`.
    fn copy_terms(&self, from: DocumentId, to: DocumentId) -> Result<TermCopyOutcome, StoreError>;
}

/// Typed parts of a validated insert/update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Columns {
    pub status: Option<String>,
    pub parent: Option<Option<DocumentId>>,
    pub fields: FieldMap,
}

/// Split `status`/`parent` out of a field map and reject `id`.
pub(crate) fn split_columns(fields: &FieldMap) -> Result<Columns, StoreError> {
    if fields.contains_key(field::ID) {
        return Err(StoreError::Validation(
            "document id is assigned by the store".to_string(),
        ));
    }

    let status = match fields.get(field::STATUS) {
        Some(status) if status.trim().is_empty() => {
            return Err(StoreError::Validation("status must not be empty".to_string()));
        }
        Some(status) => Some(status.trim().to_string()),
        None => None,
    };

    let parent = match fields.get(field::PARENT).map(|raw| raw.trim()) {
        None => None,
        Some("" | "0") => Some(None),
        Some(raw) => Some(Some(raw.parse::<DocumentId>().map_err(|err| {
            StoreError::Validation(err.to_string())
        })?)),
    };

    let rest = fields
        .iter()
        .filter(|(key, _)| key.as_str() != field::STATUS && key.as_str() != field::PARENT)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(Columns {
        status,
        parent,
        fields: rest,
    })
}

/// Validate a new document and fill in store-assigned timestamps.
pub(crate) fn prepare_insert(fields: &FieldMap) -> Result<Columns, StoreError> {
    let mut columns = split_columns(fields)?;
    if columns.status.is_none() {
        return Err(StoreError::Validation("status is required".to_string()));
    }

    let has_content = [field::TITLE, field::BODY, field::EXCERPT]
        .iter()
        .any(|name| columns.fields.get(*name).is_some_and(|v| !v.trim().is_empty()));
    if !has_content {
        return Err(StoreError::Validation(
            "content, title, and excerpt are empty".to_string(),
        ));
    }

    let (local, gmt) = now_stamps();
    for (name, value) in [
        (field::CREATED_AT, &local),
        (field::CREATED_AT_GMT, &gmt),
        (field::MODIFIED_AT, &local),
        (field::MODIFIED_AT_GMT, &gmt),
    ] {
        columns
            .fields
            .entry(name.to_string())
            .or_insert_with(|| value.clone());
    }

    Ok(columns)
}

/// Validate an update and stamp the modification time.
pub(crate) fn prepare_update(fields: &FieldMap) -> Result<Columns, StoreError> {
    let mut columns = split_columns(fields)?;
    if columns.fields.contains_key(field::GUID) {
        return Err(StoreError::Validation(
            "the document locator cannot be changed".to_string(),
        ));
    }
    let (local, gmt) = now_stamps();
    columns.fields.insert(field::MODIFIED_AT.to_string(), local);
    columns.fields.insert(field::MODIFIED_AT_GMT.to_string(), gmt);
    Ok(columns)
}

fn now_stamps() -> (String, String) {
    (
        Local::now().format(TIMESTAMP_FORMAT).to_string(),
        Utc::now().format(TIMESTAMP_FORMAT).to_string(),
    )
}

/// Union of the taxonomies of two term sets, in name order.
pub(crate) fn taxonomy_union<'a>(a: &'a TermSet, b: &'a TermSet) -> Vec<&'a str> {
    let mut names: Vec<&str> = a.keys().chain(b.keys()).map(String::as_str).collect();
    names.sort_unstable();
    names.dedup();
    names
}
