//! Document data model shared by the stores and the fork engine.

mod document;

pub use document::{
    Document, DocumentId, FieldMap, InvalidDocumentId, MetaEntry, TermCopyOutcome, TermSet, field,
};
