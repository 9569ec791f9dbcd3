//! Canonical `SQLite` schema for the document store.
//!
//! - `documents` holds identity, status and the parent back-reference; the
//!   `is_open_fork` flag is maintained by the store from its configured open
//!   fork statuses
//! - `document_fields` holds every other scalar field as name/value rows
//! - `document_meta` is an ordered multimap (`meta_id` gives insertion order)
//! - `document_terms` holds taxonomy assignments with their position
//! - `schema_history` records which migrations ran and when

/// Bookkeeping table created before any migration runs.
pub const HISTORY_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_history (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL
);
";

/// Migration v1: core tables.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    doc_id INTEGER PRIMARY KEY AUTOINCREMENT,
    status TEXT NOT NULL CHECK (length(trim(status)) > 0),
    parent_id INTEGER REFERENCES documents(doc_id) ON DELETE SET NULL,
    is_open_fork INTEGER NOT NULL DEFAULT 0 CHECK (is_open_fork IN (0, 1)),
    CHECK (is_open_fork = 0 OR parent_id IS NOT NULL)
);

CREATE TABLE IF NOT EXISTS document_fields (
    doc_id INTEGER NOT NULL REFERENCES documents(doc_id) ON DELETE CASCADE,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    value TEXT NOT NULL,
    PRIMARY KEY (doc_id, name)
);

CREATE TABLE IF NOT EXISTS document_meta (
    meta_id INTEGER PRIMARY KEY AUTOINCREMENT,
    doc_id INTEGER NOT NULL REFERENCES documents(doc_id) ON DELETE CASCADE,
    meta_key TEXT NOT NULL CHECK (length(trim(meta_key)) > 0),
    meta_value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS document_terms (
    doc_id INTEGER NOT NULL REFERENCES documents(doc_id) ON DELETE CASCADE,
    taxonomy TEXT NOT NULL CHECK (length(trim(taxonomy)) > 0),
    term TEXT NOT NULL CHECK (length(trim(term)) > 0),
    term_order INTEGER NOT NULL,
    PRIMARY KEY (doc_id, taxonomy, term)
);
";

/// Migration v2: lookup indexes and the one-open-fork-per-parent guard.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_documents_parent
    ON documents(parent_id);

CREATE INDEX IF NOT EXISTS idx_documents_status
    ON documents(status);

CREATE UNIQUE INDEX IF NOT EXISTS idx_documents_one_open_fork
    ON documents(parent_id) WHERE is_open_fork = 1;

CREATE INDEX IF NOT EXISTS idx_document_meta_doc
    ON document_meta(doc_id, meta_id);

CREATE INDEX IF NOT EXISTS idx_document_terms_doc
    ON document_terms(doc_id, taxonomy, term_order);
";

/// Indexes the store relies on.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_documents_parent",
    "idx_documents_status",
    "idx_documents_one_open_fork",
    "idx_document_meta_doc",
    "idx_document_terms_doc",
];

#[cfg(test)]
mod tests {
    use super::super::migrations;
    use rusqlite::{Connection, params};

    #[test]
    fn open_fork_index_rejects_second_open_fork() -> anyhow::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        migrations::migrate(&mut conn)?;

        conn.execute(
            "INSERT INTO documents (doc_id, status, parent_id, is_open_fork) VALUES (1, 'publish', NULL, 0)",
            [],
        )?;
        conn.execute(
            "INSERT INTO documents (status, parent_id, is_open_fork) VALUES (?1, 1, 1)",
            params!["wpse-draft"],
        )?;

        let second = conn.execute(
            "INSERT INTO documents (status, parent_id, is_open_fork) VALUES (?1, 1, 1)",
            params!["wpse-pending"],
        );
        assert!(second.is_err(), "unique open fork index must reject");

        // Retired forks do not count.
        conn.execute(
            "INSERT INTO documents (status, parent_id, is_open_fork) VALUES (?1, 1, 0)",
            params!["wpse-merged"],
        )?;
        Ok(())
    }

    #[test]
    fn open_fork_requires_parent() -> anyhow::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        migrations::migrate(&mut conn)?;
        let orphan = conn.execute(
            "INSERT INTO documents (status, parent_id, is_open_fork) VALUES ('wpse-draft', NULL, 1)",
            [],
        );
        assert!(orphan.is_err());
        Ok(())
    }
}
