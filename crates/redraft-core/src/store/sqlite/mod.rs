//! `SQLite`-backed document store.
//!
//! Runtime defaults:
//! - `journal_mode = WAL` to allow concurrent readers while a writer commits
//! - `busy_timeout = 5s` to ride out transient lock contention
//! - `foreign_keys = ON` so fields, metadata and terms follow their document
//!
//! Writes that check before they act (open-fork guard, compare-and-set status)
//! run inside `BEGIN IMMEDIATE` transactions, and the partial unique index
//! `idx_documents_one_open_fork` backs the guard at the schema level.

pub mod migrations;
pub mod schema;

use super::{
    DocumentStore, StoreError, StoreOptions, prepare_insert, prepare_update, taxonomy_union,
};
use crate::model::{Document, DocumentId, FieldMap, MetaEntry, TermCopyOutcome, TermSet, field};
use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Busy timeout used for document DB connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (or create) the document database, apply runtime pragmas, and
/// migrate the schema to the latest version.
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create database directory {}", parent.display()))?;
    }

    let mut conn = Connection::open(path)
        .with_context(|| format!("open document database {}", path.display()))?;

    configure_connection(&conn).context("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).context("apply document store migrations")?;

    Ok(conn)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

/// A [`DocumentStore`] persisted in `SQLite`.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    options: StoreOptions,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open the database at `path`, creating and migrating it as needed.
    pub fn open(path: &Path, options: StoreOptions) -> Result<Self> {
        let conn = open_database(path)?;
        Ok(Self::from_connection(conn, options))
    }

    /// A private in-memory database, mainly for tests.
    pub fn open_in_memory(options: StoreOptions) -> Result<Self> {
        let mut conn = Connection::open_in_memory().context("open in-memory database")?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("enable foreign keys")?;
        migrations::migrate(&mut conn).context("apply document store migrations")?;
        Ok(Self::from_connection(conn, options))
    }

    #[must_use]
    pub fn from_connection(conn: Connection, options: StoreOptions) -> Self {
        Self {
            conn: Mutex::new(conn),
            options,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("sqlite connection lock poisoned".to_string()))
    }

    /// Run `f` inside an immediate (write-locking) transaction.
    fn write<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    fn open_flag(&self, status: &str, parent: Option<DocumentId>) -> bool {
        parent.is_some() && self.options.is_open_fork(status)
    }
}

fn to_id(raw: i64) -> Result<DocumentId, StoreError> {
    DocumentId::new(raw).ok_or_else(|| StoreError::Backend(format!("invalid stored id {raw}")))
}

fn load_document(conn: &Connection, id: DocumentId) -> Result<Option<Document>, StoreError> {
    let row: Option<(String, Option<i64>)> = conn
        .query_row(
            "SELECT status, parent_id FROM documents WHERE doc_id = ?1",
            [id.get()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((status, parent)) = row else {
        return Ok(None);
    };

    let mut stmt = conn.prepare_cached(
        "SELECT name, value FROM document_fields WHERE doc_id = ?1 ORDER BY name",
    )?;
    let fields = stmt
        .query_map([id.get()], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<FieldMap>>()?;

    Ok(Some(Document {
        id,
        status,
        parent: parent.map(to_id).transpose()?,
        fields,
    }))
}

fn require(conn: &Connection, id: DocumentId) -> Result<(), StoreError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM documents WHERE doc_id = ?1)",
        [id.get()],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(StoreError::NotFound(id))
    }
}

fn guard_open_fork(
    conn: &Connection,
    parent: DocumentId,
    ignore: Option<DocumentId>,
) -> Result<(), StoreError> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT doc_id FROM documents
             WHERE parent_id = ?1 AND is_open_fork = 1 AND doc_id <> ?2
             LIMIT 1",
            params![parent.get(), ignore.map_or(0, DocumentId::get)],
            |row| row.get(0),
        )
        .optional()?;
    match existing {
        Some(existing) => Err(StoreError::OpenForkExists {
            parent,
            existing: to_id(existing)?,
        }),
        None => Ok(()),
    }
}

fn write_fields(conn: &Connection, id: DocumentId, fields: &FieldMap) -> Result<(), StoreError> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO document_fields (doc_id, name, value) VALUES (?1, ?2, ?3)
         ON CONFLICT(doc_id, name) DO UPDATE SET value = excluded.value",
    )?;
    for (name, value) in fields {
        stmt.execute(params![id.get(), name, value])?;
    }
    Ok(())
}

fn read_terms(conn: &Connection, id: DocumentId) -> Result<TermSet, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT taxonomy, term FROM document_terms
         WHERE doc_id = ?1 ORDER BY taxonomy, term_order",
    )?;
    let rows = stmt.query_map([id.get()], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut set = TermSet::new();
    for row in rows {
        let (taxonomy, term) = row?;
        set.entry(taxonomy).or_default().push(term);
    }
    Ok(set)
}

fn replace_terms(
    conn: &Connection,
    id: DocumentId,
    taxonomy: &str,
    terms: &[String],
) -> Result<usize, StoreError> {
    conn.execute(
        "DELETE FROM document_terms WHERE doc_id = ?1 AND taxonomy = ?2",
        params![id.get(), taxonomy],
    )?;
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO document_terms (doc_id, taxonomy, term, term_order)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    let mut count = 0;
    for (position, term) in terms.iter().enumerate() {
        let order = i64::try_from(position).map_err(|e| StoreError::Backend(e.to_string()))?;
        count += stmt.execute(params![id.get(), taxonomy, term, order])?;
    }
    Ok(count)
}

impl DocumentStore for SqliteStore {
    fn get_document(&self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        let conn = self.lock()?;
        load_document(&conn, id)
    }

    fn insert_document(&self, fields: &FieldMap) -> Result<DocumentId, StoreError> {
        let columns = prepare_insert(fields)?;
        let status = columns.status.unwrap_or_default();
        let parent = columns.parent.flatten();
        let open = self.open_flag(&status, parent);

        self.write(|tx| {
            if let Some(parent) = parent {
                require(tx, parent)?;
                if open {
                    guard_open_fork(tx, parent, None)?;
                }
            }

            tx.execute(
                "INSERT INTO documents (status, parent_id, is_open_fork) VALUES (?1, ?2, ?3)",
                params![status, parent.map(DocumentId::get), open],
            )?;
            let id = to_id(tx.last_insert_rowid())?;

            let mut doc_fields = columns.fields;
            doc_fields
                .entry(field::GUID.to_string())
                .or_insert_with(|| self.options.locator_for(id));
            write_fields(tx, id, &doc_fields)?;
            Ok(id)
        })
    }

    fn update_document_fields(&self, id: DocumentId, fields: &FieldMap) -> Result<(), StoreError> {
        let columns = prepare_update(fields)?;
        self.write(|tx| {
            let current = load_document(tx, id)?.ok_or(StoreError::NotFound(id))?;
            let status = columns.status.unwrap_or(current.status);
            let parent = columns.parent.unwrap_or(current.parent);
            let open = self.open_flag(&status, parent);
            if let Some(parent) = parent {
                require(tx, parent)?;
                if open {
                    guard_open_fork(tx, parent, Some(id))?;
                }
            }

            tx.execute(
                "UPDATE documents SET status = ?2, parent_id = ?3, is_open_fork = ?4
                 WHERE doc_id = ?1",
                params![id.get(), status, parent.map(DocumentId::get), open],
            )?;
            write_fields(tx, id, &columns.fields)
        })
    }

    fn transition_status(&self, id: DocumentId, from: &str, to: &str) -> Result<(), StoreError> {
        self.write(|tx| {
            let current = load_document(tx, id)?.ok_or(StoreError::NotFound(id))?;
            if current.status != from {
                return Err(StoreError::StatusConflict {
                    id,
                    expected: from.to_string(),
                    actual: current.status,
                });
            }
            let open = self.open_flag(to, current.parent);
            if let (true, Some(parent)) = (open, current.parent) {
                guard_open_fork(tx, parent, Some(id))?;
            }
            tx.execute(
                "UPDATE documents SET status = ?2, is_open_fork = ?3 WHERE doc_id = ?1",
                params![id.get(), to, open],
            )?;
            Ok(())
        })
    }

    fn delete_document(&self, id: DocumentId) -> Result<(), StoreError> {
        self.write(|tx| {
            require(tx, id)?;
            // Children lose their back-reference; an open fork without a
            // parent would violate the schema, so they are closed as well.
            tx.execute(
                "UPDATE documents SET parent_id = NULL, is_open_fork = 0 WHERE parent_id = ?1",
                [id.get()],
            )?;
            tx.execute("DELETE FROM documents WHERE doc_id = ?1", [id.get()])?;
            Ok(())
        })
    }

    fn children(&self, parent: DocumentId) -> Result<Vec<Document>, StoreError> {
        let conn = self.lock()?;
        let ids = {
            let mut stmt = conn.prepare_cached(
                "SELECT doc_id FROM documents WHERE parent_id = ?1 ORDER BY doc_id",
            )?;
            let ids = stmt
                .query_map([parent.get()], |row| row.get::<_, i64>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            ids
        };
        let mut docs = Vec::with_capacity(ids.len());
        for raw in ids {
            if let Some(doc) = load_document(&conn, to_id(raw)?)? {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    fn list_documents(&self) -> Result<Vec<Document>, StoreError> {
        let conn = self.lock()?;
        let ids = {
            let mut stmt = conn.prepare_cached("SELECT doc_id FROM documents ORDER BY doc_id")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, i64>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            ids
        };
        let mut docs = Vec::with_capacity(ids.len());
        for raw in ids {
            if let Some(doc) = load_document(&conn, to_id(raw)?)? {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    fn metadata(&self, id: DocumentId) -> Result<Vec<MetaEntry>, StoreError> {
        let conn = self.lock()?;
        require(&conn, id)?;
        let mut stmt = conn.prepare_cached(
            "SELECT meta_key, meta_value FROM document_meta WHERE doc_id = ?1 ORDER BY meta_id",
        )?;
        let rows = stmt
            .query_map([id.get()], |row| {
                Ok(MetaEntry {
                    key: row.get(0)?,
                    value: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn add_metadata(&self, id: DocumentId, key: &str, value: &str) -> Result<(), StoreError> {
        if key.trim().is_empty() {
            return Err(StoreError::Validation("metadata key must not be empty".to_string()));
        }
        self.write(|tx| {
            require(tx, id)?;
            tx.execute(
                "INSERT INTO document_meta (doc_id, meta_key, meta_value) VALUES (?1, ?2, ?3)",
                params![id.get(), key, value],
            )?;
            Ok(())
        })
    }

    fn clear_metadata(&self, id: DocumentId) -> Result<usize, StoreError> {
        self.write(|tx| {
            require(tx, id)?;
            Ok(tx.execute("DELETE FROM document_meta WHERE doc_id = ?1", [id.get()])?)
        })
    }

    fn copy_metadata(&self, from: DocumentId, to: DocumentId) -> Result<usize, StoreError> {
        self.write(|tx| {
            require(tx, from)?;
            require(tx, to)?;
            Ok(tx.execute(
                "INSERT INTO document_meta (doc_id, meta_key, meta_value)
                 SELECT ?2, meta_key, meta_value FROM document_meta
                 WHERE doc_id = ?1 ORDER BY meta_id",
                params![from.get(), to.get()],
            )?)
        })
    }

    fn terms(&self, id: DocumentId) -> Result<TermSet, StoreError> {
        let conn = self.lock()?;
        require(&conn, id)?;
        read_terms(&conn, id)
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
        self.write(|tx| {
            require(tx, id)?;
            replace_terms(tx, id, taxonomy, terms)
        })
    }

    fn copy_terms(&self, from: DocumentId, to: DocumentId) -> Result<TermCopyOutcome, StoreError> {
        self.write(|tx| {
            require(tx, from)?;
            require(tx, to)?;
            let source = read_terms(tx, from)?;
            let target = read_terms(tx, to)?;

            let mut outcome = TermCopyOutcome::default();
            for taxonomy in taxonomy_union(&source, &target) {
                let terms = source.get(taxonomy).map_or(&[][..], Vec::as_slice);
                let count = replace_terms(tx, to, taxonomy, terms)?;
                outcome.per_taxonomy.insert(taxonomy.to_string(), count);
            }
            Ok(outcome)
        })
    }
}
