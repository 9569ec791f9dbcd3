//! Versioned schema upgrades for the document database.
//!
//! Each step that runs is written to `schema_history` with its name and the
//! time it ran. `PRAGMA user_version` mirrors the newest recorded version so
//! the sqlite shell can tell which schema a file carries.

use super::schema;
use anyhow::{Result, bail};
use chrono::Utc;
use rusqlite::{Connection, params, types::Type};
use tracing::debug;

/// Latest schema version understood by this binary.
pub const LATEST_SCHEMA_VERSION: u32 = 2;

/// One schema step.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    sql: &'static str,
}

/// Every schema step, oldest first.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "documents, fields, metadata and terms",
        sql: schema::MIGRATION_V1_SQL,
    },
    Migration {
        version: 2,
        name: "lookup indexes and the open-fork guard",
        sql: schema::MIGRATION_V2_SQL,
    },
];

/// A row of `schema_history`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub version: u32,
    pub name: String,
    pub applied_at: String,
}

fn to_version(raw: i64) -> rusqlite::Result<u32> {
    u32::try_from(raw)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error)))
}

/// Newest version recorded in `schema_history`, or 0 for a fresh database.
pub fn recorded_version(conn: &Connection) -> rusqlite::Result<u32> {
    let newest: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_history", [], |row| row.get(0))?;
    newest.map_or(Ok(0), to_version)
}

/// Applied migrations in the order they ran.
pub fn history(conn: &Connection) -> rusqlite::Result<Vec<AppliedMigration>> {
    let mut stmt = conn.prepare(
        "SELECT version, name, applied_at FROM schema_history ORDER BY version",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(AppliedMigration {
            version: to_version(row.get(0)?)?,
            name: row.get(1)?,
            applied_at: row.get(2)?,
        })
    })?;
    rows.collect()
}

/// Bring the database up to [`LATEST_SCHEMA_VERSION`] and return the version
/// it ends at.
///
/// Each pending step runs in its own transaction together with its history
/// row. A database written by a newer build is refused untouched.
pub fn migrate(conn: &mut Connection) -> Result<u32> {
    conn.execute_batch(schema::HISTORY_SQL)?;
    let mut current = recorded_version(conn)?;
    if current > LATEST_SCHEMA_VERSION {
        bail!(
            "document database is at schema version {current}, newer than the supported {LATEST_SCHEMA_VERSION}"
        );
    }

    for migration in MIGRATIONS.iter().filter(move |m| m.version > current) {
        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_history (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![
                i64::from(migration.version),
                migration.name,
                Utc::now().to_rfc3339()
            ],
        )?;
        tx.pragma_update(None, "user_version", i64::from(migration.version))?;
        tx.commit()?;

        debug!(version = migration.version, name = migration.name, "applied schema migration");
        current = migration.version;
    }

    Ok(current)
}
