//! `rd meta add|clear`: the ordered metadata rows of a document.

use crate::cmd::project::{Project, engine_failure, parse_id};
use crate::output::{OutputMode, render};
use clap::{Args, Subcommand};
use redraft_core::error::ForkError;
use redraft_core::model::{DocumentId, MetaEntry};
use redraft_core::store::DocumentStore;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct MetaArgs {
    #[command(subcommand)]
    pub command: MetaCommand,
}

#[derive(Subcommand, Debug)]
pub enum MetaCommand {
    /// Append one metadata row. Existing rows with the same key are kept.
    Add {
        /// Document ID.
        id: String,
        key: String,
        value: String,
    },
    /// Remove every metadata row of a document.
    Clear {
        /// Document ID.
        id: String,
    },
}

#[derive(Debug, Serialize)]
struct MetaOutput {
    id: DocumentId,
    removed: usize,
    meta: Vec<MetaEntry>,
}

pub fn run_meta(args: &MetaArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let raw_id = match &args.command {
        MetaCommand::Add { id, .. } | MetaCommand::Clear { id } => id,
    };
    let id = parse_id(raw_id, output)?;
    let project = Project::open(project_root, output)?;
    let _lock = project.write_lock(output)?;
    project.require_document(id, output)?;

    let store = &project.store;
    let applied = match &args.command {
        MetaCommand::Add { key, value, .. } => store.add_metadata(id, key, value).map(|()| 0),
        MetaCommand::Clear { .. } => store.clear_metadata(id),
    };
    let removed = applied.map_err(|err| engine_failure(output, &ForkError::from(err)))?;
    let meta = store
        .metadata(id)
        .map_err(|err| engine_failure(output, &ForkError::from(err)))?;
    tracing::debug!(document = %id, rows = meta.len(), removed, "metadata updated");

    render(output, &MetaOutput { id, removed, meta }, |out, w| {
        if out.removed > 0 {
            writeln!(w, "✓ removed {} metadata rows from {}", out.removed, out.id)?;
        }
        for entry in &out.meta {
            writeln!(w, "{}\t{}", entry.key, entry.value)?;
        }
        Ok(())
    })
}
