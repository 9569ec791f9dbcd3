use crate::cmd::project::{Project, engine_failure, parse_id};
use crate::output::{OutputMode, render};
use clap::{Args, Subcommand};
use redraft_core::error::ForkError;
use redraft_core::model::DocumentId;
use redraft_core::store::DocumentStore;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct TermArgs {
    #[command(subcommand)]
    pub command: TermCommand,
}

#[derive(Subcommand, Debug)]
pub enum TermCommand {
    /// Replace the terms of one taxonomy. No slugs clears the taxonomy.
    Set {
        /// Document ID.
        id: String,
        /// Taxonomy name, e.g. `category` or `post_tag`.
        taxonomy: String,
        /// Term slugs, in order.
        slugs: Vec<String>,
    },
}

#[derive(Debug, Serialize)]
struct TermOutput {
    id: DocumentId,
    taxonomy: String,
    assigned: usize,
    slugs: Vec<String>,
}

pub fn run_term(args: &TermArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let TermCommand::Set { id, taxonomy, slugs } = &args.command;
    let id = parse_id(id, output)?;
    let project = Project::open(project_root, output)?;
    let _lock = project.write_lock(output)?;
    project.require_document(id, output)?;

    let mut unique: Vec<String> = Vec::with_capacity(slugs.len());
    for slug in slugs {
        if !unique.contains(slug) {
            unique.push(slug.clone());
        }
    }
    let assigned = project
        .store
        .set_terms(id, taxonomy, &unique)
        .map_err(|err| engine_failure(output, &ForkError::from(err)))?;

    let result = TermOutput {
        id,
        taxonomy: taxonomy.clone(),
        assigned,
        slugs: unique,
    };
    render(output, &result, |out, w| {
        writeln!(
            w,
            "✓ {} {}: {}",
            out.id,
            out.taxonomy,
            if out.slugs.is_empty() { "(none)".to_string() } else { out.slugs.join(", ") }
        )
    })
}
