use crate::cmd::project::{Project, engine_failure, parse_pairs};
use crate::cmd::show::{DocumentView, write_pretty, write_text};
use crate::output::{CliError, OutputMode, fail, render_mode};
use clap::Args;
use redraft_core::error::{ErrorCode, ForkError};
use redraft_core::events::NoopObserver;
use redraft_core::model::{DocumentId, FieldMap, TermSet, field};
use redraft_core::status::StatusKey;
use redraft_core::store::DocumentStore;
use std::path::Path;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Document title.
    #[arg(long)]
    pub title: String,

    /// Document body.
    #[arg(long)]
    pub body: Option<String>,

    /// Short summary.
    #[arg(long)]
    pub excerpt: Option<String>,

    /// Initial status (defaults to the configured published status).
    #[arg(long)]
    pub status: Option<String>,

    /// Extra content field as `key=value`. Repeatable.
    #[arg(long = "field", value_name = "KEY=VALUE")]
    pub fields: Vec<String>,

    /// Metadata row as `key=value`. Repeatable; keys may repeat.
    #[arg(long, value_name = "KEY=VALUE")]
    pub meta: Vec<String>,

    /// Term assignment as `taxonomy=slug`. Repeatable.
    #[arg(long, value_name = "TAXONOMY=SLUG")]
    pub term: Vec<String>,
}

/// Execute `rd create`: insert one document with its metadata and terms.
pub fn run_create(args: &CreateArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let project = Project::open(project_root, output)?;

    let status = match &args.status {
        Some(status) => status.trim().to_string(),
        None => project
            .statuses
            .resolve_status_name(StatusKey::Published)
            .unwrap_or_default()
            .to_string(),
    };
    if project.statuses.is_fork_lifecycle(&status) {
        return Err(fail(
            output,
            &CliError::with_details(
                format!("status '{status}' is reserved for forks"),
                "create the document published, then use `rd fork <id>`",
                ErrorCode::InvalidArgument.code(),
            ),
        ));
    }

    let mut fields = FieldMap::new();
    for (key, value) in parse_pairs(&args.fields, "--field", output)? {
        fields.insert(key.to_string(), value.to_string());
    }
    fields.insert(field::TITLE.to_string(), args.title.clone());
    if let Some(body) = &args.body {
        fields.insert(field::BODY.to_string(), body.clone());
    }
    if let Some(excerpt) = &args.excerpt {
        fields.insert(field::EXCERPT.to_string(), excerpt.clone());
    }
    fields.insert(field::STATUS.to_string(), status);

    let meta = parse_pairs(&args.meta, "--meta", output)?;
    let mut terms = TermSet::new();
    for (taxonomy, slug) in parse_pairs(&args.term, "--term", output)? {
        let slugs = terms.entry(taxonomy.to_string()).or_default();
        if !slugs.iter().any(|s| s == slug) {
            slugs.push(slug.to_string());
        }
    }

    let _lock = project.write_lock(output)?;
    let id = insert(&project.store, &fields, &meta, &terms)
        .map_err(|err| engine_failure(output, &err))?;
    tracing::info!(document = %id, "created document");

    let engine = project.engine(&NoopObserver);
    let doc = project.require_document(id, output)?;
    let view = DocumentView::load(&engine, &project.store, &project.links, doc)
        .map_err(|err| engine_failure(output, &err))?;
    render_mode(output, &view, write_text, write_pretty)
}

fn insert<S: DocumentStore + ?Sized>(
    store: &S,
    fields: &FieldMap,
    meta: &[(&str, &str)],
    terms: &TermSet,
) -> Result<DocumentId, ForkError> {
    let id = store.insert_document(fields)?;
    for (key, value) in meta {
        store.add_metadata(id, key, value)?;
    }
    for (taxonomy, slugs) in terms {
        store.set_terms(id, taxonomy, slugs)?;
    }
    Ok(id)
}
