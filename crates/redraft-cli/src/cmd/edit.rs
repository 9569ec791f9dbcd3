use crate::cmd::project::{Project, engine_failure, parse_id, parse_pairs};
use crate::cmd::show::{DocumentView, write_pretty, write_text};
use crate::output::{CliError, OutputMode, fail, render_mode};
use clap::Args;
use redraft_core::error::{ErrorCode, ForkError};
use redraft_core::events::NoopObserver;
use redraft_core::model::{FieldMap, field};
use redraft_core::store::DocumentStore;
use std::path::Path;

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Document ID.
    pub id: String,

    /// New title.
    #[arg(long)]
    pub title: Option<String>,

    /// New body.
    #[arg(long)]
    pub body: Option<String>,

    /// Field to overwrite as `key=value`. Repeatable.
    #[arg(long = "field", value_name = "KEY=VALUE")]
    pub fields: Vec<String>,
}

/// Fields `rd edit` refuses to touch; status moves go through the workflow
/// commands and identity belongs to the store.
const LOCKED_FIELDS: &[&str] = &[field::ID, field::STATUS, field::PARENT, field::GUID];

pub fn run_edit(args: &EditArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let id = parse_id(&args.id, output)?;

    let mut fields = FieldMap::new();
    for (key, value) in parse_pairs(&args.fields, "--field", output)? {
        if LOCKED_FIELDS.contains(&key) {
            return Err(fail(
                output,
                &CliError::with_details(
                    format!("field '{key}' cannot be edited directly"),
                    "use `rd submit` or `rd publish` to change status",
                    ErrorCode::InvalidArgument.code(),
                ),
            ));
        }
        fields.insert(key.to_string(), value.to_string());
    }
    if let Some(title) = &args.title {
        fields.insert(field::TITLE.to_string(), title.clone());
    }
    if let Some(body) = &args.body {
        fields.insert(field::BODY.to_string(), body.clone());
    }
    if fields.is_empty() {
        return Err(fail(
            output,
            &CliError::with_details(
                "nothing to edit",
                "pass --title, --body or --field key=value",
                ErrorCode::InvalidArgument.code(),
            ),
        ));
    }

    let project = Project::open(project_root, output)?;
    let _lock = project.write_lock(output)?;
    project.require_document(id, output)?;
    project
        .store
        .update_document_fields(id, &fields)
        .map_err(|err| engine_failure(output, &ForkError::from(err)))?;
    tracing::info!(document = %id, fields = fields.len(), "edited document");

    let engine = project.engine(&NoopObserver);
    let doc = project.require_document(id, output)?;
    let view = DocumentView::load(&engine, &project.store, &project.links, doc)
        .map_err(|err| engine_failure(output, &err))?;
    render_mode(output, &view, write_text, write_pretty)
}
