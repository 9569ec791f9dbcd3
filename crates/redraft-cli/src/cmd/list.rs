use crate::cmd::project::{Project, engine_failure};
use crate::output::{OutputMode, pretty_rule, pretty_section, render_mode};
use clap::Args;
use redraft_core::error::ForkError;
use redraft_core::model::{Document, DocumentId};
use redraft_core::status::StatusRegistry;
use redraft_core::store::DocumentStore;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only documents with this status.
    #[arg(long)]
    pub status: Option<String>,

    /// Only open forks (draft or pending review).
    #[arg(long, conflicts_with = "status")]
    pub forks: bool,
}

#[derive(Debug, Serialize)]
struct ListRow {
    id: DocumentId,
    status: String,
    parent: Option<DocumentId>,
    title: String,
}

impl From<Document> for ListRow {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            title: doc.title().to_string(),
            status: doc.status,
            parent: doc.parent,
        }
    }
}

fn select(
    docs: Vec<Document>,
    args: &ListArgs,
    statuses: &StatusRegistry,
) -> Vec<ListRow> {
    docs.into_iter()
        .filter(|doc| match &args.status {
            Some(status) => doc.status == status.trim(),
            None => !args.forks || statuses.is_open_fork(&doc.status),
        })
        .map(ListRow::from)
        .collect()
}

pub fn run_list(args: &ListArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let project = Project::open(project_root, output)?;
    let docs = project
        .store
        .list_documents()
        .map_err(|err| engine_failure(output, &ForkError::from(err)))?;
    let rows = select(docs, args, &project.statuses);

    render_mode(
        output,
        &rows,
        |rows, w| {
            for row in rows {
                writeln!(w, "{}\t{}\t{}", row.id, row.status, row.title)?;
            }
            Ok(())
        },
        |rows, w| {
            pretty_section(w, &format!("Documents ({})", rows.len()))?;
            for row in rows {
                let fork_of = row
                    .parent
                    .map(|parent| format!("  (fork of {parent})"))
                    .unwrap_or_default();
                writeln!(w, "{:>6}  {:<14} {}{fork_of}", row.id, row.status, row.title)?;
            }
            pretty_rule(w)
        },
    )
}
