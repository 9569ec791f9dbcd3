use crate::cmd::project::{Project, engine_failure, parse_id};
use crate::output::{OutputMode, render};
use clap::Args;
use redraft_core::events::TracingObserver;
use redraft_core::model::DocumentId;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// ID of the draft fork to submit for review.
    pub id: String,
}

/// A document whose status changed in place.
#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub action: &'static str,
    pub id: DocumentId,
    pub status: String,
}

pub fn render_status(output: OutputMode, out: &StatusOutput) -> anyhow::Result<()> {
    render(output, out, |out, w| {
        writeln!(w, "✓ {} {} -> {}", out.action, out.id, out.status)
    })
}

/// Execute `rd submit`: draft fork → pending fork.
pub fn run_submit(args: &SubmitArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let id = parse_id(&args.id, output)?;
    let project = Project::open(project_root, output)?;
    let _lock = project.write_lock(output)?;

    let trigger = project.trigger(&TracingObserver);
    trigger
        .submit_for_review(id)
        .map_err(|err| engine_failure(output, &err))?;
    let doc = project.require_document(id, output)?;

    render_status(
        output,
        &StatusOutput {
            action: "submit",
            id,
            status: doc.status,
        },
    )
}
