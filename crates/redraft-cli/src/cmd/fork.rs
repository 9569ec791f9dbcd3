//! `rd fork <id>`: start a private revision of a published document.

use crate::cmd::project::{Project, engine_failure, parse_id};
use crate::output::{OutputMode, pretty_kv, render_mode};
use clap::Args;
use redraft_core::events::TracingObserver;
use redraft_core::model::DocumentId;
use redraft_core::workflow::Redirect;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug)]
pub struct ForkArgs {
    /// ID of the document to fork.
    pub id: String,
}

/// Result of a workflow step that sends the editor somewhere.
#[derive(Debug, Serialize)]
pub struct RedirectOutput {
    pub action: &'static str,
    pub document: DocumentId,
    pub original: DocumentId,
    pub redirect_url: String,
    pub notice: Option<String>,
}

impl RedirectOutput {
    pub fn new(action: &'static str, original: DocumentId, redirect: Redirect) -> Self {
        Self {
            action,
            document: redirect.document,
            original,
            redirect_url: redirect.url,
            notice: redirect.notice,
        }
    }
}

pub fn write_redirect_text(out: &RedirectOutput, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{}\t{}\t{}", out.action, out.document, out.redirect_url)
}

pub fn write_redirect_pretty(out: &RedirectOutput, w: &mut dyn Write) -> io::Result<()> {
    if let Some(notice) = &out.notice {
        writeln!(w, "✓ {notice}")?;
    }
    pretty_kv(w, "document", out.document.to_string())?;
    pretty_kv(w, "original", out.original.to_string())?;
    pretty_kv(w, "edit", &out.redirect_url)
}

pub fn run_fork(args: &ForkArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let id = parse_id(&args.id, output)?;
    let project = Project::open(project_root, output)?;
    let _lock = project.write_lock(output)?;

    let trigger = project.trigger(&TracingObserver);
    let redirect = trigger
        .request_fork(id)
        .map_err(|err| engine_failure(output, &err))?;

    let result = RedirectOutput::new("fork", id, redirect);
    render_mode(output, &result, write_redirect_text, write_redirect_pretty)
}
