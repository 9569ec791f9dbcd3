//! `rd show <id>`: one document with its fields, metadata, terms and fork links.

use crate::cmd::project::{Project, engine_failure, parse_id};
use crate::output::{OutputMode, pretty_kv, pretty_rule, pretty_section, render_mode};
use clap::Args;
use redraft_core::error::ForkError;
use redraft_core::events::NoopObserver;
use redraft_core::fork::ForkEngine;
use redraft_core::model::{Document, DocumentId, FieldMap, MetaEntry, TermSet, field};
use redraft_core::store::DocumentStore;
use redraft_core::workflow::EditLinks;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Document ID.
    pub id: String,
}

/// Everything `rd` knows about one document.
#[derive(Debug, Serialize)]
pub struct DocumentView {
    pub id: DocumentId,
    pub status: String,
    pub parent: Option<DocumentId>,
    pub title: String,
    pub fields: FieldMap,
    pub meta: Vec<MetaEntry>,
    pub terms: TermSet,
    /// The open fork of this document, if any.
    pub open_fork: Option<DocumentId>,
    pub can_fork: bool,
    pub view_url: String,
    pub edit_url: String,
}

impl DocumentView {
    pub fn load<S: DocumentStore + ?Sized>(
        engine: &ForkEngine<'_, S>,
        store: &S,
        links: &EditLinks,
        doc: Document,
    ) -> Result<Self, ForkError> {
        let meta = store.metadata(doc.id)?;
        let terms = store.terms(doc.id)?;
        let open_fork = engine.open_fork(doc.id)?.map(|fork| fork.id);
        Ok(Self {
            can_fork: engine.can_fork(doc.id),
            view_url: links.view_url(doc.id),
            edit_url: links.edit_url(doc.id),
            id: doc.id,
            title: doc.title().to_string(),
            status: doc.status,
            parent: doc.parent,
            fields: doc.fields,
            meta,
            terms,
            open_fork,
        })
    }
}

/// One-line summary: `id<TAB>status<TAB>title`.
pub fn write_text(view: &DocumentView, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{}\t{}\t{}", view.id, view.status, view.title)
}

pub fn write_pretty(view: &DocumentView, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("Document {}: {}", view.id, view.title))?;
    pretty_kv(w, "status", &view.status)?;
    if let Some(parent) = view.parent {
        pretty_kv(w, "fork of", parent.to_string())?;
    }
    if let Some(fork) = view.open_fork {
        pretty_kv(w, "open fork", fork.to_string())?;
    }
    pretty_kv(w, "forkable", if view.can_fork { "yes" } else { "no" })?;
    pretty_kv(w, "view", &view.view_url)?;
    pretty_kv(w, "edit", &view.edit_url)?;
    for name in [field::GUID, field::CREATED_AT, field::MODIFIED_AT] {
        if let Some(value) = view.fields.get(name) {
            pretty_kv(w, name, value)?;
        }
    }

    writeln!(w)?;
    pretty_section(w, "Fields")?;
    for (name, value) in &view.fields {
        let shown_above = matches!(name.as_str(), field::TITLE | field::GUID)
            || name.ends_with("_at")
            || name.ends_with("_gmt");
        if shown_above {
            continue;
        }
        pretty_kv(w, name, value)?;
    }

    if !view.meta.is_empty() {
        writeln!(w)?;
        pretty_section(w, "Metadata")?;
        for entry in &view.meta {
            pretty_kv(w, &entry.key, &entry.value)?;
        }
    }

    if view.terms.values().any(|slugs| !slugs.is_empty()) {
        writeln!(w)?;
        pretty_section(w, "Terms")?;
        for (taxonomy, slugs) in view.terms.iter().filter(|(_, s)| !s.is_empty()) {
            pretty_kv(w, taxonomy, slugs.join(", "))?;
        }
    }
    pretty_rule(w)
}

pub fn run_show(args: &ShowArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let id = parse_id(&args.id, output)?;
    let project = Project::open(project_root, output)?;
    let doc = project.require_document(id, output)?;
    let engine = project.engine(&NoopObserver);
    let view = DocumentView::load(&engine, &project.store, &project.links, doc)
        .map_err(|err| engine_failure(output, &err))?;
    render_mode(output, &view, write_text, write_pretty)
}
