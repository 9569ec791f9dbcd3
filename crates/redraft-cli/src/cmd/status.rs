//! `rd status <id>`: where a document stands in the fork lifecycle.

use crate::cmd::project::{Project, engine_failure, parse_id};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use clap::Args;
use redraft_core::error::ForkError;
use redraft_core::events::NoopObserver;
use redraft_core::fork::ForkEngine;
use redraft_core::model::{Document, DocumentId};
use redraft_core::status::StatusKey;
use redraft_core::store::DocumentStore;
use serde::Serialize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Document ID.
    pub id: String,
}

#[derive(Debug, Serialize)]
struct LifecycleOutput {
    id: DocumentId,
    status: String,
    /// Symbolic lifecycle key, when the status is one of the four named ones.
    key: Option<String>,
    parent: Option<DocumentId>,
    open_fork: Option<DocumentId>,
    can_fork: bool,
    /// Why a fork would be refused.
    blocker: Option<String>,
    can_merge: bool,
}

fn lifecycle<S: DocumentStore + ?Sized>(
    engine: &ForkEngine<'_, S>,
    doc: Document,
) -> Result<LifecycleOutput, ForkError> {
    let key = engine.statuses().lookup(&doc.status);
    let blocker = engine.fork_blocker(doc.id)?;
    let open_fork = engine.open_fork(doc.id)?.map(|fork| fork.id);
    Ok(LifecycleOutput {
        id: doc.id,
        key: key.map(|k| k.as_str().to_string()),
        can_fork: blocker.is_none(),
        blocker,
        can_merge: key.is_some_and(StatusKey::is_open_fork) && doc.parent.is_some(),
        status: doc.status,
        parent: doc.parent,
        open_fork,
    })
}

pub fn run_status(args: &StatusArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let id = parse_id(&args.id, output)?;
    let project = Project::open(project_root, output)?;
    let doc = project.require_document(id, output)?;
    let engine = project.engine(&NoopObserver);
    let result = lifecycle(&engine, doc).map_err(|err| engine_failure(output, &err))?;

    render_mode(
        output,
        &result,
        |out, w| {
            let key = out.key.as_deref().unwrap_or("-");
            writeln!(
                w,
                "{}\t{}\t{key}\tforkable={}\tmergeable={}",
                out.id, out.status, out.can_fork, out.can_merge
            )
        },
        |out, w| {
            pretty_section(w, &format!("Document {}", out.id))?;
            pretty_kv(w, "status", &out.status)?;
            if let Some(key) = &out.key {
                pretty_kv(w, "lifecycle", key)?;
            }
            if let Some(parent) = out.parent {
                pretty_kv(w, "fork of", parent.to_string())?;
            }
            if let Some(fork) = out.open_fork {
                pretty_kv(w, "open fork", fork.to_string())?;
            }
            match &out.blocker {
                None => pretty_kv(w, "forkable", "yes")?,
                Some(reason) => pretty_kv(w, "forkable", format!("no ({reason})"))?,
            }
            pretty_kv(w, "mergeable", if out.can_merge { "yes" } else { "no" })
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use redraft_core::model::FieldMap;
    use redraft_core::status::StatusRegistry;
    use redraft_core::store::memory::MemoryStore;

    #[test]
    fn original_and_fork_report_opposite_capabilities() {
        let store = MemoryStore::default();
        let statuses = StatusRegistry::default();
        let engine = ForkEngine::new(&store, &statuses, &NoopObserver);
        let fields: FieldMap = [("status", "publish"), ("title", "Hello")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let original = store.insert_document(&fields).expect("insert");

        let before = lifecycle(&engine, store.get_document(original).expect("read").expect("doc"))
            .expect("lifecycle");
        assert!(before.can_fork);
        assert!(!before.can_merge);
        assert_eq!(before.key.as_deref(), Some("published"));

        let fork = engine.fork(original).expect("fork");
        let after = lifecycle(&engine, store.get_document(original).expect("read").expect("doc"))
            .expect("lifecycle");
        assert!(!after.can_fork);
        assert_eq!(after.open_fork, Some(fork));
        assert!(after.blocker.as_deref().is_some_and(|r| r.contains("open fork")));

        let fork_state = lifecycle(&engine, store.get_document(fork).expect("read").expect("doc"))
            .expect("lifecycle");
        assert!(fork_state.can_merge);
        assert!(!fork_state.can_fork);
        assert_eq!(fork_state.parent, Some(original));
    }

    #[test]
    fn status_args_parse() {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: StatusArgs,
        }

        let w = Wrapper::parse_from(["test", "7"]);
        assert_eq!(w.args.id, "7");
    }
}
