//! Workflow trigger: the editor-facing actions around the fork engine.
//!
//! The editor asks for a fork and is sent to the fork's edit screen; later it
//! publishes the fork, which merges it and sends the editor back to the
//! original.

use crate::error::ForkError;
use crate::fork::{ForkEngine, TransitionOutcome};
use crate::model::DocumentId;
use crate::status::StatusKey;
use crate::store::DocumentStore;
use serde::Serialize;

/// Notice shown on the fork's edit screen right after it was created.
pub const FORK_CREATED_NOTICE: &str =
    "A draft has been created and you can edit it below. Publish your changes to make them live.";

/// Notice shown on the original after a fork was merged into it.
pub const FORK_MERGED_NOTICE: &str = "Your changes have been published.";

/// URL templates for documents. `{id}` is replaced by the document id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditLinks {
    pub site_url: String,
    pub edit_path: String,
    pub view_path: String,
}

impl Default for EditLinks {
    fn default() -> Self {
        Self {
            site_url: "http://localhost".to_string(),
            edit_path: "/wp-admin/post.php?post={id}&action=edit".to_string(),
            view_path: "/?p={id}".to_string(),
        }
    }
}

impl EditLinks {
    #[must_use]
    pub fn edit_url(&self, id: DocumentId) -> String {
        self.render(&self.edit_path, id)
    }

    #[must_use]
    pub fn view_url(&self, id: DocumentId) -> String {
        self.render(&self.view_path, id)
    }

    fn render(&self, path: &str, id: DocumentId) -> String {
        let path = path.replace("{id}", &id.to_string());
        let base = self.site_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}

/// Where the editor should go next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub document: DocumentId,
    pub url: String,
    pub notice: Option<String>,
}

/// Outcome of [`WorkflowTrigger::publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// An open fork was merged; follow the redirect to the original.
    Merged {
        fork: DocumentId,
        original: DocumentId,
        redirect: Redirect,
    },
    /// An ordinary document was published in place.
    Published { id: DocumentId },
}

impl PublishOutcome {
    #[must_use]
    pub const fn redirect(&self) -> Option<&Redirect> {
        match self {
            Self::Merged { redirect, .. } => Some(redirect),
            Self::Published { .. } => None,
        }
    }
}

#[derive(Debug)]
pub struct WorkflowTrigger<'a, S: DocumentStore + ?Sized> {
    engine: ForkEngine<'a, S>,
    links: &'a EditLinks,
}

impl<'a, S: DocumentStore + ?Sized> WorkflowTrigger<'a, S> {
    #[must_use]
    pub const fn new(engine: ForkEngine<'a, S>, links: &'a EditLinks) -> Self {
        Self { engine, links }
    }

    #[must_use]
    pub const fn engine(&self) -> &ForkEngine<'a, S> {
        &self.engine
    }

    #[must_use]
    pub const fn links(&self) -> &EditLinks {
        self.links
    }

    /// Fork `id` and point the editor at the new fork.
    pub fn request_fork(&self, id: DocumentId) -> Result<Redirect, ForkError> {
        let fork = self.engine.fork(id)?;
        Ok(Redirect {
            document: fork,
            url: self.links.edit_url(fork),
            notice: Some(FORK_CREATED_NOTICE.to_string()),
        })
    }

    /// Merge the fork `id` explicitly and point the editor at the original.
    pub fn request_merge(&self, id: DocumentId) -> Result<Redirect, ForkError> {
        let original = self.engine.merge(id)?;
        Ok(self.merged_redirect(original))
    }

    pub fn submit_for_review(&self, id: DocumentId) -> Result<(), ForkError> {
        self.engine.submit_for_review(id)
    }

    /// Publish `id`. For an open fork this is the merge trigger.
    pub fn publish(&self, id: DocumentId) -> Result<PublishOutcome, ForkError> {
        let published = self
            .engine
            .statuses()
            .resolve_status_name(StatusKey::Published)
            .ok_or_else(|| ForkError::ForkFailed("no published status is configured".to_string()))?;

        match self.engine.transition(id, published)? {
            TransitionOutcome::Merged { fork, original } => Ok(PublishOutcome::Merged {
                fork,
                original,
                redirect: self.merged_redirect(original),
            }),
            TransitionOutcome::Updated { id, .. } => Ok(PublishOutcome::Published { id }),
        }
    }

    fn merged_redirect(&self, original: DocumentId) -> Redirect {
        Redirect {
            document: original,
            url: self.links.edit_url(original),
            notice: Some(FORK_MERGED_NOTICE.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopObserver;
    use crate::model::FieldMap;
    use crate::status::StatusRegistry;
    use crate::store::memory::MemoryStore;

    fn id(raw: i64) -> DocumentId {
        DocumentId::new(raw).expect("positive id")
    }

    #[test]
    fn links_render_templates() {
        let links = EditLinks {
            site_url: "https://news.example/".to_string(),
            ..EditLinks::default()
        };
        assert_eq!(
            links.edit_url(id(43)),
            "https://news.example/wp-admin/post.php?post=43&action=edit"
        );
        assert_eq!(links.view_url(id(43)), "https://news.example/?p=43");

        let relative = EditLinks {
            edit_path: "edit/{id}".to_string(),
            ..EditLinks::default()
        };
        assert_eq!(relative.edit_url(id(7)), "http://localhost/edit/7");
    }

    #[test]
    fn fork_then_publish_redirects_back_to_original() {
        let store = MemoryStore::default();
        let statuses = StatusRegistry::default();
        let links = EditLinks::default();
        let trigger = WorkflowTrigger::new(ForkEngine::new(&store, &statuses, &NoopObserver), &links);

        let fields: FieldMap = [("status", "publish"), ("title", "Hello")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let original = store.insert_document(&fields).expect("insert");

        let redirect = trigger.request_fork(original).expect("fork");
        assert_ne!(redirect.document, original);
        assert_eq!(redirect.url, links.edit_url(redirect.document));
        assert_eq!(redirect.notice.as_deref(), Some(FORK_CREATED_NOTICE));

        trigger.submit_for_review(redirect.document).expect("submit");
        let outcome = trigger.publish(redirect.document).expect("publish");
        let back = outcome.redirect().expect("merge redirects");
        assert_eq!(back.document, original);
        assert_eq!(back.url, links.edit_url(original));
    }

    #[test]
    fn publishing_an_ordinary_draft_does_not_redirect() {
        let store = MemoryStore::default();
        let statuses = StatusRegistry::default();
        let links = EditLinks::default();
        let trigger = WorkflowTrigger::new(ForkEngine::new(&store, &statuses, &NoopObserver), &links);

        let fields: FieldMap = [("status", "draft"), ("body", "text")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let doc = store.insert_document(&fields).expect("insert");

        let outcome = trigger.publish(doc).expect("publish");
        assert_eq!(outcome, PublishOutcome::Published { id: doc });
        assert!(outcome.redirect().is_none());
        let stored = store.get_document(doc).expect("read").expect("exists");
        assert_eq!(stored.status, "publish");
    }
}
