//! Opening a redraft project: state directory, config, store and engine.

use crate::output::{CliError, OutputMode, fail};
use redraft_core::config::{self, ProjectConfig, ProjectPaths, STATE_DIR};
use redraft_core::error::{ErrorCode, ForkError};
use redraft_core::events::ForkObserver;
use redraft_core::fork::ForkEngine;
use redraft_core::lock::{DEFAULT_LOCK_TIMEOUT, RepoWriteLock};
use redraft_core::model::{Document, DocumentId};
use redraft_core::status::StatusRegistry;
use redraft_core::store::DocumentStore;
use redraft_core::store::sqlite::SqliteStore;
use redraft_core::workflow::{EditLinks, WorkflowTrigger};
use std::path::{Path, PathBuf};

/// Find the project root by walking up from `start` to the first directory
/// that holds a `.redraft` state directory.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(STATE_DIR).is_dir() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// An opened project.
#[derive(Debug)]
pub struct Project {
    pub paths: ProjectPaths,
    pub config: ProjectConfig,
    pub statuses: StatusRegistry,
    pub links: EditLinks,
    pub store: SqliteStore,
}

impl Project {
    /// Open the project containing `start`, rendering a coded error when it
    /// is not initialized or its config is broken.
    pub fn open(start: &Path, output: OutputMode) -> anyhow::Result<Self> {
        let Some(root) = find_project_root(start) else {
            return Err(fail(
                output,
                &CliError::coded(
                    ErrorCode::NotInitialized,
                    format!("not a redraft project: {STATE_DIR} directory not found"),
                ),
            ));
        };
        let paths = ProjectPaths::new(&root);

        let config = config::load_project_config(&root).map_err(|err| {
            fail(
                output,
                &CliError::coded(ErrorCode::ConfigParseError, format!("{err:#}")),
            )
        })?;

        let store = SqliteStore::open(&paths.database, config.store_options())?;
        tracing::debug!(root = %root.display(), "opened redraft project");

        Ok(Self {
            statuses: config.status_registry(),
            links: config.links(),
            paths,
            config,
            store,
        })
    }

    /// Fork engine over this project's store, configured from the project.
    pub fn engine<'a>(&'a self, observer: &'a dyn ForkObserver) -> ForkEngine<'a, SqliteStore> {
        ForkEngine::new(&self.store, &self.statuses, observer).with_options(self.config.fork_options())
    }

    pub fn trigger<'a>(&'a self, observer: &'a dyn ForkObserver) -> WorkflowTrigger<'a, SqliteStore> {
        WorkflowTrigger::new(self.engine(observer), &self.links)
    }

    /// Hold the project write lock for the rest of a mutating command.
    pub fn write_lock(&self, output: OutputMode) -> anyhow::Result<RepoWriteLock> {
        RepoWriteLock::acquire(&self.paths.write_lock, DEFAULT_LOCK_TIMEOUT)
            .map_err(|err| fail(output, &CliError::from(&err)))
    }

    /// Load a document or render `E2001`.
    pub fn require_document(&self, id: DocumentId, output: OutputMode) -> anyhow::Result<Document> {
        match self.store.get_document(id) {
            Ok(Some(doc)) => Ok(doc),
            Ok(None) => Err(fail(
                output,
                &CliError::with_details(
                    format!("document {id} not found"),
                    "use `rd list` to see available documents",
                    ErrorCode::DocumentNotFound.code(),
                ),
            )),
            Err(err) => Err(engine_failure(output, &ForkError::from(err))),
        }
    }
}

/// Parse a document id argument or render `E2002`.
pub fn parse_id(raw: &str, output: OutputMode) -> anyhow::Result<DocumentId> {
    raw.parse::<DocumentId>().map_err(|err| {
        fail(
            output,
            &CliError::with_details(
                err.to_string(),
                "document ids are positive integers",
                ErrorCode::InvalidArgument.code(),
            ),
        )
    })
}

/// Render an engine failure and turn it into the command's error.
pub fn engine_failure(output: OutputMode, err: &ForkError) -> anyhow::Error {
    fail(output, &CliError::from(err))
}

/// Split `key=value` pairs given on the command line.
pub fn parse_pairs<'a>(
    raw: &'a [String],
    flag: &str,
    output: OutputMode,
) -> anyhow::Result<Vec<(&'a str, &'a str)>> {
    raw.iter()
        .map(|pair| {
            pair.split_once('=')
                .filter(|(key, _)| !key.trim().is_empty())
                .map(|(key, value)| (key.trim(), value))
                .ok_or_else(|| {
                    fail(
                        output,
                        &CliError::with_details(
                            format!("invalid {flag} '{pair}'"),
                            format!("use {flag} key=value"),
                            ErrorCode::InvalidArgument.code(),
                        ),
                    )
                })
        })
        .collect()
}
