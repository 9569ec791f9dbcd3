use crate::output::{OutputMode, render};
use anyhow::{Context as _, Result};
use clap::Args;
use redraft_core::config::{self, ProjectPaths, STATE_DIR};
use redraft_core::store::sqlite::{self, migrations};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite the config of an existing `.redraft/` directory.
    #[arg(long)]
    pub force: bool,
}

const GITIGNORE: &str = "redraft.sqlite3\nredraft.sqlite3-*\nwrite.lock\napi.key\n";

#[derive(Debug, Serialize)]
struct InitOutput {
    ok: bool,
    state_dir: String,
    config: String,
    database: String,
    schema_version: u32,
    migrations: Vec<String>,
}

/// Execute `rd init`. Creates the project skeleton:
///
/// ```text
/// .redraft/
///   config.toml       (default statuses, fork, merge, site and api sections)
///   redraft.sqlite3   (migrated document database)
///   .gitignore        (database, lock and key files)
/// ```
///
/// An existing database is kept on `--force`; only config and ignore file
/// are rewritten.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let paths = ProjectPaths::new(project_root);

    if paths.is_initialized() && !args.force {
        anyhow::bail!("{STATE_DIR}/ already exists. Use `rd init --force` to reinitialize.");
    }

    std::fs::create_dir_all(&paths.state_dir).with_context(|| {
        format!("Failed to create state directory: {}", paths.state_dir.display())
    })?;

    std::fs::write(&paths.config, config::default_config_toml())
        .with_context(|| format!("Failed to write config: {}", paths.config.display()))?;

    let gitignore = paths.state_dir.join(".gitignore");
    std::fs::write(&gitignore, GITIGNORE)
        .with_context(|| format!("Failed to write .gitignore: {}", gitignore.display()))?;

    let conn = sqlite::open_database(&paths.database)?;
    let applied = migrations::history(&conn).context("read schema history")?;
    tracing::info!(root = %project_root.display(), "initialized redraft project");

    let result = InitOutput {
        ok: true,
        state_dir: paths.state_dir.display().to_string(),
        config: paths.config.display().to_string(),
        database: paths.database.display().to_string(),
        schema_version: applied.last().map_or(0, |m| m.version),
        migrations: applied
            .iter()
            .map(|m| format!("v{} {} ({})", m.version, m.name, m.applied_at))
            .collect(),
    };
    render(output, &result, |out, w| {
        writeln!(w, "✓ Initialized {STATE_DIR}/ project structure.")?;
        writeln!(w)?;
        writeln!(w, "  Config:   {STATE_DIR}/config.toml")?;
        writeln!(w, "  Database: {STATE_DIR}/redraft.sqlite3 (schema v{})", out.schema_version)?;
        writeln!(w)?;
        writeln!(w, "Next steps:")?;
        writeln!(w, "  Create a published document:")?;
        writeln!(w, "    rd create --title \"Election night\" --body \"Polls close at eight.\"")?;
        writeln!(w)?;
        writeln!(w, "  Start a private revision of it:")?;
        writeln!(w, "    rd fork 1")
    })
}
