use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::api::KeyedTokens;
use crate::fork::{ForkOptions, RetireMode};
use crate::status::StatusRegistry;
use crate::store::StoreOptions;
use crate::workflow::EditLinks;

/// Name of the per-project state directory.
pub const STATE_DIR: &str = ".redraft";

/// Well-known files inside a project's state directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub state_dir: PathBuf,
    pub config: PathBuf,
    pub database: PathBuf,
    pub write_lock: PathBuf,
    pub api_key: PathBuf,
}

impl ProjectPaths {
    #[must_use]
    pub fn new(root: &Path) -> Self {
        let state_dir = root.join(STATE_DIR);
        Self {
            root: root.to_path_buf(),
            config: state_dir.join("config.toml"),
            database: state_dir.join("redraft.sqlite3"),
            write_lock: state_dir.join("write.lock"),
            api_key: state_dir.join("api.key"),
            state_dir,
        }
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state_dir.is_dir()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub statuses: StatusConfig,
    #[serde(default)]
    pub fork: ForkConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusConfig {
    #[serde(default = "default_published")]
    pub published: String,
    #[serde(default = "default_draft_fork")]
    pub draft_fork: String,
    #[serde(default = "default_pending_fork")]
    pub pending_fork: String,
    #[serde(default = "default_merged")]
    pub merged: String,
    #[serde(default = "default_ordinary")]
    pub ordinary: Vec<String>,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            published: default_published(),
            draft_fork: default_draft_fork(),
            pending_fork: default_pending_fork(),
            merged: default_merged(),
            ordinary: default_ordinary(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkConfig {
    #[serde(default)]
    pub extra_excluded_fields: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default)]
    pub retire: RetireMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_site_url")]
    pub url: String,
    #[serde(default = "default_edit_path")]
    pub edit_path: String,
    #[serde(default = "default_view_path")]
    pub view_path: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            url: default_site_url(),
            edit_path: default_edit_path(),
            view_path: default_view_path(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Token signing secret. Empty means "use the project key file".
    #[serde(default)]
    pub token_secret: String,
}

impl ProjectConfig {
    #[must_use]
    pub fn status_registry(&self) -> StatusRegistry {
        let s = &self.statuses;
        StatusRegistry::new(
            s.published.trim(),
            s.draft_fork.trim(),
            s.pending_fork.trim(),
            s.merged.trim(),
            s.ordinary.iter().map(|name| name.trim().to_string()),
        )
    }

    #[must_use]
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            site_url: self.site.url.clone(),
            open_fork_statuses: self.status_registry().open_fork_statuses(),
        }
    }

    #[must_use]
    pub fn fork_options(&self) -> ForkOptions {
        ForkOptions {
            extra_excluded_fields: self.fork.extra_excluded_fields.clone(),
            retire: self.merge.retire,
        }
    }

    #[must_use]
    pub fn links(&self) -> EditLinks {
        EditLinks {
            site_url: self.site.url.clone(),
            edit_path: self.site.edit_path.clone(),
            view_path: self.site.view_path.clone(),
        }
    }

    /// Reject status tables the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        let s = &self.statuses;
        let named = [
            ("published", &s.published),
            ("draft_fork", &s.draft_fork),
            ("pending_fork", &s.pending_fork),
            ("merged", &s.merged),
        ];
        for (key, value) in named {
            if value.trim().is_empty() {
                bail!("[statuses] {key} must not be empty");
            }
        }
        for (i, (key, value)) in named.iter().enumerate() {
            if let Some((other, _)) = named[i + 1..].iter().find(|(_, v)| v.trim() == value.trim()) {
                bail!("[statuses] {key} and {other} share the status '{}'", value.trim());
            }
            if s.ordinary.iter().any(|o| o.trim() == value.trim()) {
                bail!("[statuses] ordinary list repeats the {key} status '{}'", value.trim());
            }
        }
        Ok(())
    }

    /// Token verifier for the endpoints.
    ///
    /// Uses `api.token_secret` when set, otherwise the project key file,
    /// creating it on first use.
    pub fn token_verifier(&self, paths: &ProjectPaths) -> Result<KeyedTokens> {
        if !self.api.token_secret.trim().is_empty() {
            return Ok(KeyedTokens::from_secret(self.api.token_secret.trim()));
        }
        load_or_create_key(&paths.api_key).map(KeyedTokens::from_key)
    }
}

fn load_or_create_key(path: &Path) -> Result<[u8; 32]> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let hash = blake3::Hash::from_hex(content.trim())
            .with_context(|| format!("Malformed API key in {}", path.display()))?;
        return Ok(*hash.as_bytes());
    }

    let key: [u8; 32] = rand::random();
    std::fs::write(path, blake3::Hash::from(key).to_hex().as_str())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "generated API token key");
    Ok(key)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = ProjectPaths::new(project_root).config;
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok(config)
}

pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("redraft/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Output mode precedence: `--json`, then `FORMAT`, then the user config,
/// then pretty on a terminal and text otherwise.
#[must_use]
pub fn resolve_output(cli_json: bool, user_output: Option<&str>, env_format: Option<&str>) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "plain" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

/// Default config file written by `rd init`.
#[must_use]
pub fn default_config_toml() -> String {
    toml::to_string_pretty(&ProjectConfig::default()).unwrap_or_default()
}

fn default_published() -> String {
    "publish".to_string()
}

fn default_draft_fork() -> String {
    "wpse-draft".to_string()
}

fn default_pending_fork() -> String {
    "wpse-pending".to_string()
}

fn default_merged() -> String {
    "wpse-merged".to_string()
}

fn default_ordinary() -> Vec<String> {
    ["draft", "pending", "private", "future"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_site_url() -> String {
    "http://localhost".to_string()
}

fn default_edit_path() -> String {
    "/wp-admin/post.php?post={id}&action=edit".to_string()
}

fn default_view_path() -> String {
    "/?p={id}".to_string()
}
