//! Application configuration for DeepResearch.
//!
//! User config lives at `~/.deepresearch/deepresearch.toml`.
//! CLI flags override config file values, which override defaults.
//! API keys are never written to the file; it only names the env vars
//! that hold them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DeepResearchError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "deepresearch.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".deepresearch";

// ---------------------------------------------------------------------------
// Config structs (matching deepresearch.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Completion (text-generation) service settings.
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Retrieval (web search) service settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// `[completion]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_completion_key_env")]
    pub api_key_env: String,

    /// Model identifier sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Full chat-completions endpoint URL.
    #[serde(default = "default_completion_url")]
    pub base_url: String,

    /// Value of the `HTTP-Referer` header.
    #[serde(default = "default_referer")]
    pub referer: String,

    /// Value of the `X-Title` header.
    #[serde(default = "default_app_title")]
    pub app_title: String,

    /// Request timeout in seconds.
    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_completion_key_env(),
            model: default_model(),
            base_url: default_completion_url(),
            referer: default_referer(),
            app_title: default_app_title(),
            timeout_secs: default_completion_timeout(),
        }
    }
}

fn default_completion_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "thudm/glm-4-32b:free".into()
}
fn default_completion_url() -> String {
    "https://openrouter.ai/api/v1/chat/completions".into()
}
fn default_referer() -> String {
    "http://localhost".into()
}
fn default_app_title() -> String {
    "Deep Research System".into()
}
fn default_completion_timeout() -> u64 {
    120
}

/// `[retrieval]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_retrieval_key_env")]
    pub api_key_env: String,

    /// Search API root; `/search` is appended.
    #[serde(default = "default_retrieval_url")]
    pub base_url: String,

    /// Maximum number of results requested and kept per query.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Provider search depth ("basic" or "advanced").
    #[serde(default = "default_search_depth")]
    pub search_depth: String,

    /// Request timeout in seconds.
    #[serde(default = "default_retrieval_timeout")]
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_retrieval_key_env(),
            base_url: default_retrieval_url(),
            max_results: default_max_results(),
            search_depth: default_search_depth(),
            timeout_secs: default_retrieval_timeout(),
        }
    }
}

fn default_retrieval_key_env() -> String {
    "TAVILY_API_KEY".into()
}
fn default_retrieval_url() -> String {
    "https://api.tavily.com".into()
}
fn default_max_results() -> usize {
    5
}
fn default_search_depth() -> String {
    "basic".into()
}
fn default_retrieval_timeout() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Credentials (resolved once at startup)
// ---------------------------------------------------------------------------

/// The two API keys, resolved from the environment before any query runs.
#[derive(Clone)]
pub struct Credentials {
    pub completion_key: String,
    pub retrieval_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("completion_key", &"<redacted>")
            .field("retrieval_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Resolve both keys from the process environment.
    pub fn from_env(config: &AppConfig) -> Result<Self> {
        Self::from_lookup(config, |name| std::env::var(name).ok())
    }

    /// Resolve both keys through `lookup`, which maps an env var name to its value.
    ///
    /// Fails with a config error naming every missing or empty variable.
    pub fn from_lookup<F>(config: &AppConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let resolve = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let completion_var = &config.completion.api_key_env;
        let retrieval_var = &config.retrieval.api_key_env;

        match (resolve(completion_var), resolve(retrieval_var)) {
            (Some(completion_key), Some(retrieval_key)) => Ok(Self {
                completion_key,
                retrieval_key,
            }),
            (completion, retrieval) => {
                let missing: Vec<&str> = [
                    completion.is_none().then_some(completion_var.as_str()),
                    retrieval.is_none().then_some(retrieval_var.as_str()),
                ]
                .into_iter()
                .flatten()
                .collect();

                Err(DeepResearchError::config(format!(
                    "{} is not set. Add it to your environment or a .env file.",
                    missing.join(" and ")
                )))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.deepresearch/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DeepResearchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.deepresearch/deepresearch.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DeepResearchError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        DeepResearchError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DeepResearchError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DeepResearchError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DeepResearchError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
