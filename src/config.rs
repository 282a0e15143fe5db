//! TOML configuration parsing and validation.
//!
//! All runtime settings arrive through [`Config`]; nothing below the
//! entry point reads the environment. The one exception is resolved here,
//! once: the completion API key is read from the variable named by
//! `llm.api_key_env` and stored in [`LlmConfig::api_key`].

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Resolved by [`Config::resolve_credentials`], never read from the file.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            api_key: None,
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_temperature() -> f32 {
    0.2
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    /// Whether a remote completion client can be built at all.
    pub fn has_credentials(&self) -> bool {
        self.is_enabled()
            && self
                .api_key
                .as_deref()
                .is_some_and(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Most recent entries scanned by knowledge search.
    #[serde(default = "default_knowledge_scan_limit")]
    pub knowledge_scan_limit: usize,
    /// Most recent tasks scanned by task ranking.
    #[serde(default = "default_task_scan_limit")]
    pub task_scan_limit: usize,
    #[serde(default = "default_chat_limit")]
    pub chat_knowledge_limit: usize,
    #[serde(default = "default_chat_limit")]
    pub chat_task_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            knowledge_scan_limit: default_knowledge_scan_limit(),
            task_scan_limit: default_task_scan_limit(),
            chat_knowledge_limit: default_chat_limit(),
            chat_task_limit: default_chat_limit(),
        }
    }
}

fn default_knowledge_scan_limit() -> usize {
    200
}
fn default_task_scan_limit() -> usize {
    50
}
fn default_chat_limit() -> usize {
    3
}

impl Config {
    /// Configuration used when no config file exists.
    ///
    /// The database lives in `$CAMPUS_CONNECT_STATE_DIR`, falling back to
    /// `~/.campus_connect_portal`.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: default_state_dir().join("state.db"),
            },
            llm: LlmConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }

    /// Read the completion API key from the configured environment variable.
    pub fn resolve_credentials(&mut self) {
        self.llm.api_key = std::env::var(&self.llm.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
    }
}

fn default_state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CAMPUS_CONNECT_STATE_DIR") {
        return PathBuf::from(dir);
    }
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".campus_connect_portal")
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

fn validate(config: &Config) -> Result<()> {
    let retrieval = &config.retrieval;
    if retrieval.knowledge_scan_limit == 0 {
        anyhow::bail!("retrieval.knowledge_scan_limit must be >= 1");
    }
    if retrieval.task_scan_limit == 0 {
        anyhow::bail!("retrieval.task_scan_limit must be >= 1");
    }
    if retrieval.chat_knowledge_limit == 0 || retrieval.chat_task_limit == 0 {
        anyhow::bail!("retrieval.chat_knowledge_limit and chat_task_limit must be >= 1");
    }

    if config.llm.timeout_secs == 0 {
        anyhow::bail!("llm.timeout_secs must be >= 1");
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }

    match config.llm.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be openai or disabled.",
            other
        ),
    }

    Ok(())
}
