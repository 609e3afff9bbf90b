//! Configuration loading and validation.
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. Built-in defaults (every section is optional).
//! 2. The TOML file given by `--config` (a missing file is not an error).
//! 3. Environment variables: `OPENAI_API_KEY`, `OPENAI_MODEL`,
//!    `OPENAI_BASE_URL`, `LANGCHAIN_API_KEY`, `LANGCHAIN_PROJECT`,
//!    `LANGCHAIN_ENDPOINT`, `LANGCHAIN_TRACING_V2`.
//!
//! [`load_config`] checks structure and value ranges. Secrets are checked
//! separately by [`Config::require`], because only some commands need them.
//!
//! ```toml
//! [documents]
//! folder = "rawdata"
//!
//! [chunking]
//! chunk_size = 1000
//! chunk_overlap = 200
//!
//! [model]
//! name = "gpt-4o-mini"
//!
//! [tracing]
//! enabled = true
//! project = "my-chatbot"
//! ```

use std::path::{Path, PathBuf};

use ragbot_core::chunk::ChunkPolicy;
use ragbot_core::error::ConfigError;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/ragbot.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    #[serde(default = "default_documents_folder")]
    pub folder: PathBuf,
    /// Extra include patterns; empty means every supported extension.
    #[serde(default)]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Files larger than this are reported as failures instead of loaded.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            folder: default_documents_folder(),
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_documents_folder() -> PathBuf {
    PathBuf::from("rawdata")
}
fn default_max_file_bytes() -> u64 {
    50 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn policy(&self) -> ChunkPolicy {
        ChunkPolicy::new(self.chunk_size, self.chunk_overlap)
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    ragbot_core::retrieve::DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"openai"` or `"local"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn model_name(&self) -> String {
        match (&self.model, self.provider.as_str()) {
            (Some(model), _) => model.clone(),
            (None, "local") => "all-minilm-l6-v2".to_string(),
            (None, _) => "text-embedding-3-small".to_string(),
        }
    }

    pub fn dims(&self) -> usize {
        if let Some(dims) = self.dims {
            return dims;
        }
        match self.model_name().as_str() {
            "text-embedding-3-small" | "text-embedding-ada-002" => 1536,
            "text-embedding-3-large" => 3072,
            "bge-base-en-v1.5" | "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => 768,
            "multilingual-e5-base" => 768,
            "bge-large-en-v1.5" | "multilingual-e5-large" => 1024,
            _ => 384,
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Normally supplied through `OPENAI_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            temperature: 0.0,
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_model_timeout_secs(),
            max_tokens: None,
        }
    }
}

fn default_model_name() -> String {
    "gpt-4o-mini".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    /// Whether new sessions start with retrieval on.
    #[serde(default = "default_true")]
    pub rag_enabled: bool,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_context_chars")]
    pub context_chars: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            rag_enabled: true,
            system_prompt: None,
            context_chars: default_context_chars(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_context_chars() -> usize {
    ragbot_core::agent::graph::DEFAULT_CONTEXT_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct TracingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_tracing_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_tracing_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            project: None,
            api_key: None,
            endpoint: default_tracing_endpoint(),
            timeout_secs: default_tracing_timeout_secs(),
        }
    }
}

fn default_tracing_endpoint() -> String {
    "https://api.smith.langchain.com".to_string()
}
fn default_tracing_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScrapeConfig {
    #[serde(default = "default_scrape_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_scrape_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_scrape_timeout_secs() -> u64 {
    10
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `"warn"` or `"ragbot=debug"`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Which secrets a command needs before it may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Only the local store (init, stats, clear).
    Store,
    /// Store plus the embedding backend (ingest, scrape).
    Embedding,
    /// Everything the chat front ends use, tracing included.
    Chat,
}

impl Config {
    /// API key shared by the chat model and the OpenAI embedder.
    pub fn openai_api_key(&self) -> Option<&str> {
        self.model.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    /// Apply environment overrides, reading variables through `lookup`.
    pub fn overlay_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("OPENAI_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Some(model) = get("OPENAI_MODEL") {
            self.model.name = model;
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.model.base_url = url;
        }
        if let Some(key) = get("LANGCHAIN_API_KEY") {
            self.tracing.api_key = Some(key);
        }
        if let Some(project) = get("LANGCHAIN_PROJECT") {
            self.tracing.project = Some(project);
        }
        if let Some(endpoint) = get("LANGCHAIN_ENDPOINT") {
            self.tracing.endpoint = endpoint;
        }
        if let Some(flag) = get("LANGCHAIN_TRACING_V2") {
            self.tracing.enabled = match flag.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" => false,
                other => {
                    return Err(ConfigError::Invalid {
                        key: "LANGCHAIN_TRACING_V2",
                        reason: format!("expected true or false, got '{}'", other),
                    })
                }
            };
        }
        Ok(())
    }

    /// Check value ranges and enumerations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.chunking.chunk_size == 0 {
            problems.push(ConfigError::Invalid {
                key: "chunking.chunk_size",
                reason: "must be > 0".to_string(),
            });
        } else if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            problems.push(ConfigError::Invalid {
                key: "chunking.chunk_overlap",
                reason: "must be smaller than chunking.chunk_size".to_string(),
            });
        }

        if self.retrieval.top_k == 0 {
            problems.push(ConfigError::Invalid {
                key: "retrieval.top_k",
                reason: "must be >= 1".to_string(),
            });
        }

        if self.embedding.batch_size == 0 {
            problems.push(ConfigError::Invalid {
                key: "embedding.batch_size",
                reason: "must be > 0".to_string(),
            });
        }

        match self.embedding.provider.as_str() {
            "openai" | "local" => {}
            other => problems.push(ConfigError::Invalid {
                key: "embedding.provider",
                reason: format!("unknown provider '{}', expected openai or local", other),
            }),
        }

        if !(0.0..=2.0).contains(&self.model.temperature) {
            problems.push(ConfigError::Invalid {
                key: "model.temperature",
                reason: "must be in [0.0, 2.0]".to_string(),
            });
        }

        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            problems.push(ConfigError::Invalid {
                key: "server.bind",
                reason: format!("'{}' is not a socket address", self.server.bind),
            });
        }

        collect(problems)
    }

    /// Check that the secrets needed for `requirement` are present.
    pub fn require(&self, requirement: Requirement) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        let needs_openai = match requirement {
            Requirement::Store => false,
            Requirement::Embedding => self.embedding.provider == "openai",
            Requirement::Chat => true,
        };
        if needs_openai && self.openai_api_key().is_none() {
            problems.push(ConfigError::Missing {
                key: "OPENAI_API_KEY",
                description: "API key for the language model provider",
            });
        }

        if requirement == Requirement::Chat && self.tracing.enabled {
            if self.tracing.api_key.as_deref().map_or(true, str::is_empty) {
                problems.push(ConfigError::Missing {
                    key: "LANGCHAIN_API_KEY",
                    description: "API key for conversation tracing",
                });
            }
            if self.tracing.project.as_deref().map_or(true, str::is_empty) {
                problems.push(ConfigError::Missing {
                    key: "LANGCHAIN_PROJECT",
                    description: "project name for conversation tracing",
                });
            }
        }

        collect(problems)
    }
}

fn collect(mut problems: Vec<ConfigError>) -> Result<(), ConfigError> {
    match problems.len() {
        0 => Ok(()),
        1 => Err(problems.remove(0)),
        _ => Err(ConfigError::Many(problems)),
    }
}

/// Parse a TOML document into a [`Config`] without touching the
/// environment.
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::Invalid {
        key: "config",
        reason: format!("failed to parse config file: {}", e),
    })
}

/// Load the config file (defaults if it does not exist), apply the process
/// environment and validate the result.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Invalid {
            key: "config",
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        parse_config(&content)?
    } else {
        Config::default()
    };

    config.overlay_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn example_config_parses() {
        let config = parse_config(include_str!("../config/ragbot.example.toml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8501");
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.embedding.dims(), 1536);
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.documents.folder, PathBuf::from("rawdata"));
        assert_eq!(config.model.name, "gpt-4o-mini");
        assert_eq!(config.embedding.model_name(), "text-embedding-3-small");
        assert_eq!(config.embedding.dims(), 1536);
        assert!(config.tracing.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_file() {
        let mut config = parse_config("[model]\nname = \"gpt-4o\"\n").unwrap();
        config
            .overlay_env(env(&[
                ("OPENAI_API_KEY", "sk-test"),
                ("OPENAI_MODEL", "gpt-4.1-mini"),
                ("LANGCHAIN_TRACING_V2", "false"),
            ]))
            .unwrap();
        assert_eq!(config.model.name, "gpt-4.1-mini");
        assert_eq!(config.openai_api_key(), Some("sk-test"));
        assert!(!config.tracing.enabled);
        assert!(config.require(Requirement::Chat).is_ok());
    }

    #[test]
    fn chat_requires_all_keys() {
        let mut config = Config::default();
        config.overlay_env(env(&[])).unwrap();
        let err = config.require(Requirement::Chat).unwrap_err();
        let keys: Vec<String> = err
            .problems()
            .iter()
            .map(|p| match p {
                ConfigError::Missing { key, .. } => key.to_string(),
                other => other.to_string(),
            })
            .collect();
        assert_eq!(
            keys,
            vec!["OPENAI_API_KEY", "LANGCHAIN_API_KEY", "LANGCHAIN_PROJECT"]
        );
    }

    #[test]
    fn store_commands_need_no_secrets() {
        let config = Config::default();
        assert!(config.require(Requirement::Store).is_ok());
        assert!(config.require(Requirement::Embedding).is_err());

        let mut local = Config::default();
        local.embedding.provider = "local".to_string();
        assert!(local.require(Requirement::Embedding).is_ok());
        assert_eq!(local.embedding.model_name(), "all-minilm-l6-v2");
        assert_eq!(local.embedding.dims(), 384);
    }

    #[test]
    fn invalid_values_are_all_reported() {
        let config = parse_config(
            r#"
[chunking]
chunk_size = 100
chunk_overlap = 100

[retrieval]
top_k = 0

[embedding]
provider = "magic"
"#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(err.problems().len(), 3);
    }

    #[test]
    fn bad_tracing_flag_is_rejected() {
        let mut config = Config::default();
        let err = config
            .overlay_env(env(&[("LANGCHAIN_TRACING_V2", "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("LANGCHAIN_TRACING_V2"));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        assert!(matches!(
            parse_config("[chunking\nchunk_size = 1"),
            Err(ConfigError::Invalid { key: "config", .. })
        ));
    }

    #[test]
    fn missing_file_means_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.store.path, PathBuf::from("data/ragbot.sqlite"));
    }
}
