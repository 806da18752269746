//! TOML configuration.
//!
//! Every section is optional; missing keys fall back to the defaults below,
//! which match the behavior of a bare `lexrag serve`.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8000"
//! request_timeout_secs = 120
//!
//! [chunking]
//! chunk_size = 500
//! overlap = 100
//!
//! [retrieval]
//! default_top_k = 3
//! max_top_k = 50
//! scoring = "raw"            # or "length_normalized"
//! max_context_chars = 6000
//!
//! [generator]
//! provider = "ollama"        # or "disabled"
//! base_url = "http://localhost:11434"
//! model = "qwen2.5:0.5b"
//! timeout_secs = 30
//! max_retries = 2
//!
//! [ingest]
//! max_file_bytes = 52428800
//! sample_document = "./data/sample.pdf"
//! ```
//!
//! The `OLLAMA_URL` environment variable, when set, overrides
//! `generator.base_url`.

use anyhow::{bail, Context, Result};
use lexrag_core::chunk::ChunkParams;
use lexrag_core::score::ScoringPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Upper bound on a whole `/query` request, generator retries included.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}
fn default_request_timeout_secs() -> u64 {
    120
}

/// Default window geometry, used when an ingest request omits it.
#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> Result<ChunkParams> {
        Ok(ChunkParams::new(self.chunk_size, self.overlap)?)
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
    #[serde(default)]
    pub scoring: ScoringPolicy,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            scoring: ScoringPolicy::default(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_max_top_k() -> usize {
    50
}
fn default_max_context_chars() -> usize {
    6000
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneratorConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Hard timeout for a single generation attempt.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra attempts after the first one fails transiently.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl GeneratorConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_provider() -> String {
    "ollama".to_string()
}
fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    "qwen2.5:0.5b".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,
    /// Document ingested once at startup, if the file exists.
    #[serde(default)]
    pub sample_document: Option<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
            sample_document: None,
        }
    }
}

fn default_max_file_bytes() -> usize {
    50 * 1024 * 1024
}

impl Config {
    /// Defaults for every section, used when no config file is present.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        self.chunking
            .params()
            .context("invalid [chunking] section")?;

        if self.retrieval.max_top_k == 0 {
            bail!("retrieval.max_top_k must be >= 1");
        }
        if self.retrieval.default_top_k == 0
            || self.retrieval.default_top_k > self.retrieval.max_top_k
        {
            bail!(
                "retrieval.default_top_k must be in [1, {}]",
                self.retrieval.max_top_k
            );
        }
        if self.retrieval.max_context_chars == 0 {
            bail!("retrieval.max_context_chars must be > 0");
        }

        match self.generator.provider.as_str() {
            "disabled" | "ollama" => {}
            other => bail!(
                "Unknown generator provider: '{}'. Must be ollama or disabled.",
                other
            ),
        }
        if self.generator.timeout_secs == 0 {
            bail!("generator.timeout_secs must be > 0");
        }
        if self.generator.model.trim().is_empty() {
            bail!("generator.model must not be empty");
        }

        if self.ingest.max_file_bytes == 0 {
            bail!("ingest.max_file_bytes must be > 0");
        }
        if self.server.request_timeout_secs == 0 {
            bail!("server.request_timeout_secs must be > 0");
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            if !url.trim().is_empty() {
                self.generator.base_url = url;
            }
        }
    }
}

/// Parse and validate configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from `path`, applying environment overrides.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let mut config = parse_config(&content)?;
    config.apply_env_overrides();
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        return load_config(path);
    }
    tracing::info!(path = %path.display(), "config file not found, using defaults");
    let mut config = Config::minimal();
    config.apply_env_overrides();
    Ok(config)
}
