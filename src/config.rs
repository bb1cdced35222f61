//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/docqa.sqlite"
//!
//! [retrieval]
//! similarity_threshold = 0.7
//! hybrid_alpha = 0.6
//! candidate_k = 30
//! default_k = 10
//!
//! [embedding]
//! provider = "hash"      # hash | openai | ollama | local
//! dims = 384
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! ```
//!
//! Only `[db]` is required. Configuration is read once at startup.

use anyhow::{bail, Context, Result};
use docqa_core::engine::{RetrievalParams, DEFAULT_CANDIDATE_K, DEFAULT_K, MAX_K, MIN_K};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Minimum top score required to answer.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Semantic weight in hybrid fusion.
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f64,
    /// Semantic candidates fetched before fusion.
    #[serde(default = "default_candidate_k")]
    pub candidate_k: usize,
    /// Result count when a request does not specify one.
    #[serde(default = "default_k")]
    pub default_k: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            hybrid_alpha: default_hybrid_alpha(),
            candidate_k: default_candidate_k(),
            default_k: default_k(),
        }
    }
}

fn default_similarity_threshold() -> f64 {
    0.7
}
fn default_hybrid_alpha() -> f64 {
    0.6
}
fn default_candidate_k() -> usize {
    DEFAULT_CANDIDATE_K
}
fn default_k() -> i64 {
    DEFAULT_K as i64
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
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
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
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
            url: None,
        }
    }
}

fn default_provider() -> String {
    "hash".to_string()
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
    "127.0.0.1:8000".to_string()
}

impl Config {
    /// Defaults everywhere, database under `./data`.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/docqa.sqlite"),
            },
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            server: ServerConfig::default(),
        }
    }

    pub fn retrieval_params(&self) -> RetrievalParams {
        RetrievalParams {
            similarity_threshold: self.retrieval.similarity_threshold,
            alpha: self.retrieval.hybrid_alpha,
            candidate_k: self.retrieval.candidate_k,
        }
    }

    /// Check value ranges and provider settings.
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if !(r.similarity_threshold > 0.0 && r.similarity_threshold <= 1.0) {
            bail!("retrieval.similarity_threshold must be in (0.0, 1.0]");
        }
        if !(0.0..=1.0).contains(&r.hybrid_alpha) {
            bail!("retrieval.hybrid_alpha must be in [0.0, 1.0]");
        }
        if r.candidate_k < 1 {
            bail!("retrieval.candidate_k must be >= 1");
        }
        if r.default_k < MIN_K as i64 || r.default_k > MAX_K as i64 {
            bail!("retrieval.default_k must be in [{}, {}]", MIN_K, MAX_K);
        }

        let e = &self.embedding;
        if e.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }
        if e.dims == Some(0) {
            bail!("embedding.dims must be > 0");
        }
        match e.provider.as_str() {
            "hash" | "local" => {}
            "openai" | "ollama" => {
                if e.dims.is_none() {
                    bail!("embedding.dims must be set when provider is '{}'", e.provider);
                }
                if e.model.is_none() {
                    bail!(
                        "embedding.model must be specified when provider is '{}'",
                        e.provider
                    );
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be hash, openai, ollama, or local.",
                other
            ),
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    tracing::debug!(path = %path.display(), provider = %config.embedding.provider, "config loaded");
    Ok(config)
}
