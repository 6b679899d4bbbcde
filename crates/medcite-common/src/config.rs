//! Configuration loading for Medcite.
//! Reads medcite.toml from the current directory or the path in the
//! MEDCITE_CONFIG env var. Every section and field has a default, so a
//! missing file still yields a config pointed at localhost services.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{MedciteError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub qdrant: QdrantConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Remote archive server (PubMed baseline FTP).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_archive_host")]
    pub host: String,
    #[serde(default = "default_archive_directory")]
    pub directory: String,
    /// Baseline file name prefix; files are `<prefix><nnnn>.xml.gz`.
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    #[serde(default = "default_retries")]
    pub retries: usize,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Courtesy delay between successive retrievals on one session.
    #[serde(default = "default_fetch_delay_secs")]
    pub fetch_delay_secs: u64,
}

fn default_archive_host() -> String { "ftp.ncbi.nlm.nih.gov".to_string() }
fn default_archive_directory() -> String { "/pubmed/baseline/".to_string() }
fn default_file_prefix() -> String { "pubmed24n".to_string() }
fn default_retries() -> usize { 3 }
fn default_retry_delay_secs() -> u64 { 2 }
fn default_fetch_delay_secs() -> u64 { 1 }

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            host: default_archive_host(),
            directory: default_archive_directory(),
            file_prefix: default_file_prefix(),
            retries: default_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            fetch_delay_secs: default_fetch_delay_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantConfig {
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_vector_dim")]
    pub vector_dim: usize,
}

fn default_qdrant_url() -> String { "http://localhost:6333".to_string() }
fn default_collection() -> String { "PubMed".to_string() }
fn default_vector_dim() -> usize { 1024 }

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            collection: default_collection(),
            vector_dim: default_vector_dim(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embed_model")]
    pub model: String,
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
}

fn default_embed_model() -> String { "bge-m3".to_string() }
fn default_ollama_url() -> String { "http://localhost:11434".to_string() }

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embed_model(),
            base_url: default_ollama_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Name of the env var holding the API key; the key itself never
    /// lives in the config file.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
}

fn default_llm_model() -> String { "gpt-4.1".to_string() }
fn default_api_key_env() -> String { "OPENAI_API_KEY".to_string() }
fn default_llm_base_url() -> String { "https://api.openai.com".to_string() }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            api_key_env: default_api_key_env(),
            base_url: default_llm_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Ceiling on adaptive-search passes before returning a partial set.
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,
}

fn default_top_n() -> usize { 25 }
fn default_max_passes() -> usize { 12 }

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            max_passes: default_max_passes(),
        }
    }
}

impl Config {
    /// Load from an explicit path, MEDCITE_CONFIG, or ./medcite.toml,
    /// falling back to defaults when no file exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let candidate = path
            .map(|p| p.to_path_buf())
            .or_else(|| std::env::var("MEDCITE_CONFIG").ok().map(Into::into))
            .unwrap_or_else(|| "medcite.toml".into());

        if !candidate.exists() {
            tracing::debug!(path = %candidate.display(), "No config file; using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&candidate)
            .map_err(|e| MedciteError::Config(format!("read {}: {e}", candidate.display())))?;
        toml::from_str(&raw)
            .map_err(|e| MedciteError::Config(format!("parse {}: {e}", candidate.display())))
    }
}
