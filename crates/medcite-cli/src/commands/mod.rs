//! Subcommand implementations and the service clients they share.

pub mod ask;
pub mod batch;
pub mod check;
pub mod ingest;

use serde::{Deserialize, Serialize};

use medcite_common::Config;
use medcite_index::QdrantStore;
use medcite_llm::{OllamaBackend, OpenAiBackend};
use medcite_search::CitationMap;

/// One line of a saved batch run, as written by `batch` and read back by
/// `check`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchRecord {
    pub name: String,
    #[serde(default)]
    pub abstracts: String,
    #[serde(default)]
    pub citations: CitationMap,
    #[serde(default)]
    pub answer: String,
}

pub(crate) fn build_store(cfg: &Config) -> QdrantStore {
    QdrantStore::new(
        cfg.qdrant.url.clone(),
        cfg.qdrant.collection.clone(),
        &cfg.embedding.model,
    )
}

pub(crate) fn build_embedder(cfg: &Config) -> OllamaBackend {
    OllamaBackend::new(cfg.embedding.base_url.clone(), cfg.embedding.model.clone())
}

pub(crate) fn build_completion(cfg: &Config) -> anyhow::Result<OpenAiBackend> {
    let api_key = std::env::var(&cfg.llm.api_key_env).map_err(|_| {
        anyhow::anyhow!(
            "{} is not set; the completion service needs an API key",
            cfg.llm.api_key_env
        )
    })?;
    Ok(OpenAiBackend::new(api_key, cfg.llm.model.clone()).with_base_url(cfg.llm.base_url.clone()))
}
