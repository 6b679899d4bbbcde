//! Qdrant REST client for the abstract collection.
//!
//! Deliberately small: collection bootstrap, point upsert, and raw
//! nearest-neighbour queries against the named vector. The adaptive
//! result-set logic lives in medcite-search, behind the [`VectorSearch`]
//! trait so it can be driven by an in-memory fake.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::schema::{embedding_field_name, ArticlePayload};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Qdrant error [{status}]: {message}")]
    Api { status: u16, message: String },
}

/// One scored nearest-neighbour hit.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoredPoint {
    pub id: u64,
    pub score: f32,
    #[serde(default)]
    pub payload: ArticlePayload,
}

/// Raw nearest-neighbour access, as the adaptive search loop sees it.
///
/// Implementations must preserve a stable rank ordering across repeated
/// queries with increasing limits: the caller only ever inspects the
/// newly-revealed tail of each response.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    async fn search_points(
        &self,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, IndexError>;
}

pub struct QdrantStore {
    base_url: String,
    collection: String,
    vector_name: String,
    client: reqwest::Client,
}

impl QdrantStore {
    /// `embedding_model` is the model that produced (and will produce) the
    /// stored vectors; the vector field name derives from it here, once,
    /// for both the write and read paths.
    pub fn new(
        base_url: impl Into<String>,
        collection: impl Into<String>,
        embedding_model: &str,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.into(),
            vector_name: embedding_field_name(embedding_model),
            client: reqwest::Client::new(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn vector_name(&self) -> &str {
        &self.vector_name
    }

    async fn check(resp: reqwest::Response) -> Result<serde_json::Value, IndexError> {
        let status = resp.status().as_u16();
        let body: serde_json::Value = resp.json().await?;
        if status >= 400 {
            let message = body["status"]["error"]
                .as_str()
                .unwrap_or("unknown Qdrant error")
                .to_string();
            return Err(IndexError::Api { status, message });
        }
        Ok(body)
    }

    /// Create the collection with the named cosine vector when missing.
    pub async fn ensure_collection(&self, dim: usize) -> Result<(), IndexError> {
        let url = format!("{}/collections/{}", self.base_url, self.collection);
        let resp = self.client.get(&url).send().await?;
        if resp.status().is_success() {
            info!(collection = %self.collection, "Collection already exists");
            return Ok(());
        }

        info!(collection = %self.collection, dim, "Creating collection");
        let body = serde_json::json!({
            "vectors": {
                self.vector_name.as_str(): { "size": dim, "distance": "Cosine" }
            }
        });
        let resp = self.client.put(&url).json(&body).send().await?;
        Self::check(resp).await?;
        Ok(())
    }

    /// Upsert one article point, keyed by its integer PMID. Re-upserting
    /// the same PMID replaces the stored point.
    pub async fn upsert_article(
        &self,
        pmid: u64,
        vector: &[f32],
        payload: &ArticlePayload,
    ) -> Result<(), IndexError> {
        let url = format!(
            "{}/collections/{}/points?wait=true",
            self.base_url, self.collection
        );
        let body = serde_json::json!({
            "points": [{
                "id": pmid,
                "vector": { self.vector_name.as_str(): vector },
                "payload": payload,
            }]
        });
        let resp = self.client.put(&url).json(&body).send().await?;
        Self::check(resp).await?;
        debug!(pmid, "Upserted article point");
        Ok(())
    }
}

#[async_trait]
impl VectorSearch for QdrantStore {
    async fn search_points(
        &self,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, IndexError> {
        #[derive(Deserialize)]
        struct SearchResponse {
            result: Vec<ScoredPoint>,
        }

        let url = format!(
            "{}/collections/{}/points/search",
            self.base_url, self.collection
        );
        let body = serde_json::json!({
            "vector": { "name": &self.vector_name, "vector": vector },
            "limit": limit,
            "with_payload": true,
        });
        let resp = self.client.post(&url).json(&body).send().await?;
        let json = Self::check(resp).await?;
        let parsed: SearchResponse = serde_json::from_value(json)?;
        debug!(limit, hits = parsed.result.len(), "Qdrant search");
        Ok(parsed.result)
    }
}
